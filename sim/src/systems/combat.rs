//! Combat: stat resolution, target acquisition and firing.
//!
//! ## Targeting
//!
//! Targeting has two phases:
//!
//! 1. **Gather**: for each agent that is looking for a fight, keep its
//!    current target if it is still alive and within
//!    `detection_radius * target_hysteresis`, otherwise scan the grid for the
//!    nearest living enemy within `detection_radius`. Each agent's result is
//!    independent and only reads the grid and the agent store, so with the
//!    `parallel` feature this runs on rayon.
//! 2. **Apply**: write the gathered targets back in one sequential pass.
//!
//! ## Attacks
//!
//! An engaged agent whose target is within range and whose attack timer has
//! run out fires a projectile at the target's current position. Melee and
//! ranged attacks differ only in their [`AttackProfile`](crate::config::AttackProfile).
//! Damage is applied later, when the projectile pass records a hit.

use crate::agents::AgentStore;
use crate::components::*;
use crate::config::{CombatConfig, SimConfig};
use crate::projectiles::{FireCommand, ProjectilePool};
use crate::spatial::SpatialGrid;
use crate::systems::clock::DeltaTime;
use crate::towns::{TownRegistry, TownUpgrades, UpgradeKind};
use bevy_ecs::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Resolve an agent's stats from its job, level and its town's upgrades.
///
/// Guard-only upgrades apply to guards; `FarmerHealth` to farmers;
/// `AlertRadius` to every member of the town.
pub fn resolve_stats(
    config: &CombatConfig,
    job: Job,
    level: u32,
    upgrades: Option<&TownUpgrades>,
) -> CachedStats {
    let base = config.job_stats(job);
    let level_mult = 1.0 + level as f32 * config.level_bonus;
    let upgrade = |kind: UpgradeKind| -> f32 {
        match upgrades {
            Some(u) if !kind.guard_only() || job == Job::Guard => u.multiplier(kind),
            _ => 1.0,
        }
    };

    let mut health_mult = upgrade(UpgradeKind::GuardHealth);
    if job == Job::Farmer {
        health_mult *= upgrade(UpgradeKind::FarmerHealth);
    }

    let profile = config.profile(base.attack);
    let cooldown_mult = match upgrades {
        Some(u) if job == Job::Guard => u.cooldown_multiplier(),
        _ => 1.0,
    };

    CachedStats {
        max_health: base.max_health * health_mult * level_mult,
        speed: base.speed * upgrade(UpgradeKind::GuardMoveSpeed),
        damage: base.damage * upgrade(UpgradeKind::GuardAttack) * level_mult,
        attack: base.attack,
        range: profile.map_or(0.0, |p| p.range) * upgrade(UpgradeKind::GuardRange),
        cooldown: profile.map_or(1.0, |p| p.cooldown) * cooldown_mult,
        projectile_speed: profile.map_or(0.0, |p| p.projectile_speed),
        projectile_lifetime: profile.map_or(0.0, |p| p.projectile_lifetime),
        detection_radius: config.detection_radius * upgrade(UpgradeKind::AlertRadius),
        size: upgrade(UpgradeKind::GuardSize),
        mitigation: (level as f32 * config.mitigation_per_level).min(config.max_mitigation),
    }
}

/// Level reached with `xp` experience.
pub fn level_for_xp(config: &CombatConfig, xp: u32) -> u32 {
    xp / config.xp_per_level.max(1)
}

/// Re-resolve one agent's stats, keeping its health fraction.
pub fn refresh_stats(agents: &mut AgentStore, towns: &TownRegistry, config: &CombatConfig, slot: usize) {
    let upgrades = agents.town[slot]
        .and_then(|t| towns.get(t))
        .map(|t| &t.upgrades);
    let stats = resolve_stats(config, agents.job[slot], agents.level[slot], upgrades);
    agents.health[slot].rescale(stats.max_health);
    agents.stats[slot] = stats;
}

/// Gather phase for one agent.
fn find_target(agents: &AgentStore, grid: &SpatialGrid, config: &CombatConfig, slot: usize) -> Option<usize> {
    if !agents.state[slot].seeks_targets() || !agents.stats[slot].can_attack() || agents.recovering[slot] {
        return None;
    }
    let pos = agents.position[slot];
    let radius = agents.stats[slot].detection_radius;

    if let Some(current) = agents.combat_target[slot] {
        let keep_sq = (radius * config.target_hysteresis).powi(2);
        if agents.is_alive(current)
            && agents.faction[current] != agents.faction[slot]
            && pos.distance_sq_to(&agents.position[current]) <= keep_sq
        {
            return Some(current);
        }
    }

    grid.nearest_enemy(pos.x, pos.y, radius, agents.faction[slot].id(), |e| {
        agents.is_alive(e.slot as usize)
    })
    .map(|e| e.slot as usize)
}

/// Choose combat targets for every living agent.
///
/// ## Data Access
/// - Reads: SpatialGrid, SimConfig
/// - Writes: AgentStore::combat_target
pub fn targeting_system(grid: Res<SpatialGrid>, config: Res<SimConfig>, mut agents: ResMut<AgentStore>) {
    let combat = &config.combat;
    let grid: &SpatialGrid = &grid;

    // Gather
    let store: &AgentStore = &agents;
    #[cfg(feature = "parallel")]
    let targets: Vec<Option<usize>> = (0..store.len())
        .into_par_iter()
        .map(|slot| store.is_alive(slot).then(|| find_target(store, grid, combat, slot)).flatten())
        .collect();
    #[cfg(not(feature = "parallel"))]
    let targets: Vec<Option<usize>> = (0..store.len())
        .map(|slot| store.is_alive(slot).then(|| find_target(store, grid, combat, slot)).flatten())
        .collect();

    // Apply
    agents.combat_target = targets;
}

/// Fire at in-range targets whose attack timer has elapsed.
///
/// ## Data Access
/// - Reads: DeltaTime
/// - Writes: AgentStore::attack_timer, ProjectilePool
pub fn attack_system(dt: Res<DeltaTime>, mut agents: ResMut<AgentStore>, mut pool: ResMut<ProjectilePool>) {
    let delta = dt.0;
    let agents = &mut *agents;

    for slot in 0..agents.len() {
        if !agents.alive[slot] {
            continue;
        }
        agents.attack_timer[slot] = (agents.attack_timer[slot] - delta).max(0.0);

        let stats = agents.stats[slot];
        if !stats.can_attack() || !agents.state[slot].is_engaged() || agents.attack_timer[slot] > 0.0 {
            continue;
        }
        let Some(target) = agents.combat_target[slot].filter(|&t| agents.is_alive(t)) else {
            continue;
        };

        let from = agents.position[slot];
        let toward = agents.position[target];
        if from.distance_to(&toward) > stats.range {
            continue;
        }

        let fired = pool.fire(FireCommand {
            from,
            toward,
            speed: stats.projectile_speed,
            lifetime: stats.projectile_lifetime,
            damage: stats.damage,
            faction: agents.faction[slot].id(),
            shooter: slot,
            shooter_generation: agents.generation[slot],
        });
        if fired.is_some() {
            agents.attack_timer[slot] = stats.cooldown;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentInit;
    use crate::behavior::{BehaviorState, GuardState, RaiderState};

    fn spawn(store: &mut AgentStore, config: &CombatConfig, job: Job, x: f32) -> usize {
        let position = Position::new(x, 0.0);
        let slot = store
            .spawn(AgentInit {
                position,
                job,
                faction: job.default_faction(),
                stats: resolve_stats(config, job, 0, None),
                town: None,
                home: position,
                work: position,
                anchor: position,
                patrol_post: 0,
                level: 0,
                xp: 0,
            })
            .unwrap();
        store.state[slot] = match job {
            Job::Guard => BehaviorState::Guard(GuardState::Engaging),
            _ => BehaviorState::Raider(RaiderState::Attacking),
        };
        slot
    }

    fn world_with(store: AgentStore) -> World {
        let config = SimConfig::default();
        let mut world = World::new();
        world.insert_resource(SpatialGrid::new(&config.grid));
        world.insert_resource(ProjectilePool::new(16));
        world.insert_resource(DeltaTime(1.0 / 60.0));
        world.insert_resource(store);
        world.insert_resource(config);
        world
    }

    #[test]
    fn test_resolve_stats_applies_guard_upgrades_only_to_guards() {
        let config = CombatConfig::default();
        let mut upgrades = TownUpgrades::default();
        upgrades.set_level(UpgradeKind::GuardAttack, 5);
        upgrades.set_level(UpgradeKind::GuardAttackSpeed, 5);

        let guard = resolve_stats(&config, Job::Guard, 0, Some(&upgrades));
        assert!((guard.damage - 15.0 * 1.5).abs() < 1e-4);
        assert!((guard.cooldown - 1.5 / 1.4).abs() < 1e-4);
        assert_eq!(guard.range, 150.0);

        let raider = resolve_stats(&config, Job::Raider, 0, Some(&upgrades));
        assert_eq!(raider.damage, 15.0);
        assert_eq!(raider.range, 50.0);
    }

    #[test]
    fn test_level_scales_stats_and_mitigation() {
        let config = CombatConfig::default();
        let stats = resolve_stats(&config, Job::Raider, 10, None);
        assert!((stats.max_health - 110.0).abs() < 1e-3);
        assert!((stats.mitigation - 0.1).abs() < 1e-6);

        let capped = resolve_stats(&config, Job::Raider, 500, None);
        assert_eq!(capped.mitigation, config.max_mitigation);
        assert_eq!(level_for_xp(&config, 250), 2);
    }

    #[test]
    fn test_targeting_picks_nearest_enemy_and_skips_dead() {
        let config = CombatConfig::default();
        let mut store = AgentStore::with_capacity(8);
        let guard = spawn(&mut store, &config, Job::Guard, 0.0);
        let near = spawn(&mut store, &config, Job::Raider, 40.0);
        let far = spawn(&mut store, &config, Job::Raider, 90.0);
        store.kill(near);

        let mut world = world_with(store);
        let mut schedule = Schedule::default();
        schedule.add_systems((crate::spatial::spatial_grid_update_system, targeting_system).chain());
        schedule.run(&mut world);

        let store = world.resource::<AgentStore>();
        assert_eq!(store.combat_target[guard], Some(far));
        assert_eq!(store.combat_target[far], Some(guard));
    }

    #[test]
    fn test_attack_fires_when_in_range_and_resets_timer() {
        let config = CombatConfig::default();
        let mut store = AgentStore::with_capacity(4);
        let guard = spawn(&mut store, &config, Job::Guard, 0.0);
        let raider = spawn(&mut store, &config, Job::Raider, 120.0);
        store.combat_target[guard] = Some(raider);
        store.combat_target[raider] = Some(guard);

        let mut world = world_with(store);
        let mut schedule = Schedule::default();
        schedule.add_systems(attack_system);
        schedule.run(&mut world);

        // Guard (range 150) fires; raider (melee, range 50) cannot reach.
        assert_eq!(world.resource::<ProjectilePool>().active_count(), 1);
        let store = world.resource::<AgentStore>();
        assert_eq!(store.attack_timer[guard], store.stats[guard].cooldown);
        assert_eq!(store.attack_timer[raider], 0.0);

        schedule.run(&mut world);
        assert_eq!(world.resource::<ProjectilePool>().active_count(), 1, "still cooling down");
    }
}
