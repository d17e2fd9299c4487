//! Public API for the simulation.
//!
//! [`SimWorld`] is the interface for the host game (world setup, UI,
//! rendering). It owns the ECS world and the tick schedule.
//!
//! ## Fixed Timestep
//!
//! `step(dt)` accumulates frame time and runs as many fixed ticks as fit.
//! The phases of one tick are listed in [`crate::systems`].
//!
//! ## Invalid input
//!
//! Getters return `None` for dead or unknown slots; mutators return an error
//! and leave state untouched. Reservation calls return `Option`/`bool`.

use crate::agents::{AgentInit, AgentStore, SpawnConfig};
use crate::components::*;
use crate::compute::{create_backend, BackendKind, Compute};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::projectiles::ProjectilePool;
use crate::render_bridge;
use crate::spatial::{spatial_grid_update_system, SpatialGrid};
use crate::systems::*;
use crate::towns::{BuildingKind, Town, TownRegistry, UpgradeKind};
use crate::world::{DebugStats, Snapshot};
use bevy_ecs::prelude::*;

/// Ticks run per `step` call before the backlog is dropped.
const MAX_TICKS_PER_STEP: u32 = 8;

/// The main simulation world container.
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    paused: bool,
}

impl SimWorld {
    /// Create a simulation with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a simulation with a custom configuration, using the default
    /// CPU backend. The config is trusted; use [`SimWorld::from_config`] to
    /// validate it first.
    pub fn with_config(config: SimConfig) -> Self {
        Self::build(config, Compute::default())
    }

    /// Validate `config`, then build the world on the requested backend.
    pub fn from_config(config: SimConfig, backend: BackendKind) -> SimResult<Self> {
        config.validate()?;
        Ok(Self::build(config, Compute(create_backend(backend))))
    }

    /// Swap the compute backend used for steering and projectiles.
    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        let compute = Compute(create_backend(kind));
        tracing::info!(backend = compute.name(), "compute backend selected");
        self.world.insert_resource(compute);
        self
    }

    fn build(config: SimConfig, compute: Compute) -> Self {
        let mut world = World::new();

        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimTick(0));
        world.insert_resource(GameClock::new(&config.clock));
        world.insert_resource(SpatialGrid::new(&config.grid));
        world.insert_resource(AgentStore::with_capacity(config.max_agents));
        world.insert_resource(TownRegistry::default());
        world.insert_resource(ProjectilePool::new(config.projectiles.max_projectiles));
        world.insert_resource(SteerScratch::default());
        world.insert_resource(ProjectileScratch::default());
        world.insert_resource(DeathLog::default());
        world.insert_resource(SimRng::seeded(config.rng_seed));
        world.insert_resource(compute);
        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                clock_system,
                spatial_grid_update_system,
                targeting_system,
                decision_system,
                attack_system,
                steering_system,
                movement_system,
                projectile_system,
                damage_system,
                death_system,
                needs_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            time: 0.0,
            time_accumulator: 0.0,
            paused: false,
        }
    }

    /// Step the simulation forward by `dt` seconds of frame time.
    ///
    /// Runs zero or more fixed ticks. A long frame runs at most
    /// `MAX_TICKS_PER_STEP` ticks and drops the rest.
    pub fn step(&mut self, dt: f32) {
        if self.paused || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let fixed_dt = self.config().fixed_timestep;
        self.time_accumulator += dt;

        let mut ran = 0;
        while self.time_accumulator >= fixed_dt {
            if ran == MAX_TICKS_PER_STEP {
                tracing::warn!(backlog = self.time_accumulator, "tick backlog dropped");
                self.time_accumulator = 0.0;
                break;
            }
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
            ran += 1;
        }
    }

    /// Run exactly `ticks` fixed updates, ignoring the pause flag.
    pub fn run_ticks(&mut self, ticks: u32) {
        let fixed_dt = self.config().fixed_timestep;
        for _ in 0..ticks {
            self.fixed_update(fixed_dt);
        }
    }

    fn fixed_update(&mut self, dt: f32) {
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }
        self.schedule.run(&mut self.world);
        self.time += dt;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ticks run so far, as counted by the clock system.
    pub fn current_tick(&self) -> u64 {
        self.world.resource::<SimTick>().0
    }

    /// Simulated seconds elapsed.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Spawn an agent. Its stats come from the job, the starting level and
    /// the owning town's upgrades.
    pub fn spawn(&mut self, position: Position, job: Job, faction: Faction, spawn: SpawnConfig) -> SimResult<usize> {
        let config = self.config();
        if !position.is_finite() || !config.grid.contains(position.x, position.y) {
            tracing::warn!(x = position.x, y = position.y, job = job.name(), "spawn rejected: invalid position");
            return Err(SimError::InvalidPosition {
                x: position.x,
                y: position.y,
            });
        }
        for p in [spawn.home, spawn.work, spawn.anchor].into_iter().flatten() {
            check_position(p)?;
        }

        let towns = self.world.resource::<TownRegistry>();
        let town = match spawn.town {
            Some(t) => Some(towns.get(t).ok_or(SimError::InvalidTown(t))?),
            None => None,
        };
        let fallback = town.map_or(position, |t| t.center);
        let stats = resolve_stats(&config.combat, job, spawn.level, town.map(|t| &t.upgrades));
        let xp = spawn.level.saturating_mul(config.combat.xp_per_level);

        let init = AgentInit {
            position,
            job,
            faction,
            stats,
            town: spawn.town,
            home: spawn.home.unwrap_or(fallback),
            work: spawn.work.unwrap_or(fallback),
            anchor: spawn.anchor.unwrap_or(fallback),
            patrol_post: spawn.patrol_post,
            level: spawn.level,
            xp,
        };

        let slot = self.world.resource_mut::<AgentStore>().spawn(init).map_err(|err| {
            tracing::warn!(%err, "spawn rejected");
            err
        })?;
        tracing::debug!(slot, job = job.name(), ?faction, "agent spawned");
        Ok(slot)
    }

    /// Spawn with the job's default faction.
    pub fn spawn_job(&mut self, position: Position, job: Job, spawn: SpawnConfig) -> SimResult<usize> {
        self.spawn(position, job, job.default_faction(), spawn)
    }

    /// Set or clear a living agent's movement target.
    pub fn set_target(&mut self, slot: usize, target: Option<Position>) -> SimResult<()> {
        if let Some(t) = target {
            check_position(t)?;
        }
        let mut agents = self.world.resource_mut::<AgentStore>();
        agents.check_alive(slot)?;
        agents.set_target(slot, target);
        Ok(())
    }

    pub fn get_position(&self, slot: usize) -> Option<Position> {
        let agents = self.agents();
        agents.is_alive(slot).then(|| agents.position[slot])
    }

    pub fn get_velocity(&self, slot: usize) -> Option<Velocity> {
        let agents = self.agents();
        agents.is_alive(slot).then(|| agents.velocity[slot])
    }

    pub fn get_health(&self, slot: usize) -> Option<Health> {
        let agents = self.agents();
        agents.is_alive(slot).then(|| agents.health[slot])
    }

    pub fn is_alive(&self, slot: usize) -> bool {
        self.agents().is_alive(slot)
    }

    pub fn living_count(&self) -> usize {
        self.agents().living_count()
    }

    /// Apply damage outside the projectile pipeline, with level mitigation.
    /// An agent brought to zero dies immediately. Returns the damage dealt.
    pub fn apply_damage(&mut self, slot: usize, amount: f32) -> SimResult<f32> {
        if !amount.is_finite() {
            return Err(SimError::InvalidDamage(amount));
        }
        self.world.resource::<AgentStore>().check_alive(slot)?;

        self.world.resource_scope(|world, mut agents: Mut<AgentStore>| {
            let dealt = deal_damage(&mut agents, slot, amount, None);
            if !agents.health[slot].is_alive() {
                world.resource_scope(|world, mut towns: Mut<TownRegistry>| {
                    world.resource_scope(|world, mut log: Mut<DeathLog>| {
                        let config = world.resource::<SimConfig>();
                        kill_agent(&mut agents, &mut towns, &mut log, config, slot);
                    });
                });
            }
            Ok(dealt)
        })
    }

    /// Drain the deaths recorded since the last call.
    pub fn drain_deaths(&mut self) -> Vec<DeathEvent> {
        self.world.resource_mut::<DeathLog>().drain()
    }

    // ------------------------------------------------------------------
    // Towns
    // ------------------------------------------------------------------

    pub fn add_town(&mut self, name: &str, center: Position, faction: Faction) -> SimResult<usize> {
        check_position(center)?;
        let index = self
            .world
            .resource_mut::<TownRegistry>()
            .add(Town::new(name, center, faction));
        tracing::debug!(index, name, "town added");
        Ok(index)
    }

    fn add_building(&mut self, town: usize, kind: BuildingKind, position: Position) -> SimResult<usize> {
        check_position(position)?;
        self.world
            .resource_mut::<TownRegistry>()
            .get_mut(town)
            .map(|t| t.add_building(kind, position))
            .ok_or(SimError::InvalidTown(town))
    }

    pub fn add_farm(&mut self, town: usize, position: Position) -> SimResult<usize> {
        self.add_building(town, BuildingKind::Farm, position)
    }

    pub fn add_bed(&mut self, town: usize, position: Position) -> SimResult<usize> {
        self.add_building(town, BuildingKind::Bed, position)
    }

    pub fn add_guard_post(&mut self, town: usize, position: Position) -> SimResult<usize> {
        self.add_building(town, BuildingKind::GuardPost, position)
    }

    fn reserve(&mut self, town: usize, kind: BuildingKind, near: Position) -> Option<usize> {
        self.world
            .resource_mut::<TownRegistry>()
            .get_mut(town)?
            .reserve(kind, near, None)
    }

    fn release(&mut self, town: usize, kind: BuildingKind, building: usize) -> bool {
        let mut towns = self.world.resource_mut::<TownRegistry>();
        match towns.get_mut(town) {
            Some(t) if t.building(building).is_some_and(|b| b.kind == kind) => t.release(building),
            _ => false,
        }
    }

    /// Reserve the free bed nearest `near`. Returns the building index.
    pub fn reserve_bed(&mut self, town: usize, near: Position) -> Option<usize> {
        self.reserve(town, BuildingKind::Bed, near)
    }

    pub fn release_bed(&mut self, town: usize, building: usize) -> bool {
        self.release(town, BuildingKind::Bed, building)
    }

    /// Reserve the free farm nearest `near`. Returns the building index.
    pub fn reserve_farm(&mut self, town: usize, near: Position) -> Option<usize> {
        self.reserve(town, BuildingKind::Farm, near)
    }

    pub fn release_farm(&mut self, town: usize, building: usize) -> bool {
        self.release(town, BuildingKind::Farm, building)
    }

    pub fn free_beds(&self, town: usize) -> Option<usize> {
        self.towns().get(town).map(|t| t.free_count(BuildingKind::Bed))
    }

    pub fn free_farms(&self, town: usize) -> Option<usize> {
        self.towns().get(town).map(|t| t.free_count(BuildingKind::Farm))
    }

    pub fn town_food(&self, town: usize) -> Option<u32> {
        self.towns().get(town).map(|t| t.food)
    }

    pub fn add_town_food(&mut self, town: usize, amount: u32) -> SimResult<u32> {
        let mut towns = self.world.resource_mut::<TownRegistry>();
        let t = towns.get_mut(town).ok_or(SimError::InvalidTown(town))?;
        t.food = t.food.saturating_add(amount);
        Ok(t.food)
    }

    /// Set a town upgrade level (clamped to the maximum) and re-resolve the
    /// stats of the town's living agents. Returns the stored level.
    pub fn set_upgrade_level(&mut self, town: usize, kind: UpgradeKind, level: u8) -> SimResult<u8> {
        let stored = self
            .world
            .resource_mut::<TownRegistry>()
            .get_mut(town)
            .map(|t| t.upgrades.set_level(kind, level))
            .ok_or(SimError::InvalidTown(town))?;

        self.world.resource_scope(|world, mut agents: Mut<AgentStore>| {
            let towns = world.resource::<TownRegistry>();
            let config = world.resource::<SimConfig>();
            let members: Vec<usize> = agents.living().filter(|&s| agents.town[s] == Some(town)).collect();
            for slot in members {
                refresh_stats(&mut agents, towns, &config.combat, slot);
            }
        });
        tracing::debug!(town, ?kind, level = stored, "upgrade set");
        Ok(stored)
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Flat render buffer of living agents and active projectiles.
    /// See [`crate::render_bridge`] for the layout.
    pub fn render_buffer(&self) -> Vec<f32> {
        render_bridge::render_buffer(self.agents(), self.world.resource::<ProjectilePool>())
    }

    /// Fill `buffer` with the render export, reusing its allocation.
    pub fn write_render_buffer(&self, buffer: &mut Vec<f32>) {
        render_bridge::write_render_buffer(self.agents(), self.world.resource::<ProjectilePool>(), buffer);
    }

    pub fn get_debug_stats(&self) -> DebugStats {
        let agents = self.agents();
        let grid = self.world.resource::<SpatialGrid>().stats();
        let pool = self.world.resource::<ProjectilePool>();

        let mut stats = DebugStats {
            tick: self.current_tick(),
            active_cells: grid.active_cells,
            max_per_cell: grid.max_per_cell,
            spilled: grid.spilled,
            active_projectiles: pool.active_count(),
            dropped_projectiles: pool.dropped,
            deaths: self.world.resource::<DeathLog>().total,
            backend: self.world.resource::<Compute>().name().to_string(),
            ..Default::default()
        };
        for slot in agents.living() {
            stats.living_agents += 1;
            if agents.arrived[slot] {
                stats.arrived += 1;
            }
            if agents.backoff[slot] > 0 {
                stats.backing_off += 1;
                stats.max_backoff = stats.max_backoff.max(agents.backoff[slot]);
            }
        }
        stats
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            self.agents(),
            self.world.resource::<ProjectilePool>(),
            self.towns(),
            self.current_tick(),
            self.time,
            self.world.resource::<GameClock>().hour(),
        )
    }

    pub fn snapshot_json(&self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    // ------------------------------------------------------------------
    // Raw access
    // ------------------------------------------------------------------

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    pub fn agents(&self) -> &AgentStore {
        self.world.resource::<AgentStore>()
    }

    pub fn towns(&self) -> &TownRegistry {
        self.world.resource::<TownRegistry>()
    }

    pub fn spatial_grid(&self) -> &SpatialGrid {
        self.world.resource::<SpatialGrid>()
    }

    pub fn projectiles(&self) -> &ProjectilePool {
        self.world.resource::<ProjectilePool>()
    }

    pub fn clock(&self) -> &GameClock {
        self.world.resource::<GameClock>()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn check_position(p: Position) -> SimResult<()> {
    if p.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidPosition { x: p.x, y: p.y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn village(sim: &mut SimWorld) -> usize {
        let town = sim
            .add_town("Millbrook", Position::new(500.0, 500.0), Faction::Villager)
            .unwrap();
        sim.add_bed(town, Position::new(520.0, 500.0)).unwrap();
        sim.add_bed(town, Position::new(540.0, 500.0)).unwrap();
        sim.add_farm(town, Position::new(600.0, 500.0)).unwrap();
        town
    }

    #[test]
    fn test_new_world() {
        let sim = SimWorld::new();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.living_count(), 0);
    }

    #[test]
    fn test_step_accumulates_fixed_ticks() {
        let mut sim = SimWorld::new();
        let fixed = sim.config().fixed_timestep;
        sim.step(fixed * 0.5);
        assert_eq!(sim.current_tick(), 0);
        sim.step(fixed * 0.6);
        assert_eq!(sim.current_tick(), 1);
        sim.step(fixed * 2.0);
        assert_eq!(sim.current_tick(), 3);
    }

    #[test]
    fn test_long_frame_is_capped() {
        let mut sim = SimWorld::new();
        sim.step(10.0);
        assert_eq!(sim.current_tick(), MAX_TICKS_PER_STEP as u64);
    }

    #[test]
    fn test_tick_count_comes_from_clock_resource() {
        let mut sim = SimWorld::new();
        sim.run_ticks(5);
        assert_eq!(sim.world().resource::<SimTick>().0, 5);
        assert_eq!(sim.current_tick(), 5);
        assert_eq!(sim.snapshot().tick, 5);

        sim.world_mut().resource_mut::<SimTick>().0 = 40;
        assert_eq!(sim.current_tick(), 40);
        assert_eq!(sim.get_debug_stats().tick, 40);
    }

    #[test]
    fn test_pause_freezes_ticks() {
        let mut sim = SimWorld::new();
        sim.set_paused(true);
        sim.step(1.0);
        assert_eq!(sim.current_tick(), 0);
        sim.set_paused(false);
        sim.step(sim.config().fixed_timestep);
        assert_eq!(sim.current_tick(), 1);
    }

    #[test]
    fn test_spawn_rejects_bad_positions() {
        let mut sim = SimWorld::new();
        let nan = sim.spawn_job(Position::new(f32::NAN, 1.0), Job::Farmer, SpawnConfig::default());
        assert!(matches!(nan, Err(SimError::InvalidPosition { .. })));
        let outside = sim.spawn_job(Position::new(-5000.0, 1.0), Job::Farmer, SpawnConfig::default());
        assert!(matches!(outside, Err(SimError::InvalidPosition { .. })));
        let town = sim.spawn_job(
            Position::new(10.0, 10.0),
            Job::Farmer,
            SpawnConfig {
                town: Some(3),
                ..Default::default()
            },
        );
        assert!(matches!(town, Err(SimError::InvalidTown(3))));
        assert_eq!(sim.living_count(), 0);
    }

    #[test]
    fn test_spawn_capacity_exhausted() {
        let mut sim = SimWorld::with_config(SimConfig {
            max_agents: 2,
            ..Default::default()
        });
        for _ in 0..2 {
            sim.spawn_job(Position::new(10.0, 10.0), Job::Raider, SpawnConfig::default())
                .unwrap();
        }
        let err = sim
            .spawn_job(Position::new(10.0, 10.0), Job::Raider, SpawnConfig::default())
            .unwrap_err();
        assert!(matches!(err, SimError::CapacityExhausted { capacity: 2 }));
    }

    #[test]
    fn test_invalid_slot_operations() {
        let mut sim = SimWorld::new();
        assert!(sim.get_position(7).is_none());
        assert!(sim.get_health(7).is_none());
        assert!(matches!(sim.set_target(7, None), Err(SimError::InvalidSlot(7))));
        assert!(matches!(sim.apply_damage(7, 10.0), Err(SimError::InvalidSlot(7))));

        let slot = sim
            .spawn_job(Position::new(10.0, 10.0), Job::Farmer, SpawnConfig::default())
            .unwrap();
        sim.apply_damage(slot, 1000.0).unwrap();
        assert!(matches!(sim.apply_damage(slot, 1.0), Err(SimError::DeadSlot(_))));
        assert!(sim
            .set_target(slot, Some(Position::new(f32::INFINITY, 0.0)))
            .is_err());
    }

    #[test]
    fn test_apply_damage_rejects_non_finite_amounts() {
        let mut sim = SimWorld::new();
        let slot = sim
            .spawn_job(Position::new(0.0, 0.0), Job::Guard, SpawnConfig::default())
            .unwrap();
        let before = sim.get_health(slot).unwrap();
        for amount in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(matches!(sim.apply_damage(slot, amount), Err(SimError::InvalidDamage(_))));
        }
        assert_eq!(sim.get_health(slot), Some(before));
    }

    #[test]
    fn test_apply_damage_kills_and_logs() {
        let mut sim = SimWorld::new();
        let slot = sim
            .spawn_job(Position::new(10.0, 10.0), Job::Raider, SpawnConfig::default())
            .unwrap();
        let max = sim.get_health(slot).unwrap().max;
        let dealt = sim.apply_damage(slot, max * 0.5).unwrap();
        assert_eq!(dealt, max * 0.5);
        assert!(sim.is_alive(slot));

        sim.apply_damage(slot, max).unwrap();
        assert!(!sim.is_alive(slot));
        let deaths = sim.drain_deaths();
        assert_eq!(deaths.len(), 1);
        assert_eq!(deaths[0].slot, slot);
        assert!(sim.drain_deaths().is_empty());
        assert_eq!(sim.get_debug_stats().deaths, 1);
    }

    #[test]
    fn test_bed_reserve_and_release() {
        let mut sim = SimWorld::new();
        let town = village(&mut sim);
        assert_eq!(sim.free_beds(town), Some(2));

        let bed = sim.reserve_bed(town, Position::new(545.0, 500.0)).unwrap();
        assert_eq!(sim.free_beds(town), Some(1));
        assert!(!sim.release_farm(town, bed), "kind mismatch is a failure");
        assert!(sim.release_bed(town, bed));
        assert!(!sim.release_bed(town, bed));
        assert_eq!(sim.free_beds(town), Some(2));

        assert!(sim.reserve_bed(9, Position::new(0.0, 0.0)).is_none());
        assert!(sim.free_beds(9).is_none());
        assert!(matches!(
            sim.add_bed(9, Position::new(0.0, 0.0)),
            Err(SimError::InvalidTown(9))
        ));
    }

    #[test]
    fn test_farm_reserve_exhausts() {
        let mut sim = SimWorld::new();
        let town = village(&mut sim);
        assert!(sim.reserve_farm(town, Position::new(0.0, 0.0)).is_some());
        assert!(sim.reserve_farm(town, Position::new(0.0, 0.0)).is_none());
        assert_eq!(sim.free_farms(town), Some(0));
    }

    #[test]
    fn test_upgrade_refreshes_guard_stats() {
        let mut sim = SimWorld::new();
        let town = village(&mut sim);
        let guard = sim
            .spawn_job(
                Position::new(500.0, 500.0),
                Job::Guard,
                SpawnConfig {
                    town: Some(town),
                    ..Default::default()
                },
            )
            .unwrap();
        let before = sim.get_health(guard).unwrap();

        let stored = sim.set_upgrade_level(town, UpgradeKind::GuardHealth, 200).unwrap();
        assert_eq!(stored, crate::towns::MAX_UPGRADE_LEVEL);
        let after = sim.get_health(guard).unwrap();
        assert!(after.max > before.max);
        assert_eq!(after.fraction(), 1.0);
    }

    #[test]
    fn test_town_food() {
        let mut sim = SimWorld::new();
        let town = village(&mut sim);
        assert_eq!(sim.add_town_food(town, 5).unwrap(), 5);
        assert_eq!(sim.town_food(town), Some(5));
        assert!(sim.add_town_food(4, 1).is_err());
    }

    #[test]
    fn test_debug_stats_after_tick() {
        let mut sim = SimWorld::new();
        for i in 0..10 {
            sim.spawn_job(Position::new(100.0 + i as f32, 100.0), Job::Farmer, SpawnConfig::default())
                .unwrap();
        }
        sim.run_ticks(1);
        let stats = sim.get_debug_stats();
        assert_eq!(stats.living_agents, 10);
        assert!(stats.active_cells >= 1);
        assert!(stats.max_per_cell >= 1);
        assert_eq!(stats.tick, 1);
    }

    #[test]
    fn test_snapshot_json() {
        let mut sim = SimWorld::new();
        village(&mut sim);
        sim.spawn_job(Position::new(10.0, 10.0), Job::Raider, SpawnConfig::default())
            .unwrap();
        let json = sim.snapshot_json();
        assert!(json.contains("Millbrook"));
        assert!(json.contains("Raider"));

        let snapshot = sim.snapshot();
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.towns.len(), 1);
    }

    #[test]
    fn test_render_buffer_counts() {
        let mut sim = SimWorld::new();
        sim.spawn_job(Position::new(10.0, 10.0), Job::Guard, SpawnConfig::default())
            .unwrap();
        let buffer = sim.render_buffer();
        assert_eq!(render_bridge::parse_counts(&buffer), Some((1, 0)));
        assert_eq!(buffer.len(), render_bridge::calculate_buffer_size(1));
    }

    #[test]
    fn test_from_config_validates() {
        let bad = SimConfig {
            fixed_timestep: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            SimWorld::from_config(bad, BackendKind::Serial),
            Err(SimError::InvalidConfig(_))
        ));
        let sim = SimWorld::from_config(SimConfig::default(), BackendKind::Serial).unwrap();
        assert_eq!(sim.get_debug_stats().backend, "cpu-serial");
    }
}
