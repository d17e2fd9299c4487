//! Damage application and death handling.

use crate::agents::AgentStore;
use crate::components::*;
use crate::config::SimConfig;
use crate::projectiles::ProjectilePool;
use crate::systems::combat::{level_for_xp, refresh_stats};
use crate::towns::TownRegistry;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Deaths kept for [`SimWorld::drain_deaths`](crate::api::SimWorld::drain_deaths)
/// before the oldest are dropped.
pub const DEATH_LOG_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeathEvent {
    pub slot: usize,
    pub generation: u32,
    pub job: Job,
    pub faction: Faction,
    pub position: Position,
    /// Living killer credited with the kill, if any.
    pub killer: Option<usize>,
}

#[derive(Resource, Debug, Default)]
pub struct DeathLog {
    pub events: VecDeque<DeathEvent>,
    pub total: u64,
}

impl DeathLog {
    pub fn push(&mut self, event: DeathEvent) {
        if self.events.len() == DEATH_LOG_LIMIT {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total += 1;
    }

    pub fn drain(&mut self) -> Vec<DeathEvent> {
        self.events.drain(..).collect()
    }
}

/// Apply `amount` damage after level mitigation. Returns the damage dealt.
pub fn deal_damage(agents: &mut AgentStore, slot: usize, amount: f32, attacker: Option<(usize, u32)>) -> f32 {
    let dealt = amount.max(0.0) * (1.0 - agents.stats[slot].mitigation);
    agents.health[slot].damage(dealt);
    if attacker.is_some() {
        agents.last_hit_by[slot] = attacker;
    }
    dealt
}

/// Kill a slot: log it, credit the killer, drop its reservations and free
/// the slot. No-op on a dead slot.
pub fn kill_agent(
    agents: &mut AgentStore,
    towns: &mut TownRegistry,
    log: &mut DeathLog,
    config: &SimConfig,
    slot: usize,
) {
    if !agents.is_alive(slot) {
        return;
    }
    let killer = agents.last_hit_by[slot]
        .filter(|&(k, generation)| k != slot && agents.is_alive(k) && agents.generation[k] == generation)
        .map(|(k, _)| k);

    log.push(DeathEvent {
        slot,
        generation: agents.generation[slot],
        job: agents.job[slot],
        faction: agents.faction[slot],
        position: agents.position[slot],
        killer,
    });
    towns.release_occupant(slot);
    agents.kill(slot);

    if let Some(k) = killer {
        agents.xp[k] = agents.xp[k].saturating_add(config.combat.xp_per_kill);
        let level = level_for_xp(&config.combat, agents.xp[k]);
        if level != agents.level[k] {
            agents.level[k] = level;
            refresh_stats(agents, towns, &config.combat, k);
            tracing::debug!(slot = k, level, "level up");
        }
    }
    tracing::debug!(slot, job = agents.job[slot].name(), ?killer, "agent died");
}

/// Turn recorded projectile hits into health loss.
///
/// ## Data Access
/// - Writes: ProjectilePool (hits consumed), AgentStore::{health, last_hit_by}
pub fn damage_system(mut pool: ResMut<ProjectilePool>, mut agents: ResMut<AgentStore>) {
    for slot in 0..pool.slots.len() {
        let p = pool.slots[slot];
        let Some(target) = p.pending_hit() else { continue };
        if agents.is_alive(target) {
            deal_damage(
                &mut agents,
                target,
                p.damage,
                Some((p.shooter as usize, p.shooter_generation)),
            );
        }
        pool.consume_hit(slot);
    }
}

/// Retire every living agent whose health reached zero, in slot order.
pub fn death_system(
    config: Res<SimConfig>,
    mut agents: ResMut<AgentStore>,
    mut towns: ResMut<TownRegistry>,
    mut log: ResMut<DeathLog>,
) {
    let dead: Vec<usize> = agents
        .living()
        .filter(|&slot| !agents.health[slot].is_alive())
        .collect();
    for slot in dead {
        kill_agent(&mut agents, &mut towns, &mut log, &config, slot);
    }
}
