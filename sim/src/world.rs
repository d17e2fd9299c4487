//! Snapshot and debug types.
//!
//! [`Snapshot`] is a serializable copy of the simulation state for debugging
//! and tooling; [`DebugStats`] is the cheap per-frame summary.

use crate::agents::AgentStore;
use crate::behavior::BehaviorState;
use crate::components::*;
use crate::projectiles::ProjectilePool;
use crate::towns::{Town, TownRegistry};
use serde::{Deserialize, Serialize};

/// Snapshot of one living agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub slot: usize,
    pub job: Job,
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub health: f32,
    pub health_max: f32,
    pub energy: f32,
    pub hunger: f32,
    pub level: u32,
    pub state: BehaviorState,
    pub target: Option<Position>,
    pub combat_target: Option<usize>,
    pub town: Option<usize>,
}

/// Snapshot of one active projectile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub slot: usize,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub faction: u32,
    pub shooter: u32,
}

/// Simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub hour: u32,
    pub agents: Vec<AgentSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub towns: Vec<Town>,
}

impl Snapshot {
    pub fn capture(
        agents: &AgentStore,
        pool: &ProjectilePool,
        towns: &TownRegistry,
        tick: u64,
        time: f32,
        hour: u32,
    ) -> Self {
        let agents_out = agents
            .living()
            .map(|slot| AgentSnapshot {
                slot,
                job: agents.job[slot],
                faction: agents.faction[slot],
                x: agents.position[slot].x,
                y: agents.position[slot].y,
                vx: agents.velocity[slot].vx,
                vy: agents.velocity[slot].vy,
                health: agents.health[slot].current,
                health_max: agents.health[slot].max,
                energy: agents.energy[slot],
                hunger: agents.hunger[slot],
                level: agents.level[slot],
                state: agents.state[slot],
                target: agents.target[slot],
                combat_target: agents.combat_target[slot],
                town: agents.town[slot],
            })
            .collect();

        let projectiles = pool
            .slots
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active())
            .map(|(slot, p)| ProjectileSnapshot {
                slot,
                x: p.x,
                y: p.y,
                vx: p.vx,
                vy: p.vy,
                faction: p.faction,
                shooter: p.shooter,
            })
            .collect();

        Self {
            tick,
            time,
            hour,
            agents: agents_out,
            projectiles,
            towns: towns.towns.clone(),
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Per-frame counters for overlays and logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugStats {
    pub tick: u64,
    pub living_agents: usize,
    /// Agents with a movement target that have arrived.
    pub arrived: usize,
    /// Agents currently backing off, and the largest backoff counter.
    pub backing_off: usize,
    pub max_backoff: u32,
    pub active_cells: usize,
    pub max_per_cell: usize,
    pub spilled: usize,
    pub active_projectiles: usize,
    pub dropped_projectiles: u64,
    pub deaths: u64,
    pub backend: String,
}
