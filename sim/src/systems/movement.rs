//! Steering solve and position integration.

use crate::agents::AgentStore;
use crate::compute::Compute;
use crate::config::SimConfig;
use crate::spatial::SpatialGrid;
use crate::steering::{SteerAgent, SteerOutput, SteerParams, FLAG_ALIVE, FLAG_ARRIVED, FLAG_HAS_TARGET};
use crate::systems::clock::DeltaTime;
use bevy_ecs::prelude::*;

/// Reused pack/unpack buffers for the steering dispatch.
#[derive(Resource, Debug, Default)]
pub struct SteerScratch {
    pub agents: Vec<SteerAgent>,
    pub out: Vec<SteerOutput>,
}

/// Pack the steering inputs for every slot. Dead slots are packed with no
/// flags so output indices line up with agent slots.
pub fn pack_steering(agents: &AgentStore, config: &SimConfig, buf: &mut Vec<SteerAgent>) {
    buf.clear();
    buf.extend((0..agents.len()).map(|slot| {
        if !agents.alive[slot] {
            return SteerAgent::default();
        }
        let pos = agents.position[slot];
        let mut speed = agents.stats[slot].speed;
        if agents.hunger[slot] >= config.needs.starving {
            speed *= config.needs.starving_speed_mult;
        }
        let mut flags = FLAG_ALIVE;
        let target = agents.target[slot].unwrap_or(pos);
        if agents.target[slot].is_some() {
            flags |= FLAG_HAS_TARGET;
        }
        if agents.arrived[slot] {
            flags |= FLAG_ARRIVED;
        }
        SteerAgent {
            x: pos.x,
            y: pos.y,
            target_x: target.x,
            target_y: target.y,
            speed,
            flags,
            backoff: agents.backoff[slot],
            _pad: 0,
        }
    }));
}

/// Solve arrival + separation for every living agent through the compute
/// backend.
///
/// ## Data Access
/// - Reads: SpatialGrid, SimConfig
/// - Writes: AgentStore::{velocity, arrived, backoff}
pub fn steering_system(
    grid: Res<SpatialGrid>,
    config: Res<SimConfig>,
    mut compute: ResMut<Compute>,
    mut scratch: ResMut<SteerScratch>,
    mut agents: ResMut<AgentStore>,
) {
    let scratch = &mut *scratch;
    pack_steering(&agents, &config, &mut scratch.agents);
    let params = SteerParams::from_config(&config.steering, scratch.agents.len());

    if let Err(err) = compute.0.steer(&grid, &params, &scratch.agents, &mut scratch.out) {
        tracing::error!(%err, backend = compute.name(), "steering dispatch failed");
        return;
    }

    for (slot, out) in scratch.out.iter().enumerate() {
        if !agents.alive[slot] {
            continue;
        }
        agents.velocity[slot].vx = out.vx;
        agents.velocity[slot].vy = out.vy;
        agents.backoff[slot] = out.backoff;
        if agents.target[slot].is_some() {
            agents.arrived[slot] = out.arrived != 0;
        }
    }
}

/// Apply velocity to position, clamped to the world rectangle.
pub fn movement_system(dt: Res<DeltaTime>, config: Res<SimConfig>, mut agents: ResMut<AgentStore>) {
    let delta = dt.0;
    let grid = &config.grid;
    // Keep positions strictly inside the last cell.
    let (max_x, max_y) = (grid.max_x() - 1e-3, grid.max_y() - 1e-3);
    let agents = &mut *agents;

    for slot in 0..agents.len() {
        if !agents.alive[slot] {
            continue;
        }
        let vel = agents.velocity[slot];
        let pos = &mut agents.position[slot];
        pos.x = (pos.x + vel.vx * delta).clamp(grid.origin_x, max_x);
        pos.y = (pos.y + vel.vy * delta).clamp(grid.origin_y, max_y);
    }
}
