//! Projectile advance/collide pass.

use crate::agents::AgentStore;
use crate::compute::Compute;
use crate::config::SimConfig;
use crate::projectiles::{ProjectileParams, ProjectilePool};
use crate::spatial::SpatialGrid;
use crate::systems::clock::DeltaTime;
use bevy_ecs::prelude::*;

/// Reused buffers for the projectile dispatch.
#[derive(Resource, Debug, Default)]
pub struct ProjectileScratch {
    pub alive: Vec<u32>,
    pub was_active: Vec<bool>,
}

/// Advance every active projectile and record hits.
///
/// Collision uses the grid as rebuilt at the start of the tick, so targets
/// are tested at their pre-movement positions.
///
/// ## Data Access
/// - Reads: DeltaTime, SpatialGrid, AgentStore::alive, SimConfig
/// - Writes: ProjectilePool
pub fn projectile_system(
    dt: Res<DeltaTime>,
    grid: Res<SpatialGrid>,
    config: Res<SimConfig>,
    agents: Res<AgentStore>,
    mut compute: ResMut<Compute>,
    mut scratch: ResMut<ProjectileScratch>,
    mut pool: ResMut<ProjectilePool>,
) {
    if pool.slots.is_empty() {
        return;
    }
    let scratch = &mut *scratch;
    scratch.alive.clear();
    scratch.alive.extend(agents.alive.iter().map(|&a| a as u32));
    scratch.was_active.clear();
    scratch.was_active.extend(pool.slots.iter().map(|p| p.is_active()));

    let params = ProjectileParams {
        dt: dt.0,
        hit_radius: config.projectiles.hit_radius,
        projectile_count: pool.slots.len() as u32,
        _pad: 0,
    };
    if let Err(err) = compute
        .0
        .advance_projectiles(&grid, &params, &scratch.alive, &mut pool.slots)
    {
        tracing::error!(%err, backend = compute.name(), "projectile dispatch failed");
        return;
    }
    pool.reclaim_expired(&scratch.was_active);
}
