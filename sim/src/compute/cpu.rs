//! CPU schedulers over the shared kernels.

use super::ComputeBackend;
use crate::error::SimResult;
use crate::projectiles::{advance_one, sweep_bounds, Projectile, ProjectileParams};
use crate::spatial::SpatialGrid;
use crate::steering::{steer_one, SteerAgent, SteerOutput, SteerParams};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Runs kernels on the CPU, across rayon's pool when `parallel` is set and
/// the crate was built with the `parallel` feature.
#[derive(Debug, Clone, Copy)]
pub struct CpuBackend {
    pub parallel: bool,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self {
            parallel: cfg!(feature = "parallel"),
        }
    }
}

impl CpuBackend {
    pub fn serial() -> Self {
        Self { parallel: false }
    }
}

#[inline]
fn steer_slot(grid: &SpatialGrid, params: &SteerParams, agents: &[SteerAgent], slot: usize) -> SteerOutput {
    let agent = &agents[slot];
    let neighbors = grid
        .candidates(agent.x, agent.y, params.push_radius)
        .map(|e| (e.slot, e.x, e.y));
    steer_one(slot as u32, agent, neighbors, params)
}

#[inline]
fn advance_slot(grid: &SpatialGrid, params: &ProjectileParams, alive: &[u32], p: &mut Projectile) {
    if !p.is_active() {
        return;
    }
    let (cx, cy, radius) = sweep_bounds(p, params);
    let candidates = grid
        .candidates(cx, cy, radius)
        .map(|e| (e.slot, e.x, e.y, e.faction));
    let is_alive = |slot: u32| alive.get(slot as usize).copied().unwrap_or(0) != 0;
    advance_one(p, candidates, is_alive, params);
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &'static str {
        if self.parallel {
            "cpu-parallel"
        } else {
            "cpu-serial"
        }
    }

    fn steer(
        &mut self,
        grid: &SpatialGrid,
        params: &SteerParams,
        agents: &[SteerAgent],
        out: &mut Vec<SteerOutput>,
    ) -> SimResult<()> {
        out.clear();
        out.resize(agents.len(), SteerOutput::default());

        #[cfg(feature = "parallel")]
        if self.parallel {
            out.par_iter_mut()
                .enumerate()
                .for_each(|(slot, o)| *o = steer_slot(grid, params, agents, slot));
            return Ok(());
        }

        for (slot, o) in out.iter_mut().enumerate() {
            *o = steer_slot(grid, params, agents, slot);
        }
        Ok(())
    }

    fn advance_projectiles(
        &mut self,
        grid: &SpatialGrid,
        params: &ProjectileParams,
        alive: &[u32],
        projectiles: &mut [Projectile],
    ) -> SimResult<()> {
        #[cfg(feature = "parallel")]
        if self.parallel {
            projectiles
                .par_iter_mut()
                .for_each(|p| advance_slot(grid, params, alive, p));
            return Ok(());
        }

        for p in projectiles.iter_mut() {
            advance_slot(grid, params, alive, p);
        }
        Ok(())
    }
}
