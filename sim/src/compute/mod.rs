//! Data-parallel dispatch for the two per-element kernels: steering and
//! projectile advance/collide.
//!
//! A [`ComputeBackend`] takes a frozen snapshot (the grid rebuilt this tick
//! plus packed per-element inputs) and writes exactly one output element per
//! input element. Backends never touch the ECS world; the steering and
//! projectile systems pack inputs, dispatch, and unpack.
//!
//! - [`CpuBackend`] runs the kernels on the calling thread, or across the
//!   rayon pool with the `parallel` feature.
//! - `GpuBackend` (feature `gpu`) runs the WGSL ports of the same kernels
//!   through wgpu.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::CpuBackend;
#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;

use crate::error::SimResult;
use crate::projectiles::{Projectile, ProjectileParams};
use crate::spatial::SpatialGrid;
use crate::steering::{SteerAgent, SteerOutput, SteerParams};
use bevy_ecs::prelude::*;
use bytemuck::{Pod, Zeroable};

/// Grid geometry handed to kernels next to the packed grid arrays.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GridParams {
    pub origin_x: f32,
    pub origin_y: f32,
    pub cell_size: f32,
    pub columns: u32,
    pub rows: u32,
    pub cell_capacity: u32,
    pub _pad: [u32; 2],
}

impl GridParams {
    pub fn from_grid(grid: &SpatialGrid) -> Self {
        Self {
            origin_x: grid.origin_x,
            origin_y: grid.origin_y,
            cell_size: grid.cell_size,
            columns: grid.columns,
            rows: grid.rows,
            cell_capacity: grid.cell_capacity,
            _pad: [0; 2],
        }
    }
}

/// Scheduler for the per-element kernels.
pub trait ComputeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve steering for every slot in `agents`; `out` is resized to match.
    fn steer(
        &mut self,
        grid: &SpatialGrid,
        params: &SteerParams,
        agents: &[SteerAgent],
        out: &mut Vec<SteerOutput>,
    ) -> SimResult<()>;

    /// Advance and collide every projectile in place. `alive` is the agent
    /// liveness mask indexed by slot.
    fn advance_projectiles(
        &mut self,
        grid: &SpatialGrid,
        params: &ProjectileParams,
        alive: &[u32],
        projectiles: &mut [Projectile],
    ) -> SimResult<()>;
}

/// The backend the simulation dispatches through.
#[derive(Resource)]
pub struct Compute(pub Box<dyn ComputeBackend>);

impl Default for Compute {
    fn default() -> Self {
        Self(Box::new(CpuBackend::default()))
    }
}

impl Compute {
    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

/// Backend selection for [`SimWorld::with_backend`](crate::api::SimWorld::with_backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Single-threaded CPU.
    Serial,
    /// Rayon when compiled with `parallel`, serial otherwise.
    #[default]
    Parallel,
    /// wgpu compute; falls back to [`BackendKind::Parallel`] when unavailable.
    Gpu,
}

/// Build the requested backend, falling back to the CPU if the GPU cannot be
/// initialised.
pub fn create_backend(kind: BackendKind) -> Box<dyn ComputeBackend> {
    match kind {
        BackendKind::Serial => Box::new(CpuBackend::serial()),
        BackendKind::Parallel => Box::new(CpuBackend::default()),
        BackendKind::Gpu => gpu_or_fallback(),
    }
}

#[cfg(feature = "gpu")]
fn gpu_or_fallback() -> Box<dyn ComputeBackend> {
    match GpuBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            tracing::warn!(%err, "gpu backend unavailable, using cpu");
            Box::new(CpuBackend::default())
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn gpu_or_fallback() -> Box<dyn ComputeBackend> {
    tracing::warn!("built without the `gpu` feature, using cpu");
    Box::new(CpuBackend::default())
}
