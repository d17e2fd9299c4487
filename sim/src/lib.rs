//! Hearth - NPC simulation core
//!
//! Fixed-timestep simulation of villagers, guards and raiders: a spatial
//! grid, steering with separation, per-job behavior state machines, combat
//! through a projectile pipeline, and towns with reservable buildings.
//! Uses `bevy_ecs` resources and a chained schedule; the data-parallel
//! kernels run through a [`compute::ComputeBackend`] (rayon or wgpu).

pub mod agents;
pub mod api;
pub mod behavior;
pub mod components;
pub mod compute;
pub mod config;
pub mod error;
pub mod projectiles;
pub mod render_bridge;
pub mod spatial;
pub mod steering;
pub mod systems;
pub mod towns;
pub mod world;

pub use agents::{AgentStore, SpawnConfig};
pub use api::SimWorld;
pub use behavior::{BehaviorEvent, BehaviorState, FarmerState, GuardState, RaiderState};
pub use components::*;
pub use compute::BackendKind;
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::DeathEvent;
pub use towns::{BuildingKind, Town, TownRegistry, UpgradeKind};
pub use world::{DebugStats, Snapshot};
