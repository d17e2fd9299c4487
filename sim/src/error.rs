//! Error type for the simulation core.
//!
//! Capacity pressure on the spatial grid and the projectile pool is handled
//! internally (spill / drop-and-count); only caller mistakes and hard
//! exhaustion of the agent pool surface as errors.

use thiserror::Error;

/// Errors returned by the public simulation API.
#[derive(Debug, Error)]
pub enum SimError {
    /// Coordinates were NaN, infinite, or outside the world bounds.
    #[error("invalid position ({x}, {y})")]
    InvalidPosition { x: f32, y: f32 },

    /// Every agent slot is occupied and none are free for recycling.
    #[error("agent capacity exhausted ({capacity} slots)")]
    CapacityExhausted { capacity: usize },

    /// Slot index was never allocated.
    #[error("invalid agent slot {0}")]
    InvalidSlot(usize),

    /// Slot exists but its agent is dead.
    #[error("agent slot {0} is dead")]
    DeadSlot(usize),

    /// Town index does not exist.
    #[error("invalid town index {0}")]
    InvalidTown(usize),

    /// Building index does not exist within its town.
    #[error("invalid building {building} in town {town}")]
    InvalidBuilding { town: usize, building: usize },

    /// Damage amount was NaN or infinite.
    #[error("invalid damage amount {0}")]
    InvalidDamage(f32),

    /// Configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Config file could not be read.
    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// GPU compute backend could not be created or dispatched.
    #[error("gpu backend: {0}")]
    Gpu(String),
}

pub type SimResult<T> = Result<T, SimError>;
