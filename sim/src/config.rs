//! Simulation tunables.
//!
//! Every constant the core needs is gathered in [`SimConfig`], handed to
//! [`SimWorld::with_config`](crate::api::SimWorld::with_config) at construction
//! and inserted into the ECS world as a resource. Configs can be loaded from
//! TOML; missing sections and fields fall back to defaults.
//!
//! ```toml
//! fixed_timestep = 0.016666668
//! max_agents = 20000
//!
//! [steering]
//! separation_radius = 16.0
//!
//! [projectiles]
//! max_projectiles = 4096
//! ```

use crate::components::{AttackKind, Job};
use crate::error::{SimError, SimResult};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration resource.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (1/60 = 60 Hz).
    pub fixed_timestep: f32,
    /// Hard cap on agent slots.
    pub max_agents: usize,
    /// Seed for wander/raid choices.
    pub rng_seed: u64,
    pub grid: GridConfig,
    pub steering: SteeringConfig,
    pub behavior: BehaviorConfig,
    pub needs: NeedsConfig,
    pub combat: CombatConfig,
    pub projectiles: ProjectileConfig,
    pub clock: ClockConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            max_agents: 20_000,
            rng_seed: 0x4845_4152_5448,
            grid: GridConfig::default(),
            steering: SteeringConfig::default(),
            behavior: BehaviorConfig::default(),
            needs: NeedsConfig::default(),
            combat: CombatConfig::default(),
            projectiles: ProjectileConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> SimResult<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded sim config");
        Ok(config)
    }

    /// Serialize back to TOML (used to write out a default config).
    pub fn to_toml_string(&self) -> SimResult<String> {
        toml::to_string_pretty(self).map_err(|e| SimError::InvalidConfig(e.to_string()))
    }

    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        fn check(ok: bool, msg: &str) -> SimResult<()> {
            if ok {
                Ok(())
            } else {
                Err(SimError::InvalidConfig(msg.to_string()))
            }
        }

        check(
            self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0,
            "fixed_timestep must be positive",
        )?;
        check(self.max_agents > 0, "max_agents must be non-zero")?;
        check(
            self.grid.cell_size.is_finite() && self.grid.cell_size > 0.0,
            "grid.cell_size must be positive",
        )?;
        check(
            self.grid.columns > 0 && self.grid.rows > 0,
            "grid must have at least one cell",
        )?;
        check(self.grid.cell_capacity > 0, "grid.cell_capacity must be non-zero")?;
        check(
            self.steering.separation_radius > 0.0,
            "steering.separation_radius must be positive",
        )?;
        check(
            self.steering.separation_falloff >= 1.0,
            "steering.separation_falloff must be >= 1",
        )?;
        check(
            self.steering.slowing_radius >= self.steering.arrival_radius,
            "steering.slowing_radius must be >= arrival_radius",
        )?;
        check(
            self.projectiles.max_projectiles > 0,
            "projectiles.max_projectiles must be non-zero",
        )?;
        check(
            self.clock.wake_hour < 24 && self.clock.sleep_hour < 24,
            "clock hours must be in 0..24",
        )?;
        check(
            self.clock.wake_hour < self.clock.sleep_hour,
            "clock.wake_hour must be before clock.sleep_hour",
        )?;
        check(
            self.clock.minutes_per_second > 0.0,
            "clock.minutes_per_second must be positive",
        )?;
        Ok(())
    }
}

// ============================================================================
// GRID
// ============================================================================

/// Bounded dense grid covering the whole world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cell_size: f32,
    pub columns: u32,
    pub rows: u32,
    /// World-space coordinate of the grid's minimum corner.
    pub origin_x: f32,
    pub origin_y: f32,
    /// Dense slots per cell; further entries go to the spill list.
    pub cell_capacity: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 64.0,
            columns: 128,
            rows: 128,
            origin_x: -4096.0,
            origin_y: -4096.0,
            cell_capacity: 16,
        }
    }
}

impl GridConfig {
    pub fn width(&self) -> f32 {
        self.columns as f32 * self.cell_size
    }

    pub fn height(&self) -> f32 {
        self.rows as f32 * self.cell_size
    }

    pub fn max_x(&self) -> f32 {
        self.origin_x + self.width()
    }

    pub fn max_y(&self) -> f32 {
        self.origin_y + self.height()
    }

    /// Whether a point lies inside the world rectangle.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.origin_x && x < self.max_x() && y >= self.origin_y && y < self.max_y()
    }
}

// ============================================================================
// STEERING
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Minimum spacing agents settle at.
    pub separation_radius: f32,
    /// Repulsion acts out to `separation_radius * separation_falloff`.
    pub separation_falloff: f32,
    /// Push per unit of penetration depth.
    pub separation_strength: f32,
    /// Distance at which an agent counts as arrived.
    pub arrival_radius: f32,
    /// Distance at which arrival speed starts ramping down.
    pub slowing_radius: f32,
    /// Neighbors closer than this are treated as exactly overlapping.
    pub overlap_epsilon: f32,
    /// Fraction of desired speed below which an agent counts as blocked.
    pub backoff_progress: f32,
    /// Arrival push scale-down per backoff step.
    pub backoff_yield: f32,
    pub max_backoff: u32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            separation_radius: 20.0,
            separation_falloff: 1.5,
            separation_strength: 40.0,
            arrival_radius: 20.0,
            slowing_radius: 60.0,
            overlap_epsilon: 1e-3,
            backoff_progress: 0.25,
            backoff_yield: 0.15,
            max_backoff: 20,
        }
    }
}

impl SteeringConfig {
    /// Radius neighbors are gathered from.
    pub fn push_radius(&self) -> f32 {
        self.separation_radius * self.separation_falloff
    }
}

// ============================================================================
// BEHAVIOR
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Seconds between voluntary state changes.
    pub decision_cooldown: f32,
    /// Seconds a guard waits at a post before moving on.
    pub patrol_wait: f32,
    /// Raiders break off a chase this far from their camp.
    pub leash_range: f32,
    pub wander_radius: f32,
    pub farmer_flee_threshold: f32,
    pub guard_flee_threshold: f32,
    pub raider_flee_threshold: f32,
    /// Health fraction at which recovery ends.
    pub recover_threshold: f32,
    /// Raiders stop chasing when the target is this much farther than range.
    pub out_of_range_factor: f32,
    /// Engaged agents hold position inside `range * standoff_factor`.
    pub standoff_factor: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            decision_cooldown: 0.5,
            patrol_wait: 1.0,
            leash_range: 400.0,
            wander_radius: 200.0,
            farmer_flee_threshold: 0.5,
            guard_flee_threshold: 0.25,
            raider_flee_threshold: 0.3,
            recover_threshold: 0.75,
            out_of_range_factor: 1.1,
            standoff_factor: 0.8,
        }
    }
}

impl BehaviorConfig {
    pub fn flee_threshold(&self, job: Job) -> f32 {
        match job {
            Job::Farmer => self.farmer_flee_threshold,
            Job::Guard => self.guard_flee_threshold,
            Job::Raider => self.raider_flee_threshold,
        }
    }
}

// ============================================================================
// NEEDS
// ============================================================================

/// Hunger and energy run on game hours; healing runs on real seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsConfig {
    pub hunger_per_hour: f32,
    pub hungry: f32,
    pub starving: f32,
    pub full: f32,
    pub energy_drain_per_hour: f32,
    pub energy_restore_per_hour: f32,
    pub tired: f32,
    pub rested: f32,
    /// Speed multiplier while starving.
    pub starving_speed_mult: f32,
    /// Health is capped at this fraction of max while starving.
    pub starving_hp_cap: f32,
    /// HP per second for recovering agents near their refuge.
    pub heal_rate: f32,
    pub heal_radius: f32,
    /// Food added to the town per game hour a farmer works.
    pub farm_yield_per_hour: f32,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            hunger_per_hour: 4.0,
            hungry: 50.0,
            starving: 85.0,
            full: 10.0,
            energy_drain_per_hour: 4.0,
            energy_restore_per_hour: 15.0,
            tired: 30.0,
            rested: 80.0,
            starving_speed_mult: 0.5,
            starving_hp_cap: 0.5,
            heal_rate: 5.0,
            heal_radius: 150.0,
            farm_yield_per_hour: 1.0,
        }
    }
}

// ============================================================================
// COMBAT
// ============================================================================

/// How an attack is delivered. Both kinds fire projectiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackProfile {
    pub range: f32,
    pub cooldown: f32,
    pub projectile_speed: f32,
    pub projectile_lifetime: f32,
}

impl Default for AttackProfile {
    fn default() -> Self {
        Self::MELEE
    }
}

impl AttackProfile {
    pub const MELEE: Self = Self {
        range: 50.0,
        cooldown: 1.0,
        projectile_speed: 500.0,
        projectile_lifetime: 0.5,
    };

    pub const RANGED: Self = Self {
        range: 150.0,
        cooldown: 1.5,
        projectile_speed: 200.0,
        projectile_lifetime: 3.0,
    };
}

/// Base stats for one job before upgrades and levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobStats {
    pub max_health: f32,
    pub speed: f32,
    pub damage: f32,
    pub attack: AttackKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Nearest-enemy search radius.
    pub detection_radius: f32,
    /// A current target is kept while within `detection_radius * target_hysteresis`.
    pub target_hysteresis: f32,
    /// Stat bonus per agent level.
    pub level_bonus: f32,
    pub xp_per_kill: u32,
    pub xp_per_level: u32,
    /// Damage reduction per agent level, capped at `max_mitigation`.
    pub mitigation_per_level: f32,
    pub max_mitigation: f32,
    pub melee: AttackProfile,
    pub ranged: AttackProfile,
    pub farmer: JobStats,
    pub guard: JobStats,
    pub raider: JobStats,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            detection_radius: 300.0,
            target_hysteresis: 1.2,
            level_bonus: 0.01,
            xp_per_kill: 100,
            xp_per_level: 100,
            mitigation_per_level: 0.01,
            max_mitigation: 0.5,
            melee: AttackProfile::MELEE,
            ranged: AttackProfile::RANGED,
            farmer: JobStats {
                max_health: 100.0,
                speed: 100.0,
                damage: 0.0,
                attack: AttackKind::None,
            },
            guard: JobStats {
                max_health: 100.0,
                speed: 100.0,
                damage: 15.0,
                attack: AttackKind::Ranged,
            },
            raider: JobStats {
                max_health: 100.0,
                speed: 100.0,
                damage: 15.0,
                attack: AttackKind::Melee,
            },
        }
    }
}

impl CombatConfig {
    pub fn job_stats(&self, job: Job) -> &JobStats {
        match job {
            Job::Farmer => &self.farmer,
            Job::Guard => &self.guard,
            Job::Raider => &self.raider,
        }
    }

    pub fn profile(&self, kind: AttackKind) -> Option<&AttackProfile> {
        match kind {
            AttackKind::None => None,
            AttackKind::Melee => Some(&self.melee),
            AttackKind::Ranged => Some(&self.ranged),
        }
    }
}

// ============================================================================
// PROJECTILES / CLOCK
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    pub max_projectiles: usize,
    /// Agents within this distance of a projectile's path are hit.
    pub hit_radius: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            max_projectiles: 8192,
            hit_radius: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Hour of day the simulation starts at.
    pub start_hour: u32,
    /// Game minutes that pass per simulated second.
    pub minutes_per_second: f32,
    pub wake_hour: u32,
    pub sleep_hour: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            start_hour: 6,
            minutes_per_second: 10.0,
            wake_hour: 6,
            sleep_hour: 22,
        }
    }
}
