//! Per-agent value types.
//!
//! Agents are stored structure-of-arrays in [`AgentStore`](crate::agents::AgentStore);
//! the types here are the element types of those arrays.

use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL
// ============================================================================

/// 2D position in world units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.distance_sq_to(other).sqrt()
    }

    #[inline]
    pub fn distance_sq_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// 2D velocity vector in units per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Self::default()
        } else {
            Self {
                vx: self.vx / mag,
                vy: self.vy / mag,
            }
        }
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Side an agent fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Villager,
    Raider,
}

impl Faction {
    /// Compact id used by the grid and compute kernels.
    pub fn id(self) -> u32 {
        match self {
            Faction::Villager => 0,
            Faction::Raider => 1,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Faction::Villager),
            1 => Some(Faction::Raider),
            _ => None,
        }
    }

    /// Render tint as linear RGB.
    pub fn tint(self) -> [f32; 3] {
        match self {
            Faction::Villager => [0.35, 0.55, 1.0],
            Faction::Raider => [0.95, 0.3, 0.25],
        }
    }
}

/// What an agent does for a living. Selects its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Job {
    Farmer,
    Guard,
    Raider,
}

impl Job {
    pub fn default_faction(self) -> Faction {
        match self {
            Job::Farmer | Job::Guard => Faction::Villager,
            Job::Raider => Faction::Raider,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Job::Farmer => "Farmer",
            Job::Guard => "Guard",
            Job::Raider => "Raider",
        }
    }
}

// ============================================================================
// COMBAT
// ============================================================================

/// Current and maximum hit points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    /// Subtract `amount`, clamping at zero.
    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    /// Change max health, keeping the current fraction.
    pub fn rescale(&mut self, new_max: f32) {
        let frac = self.fraction();
        self.max = new_max;
        self.current = new_max * frac;
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Attack delivery. Both kinds spawn projectiles; they differ in range,
/// cooldown and projectile speed/lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    None,
    Melee,
    Ranged,
}

/// Stats resolved from job base stats, town upgrades and agent level.
///
/// Recomputed on spawn, level-up and upgrade purchase, never per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedStats {
    pub max_health: f32,
    pub speed: f32,
    pub damage: f32,
    pub attack: AttackKind,
    pub range: f32,
    pub cooldown: f32,
    pub projectile_speed: f32,
    pub projectile_lifetime: f32,
    pub detection_radius: f32,
    /// Sprite scale.
    pub size: f32,
    /// Fraction of incoming damage absorbed.
    pub mitigation: f32,
}

impl CachedStats {
    pub fn can_attack(&self) -> bool {
        self.attack != AttackKind::None && self.damage > 0.0
    }
}

impl Default for CachedStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            speed: 100.0,
            damage: 0.0,
            attack: AttackKind::None,
            range: 0.0,
            cooldown: 1.0,
            projectile_speed: 0.0,
            projectile_lifetime: 0.0,
            detection_radius: 0.0,
            size: 1.0,
            mitigation: 0.0,
        }
    }
}
