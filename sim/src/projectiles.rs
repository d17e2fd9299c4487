//! Projectile pool and the per-projectile advance/collide step.
//!
//! Every attack, melee or ranged, is delivered as a projectile. Projectiles
//! live in a fixed-size pool of stable slots; expiring or hitting something
//! deactivates a slot in place and parks it off-world until it is reused.
//!
//! [`advance_one`] is the pure kernel body shared by the CPU backends and
//! `compute/projectile.wgsl`. It only records hits; damage is applied later
//! by the damage system so mitigation and kill credit stay on one code path.

use crate::components::Position;
use bevy_ecs::prelude::*;
use bytemuck::{Pod, Zeroable};

/// Where inactive projectiles are parked.
pub const OFF_WORLD: f32 = -99_999.0;

/// Sentinel for "no hit".
pub const NO_HIT: i32 = -1;

/// One projectile slot, laid out for GPU storage buffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub damage: f32,
    /// Seconds left before expiry.
    pub lifetime: f32,
    pub faction: u32,
    pub shooter: u32,
    pub shooter_generation: u32,
    pub active: u32,
    /// Slot hit, or [`NO_HIT`].
    pub hit_target: i32,
    pub hit_processed: u32,
}

impl Default for Projectile {
    fn default() -> Self {
        Self {
            x: OFF_WORLD,
            y: OFF_WORLD,
            vx: 0.0,
            vy: 0.0,
            damage: 0.0,
            lifetime: 0.0,
            faction: 0,
            shooter: 0,
            shooter_generation: 0,
            active: 0,
            hit_target: NO_HIT,
            hit_processed: 1,
        }
    }
}

impl Projectile {
    pub fn is_active(&self) -> bool {
        self.active != 0
    }

    /// A hit the damage pass has not consumed yet.
    pub fn pending_hit(&self) -> Option<usize> {
        (self.hit_target >= 0 && self.hit_processed == 0).then_some(self.hit_target as usize)
    }

    fn park(&mut self) {
        self.active = 0;
        self.x = OFF_WORLD;
        self.y = OFF_WORLD;
        self.vx = 0.0;
        self.vy = 0.0;
    }
}

/// Uniform parameters for one projectile dispatch.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ProjectileParams {
    pub dt: f32,
    pub hit_radius: f32,
    pub projectile_count: u32,
    pub _pad: u32,
}

/// Request to fire.
#[derive(Debug, Clone, Copy)]
pub struct FireCommand {
    pub from: Position,
    pub toward: Position,
    pub speed: f32,
    pub lifetime: f32,
    pub damage: f32,
    pub faction: u32,
    pub shooter: usize,
    pub shooter_generation: u32,
}

/// Fixed-capacity projectile storage with slot recycling.
#[derive(Resource, Debug)]
pub struct ProjectilePool {
    pub slots: Vec<Projectile>,
    free: Vec<u32>,
    capacity: usize,
    /// Shots dropped because the pool was full.
    pub dropped: u64,
}

impl ProjectilePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|p| p.is_active()).count()
    }

    /// Spawn a projectile aimed at a fixed point. Returns the slot, or `None`
    /// if the pool is full (the shot is dropped and counted).
    pub fn fire(&mut self, cmd: FireCommand) -> Option<usize> {
        let dx = cmd.toward.x - cmd.from.x;
        let dy = cmd.toward.y - cmd.from.y;
        let len = (dx * dx + dy * dy).sqrt();
        let (ux, uy) = if len > 1e-4 { (dx / len, dy / len) } else { (1.0, 0.0) };

        let slot = match self.free.pop() {
            Some(slot) => slot as usize,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Projectile::default());
                self.slots.len() - 1
            }
            None => {
                self.dropped += 1;
                if self.dropped.is_power_of_two() {
                    tracing::warn!(capacity = self.capacity, dropped = self.dropped, "projectile pool full");
                }
                return None;
            }
        };

        self.slots[slot] = Projectile {
            x: cmd.from.x,
            y: cmd.from.y,
            vx: ux * cmd.speed,
            vy: uy * cmd.speed,
            damage: cmd.damage,
            lifetime: cmd.lifetime,
            faction: cmd.faction,
            shooter: cmd.shooter as u32,
            shooter_generation: cmd.shooter_generation,
            active: 1,
            hit_target: NO_HIT,
            hit_processed: 1,
        };
        Some(slot)
    }

    /// Mark a hit consumed and free its slot.
    pub fn consume_hit(&mut self, slot: usize) {
        if let Some(p) = self.slots.get_mut(slot) {
            p.hit_processed = 1;
            p.hit_target = NO_HIT;
            self.free.push(slot as u32);
        }
    }

    /// Return slots that went inactive without a hit (expired) to the free
    /// list. Hit slots are freed by [`consume_hit`](Self::consume_hit).
    pub fn reclaim_expired(&mut self, was_active: &[bool]) {
        for (slot, p) in self.slots.iter().enumerate() {
            if was_active.get(slot).copied().unwrap_or(false)
                && !p.is_active()
                && p.hit_target == NO_HIT
            {
                self.free.push(slot as u32);
            }
        }
    }
}

/// Advance one projectile by `dt` and test its swept path for hits.
///
/// `candidates` yields `(slot, x, y, faction)` of agents near the path;
/// `is_alive` filters out agents that died since the grid was built. The
/// first candidate (in iteration order) within `hit_radius` of the segment
/// travelled this step is hit.
pub fn advance_one(
    p: &mut Projectile,
    candidates: impl Iterator<Item = (u32, f32, f32, u32)>,
    is_alive: impl Fn(u32) -> bool,
    params: &ProjectileParams,
) {
    if p.active == 0 {
        return;
    }

    let (x0, y0) = (p.x, p.y);
    let (x1, y1) = (x0 + p.vx * params.dt, y0 + p.vy * params.dt);
    p.x = x1;
    p.y = y1;
    p.lifetime -= params.dt;

    let (sx, sy) = (x1 - x0, y1 - y0);
    let seg_sq = sx * sx + sy * sy;
    let hit_sq = params.hit_radius * params.hit_radius;

    for (slot, ax, ay, faction) in candidates {
        if faction == p.faction || !is_alive(slot) {
            continue;
        }
        let t = if seg_sq > 0.0 {
            (((ax - x0) * sx + (ay - y0) * sy) / seg_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (cx, cy) = (x0 + sx * t, y0 + sy * t);
        let (dx, dy) = (ax - cx, ay - cy);
        if dx * dx + dy * dy <= hit_sq {
            p.hit_target = slot as i32;
            p.hit_processed = 0;
            p.park();
            return;
        }
    }

    if p.lifetime <= 0.0 {
        p.park();
    }
}

/// Center and radius of the area a projectile can hit this step.
#[inline]
pub fn sweep_bounds(p: &Projectile, params: &ProjectileParams) -> (f32, f32, f32) {
    let hx = p.vx * params.dt * 0.5;
    let hy = p.vy * params.dt * 0.5;
    (p.x + hx, p.y + hy, (hx * hx + hy * hy).sqrt() + params.hit_radius)
}
