//! Arrival + separation steering.
//!
//! [`steer_one`] is the whole algorithm for one agent, written as a pure
//! function over its neighbor candidates. The CPU backends call it serially
//! or across a rayon pool; `compute/steer.wgsl` is a line-for-line port of it
//! for the GPU backend. The packed types below are shared with that kernel,
//! so their layout is fixed (`#[repr(C)]`, 4-byte scalars only).
//!
//! Per agent:
//!
//! - **arrival**: head for the movement target at full speed, ramping down
//!   inside `slowing_radius`; within `arrival_radius` the agent is marked
//!   arrived and stops seeking (arrival is sticky until the target changes).
//! - **separation**: every neighbor closer than the push radius
//!   (`separation_radius * separation_falloff`) pushes the agent away, in
//!   proportion to how deep it is inside that radius. Neighbors sitting at
//!   exactly the same point have no direction to push along; they are given
//!   one from a Vogel spiral keyed on the two slot ids and all of them
//!   together contribute a single push, so a stack of co-located agents
//!   unfolds instead of oscillating.
//! - the two are summed and clamped to the agent's max speed.
//! - **backoff**: an agent that keeps failing to make progress toward its
//!   target scales its arrival push down so jammed crowds can untangle.

use bytemuck::{Pod, Zeroable};

pub const FLAG_ALIVE: u32 = 1;
pub const FLAG_HAS_TARGET: u32 = 2;
pub const FLAG_ARRIVED: u32 = 4;

/// Golden angle in radians.
pub const GOLDEN_ANGLE: f32 = 2.399_963_3;

/// Steering input for one agent slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SteerAgent {
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    /// Max speed this tick.
    pub speed: f32,
    pub flags: u32,
    pub backoff: u32,
    pub _pad: u32,
}

impl SteerAgent {
    #[inline]
    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Steering result for one agent slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SteerOutput {
    pub vx: f32,
    pub vy: f32,
    pub arrived: u32,
    pub backoff: u32,
}

/// Uniform parameters for one steering dispatch.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SteerParams {
    pub push_radius: f32,
    pub strength: f32,
    pub arrival_radius: f32,
    pub slowing_radius: f32,
    pub overlap_epsilon: f32,
    pub backoff_progress: f32,
    pub backoff_yield: f32,
    pub max_backoff: u32,
    pub agent_count: u32,
    pub _pad: [u32; 3],
}

impl SteerParams {
    pub fn from_config(config: &crate::config::SteeringConfig, agent_count: usize) -> Self {
        Self {
            push_radius: config.push_radius(),
            strength: config.separation_strength,
            arrival_radius: config.arrival_radius,
            slowing_radius: config.slowing_radius.max(1e-3),
            overlap_epsilon: config.overlap_epsilon,
            backoff_progress: config.backoff_progress,
            backoff_yield: config.backoff_yield,
            max_backoff: config.max_backoff,
            agent_count: agent_count as u32,
            _pad: [0; 3],
        }
    }
}

/// Point `k` of a Vogel (sunflower) spiral.
#[inline]
pub fn vogel_point(k: u32) -> (f32, f32) {
    let r = (k as f32 + 0.5).sqrt();
    let theta = k as f32 * GOLDEN_ANGLE;
    (r * theta.cos(), r * theta.sin())
}

/// Deterministic unit direction separating slot `me` from an overlapping `other`.
#[inline]
pub fn overlap_direction(me: u32, other: u32) -> (f32, f32) {
    let (ax, ay) = vogel_point(me);
    let (bx, by) = vogel_point(other);
    let (dx, dy) = (ax - bx, ay - by);
    let len = (dx * dx + dy * dy).sqrt();
    if len > 1e-6 {
        (dx / len, dy / len)
    } else {
        let theta = me as f32 * GOLDEN_ANGLE;
        (theta.cos(), theta.sin())
    }
}

/// Solve one agent. `neighbors` yields `(slot, x, y)` candidates and may
/// include the agent itself and agents outside the push radius.
pub fn steer_one(
    slot: u32,
    agent: &SteerAgent,
    neighbors: impl Iterator<Item = (u32, f32, f32)>,
    params: &SteerParams,
) -> SteerOutput {
    if !agent.has(FLAG_ALIVE) {
        return SteerOutput::default();
    }

    let rp = params.push_radius;
    let rp_sq = rp * rp;
    let eps_sq = params.overlap_epsilon * params.overlap_epsilon;

    let (mut sx, mut sy) = (0.0f32, 0.0f32);
    let (mut ox, mut oy) = (0.0f32, 0.0f32);
    let mut overlaps = 0u32;

    for (other, nx, ny) in neighbors {
        if other == slot {
            continue;
        }
        let dx = agent.x - nx;
        let dy = agent.y - ny;
        let d_sq = dx * dx + dy * dy;
        if d_sq >= rp_sq {
            continue;
        }
        if d_sq < eps_sq {
            let (ux, uy) = overlap_direction(slot, other);
            ox += ux;
            oy += uy;
            overlaps += 1;
        } else {
            let d = d_sq.sqrt();
            let w = (rp - d) / d;
            sx += dx * w;
            sy += dy * w;
        }
    }
    if overlaps > 0 {
        let inv = rp / overlaps as f32;
        sx += ox * inv;
        sy += oy * inv;
    }
    sx *= params.strength;
    sy *= params.strength;

    let mut arrived = agent.has(FLAG_ARRIVED);
    let mut backoff = agent.backoff;
    let (mut ax, mut ay) = (0.0f32, 0.0f32);
    let mut seek: Option<(f32, f32, f32)> = None;

    if agent.has(FLAG_HAS_TARGET) && !arrived {
        let tx = agent.target_x - agent.x;
        let ty = agent.target_y - agent.y;
        let dist = (tx * tx + ty * ty).sqrt();
        if dist <= params.arrival_radius {
            arrived = true;
        } else {
            let (ux, uy) = (tx / dist, ty / dist);
            let desired = agent.speed * (dist / params.slowing_radius).min(1.0);
            let yield_scale = 1.0 / (1.0 + backoff as f32 * params.backoff_yield);
            ax = ux * desired * yield_scale;
            ay = uy * desired * yield_scale;
            seek = Some((ux, uy, desired));
        }
    }

    let mut vx = ax + sx;
    let mut vy = ay + sy;
    let mag = (vx * vx + vy * vy).sqrt();
    if mag > agent.speed && mag > 0.0 {
        let scale = agent.speed / mag;
        vx *= scale;
        vy *= scale;
    }

    match seek {
        Some((ux, uy, desired)) => {
            let progress = vx * ux + vy * uy;
            if progress < params.backoff_progress * desired {
                backoff = (backoff + 1).min(params.max_backoff);
            } else {
                backoff = backoff.saturating_sub(1);
            }
        }
        None => backoff = 0,
    }

    SteerOutput {
        vx,
        vy,
        arrived: arrived as u32,
        backoff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SteeringConfig;

    fn params() -> SteerParams {
        SteerParams::from_config(&SteeringConfig::default(), 0)
    }

    fn agent(x: f32, y: f32) -> SteerAgent {
        SteerAgent {
            x,
            y,
            speed: 100.0,
            flags: FLAG_ALIVE,
            ..Default::default()
        }
    }

    #[test]
    fn test_lone_agent_without_target_is_still() {
        let a = agent(0.0, 0.0);
        let out = steer_one(0, &a, std::iter::empty(), &params());
        assert_eq!(out.vx, 0.0);
        assert_eq!(out.vy, 0.0);
        assert_eq!(out.arrived, 0);
    }

    #[test]
    fn test_dead_agent_outputs_nothing() {
        let mut a = agent(0.0, 0.0);
        a.flags = 0;
        let out = steer_one(0, &a, [(1, 1.0, 0.0)].into_iter(), &params());
        assert_eq!(out, SteerOutput::default());
    }

    #[test]
    fn test_arrival_heads_to_target_at_full_speed() {
        let mut a = agent(0.0, 0.0);
        a.flags |= FLAG_HAS_TARGET;
        a.target_x = 500.0;
        let out = steer_one(0, &a, std::iter::empty(), &params());
        assert!((out.vx - 100.0).abs() < 1e-3);
        assert!(out.vy.abs() < 1e-6);
        assert_eq!(out.backoff, 0);
    }

    #[test]
    fn test_arrival_slows_inside_slowing_radius_and_marks_arrived() {
        let p = params();
        let mut a = agent(0.0, 0.0);
        a.flags |= FLAG_HAS_TARGET;
        a.target_x = 30.0;
        let out = steer_one(0, &a, std::iter::empty(), &p);
        assert!((out.vx - 50.0).abs() < 1e-3);
        assert_eq!(out.arrived, 0);

        a.target_x = p.arrival_radius * 0.5;
        let out = steer_one(0, &a, std::iter::empty(), &p);
        assert_eq!(out.arrived, 1);
        assert_eq!(out.vx, 0.0);
    }

    #[test]
    fn test_separation_pushes_apart_and_ignores_far() {
        let p = params();
        let a = agent(0.0, 0.0);
        let out = steer_one(0, &a, [(1, 10.0, 0.0)].into_iter(), &p);
        assert!(out.vx < 0.0, "pushed away from neighbor on +x");
        assert!(out.vy.abs() < 1e-6);

        let out = steer_one(0, &a, [(1, p.push_radius + 1.0, 0.0)].into_iter(), &p);
        assert_eq!(out.vx, 0.0);
    }

    #[test]
    fn test_push_is_clamped_to_speed() {
        let a = agent(0.0, 0.0);
        let crowd = (1..20).map(|i| (i, 1.0, 0.01 * i as f32));
        let out = steer_one(0, &a, crowd, &params());
        let mag = (out.vx * out.vx + out.vy * out.vy).sqrt();
        assert!(mag <= 100.0 + 1e-3);
    }

    #[test]
    fn test_overlap_fallback_is_deterministic_and_opposed() {
        let p = params();
        let a = agent(5.0, 5.0);
        let out_a = steer_one(3, &a, [(7, 5.0, 5.0)].into_iter(), &p);
        let again = steer_one(3, &a, [(7, 5.0, 5.0)].into_iter(), &p);
        assert_eq!(out_a, again);

        let out_b = steer_one(7, &a, [(3, 5.0, 5.0)].into_iter(), &p);
        assert!(out_a.vx.hypot(out_a.vy) > 1.0);
        assert!((out_a.vx + out_b.vx).abs() < 1e-3);
        assert!((out_a.vy + out_b.vy).abs() < 1e-3);
    }

    #[test]
    fn test_blocked_agent_accumulates_backoff() {
        let mut p = params();
        p.backoff_yield = 0.1;
        let mut a = agent(0.0, 0.0);
        a.flags |= FLAG_HAS_TARGET;
        a.target_x = 500.0;
        // Wall of neighbors directly ahead.
        let wall = [(1, 2.0, 0.0), (2, 2.0, 1.0), (3, 2.0, -1.0)];
        let out = steer_one(0, &a, wall.into_iter(), &p);
        assert_eq!(out.backoff, 1);

        a.backoff = p.max_backoff;
        let out = steer_one(0, &a, wall.into_iter(), &p);
        assert_eq!(out.backoff, p.max_backoff);

        let out = steer_one(0, &a, std::iter::empty(), &p);
        assert_eq!(out.backoff, p.max_backoff - 1);
    }

    #[test]
    fn test_packed_layout_sizes() {
        assert_eq!(std::mem::size_of::<SteerAgent>(), 32);
        assert_eq!(std::mem::size_of::<SteerOutput>(), 16);
        assert_eq!(std::mem::size_of::<SteerParams>(), 48);
    }
}
