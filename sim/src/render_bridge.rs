//! Render export.
//!
//! Converts the finished tick into a flat `f32` buffer for the rendering
//! layer. The buffer is a one-way snapshot; nothing on the render side writes
//! back into the simulation.
//!
//! # Buffer Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ HEADER (2 elements)                                             │
//! │ [0] agent_count, [1] projectile_count (as f32)                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ RECORDS ((agent_count + projectile_count) × RECORD_STRIDE)      │
//! │ Living agents in slot order, then active projectiles in slot    │
//! │ order. For record i (offset = HEADER_SIZE + i * RECORD_STRIDE): │
//! │   [+0] id      - agent or projectile slot                       │
//! │   [+1] x       - X position (world units)                       │
//! │   [+2] y       - Y position (world units)                       │
//! │   [+3] sprite  - behavior sprite code, or PROJECTILE_SPRITE     │
//! │   [+4] scale   - visual size multiplier                         │
//! │   [+5] health  - health fraction 0..1 (1.0 for projectiles)     │
//! │   [+6] tint_r  - faction tint                                   │
//! │   [+7] tint_g                                                   │
//! │   [+8] tint_b                                                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Given the same state the output is identical.

use crate::agents::AgentStore;
use crate::components::Faction;
use crate::projectiles::ProjectilePool;

/// Number of f32 values per record.
pub const RECORD_STRIDE: usize = 9;

/// Number of f32 values in the buffer header.
pub const HEADER_SIZE: usize = 2;

/// Sprite selector for projectiles. Agent sprite codes stay below 32.
pub const PROJECTILE_SPRITE: f32 = 64.0;

pub const FIELD_ID: usize = 0;
pub const FIELD_X: usize = 1;
pub const FIELD_Y: usize = 2;
pub const FIELD_SPRITE: usize = 3;
pub const FIELD_SCALE: usize = 4;
pub const FIELD_HEALTH: usize = 5;
pub const FIELD_TINT_R: usize = 6;
pub const FIELD_TINT_G: usize = 7;
pub const FIELD_TINT_B: usize = 8;

/// Write the render buffer for the current state into `buffer`, replacing
/// its contents.
pub fn write_render_buffer(agents: &AgentStore, pool: &ProjectilePool, buffer: &mut Vec<f32>) {
    let agent_count = agents.living_count();
    let projectile_count = pool.active_count();
    let size = calculate_buffer_size(agent_count + projectile_count);

    buffer.clear();
    buffer.reserve(size);
    buffer.push(agent_count as f32);
    buffer.push(projectile_count as f32);

    for slot in agents.living() {
        let pos = agents.position[slot];
        let [r, g, b] = agents.faction[slot].tint();
        buffer.extend_from_slice(&[
            slot as f32,
            pos.x,
            pos.y,
            agents.state[slot].sprite_code() as f32,
            agents.stats[slot].size,
            agents.health[slot].fraction(),
            r,
            g,
            b,
        ]);
    }

    for (slot, p) in pool.slots.iter().enumerate().filter(|(_, p)| p.is_active()) {
        let [r, g, b] = Faction::from_id(p.faction).unwrap_or(Faction::Villager).tint();
        buffer.extend_from_slice(&[slot as f32, p.x, p.y, PROJECTILE_SPRITE, 1.0, 1.0, r, g, b]);
    }

    debug_assert_eq!(buffer.len(), size, "render buffer size mismatch");
}

pub fn render_buffer(agents: &AgentStore, pool: &ProjectilePool) -> Vec<f32> {
    let mut buffer = Vec::new();
    write_render_buffer(agents, pool, &mut buffer);
    buffer
}

#[inline]
pub fn calculate_buffer_size(record_count: usize) -> usize {
    HEADER_SIZE + record_count * RECORD_STRIDE
}

/// Agent and projectile counts from a buffer header, or `None` if the buffer
/// is too short to hold one.
#[inline]
pub fn parse_counts(buffer: &[f32]) -> Option<(usize, usize)> {
    match buffer {
        [agents, projectiles, ..] => Some((*agents as usize, *projectiles as usize)),
        _ => None,
    }
}

/// Offset of record `index`. Projectile records follow the agent records.
#[inline]
pub const fn record_offset(index: usize) -> usize {
    HEADER_SIZE + index * RECORD_STRIDE
}
