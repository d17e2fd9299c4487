//! Spatial partitioning for neighbor queries.
//!
//! A bounded dense grid: the world rectangle is divided into
//! `columns x rows` cells of `cell_size`, each holding up to `cell_capacity`
//! entries inline. Entries beyond a cell's capacity go to a spill list kept
//! sorted by cell (counting sort), so nothing is ever dropped and iteration
//! order stays deterministic.
//!
//! The grid is rebuilt from scratch once per tick, before anything queries it.
//! Entries carry a copy of the agent's position and faction as of the
//! rebuild; queries made later in the tick see those frozen values.

use crate::agents::AgentStore;
use crate::components::{Faction, Position};
use crate::config::GridConfig;
use bevy_ecs::prelude::*;
use bytemuck::{Pod, Zeroable};

/// Entry in a spatial cell.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SpatialEntry {
    pub slot: u32,
    pub x: f32,
    pub y: f32,
    pub faction: u32,
}

impl SpatialEntry {
    #[inline]
    pub fn distance_sq(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

/// Occupancy figures from the last rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    pub entries: usize,
    pub active_cells: usize,
    pub max_per_cell: usize,
    /// Entries that overflowed their cell's inline capacity.
    pub spilled: usize,
}

#[derive(Resource, Debug, Clone)]
pub struct SpatialGrid {
    pub cell_size: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub columns: u32,
    pub rows: u32,
    pub cell_capacity: u32,
    /// Inline entry count per cell, at most `cell_capacity`.
    counts: Vec<u32>,
    /// `cells * cell_capacity` inline slots.
    dense: Vec<SpatialEntry>,
    /// Spill offsets per cell (`cells + 1` long).
    spill_start: Vec<u32>,
    spill: Vec<SpatialEntry>,
    /// Scratch for the spill counting sort.
    overflow: Vec<(u32, SpatialEntry)>,
    stats: GridStats,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(&GridConfig::default())
    }
}

impl SpatialGrid {
    pub fn new(config: &GridConfig) -> Self {
        let cells = (config.columns as usize) * (config.rows as usize);
        Self {
            cell_size: config.cell_size,
            origin_x: config.origin_x,
            origin_y: config.origin_y,
            columns: config.columns,
            rows: config.rows,
            cell_capacity: config.cell_capacity,
            counts: vec![0; cells],
            dense: vec![SpatialEntry::default(); cells * config.cell_capacity as usize],
            spill_start: vec![0; cells + 1],
            spill: Vec::new(),
            overflow: Vec::new(),
            stats: GridStats::default(),
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    /// Cell containing a point, or `None` outside the world.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> Option<(u32, u32)> {
        let fx = ((x - self.origin_x) / self.cell_size).floor();
        let fy = ((y - self.origin_y) / self.cell_size).floor();
        if fx.is_nan() || fy.is_nan() || fx < 0.0 || fy < 0.0 {
            return None;
        }
        let (cx, cy) = (fx as u32, fy as u32);
        (cx < self.columns && cy < self.rows).then_some((cx, cy))
    }

    /// Cell containing a point, clamped onto the grid edge.
    #[inline]
    pub fn clamped_cell(&self, x: f32, y: f32) -> (u32, u32) {
        let fx = ((x - self.origin_x) / self.cell_size).floor();
        let fy = ((y - self.origin_y) / self.cell_size).floor();
        let cx = if fx.is_nan() { 0.0 } else { fx.clamp(0.0, (self.columns - 1) as f32) };
        let cy = if fy.is_nan() { 0.0 } else { fy.clamp(0.0, (self.rows - 1) as f32) };
        (cx as u32, cy as u32)
    }

    #[inline]
    fn cell_index(&self, cx: u32, cy: u32) -> usize {
        cy as usize * self.columns as usize + cx as usize
    }

    /// Clear and repopulate from the living agents in one pass.
    pub fn rebuild(&mut self, positions: &[Position], alive: &[bool], factions: &[Faction]) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.overflow.clear();
        let capacity = self.cell_capacity as usize;
        let mut entries = 0;

        for (slot, pos) in positions.iter().enumerate() {
            if !alive.get(slot).copied().unwrap_or(false) {
                continue;
            }
            let (cx, cy) = self.clamped_cell(pos.x, pos.y);
            let cell = self.cell_index(cx, cy);
            let entry = SpatialEntry {
                slot: slot as u32,
                x: pos.x,
                y: pos.y,
                faction: factions.get(slot).map(|f| f.id()).unwrap_or(0),
            };
            let n = self.counts[cell] as usize;
            if n < capacity {
                self.dense[cell * capacity + n] = entry;
                self.counts[cell] += 1;
            } else {
                self.overflow.push((cell as u32, entry));
            }
            entries += 1;
        }

        self.sort_spill();
        self.stats = self.compute_stats(entries);
    }

    /// Counting sort of overflow entries by cell, stable in slot order.
    fn sort_spill(&mut self) {
        self.spill_start.iter_mut().for_each(|s| *s = 0);
        for &(cell, _) in &self.overflow {
            self.spill_start[cell as usize + 1] += 1;
        }
        for i in 1..self.spill_start.len() {
            self.spill_start[i] += self.spill_start[i - 1];
        }

        self.spill.clear();
        self.spill.resize(self.overflow.len(), SpatialEntry::default());
        let mut cursor: Vec<u32> = if self.overflow.is_empty() {
            Vec::new()
        } else {
            self.spill_start[..self.counts.len()].to_vec()
        };
        for &(cell, entry) in &self.overflow {
            let at = &mut cursor[cell as usize];
            self.spill[*at as usize] = entry;
            *at += 1;
        }
    }

    fn compute_stats(&self, entries: usize) -> GridStats {
        let mut stats = GridStats {
            entries,
            spilled: self.spill.len(),
            ..Default::default()
        };
        for cell in 0..self.counts.len() {
            let n = self.counts[cell] as usize + self.spill_len(cell);
            if n > 0 {
                stats.active_cells += 1;
                stats.max_per_cell = stats.max_per_cell.max(n);
            }
        }
        stats
    }

    #[inline]
    fn spill_len(&self, cell: usize) -> usize {
        (self.spill_start[cell + 1] - self.spill_start[cell]) as usize
    }

    /// All entries stored in one cell, inline entries first.
    pub fn cell_entries(&self, cx: u32, cy: u32) -> impl Iterator<Item = &SpatialEntry> + '_ {
        let cell = self.cell_index(cx, cy);
        let capacity = self.cell_capacity as usize;
        let dense = &self.dense[cell * capacity..cell * capacity + self.counts[cell] as usize];
        let spill = &self.spill
            [self.spill_start[cell] as usize..self.spill_start[cell + 1] as usize];
        dense.iter().chain(spill.iter())
    }

    /// Every entry in the cells around a point, without distance filtering.
    ///
    /// Covers `max(1, ceil(radius / cell_size))` rings of cells, so at least
    /// the 3x3 neighborhood, in row-major cell order. Rings are capped at the
    /// grid's larger dimension. A point outside the world yields nothing.
    pub fn candidates(&self, x: f32, y: f32, radius: f32) -> impl Iterator<Item = &SpatialEntry> + '_ {
        let bounds = self.world_to_cell(x, y).map(|(cx, cy)| {
            let max_rings = self.columns.max(self.rows) as i64;
            let rings = ((radius / self.cell_size).ceil() as i64).clamp(1, max_rings.max(1));
            (
                (cx as i64 - rings).max(0) as u32,
                (cx as i64 + rings).min(self.columns as i64 - 1) as u32,
                (cy as i64 - rings).max(0) as u32,
                (cy as i64 + rings).min(self.rows as i64 - 1) as u32,
            )
        });
        bounds.into_iter().flat_map(move |(x0, x1, y0, y1)| {
            (y0..=y1).flat_map(move |gy| (x0..=x1).flat_map(move |gx| self.cell_entries(gx, gy)))
        })
    }

    pub fn for_each_candidate(&self, x: f32, y: f32, radius: f32, mut f: impl FnMut(&SpatialEntry)) {
        for entry in self.candidates(x, y, radius) {
            f(entry);
        }
    }

    /// All entries in the neighborhood of a point. Callers filter by exact
    /// distance.
    pub fn query_neighbors(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let mut results = Vec::new();
        self.for_each_candidate(x, y, radius, |e| results.push(*e));
        results
    }

    /// Entries within `radius` of a point, closest first.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let mut results = Vec::new();
        self.for_each_candidate(x, y, radius, |e| {
            if e.distance_sq(x, y) <= radius_sq {
                results.push(*e);
            }
        });
        results.sort_by(|a, b| a.distance_sq(x, y).total_cmp(&b.distance_sq(x, y)));
        results
    }

    /// Nearest entry of another faction within `radius` that passes `accept`.
    /// Ties go to the lower slot.
    pub fn nearest_enemy(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        my_faction: u32,
        mut accept: impl FnMut(&SpatialEntry) -> bool,
    ) -> Option<SpatialEntry> {
        let radius_sq = radius * radius;
        let mut best: Option<(f32, SpatialEntry)> = None;
        self.for_each_candidate(x, y, radius, |e| {
            if e.faction == my_faction {
                return;
            }
            let d = e.distance_sq(x, y);
            if d > radius_sq || !accept(e) {
                return;
            }
            let better = match best {
                None => true,
                Some((bd, be)) => d < bd || (d == bd && e.slot < be.slot),
            };
            if better {
                best = Some((d, *e));
            }
        });
        best.map(|(_, e)| e)
    }

    pub fn stats(&self) -> GridStats {
        self.stats
    }

    /// Total entries from the last rebuild.
    pub fn total_count(&self) -> usize {
        self.stats.entries
    }

    /// Borrow the raw storage for upload to compute kernels.
    pub fn pack(&self) -> PackedGrid<'_> {
        PackedGrid {
            counts: &self.counts,
            dense: &self.dense,
            spill_start: &self.spill_start,
            spill: &self.spill,
        }
    }
}

/// Grid storage as flat arrays, in the layout the kernels index directly.
/// `spill` may be empty.
#[derive(Debug, Clone, Copy)]
pub struct PackedGrid<'a> {
    pub counts: &'a [u32],
    pub dense: &'a [SpatialEntry],
    pub spill_start: &'a [u32],
    pub spill: &'a [SpatialEntry],
}

/// System that rebuilds the spatial grid each tick.
pub fn spatial_grid_update_system(mut grid: ResMut<SpatialGrid>, agents: Res<AgentStore>) {
    grid.rebuild(&agents.position, &agents.alive, &agents.faction);

    let stats = grid.stats();
    if stats.spilled > 0 {
        tracing::trace!(spilled = stats.spilled, max_per_cell = stats.max_per_cell, "grid cells over capacity");
    }
}
