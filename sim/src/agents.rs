//! Structure-of-arrays agent storage.
//!
//! Every per-agent attribute is a `Vec` indexed by the agent's slot. Slots are
//! stable for an agent's lifetime; dead slots go on a free list and are handed
//! out again by the next spawn, with `generation` bumped so stale references
//! (e.g. kill credit on an in-flight projectile) can be detected.

use crate::behavior::BehaviorState;
use crate::components::*;
use crate::error::{SimError, SimResult};
use bevy_ecs::prelude::*;

/// Optional spawn parameters. Unset positions default to the spawn point or
/// the owning town's center.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnConfig {
    pub town: Option<usize>,
    pub home: Option<Position>,
    pub work: Option<Position>,
    /// Raider camp / guard fallback point.
    pub anchor: Option<Position>,
    /// Starting index on the town's guard-post ring.
    pub patrol_post: usize,
    pub level: u32,
}

/// Fully resolved spawn record.
#[derive(Debug, Clone, Copy)]
pub struct AgentInit {
    pub position: Position,
    pub job: Job,
    pub faction: Faction,
    pub stats: CachedStats,
    pub town: Option<usize>,
    pub home: Position,
    pub work: Position,
    pub anchor: Position,
    pub patrol_post: usize,
    pub level: u32,
    pub xp: u32,
}

#[derive(Resource, Debug, Default)]
pub struct AgentStore {
    capacity: usize,
    free: Vec<usize>,

    pub alive: Vec<bool>,
    pub generation: Vec<u32>,

    pub position: Vec<Position>,
    pub velocity: Vec<Velocity>,
    pub faction: Vec<Faction>,
    pub job: Vec<Job>,
    pub health: Vec<Health>,
    pub stats: Vec<CachedStats>,
    pub energy: Vec<f32>,
    pub hunger: Vec<f32>,
    pub level: Vec<u32>,
    pub xp: Vec<u32>,

    pub state: Vec<BehaviorState>,
    /// Seconds until the next voluntary state change is allowed.
    pub decision_cooldown: Vec<f32>,
    /// Seconds spent in the current state.
    pub state_timer: Vec<f32>,

    pub target: Vec<Option<Position>>,
    pub arrived: Vec<bool>,
    /// Set once the decision system has reacted to `arrived`.
    pub arrival_handled: Vec<bool>,
    pub backoff: Vec<u32>,

    pub combat_target: Vec<Option<usize>>,
    pub attack_timer: Vec<f32>,

    pub home: Vec<Position>,
    pub work: Vec<Position>,
    pub anchor: Vec<Position>,
    pub town: Vec<Option<usize>>,
    pub patrol_post: Vec<usize>,
    pub recovering: Vec<bool>,
    pub carrying_food: Vec<bool>,
    /// Reserved bed as (town, building).
    pub bed: Vec<Option<(usize, usize)>>,
    /// Farm worked by a farmer as (town, building).
    pub farm: Vec<Option<(usize, usize)>>,
    /// Farm being raided as (town, building).
    pub raid_target: Vec<Option<(usize, usize)>>,
    /// Shooter slot and generation of the last hit taken.
    pub last_hit_by: Vec<Option<(usize, u32)>>,
}

impl AgentStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Slots ever allocated (living or dead).
    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn living_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    #[inline]
    pub fn is_alive(&self, slot: usize) -> bool {
        self.alive.get(slot).copied().unwrap_or(false)
    }

    /// Ok if `slot` holds a living agent.
    pub fn check_alive(&self, slot: usize) -> SimResult<()> {
        match self.alive.get(slot) {
            None => Err(SimError::InvalidSlot(slot)),
            Some(false) => Err(SimError::DeadSlot(slot)),
            Some(true) => Ok(()),
        }
    }

    /// Slots of living agents in ascending order.
    pub fn living(&self) -> impl Iterator<Item = usize> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter_map(|(slot, &alive)| alive.then_some(slot))
    }

    /// Place a new agent, reusing the most recently freed slot if any.
    pub fn spawn(&mut self, init: AgentInit) -> SimResult<usize> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.len() < self.capacity => {
                self.push_blank();
                self.len() - 1
            }
            None => {
                return Err(SimError::CapacityExhausted {
                    capacity: self.capacity,
                })
            }
        };

        self.alive[slot] = true;
        self.generation[slot] = self.generation[slot].wrapping_add(1);
        self.position[slot] = init.position;
        self.velocity[slot] = Velocity::default();
        self.faction[slot] = init.faction;
        self.job[slot] = init.job;
        self.health[slot] = Health::new(init.stats.max_health);
        self.stats[slot] = init.stats;
        self.energy[slot] = 100.0;
        self.hunger[slot] = 0.0;
        self.level[slot] = init.level;
        self.xp[slot] = init.xp;
        self.state[slot] = BehaviorState::Idle;
        self.decision_cooldown[slot] = 0.0;
        self.state_timer[slot] = 0.0;
        self.target[slot] = None;
        self.arrived[slot] = false;
        self.arrival_handled[slot] = false;
        self.backoff[slot] = 0;
        self.combat_target[slot] = None;
        self.attack_timer[slot] = 0.0;
        self.home[slot] = init.home;
        self.work[slot] = init.work;
        self.anchor[slot] = init.anchor;
        self.town[slot] = init.town;
        self.patrol_post[slot] = init.patrol_post;
        self.recovering[slot] = false;
        self.carrying_food[slot] = false;
        self.bed[slot] = None;
        self.farm[slot] = None;
        self.raid_target[slot] = None;
        self.last_hit_by[slot] = None;
        Ok(slot)
    }

    fn push_blank(&mut self) {
        self.alive.push(false);
        self.generation.push(0);
        self.position.push(Position::default());
        self.velocity.push(Velocity::default());
        self.faction.push(Faction::Villager);
        self.job.push(Job::Farmer);
        self.health.push(Health::new(0.0));
        self.stats.push(CachedStats::default());
        self.energy.push(0.0);
        self.hunger.push(0.0);
        self.level.push(0);
        self.xp.push(0);
        self.state.push(BehaviorState::Idle);
        self.decision_cooldown.push(0.0);
        self.state_timer.push(0.0);
        self.target.push(None);
        self.arrived.push(false);
        self.arrival_handled.push(false);
        self.backoff.push(0);
        self.combat_target.push(None);
        self.attack_timer.push(0.0);
        self.home.push(Position::default());
        self.work.push(Position::default());
        self.anchor.push(Position::default());
        self.town.push(None);
        self.patrol_post.push(0);
        self.recovering.push(false);
        self.carrying_food.push(false);
        self.bed.push(None);
        self.farm.push(None);
        self.raid_target.push(None);
        self.last_hit_by.push(None);
    }

    /// Mark a slot dead and return it to the free list.
    ///
    /// Returns false if the slot was already dead or never allocated. Town
    /// reservations are released by the caller, which owns the town registry.
    pub fn kill(&mut self, slot: usize) -> bool {
        if !self.is_alive(slot) {
            return false;
        }
        self.alive[slot] = false;
        self.health[slot].current = 0.0;
        self.velocity[slot] = Velocity::default();
        self.target[slot] = None;
        self.combat_target[slot] = None;
        self.bed[slot] = None;
        self.farm[slot] = None;
        self.raid_target[slot] = None;
        self.free.push(slot);
        true
    }

    /// Set or clear the movement target, resetting arrival.
    pub fn set_target(&mut self, slot: usize, target: Option<Position>) {
        self.target[slot] = target;
        self.arrived[slot] = false;
        self.arrival_handled[slot] = false;
        self.backoff[slot] = 0;
    }

    /// Enter a new behavior state, resetting the state timer.
    pub fn enter_state(&mut self, slot: usize, state: BehaviorState) {
        self.state[slot] = state;
        self.state_timer[slot] = 0.0;
    }

    pub fn free_slots(&self) -> usize {
        self.free.len() + (self.capacity - self.len())
    }
}
