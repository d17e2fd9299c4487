//! Behavior decisions: evaluate events, apply transitions and their effects,
//! and point each agent at the destination its new state implies.

use crate::agents::AgentStore;
use crate::behavior::*;
use crate::components::*;
use crate::config::SimConfig;
use crate::systems::clock::{DeltaTime, GameClock};
use crate::towns::{BuildingKind, TownRegistry};
use bevy_ecs::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded RNG for wander points and other behavior choices.
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub ChaCha8Rng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::seeded(0)
    }
}

/// Where an agent goes to heal and eat: its town's fountain, or its camp
/// (anchor) if it has no town.
pub fn refuge(agents: &AgentStore, towns: &TownRegistry, slot: usize) -> Position {
    agents.town[slot]
        .and_then(|t| towns.get(t))
        .map(|t| t.center)
        .unwrap_or(agents.anchor[slot])
}

struct Ctx<'a> {
    config: &'a SimConfig,
    is_daytime: bool,
}

fn event_holds(agents: &AgentStore, slot: usize, event: BehaviorEvent, ctx: &Ctx) -> bool {
    use BehaviorEvent as E;
    let needs = &ctx.config.needs;
    let behavior = &ctx.config.behavior;
    let state = agents.state[slot];
    let target = agents.combat_target[slot].filter(|&t| agents.is_alive(t));
    let target_dist = || target.map(|t| agents.position[slot].distance_to(&agents.position[t]));

    match event {
        E::LowHealth => {
            !agents.recovering[slot]
                && agents.health[slot].fraction() < behavior.flee_threshold(agents.job[slot])
        }
        E::Starving => agents.hunger[slot] >= needs.starving,
        E::LeashBroken => {
            state.is_engaged()
                && agents.position[slot].distance_to(&agents.anchor[slot]) > behavior.leash_range
        }
        E::TargetLost => state.is_engaged() && target.is_none(),
        E::EnemySpotted => target.is_some(),
        E::InRange => target_dist().is_some_and(|d| d <= agents.stats[slot].range),
        E::OutOfRange => target_dist()
            .is_some_and(|d| d > agents.stats[slot].range * behavior.out_of_range_factor),
        E::Healed => {
            let health = agents.health[slot];
            let heal_to = recovery_target(agents, slot, ctx.config);
            agents.recovering[slot] && health.current >= health.max * heal_to
        }
        E::Arrived => agents.arrived[slot] && !agents.arrival_handled[slot],
        E::BedTime => !ctx.is_daytime,
        E::WakeTime => ctx.is_daytime,
        E::Hungry => agents.hunger[slot] >= needs.hungry,
        E::Full => agents.hunger[slot] <= needs.full,
        E::Tired => agents.energy[slot] <= needs.tired,
        E::Rested => agents.energy[slot] >= needs.rested,
        E::PostWaitElapsed => agents.state_timer[slot] >= behavior.patrol_wait,
        E::Routine => true,
    }
}

/// Health fraction that ends recovery. Starvation caps health below the
/// usual threshold, so a starving agent is released at the cap instead.
fn recovery_target(agents: &AgentStore, slot: usize, config: &SimConfig) -> f32 {
    let threshold = config.behavior.recover_threshold;
    if agents.hunger[slot] >= config.needs.starving {
        threshold.min(config.needs.starving_hp_cap)
    } else {
        threshold
    }
}

/// Whether eating would succeed: agents without a town eat from their own
/// supplies.
fn food_available(agents: &AgentStore, towns: &TownRegistry, slot: usize) -> bool {
    agents.town[slot]
        .and_then(|t| towns.get(t))
        .map_or(true, |town| town.food > 0)
}

/// First applicable transition in priority order.
fn decide(
    agents: &AgentStore,
    towns: &TownRegistry,
    slot: usize,
    ctx: &Ctx,
) -> Option<(BehaviorEvent, Transition)> {
    let on_cooldown = agents.decision_cooldown[slot] > 0.0;
    let tctx = TransitionContext {
        is_daytime: ctx.is_daytime,
        recovering: agents.recovering[slot],
        rested: agents.energy[slot] >= ctx.config.needs.rested,
        food_available: food_available(agents, towns, slot),
    };

    BehaviorEvent::PRIORITY
        .iter()
        .copied()
        .filter(|e| !on_cooldown || e.is_survival())
        .filter_map(|e| transition(agents.job[slot], agents.state[slot], e, &tctx).map(|t| (e, t)))
        .find(|&(e, _)| event_holds(agents, slot, e, ctx))
}

fn eat(agents: &mut AgentStore, towns: &mut TownRegistry, slot: usize) {
    let fed = match agents.town[slot].and_then(|t| towns.get_mut(t)) {
        Some(town) => town.take_food(),
        None => true,
    };
    if fed {
        agents.hunger[slot] = 0.0;
    }
}

fn apply_effect(agents: &mut AgentStore, towns: &mut TownRegistry, slot: usize, effect: Effect) {
    match effect {
        Effect::None | Effect::PickWanderPoint => {}
        Effect::Eat => eat(agents, towns, slot),
        Effect::ChooseRaidTarget => {
            agents.raid_target[slot] = towns
                .nearest_enemy_farm(agents.faction[slot], agents.position[slot])
                .map(|(t, b, _)| (t, b));
        }
        Effect::StealFood => {
            if let Some((t, _)) = agents.raid_target[slot].take() {
                if towns.get_mut(t).is_some_and(|town| town.take_food()) {
                    agents.carrying_food[slot] = true;
                }
            }
        }
        Effect::DeliverFood => {
            if agents.carrying_food[slot] {
                agents.carrying_food[slot] = false;
                if let Some(camp) = agents.town[slot].and_then(|t| towns.get_mut(t)) {
                    camp.food += 1;
                }
            }
            eat(agents, towns, slot);
        }
        Effect::AdvancePost => agents.patrol_post[slot] = agents.patrol_post[slot].wrapping_add(1),
        Effect::BeginRecovery => {
            agents.recovering[slot] = true;
            agents.combat_target[slot] = None;
        }
        Effect::EndRecovery => agents.recovering[slot] = false,
        Effect::DropTarget => agents.combat_target[slot] = None,
    }
}

fn wander_point(agents: &AgentStore, slot: usize, radius: f32, rng: &mut SimRng) -> Position {
    let anchor = agents.anchor[slot];
    let angle = rng.0.gen_range(0.0..std::f32::consts::TAU);
    let dist = radius * rng.0.gen_range(0.0f32..1.0).sqrt();
    Position::new(anchor.x + dist * angle.cos(), anchor.y + dist * angle.sin())
}

/// Reserve a bed near home for a farmer heading to bed.
fn bed_destination(agents: &mut AgentStore, towns: &mut TownRegistry, slot: usize) -> Position {
    if let Some((t, b)) = agents.bed[slot] {
        if let Some(bed) = towns.get(t).and_then(|town| town.building(b)) {
            return bed.position;
        }
    }
    let home = agents.home[slot];
    let Some(t) = agents.town[slot] else { return home };
    match towns.get_mut(t).and_then(|town| {
        town.reserve(BuildingKind::Bed, home, Some(slot))
            .and_then(|b| town.building(b).map(|bed| (b, bed.position)))
    }) {
        Some((b, pos)) => {
            agents.bed[slot] = Some((t, b));
            pos
        }
        None => home,
    }
}

/// Reserve a farm near the work position if the farmer has none.
fn farm_destination(agents: &mut AgentStore, towns: &mut TownRegistry, slot: usize) -> Position {
    if let Some((t, b)) = agents.farm[slot] {
        if let Some(farm) = towns.get(t).and_then(|town| town.building(b)) {
            return farm.position;
        }
    }
    let work = agents.work[slot];
    let Some(t) = agents.town[slot] else { return work };
    match towns.get_mut(t).and_then(|town| {
        town.reserve(BuildingKind::Farm, work, Some(slot))
            .and_then(|b| town.building(b).map(|farm| (b, farm.position)))
    }) {
        Some((b, pos)) => {
            agents.farm[slot] = Some((t, b));
            pos
        }
        None => work,
    }
}

/// Movement target implied by entering `state`. `None` means stand still.
fn destination(
    agents: &mut AgentStore,
    towns: &mut TownRegistry,
    rng: &mut SimRng,
    config: &SimConfig,
    slot: usize,
) -> Option<Position> {
    use BehaviorState as B;
    match agents.state[slot] {
        B::Idle => None,
        B::Farmer(s) => match s {
            FarmerState::WalkingToField => Some(farm_destination(agents, towns, slot)),
            FarmerState::WalkingHome => Some(agents.home[slot]),
            FarmerState::GoingToBed => Some(bed_destination(agents, towns, slot)),
            FarmerState::Eating | FarmerState::Fleeing => Some(refuge(agents, towns, slot)),
            FarmerState::Sleeping | FarmerState::Waking | FarmerState::Working => None,
        },
        B::Guard(s) => match s {
            GuardState::Patrolling => Some(
                agents.town[slot]
                    .and_then(|t| towns.get(t))
                    .and_then(|town| town.patrol_post(agents.patrol_post[slot]))
                    .unwrap_or(agents.anchor[slot]),
            ),
            GuardState::Eating | GuardState::Fleeing => Some(refuge(agents, towns, slot)),
            GuardState::Resting => Some(agents.home[slot]),
            GuardState::OnDuty | GuardState::Engaging | GuardState::Recovering => None,
        },
        B::Raider(s) => match s {
            RaiderState::Wandering => Some(wander_point(agents, slot, config.behavior.wander_radius, rng)),
            RaiderState::Raiding => agents.raid_target[slot]
                .and_then(|(t, b)| towns.get(t).and_then(|town| town.building(b)))
                .map(|farm| farm.position),
            RaiderState::Retreating => Some(agents.anchor[slot]),
            RaiderState::Chasing | RaiderState::Attacking | RaiderState::Recovering => None,
        },
    }
}

fn release_bed(agents: &mut AgentStore, towns: &mut TownRegistry, slot: usize) {
    if let Some((t, b)) = agents.bed[slot].take() {
        if let Some(town) = towns.get_mut(t) {
            town.release(b);
        }
    }
}

/// Move engaged agents toward their enemy, stopping inside attack range.
fn track_enemy(agents: &mut AgentStore, slot: usize, standoff_factor: f32) {
    let Some(enemy) = agents.combat_target[slot].filter(|&t| agents.is_alive(t)) else {
        return;
    };
    let enemy_pos = agents.position[enemy];
    let standoff = agents.stats[slot].range * standoff_factor;
    if agents.position[slot].distance_to(&enemy_pos) <= standoff {
        agents.target[slot] = None;
    } else {
        agents.target[slot] = Some(enemy_pos);
    }
    agents.arrived[slot] = false;
    agents.arrival_handled[slot] = true;
}

/// Run the behavior FSM for every living agent.
///
/// ## Data Access
/// - Reads: DeltaTime, SimConfig, GameClock
/// - Writes: AgentStore, TownRegistry (food, reservations), SimRng
pub fn decision_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    clock: Res<GameClock>,
    mut agents: ResMut<AgentStore>,
    mut towns: ResMut<TownRegistry>,
    mut rng: ResMut<SimRng>,
) {
    let delta = dt.0;
    let config: &SimConfig = &config;
    let agents = &mut *agents;
    let towns = &mut *towns;
    let rng = &mut *rng;
    let ctx = Ctx {
        config,
        is_daytime: clock.is_daytime(),
    };

    for slot in 0..agents.len() {
        if !agents.alive[slot] {
            continue;
        }
        agents.decision_cooldown[slot] = (agents.decision_cooldown[slot] - delta).max(0.0);
        agents.state_timer[slot] += delta;

        if let Some((event, t)) = decide(agents, towns, slot, &ctx) {
            let prev = agents.state[slot];
            if event == BehaviorEvent::Arrived {
                agents.arrival_handled[slot] = true;
            }
            apply_effect(agents, towns, slot, t.effect);

            if t.next != prev || t.effect == Effect::PickWanderPoint {
                if prev.uses_bed() && !t.next.uses_bed() {
                    release_bed(agents, towns, slot);
                }
                agents.enter_state(slot, t.next);
                agents.decision_cooldown[slot] = config.behavior.decision_cooldown;

                let mut dest = destination(agents, towns, rng, config, slot);
                if t.next == BehaviorState::Raider(RaiderState::Raiding) && dest.is_none() {
                    // No enemy farm to raid.
                    agents.enter_state(slot, BehaviorState::Raider(RaiderState::Wandering));
                    dest = destination(agents, towns, rng, config, slot);
                }
                agents.set_target(slot, dest);

                tracing::trace!(slot, from = prev.name(), to = agents.state[slot].name(), ?event, "transition");
            }
        }

        if agents.state[slot].is_engaged() {
            track_enemy(agents, slot, config.behavior.standoff_factor);
        }
    }
}
