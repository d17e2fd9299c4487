//! Per-job behavior state machines.
//!
//! Each job has its own state enum; [`BehaviorState`] tags them together with
//! a shared `Idle`. All legal moves live in one table, [`transition`], which
//! maps `(job, state, event)` to the next state plus a side effect for the
//! decision system to apply. Anything not listed is ignored.
//!
//! Events are checked in [`BehaviorEvent::PRIORITY`] order. Survival events
//! (`LowHealth`, `Starving`) are checked even while an agent is on decision
//! cooldown; everything else waits for the cooldown to expire. Villagers
//! only break off to eat while their town's store can feed them; with the
//! store empty, farmers keep working the fields that refill it.

use crate::components::Job;
use serde::{Deserialize, Serialize};

// ============================================================================
// STATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FarmerState {
    Sleeping,
    Waking,
    Eating,
    WalkingToField,
    Working,
    WalkingHome,
    GoingToBed,
    Fleeing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardState {
    Patrolling,
    OnDuty,
    Engaging,
    Fleeing,
    Recovering,
    Eating,
    Resting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaiderState {
    Wandering,
    Raiding,
    Chasing,
    Attacking,
    /// Heading back to camp, possibly carrying food.
    Retreating,
    Recovering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    #[default]
    Idle,
    Farmer(FarmerState),
    Guard(GuardState),
    Raider(RaiderState),
}

impl BehaviorState {
    pub fn name(&self) -> &'static str {
        match self {
            BehaviorState::Idle => "Idle",
            BehaviorState::Farmer(s) => match s {
                FarmerState::Sleeping => "Sleeping",
                FarmerState::Waking => "Waking",
                FarmerState::Eating => "Eating",
                FarmerState::WalkingToField => "WalkingToField",
                FarmerState::Working => "Working",
                FarmerState::WalkingHome => "WalkingHome",
                FarmerState::GoingToBed => "GoingToBed",
                FarmerState::Fleeing => "Fleeing",
            },
            BehaviorState::Guard(s) => match s {
                GuardState::Patrolling => "Patrolling",
                GuardState::OnDuty => "OnDuty",
                GuardState::Engaging => "Engaging",
                GuardState::Fleeing => "Fleeing",
                GuardState::Recovering => "Recovering",
                GuardState::Eating => "Eating",
                GuardState::Resting => "Resting",
            },
            BehaviorState::Raider(s) => match s {
                RaiderState::Wandering => "Wandering",
                RaiderState::Raiding => "Raiding",
                RaiderState::Chasing => "Chasing",
                RaiderState::Attacking => "Attacking",
                RaiderState::Retreating => "Retreating",
                RaiderState::Recovering => "Recovering",
            },
        }
    }

    /// Stable numeric code used as the render sprite selector.
    ///
    /// Farmer states occupy 1..=8, guard states 10..=16, raider states 20..=25.
    pub fn sprite_code(&self) -> u32 {
        match self {
            BehaviorState::Idle => 0,
            BehaviorState::Farmer(s) => 1 + *s as u32,
            BehaviorState::Guard(s) => 10 + *s as u32,
            BehaviorState::Raider(s) => 20 + *s as u32,
        }
    }

    /// States in which the agent looks for enemies to fight.
    pub fn seeks_targets(&self) -> bool {
        matches!(
            self,
            BehaviorState::Guard(GuardState::Patrolling)
                | BehaviorState::Guard(GuardState::OnDuty)
                | BehaviorState::Guard(GuardState::Engaging)
                | BehaviorState::Raider(RaiderState::Wandering)
                | BehaviorState::Raider(RaiderState::Raiding)
                | BehaviorState::Raider(RaiderState::Chasing)
                | BehaviorState::Raider(RaiderState::Attacking)
        )
    }

    /// States that pursue the current combat target.
    pub fn is_engaged(&self) -> bool {
        matches!(
            self,
            BehaviorState::Guard(GuardState::Engaging)
                | BehaviorState::Raider(RaiderState::Chasing)
                | BehaviorState::Raider(RaiderState::Attacking)
        )
    }

    /// States that keep a bed reservation.
    pub fn uses_bed(&self) -> bool {
        matches!(
            self,
            BehaviorState::Farmer(FarmerState::GoingToBed)
                | BehaviorState::Farmer(FarmerState::Sleeping)
        )
    }

    pub fn is_sleeping(&self) -> bool {
        matches!(
            self,
            BehaviorState::Farmer(FarmerState::Sleeping) | BehaviorState::Guard(GuardState::Resting)
        )
    }
}

// ============================================================================
// EVENTS / EFFECTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorEvent {
    LowHealth,
    Starving,
    LeashBroken,
    TargetLost,
    EnemySpotted,
    InRange,
    OutOfRange,
    Healed,
    Arrived,
    BedTime,
    WakeTime,
    Hungry,
    Full,
    Tired,
    Rested,
    PostWaitElapsed,
    Routine,
}

impl BehaviorEvent {
    /// Evaluation order. The first event whose condition holds and which has
    /// an entry in the table for the current state wins.
    pub const PRIORITY: [BehaviorEvent; 17] = [
        BehaviorEvent::LowHealth,
        BehaviorEvent::Starving,
        BehaviorEvent::LeashBroken,
        BehaviorEvent::TargetLost,
        BehaviorEvent::EnemySpotted,
        BehaviorEvent::InRange,
        BehaviorEvent::OutOfRange,
        BehaviorEvent::Healed,
        BehaviorEvent::Arrived,
        BehaviorEvent::BedTime,
        BehaviorEvent::WakeTime,
        BehaviorEvent::Hungry,
        BehaviorEvent::Full,
        BehaviorEvent::Tired,
        BehaviorEvent::Rested,
        BehaviorEvent::PostWaitElapsed,
        BehaviorEvent::Routine,
    ];

    /// Survival events ignore the decision cooldown.
    pub fn is_survival(self) -> bool {
        matches!(self, BehaviorEvent::LowHealth | BehaviorEvent::Starving)
    }
}

/// Side effect attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    None,
    /// Consume one food from the agent's town and reset hunger.
    Eat,
    /// Pick a farm of an enemy town to raid.
    ChooseRaidTarget,
    /// Take one food from the raided town if any is stored.
    StealFood,
    /// Drop carried food at camp, then eat if the camp has food.
    DeliverFood,
    /// Move to the next guard post on the ring.
    AdvancePost,
    PickWanderPoint,
    BeginRecovery,
    EndRecovery,
    /// Forget the current combat target.
    DropTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: BehaviorState,
    pub effect: Effect,
}

impl Transition {
    fn to(next: BehaviorState) -> Option<Self> {
        Some(Self {
            next,
            effect: Effect::None,
        })
    }

    fn with(next: BehaviorState, effect: Effect) -> Option<Self> {
        Some(Self { next, effect })
    }
}

/// Facts the table needs beyond `(state, event)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    pub is_daytime: bool,
    pub recovering: bool,
    /// Energy at or above the rested threshold.
    pub rested: bool,
    /// The agent's town has food to eat, or it has no town to draw from.
    pub food_available: bool,
}

// ============================================================================
// TRANSITION TABLE
// ============================================================================

/// Look up the transition for `event` in `state`.
pub fn transition(
    job: Job,
    state: BehaviorState,
    event: BehaviorEvent,
    ctx: &TransitionContext,
) -> Option<Transition> {
    match state {
        BehaviorState::Idle => idle(job, event, ctx),
        BehaviorState::Farmer(s) => farmer(s, event, ctx),
        BehaviorState::Guard(s) => guard(s, event, ctx),
        BehaviorState::Raider(s) => raider(s, event, ctx),
    }
}

fn idle(job: Job, event: BehaviorEvent, ctx: &TransitionContext) -> Option<Transition> {
    use BehaviorEvent as E;
    match (job, event) {
        (Job::Farmer, E::LowHealth) => {
            Transition::with(BehaviorState::Farmer(FarmerState::Fleeing), Effect::BeginRecovery)
        }
        (Job::Guard, E::LowHealth) => {
            Transition::with(BehaviorState::Guard(GuardState::Fleeing), Effect::BeginRecovery)
        }
        (Job::Raider, E::LowHealth) => {
            Transition::with(BehaviorState::Raider(RaiderState::Retreating), Effect::BeginRecovery)
        }
        (Job::Farmer, E::Routine) => Transition::to(farmer_routine(ctx)),
        (Job::Guard, E::Routine) => Transition::to(BehaviorState::Guard(GuardState::Patrolling)),
        (Job::Raider, E::Routine) => Transition::with(
            BehaviorState::Raider(RaiderState::Wandering),
            Effect::PickWanderPoint,
        ),
        _ => None,
    }
}

fn farmer_routine(ctx: &TransitionContext) -> BehaviorState {
    if ctx.is_daytime {
        BehaviorState::Farmer(FarmerState::WalkingToField)
    } else {
        BehaviorState::Farmer(FarmerState::GoingToBed)
    }
}

fn farmer(state: FarmerState, event: BehaviorEvent, ctx: &TransitionContext) -> Option<Transition> {
    use BehaviorEvent as E;
    use FarmerState as S;
    let to = |s: S| BehaviorState::Farmer(s);

    match (state, event) {
        (S::Fleeing, E::Healed) => Transition::with(to(S::Waking), Effect::EndRecovery),
        (S::Fleeing, _) => None,
        (_, E::LowHealth) => Transition::with(to(S::Fleeing), Effect::BeginRecovery),
        (S::Eating, E::Starving) => None,
        (_, E::Starving) if ctx.food_available => Transition::to(to(S::Eating)),

        (S::Sleeping, E::WakeTime) if ctx.rested => Transition::to(to(S::Waking)),
        (S::Waking, E::Hungry) if ctx.food_available => Transition::to(to(S::Eating)),
        (S::Waking, E::Routine) => Transition::to(farmer_routine(ctx)),
        (S::Eating, E::Arrived) => Transition::with(farmer_routine(ctx), Effect::Eat),
        (S::Eating, E::Full) => Transition::to(farmer_routine(ctx)),
        (S::WalkingToField, E::Arrived) => Transition::to(to(S::Working)),
        (S::WalkingToField | S::Working, E::BedTime) => Transition::to(to(S::WalkingHome)),
        (S::WalkingToField | S::Working, E::Hungry) if ctx.food_available => {
            Transition::to(to(S::Eating))
        }
        (S::Working, E::Tired) => Transition::to(to(S::WalkingHome)),
        (S::WalkingHome, E::Arrived) => Transition::to(to(S::GoingToBed)),
        (S::GoingToBed, E::Arrived) => Transition::to(to(S::Sleeping)),
        _ => None,
    }
}

fn guard(state: GuardState, event: BehaviorEvent, ctx: &TransitionContext) -> Option<Transition> {
    use BehaviorEvent as E;
    use GuardState as S;
    let to = |s: S| BehaviorState::Guard(s);

    match (state, event) {
        (S::Fleeing | S::Recovering, E::Healed) => {
            Transition::with(to(S::Patrolling), Effect::EndRecovery)
        }
        (S::Fleeing, E::Arrived) => Transition::to(to(S::Recovering)),
        (S::Fleeing | S::Recovering, _) => None,
        (_, E::LowHealth) => Transition::with(to(S::Fleeing), Effect::BeginRecovery),
        (S::Patrolling | S::OnDuty | S::Resting, E::Starving) if ctx.food_available => {
            Transition::to(to(S::Eating))
        }

        (S::Engaging, E::TargetLost) => Transition::to(to(S::Patrolling)),
        (S::Patrolling | S::OnDuty, E::EnemySpotted) => Transition::to(to(S::Engaging)),
        (S::Patrolling, E::Arrived) => Transition::to(to(S::OnDuty)),
        (S::OnDuty, E::PostWaitElapsed) => {
            Transition::with(to(S::Patrolling), Effect::AdvancePost)
        }
        (S::Patrolling | S::OnDuty, E::Hungry) if ctx.food_available => Transition::to(to(S::Eating)),
        (S::Eating, E::Arrived) => Transition::with(to(S::Patrolling), Effect::Eat),
        (S::Eating, E::Full) => Transition::to(to(S::Patrolling)),
        (S::Patrolling | S::OnDuty, E::Tired) => Transition::to(to(S::Resting)),
        (S::Resting, E::Rested) => Transition::to(to(S::Patrolling)),
        _ => None,
    }
}

fn raider(state: RaiderState, event: BehaviorEvent, ctx: &TransitionContext) -> Option<Transition> {
    use BehaviorEvent as E;
    use RaiderState as S;
    let to = |s: S| BehaviorState::Raider(s);

    match (state, event) {
        (S::Recovering, E::Healed) => Transition::with(to(S::Wandering), Effect::EndRecovery),
        (S::Recovering, _) => None,
        (S::Retreating, E::Arrived) if ctx.recovering => {
            Transition::with(to(S::Recovering), Effect::DeliverFood)
        }
        (S::Retreating, E::Arrived) => Transition::with(to(S::Wandering), Effect::DeliverFood),
        (_, E::LowHealth) => Transition::with(to(S::Retreating), Effect::BeginRecovery),
        (S::Wandering, E::Starving) => {
            Transition::with(to(S::Raiding), Effect::ChooseRaidTarget)
        }

        (S::Chasing | S::Attacking, E::LeashBroken) => {
            Transition::with(to(S::Retreating), Effect::DropTarget)
        }
        (S::Chasing | S::Attacking, E::TargetLost) => {
            Transition::with(to(S::Wandering), Effect::PickWanderPoint)
        }
        (S::Wandering | S::Raiding, E::EnemySpotted) => Transition::to(to(S::Chasing)),
        (S::Chasing, E::InRange) => Transition::to(to(S::Attacking)),
        (S::Attacking, E::OutOfRange) => Transition::to(to(S::Chasing)),
        (S::Raiding, E::Arrived) => Transition::with(to(S::Retreating), Effect::StealFood),
        (S::Wandering, E::Arrived) => Transition::with(to(S::Wandering), Effect::PickWanderPoint),
        (S::Wandering, E::Hungry) => Transition::with(to(S::Raiding), Effect::ChooseRaidTarget),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> TransitionContext {
        TransitionContext {
            is_daytime: true,
            recovering: false,
            rested: true,
            food_available: true,
        }
    }

    fn night() -> TransitionContext {
        TransitionContext {
            is_daytime: false,
            ..day()
        }
    }

    #[test]
    fn test_idle_routine_enters_job_state() {
        let t = transition(Job::Farmer, BehaviorState::Idle, BehaviorEvent::Routine, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Farmer(FarmerState::WalkingToField));

        let t = transition(Job::Farmer, BehaviorState::Idle, BehaviorEvent::Routine, &night()).unwrap();
        assert_eq!(t.next, BehaviorState::Farmer(FarmerState::GoingToBed));

        let t = transition(Job::Raider, BehaviorState::Idle, BehaviorEvent::Routine, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Raider(RaiderState::Wandering));
        assert_eq!(t.effect, Effect::PickWanderPoint);
    }

    #[test]
    fn test_farmer_day_cycle() {
        let ctx = day();
        let mut state = BehaviorState::Farmer(FarmerState::WalkingToField);
        for (event, expected) in [
            (BehaviorEvent::Arrived, FarmerState::Working),
            (BehaviorEvent::BedTime, FarmerState::WalkingHome),
            (BehaviorEvent::Arrived, FarmerState::GoingToBed),
            (BehaviorEvent::Arrived, FarmerState::Sleeping),
            (BehaviorEvent::WakeTime, FarmerState::Waking),
        ] {
            state = transition(Job::Farmer, state, event, &ctx).unwrap().next;
            assert_eq!(state, BehaviorState::Farmer(expected));
        }
    }

    #[test]
    fn test_tired_farmer_keeps_sleeping() {
        let ctx = TransitionContext {
            rested: false,
            ..day()
        };
        let sleeping = BehaviorState::Farmer(FarmerState::Sleeping);
        assert!(transition(Job::Farmer, sleeping, BehaviorEvent::WakeTime, &ctx).is_none());
    }

    #[test]
    fn test_survival_preempts_work() {
        let working = BehaviorState::Farmer(FarmerState::Working);
        let t = transition(Job::Farmer, working, BehaviorEvent::LowHealth, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Farmer(FarmerState::Fleeing));
        assert_eq!(t.effect, Effect::BeginRecovery);

        let patrolling = BehaviorState::Guard(GuardState::Patrolling);
        let t = transition(Job::Guard, patrolling, BehaviorEvent::Starving, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Guard(GuardState::Eating));
    }

    #[test]
    fn test_fleeing_ignores_everything_but_healed() {
        let fleeing = BehaviorState::Guard(GuardState::Fleeing);
        assert!(transition(Job::Guard, fleeing, BehaviorEvent::EnemySpotted, &day()).is_none());
        assert!(transition(Job::Guard, fleeing, BehaviorEvent::LowHealth, &day()).is_none());
        let t = transition(Job::Guard, fleeing, BehaviorEvent::Arrived, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Guard(GuardState::Recovering));
        let t = transition(Job::Guard, t.next, BehaviorEvent::Healed, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Guard(GuardState::Patrolling));
        assert_eq!(t.effect, Effect::EndRecovery);
    }

    #[test]
    fn test_guard_patrol_ring() {
        let ctx = day();
        let t = transition(Job::Guard, BehaviorState::Guard(GuardState::Patrolling), BehaviorEvent::Arrived, &ctx).unwrap();
        assert_eq!(t.next, BehaviorState::Guard(GuardState::OnDuty));
        let t = transition(Job::Guard, t.next, BehaviorEvent::PostWaitElapsed, &ctx).unwrap();
        assert_eq!(t.next, BehaviorState::Guard(GuardState::Patrolling));
        assert_eq!(t.effect, Effect::AdvancePost);
    }

    #[test]
    fn test_raider_leash_breaks_chase() {
        let ctx = day();
        let chasing = BehaviorState::Raider(RaiderState::Chasing);
        let t = transition(Job::Raider, chasing, BehaviorEvent::LeashBroken, &ctx).unwrap();
        assert_eq!(t.next, BehaviorState::Raider(RaiderState::Retreating));
        assert_eq!(t.effect, Effect::DropTarget);

        let t = transition(Job::Raider, chasing, BehaviorEvent::InRange, &ctx).unwrap();
        assert_eq!(t.next, BehaviorState::Raider(RaiderState::Attacking));
    }

    #[test]
    fn test_raider_retreat_delivers_food() {
        let retreating = BehaviorState::Raider(RaiderState::Retreating);
        let t = transition(Job::Raider, retreating, BehaviorEvent::Arrived, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Raider(RaiderState::Wandering));
        assert_eq!(t.effect, Effect::DeliverFood);

        let hurt = TransitionContext {
            recovering: true,
            ..day()
        };
        let t = transition(Job::Raider, retreating, BehaviorEvent::Arrived, &hurt).unwrap();
        assert_eq!(t.next, BehaviorState::Raider(RaiderState::Recovering));

        let t = transition(Job::Raider, t.next, BehaviorEvent::Healed, &hurt).unwrap();
        assert_eq!(t.next, BehaviorState::Raider(RaiderState::Wandering));
        assert_eq!(t.effect, Effect::EndRecovery);
    }

    #[test]
    fn test_empty_store_keeps_villagers_at_work() {
        let famine = TransitionContext {
            food_available: false,
            ..day()
        };
        let working = BehaviorState::Farmer(FarmerState::Working);
        for event in [BehaviorEvent::Starving, BehaviorEvent::Hungry] {
            assert!(transition(Job::Farmer, working, event, &famine).is_none());
            let walking = BehaviorState::Farmer(FarmerState::WalkingToField);
            assert!(transition(Job::Farmer, walking, event, &famine).is_none());
        }
        let waking = BehaviorState::Farmer(FarmerState::Waking);
        let t = transition(Job::Farmer, waking, BehaviorEvent::Routine, &famine).unwrap();
        assert_eq!(t.next, BehaviorState::Farmer(FarmerState::WalkingToField));
        assert!(transition(Job::Farmer, waking, BehaviorEvent::Hungry, &famine).is_none());

        let patrolling = BehaviorState::Guard(GuardState::Patrolling);
        assert!(transition(Job::Guard, patrolling, BehaviorEvent::Starving, &famine).is_none());
        let t = transition(Job::Guard, patrolling, BehaviorEvent::Starving, &day()).unwrap();
        assert_eq!(t.next, BehaviorState::Guard(GuardState::Eating));
    }

    #[test]
    fn test_unlisted_pairs_are_ignored() {
        let ctx = day();
        let working = BehaviorState::Farmer(FarmerState::Working);
        assert!(transition(Job::Farmer, working, BehaviorEvent::EnemySpotted, &ctx).is_none());
        assert!(transition(Job::Farmer, working, BehaviorEvent::Routine, &ctx).is_none());
    }

    #[test]
    fn test_sprite_codes_are_distinct() {
        let states = [
            BehaviorState::Idle,
            BehaviorState::Farmer(FarmerState::Fleeing),
            BehaviorState::Guard(GuardState::Patrolling),
            BehaviorState::Guard(GuardState::Resting),
            BehaviorState::Raider(RaiderState::Wandering),
            BehaviorState::Raider(RaiderState::Recovering),
        ];
        let mut codes: Vec<_> = states.iter().map(|s| s.sprite_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), states.len());
        assert_eq!(BehaviorState::Guard(GuardState::Resting).sprite_code(), 16);
    }
}
