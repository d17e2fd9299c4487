//! Hunger, energy, recovery healing and farm output.
//!
//! Hunger and energy move on game hours (see [`GameClock`]); healing is per
//! real second so recovery time does not depend on the clock speed.

use crate::agents::AgentStore;
use crate::behavior::{BehaviorState, FarmerState};
use crate::config::SimConfig;
use crate::systems::clock::{DeltaTime, GameClock};
use crate::systems::decision::refuge;
use crate::towns::{TownRegistry, UpgradeKind};
use bevy_ecs::prelude::*;

pub fn needs_system(
    dt: Res<DeltaTime>,
    clock: Res<GameClock>,
    config: Res<SimConfig>,
    mut agents: ResMut<AgentStore>,
    mut towns: ResMut<TownRegistry>,
) {
    let delta = dt.0;
    let hours = clock.hours_in(delta);
    let needs = &config.needs;
    let agents = &mut *agents;

    for slot in 0..agents.len() {
        if !agents.alive[slot] {
            continue;
        }
        let town = agents.town[slot];

        agents.hunger[slot] = (agents.hunger[slot] + needs.hunger_per_hour * hours).clamp(0.0, 100.0);
        let energy_rate = if agents.state[slot].is_sleeping() {
            needs.energy_restore_per_hour
        } else {
            -needs.energy_drain_per_hour
        };
        agents.energy[slot] = (agents.energy[slot] + energy_rate * hours).clamp(0.0, 100.0);

        if agents.recovering[slot] {
            let home = refuge(agents, &towns, slot);
            if agents.position[slot].distance_to(&home) <= needs.heal_radius {
                let bonus = town
                    .and_then(|t| towns.get(t))
                    .map_or(1.0, |t| t.upgrades.multiplier(UpgradeKind::HealingRate));
                agents.health[slot].heal(needs.heal_rate * bonus * delta);
            }
        }

        if agents.state[slot] == BehaviorState::Farmer(FarmerState::Working) {
            if let Some(t) = town.and_then(|t| towns.get_mut(t)) {
                let yield_mult = t.upgrades.multiplier(UpgradeKind::FarmYield);
                t.add_harvest(needs.farm_yield_per_hour * yield_mult * hours);
            }
        }

        if agents.hunger[slot] >= needs.starving {
            let health = &mut agents.health[slot];
            health.current = health.current.min(health.max * needs.starving_hp_cap);
        }
    }
}
