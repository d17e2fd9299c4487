//! Tick counter, fixed delta and the day/night clock.

use crate::config::ClockConfig;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Resource containing the delta time for the current tick.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DeltaTime(pub f32);

/// Global simulation tick counter.
#[derive(Resource, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// In-game time of day. Game minutes advance at a fixed rate per simulated
/// second.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct GameClock {
    pub total_minutes: f64,
    pub minutes_per_second: f32,
    pub wake_hour: u32,
    pub sleep_hour: u32,
}

impl GameClock {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            total_minutes: config.start_hour as f64 * 60.0,
            minutes_per_second: config.minutes_per_second,
            wake_hour: config.wake_hour,
            sleep_hour: config.sleep_hour,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.total_minutes += (dt * self.minutes_per_second) as f64;
    }

    /// Hour of the current day, 0..24.
    pub fn hour(&self) -> u32 {
        ((self.total_minutes / 60.0) as u64 % 24) as u32
    }

    /// Days elapsed since the simulation started at midnight of day 0.
    pub fn day(&self) -> u64 {
        (self.total_minutes / (24.0 * 60.0)) as u64
    }

    pub fn is_daytime(&self) -> bool {
        let hour = self.hour();
        hour >= self.wake_hour && hour < self.sleep_hour
    }

    /// Game hours covered by a step of `dt` seconds.
    pub fn hours_in(&self, dt: f32) -> f32 {
        dt * self.minutes_per_second / 60.0
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new(&ClockConfig::default())
    }
}

pub fn clock_system(dt: Res<DeltaTime>, mut tick: ResMut<SimTick>, mut clock: ResMut<GameClock>) {
    tick.increment();
    clock.advance(dt.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_day_night() {
        let mut clock = GameClock::default();
        assert_eq!(clock.hour(), 6);
        assert!(clock.is_daytime());

        // 16 game hours at 10 min/s = 96 s.
        clock.advance(96.0);
        assert_eq!(clock.hour(), 22);
        assert!(!clock.is_daytime());

        clock.advance(48.0);
        assert_eq!(clock.hour(), 6);
        assert_eq!(clock.day(), 1);
        assert!(clock.is_daytime());
    }

    #[test]
    fn test_clock_system_advances_tick() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(6.0));
        world.insert_resource(SimTick::default());
        world.insert_resource(GameClock::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(clock_system);
        schedule.run(&mut world);
        schedule.run(&mut world);

        assert_eq!(world.resource::<SimTick>().0, 2);
        assert_eq!(world.resource::<GameClock>().hour(), 8);
        assert!((world.resource::<GameClock>().hours_in(6.0) - 1.0).abs() < 1e-6);
    }
}
