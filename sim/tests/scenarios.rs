//! End-to-end scenarios through the public API.

use bevy_ecs::prelude::*;
use hearth_sim::agents::{AgentInit, AgentStore, SpawnConfig};
use hearth_sim::compute::Compute;
use hearth_sim::spatial::{spatial_grid_update_system, SpatialGrid};
use hearth_sim::systems::{movement_system, resolve_stats, steering_system, DeltaTime, SteerScratch};
use hearth_sim::*;

/// Grid rebuild, steering and integration only: no behavior FSM to move
/// targets around underneath the test.
struct Kinematics {
    world: World,
    schedule: Schedule,
}

impl Kinematics {
    fn new(config: SimConfig) -> Self {
        let mut world = World::new();
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SpatialGrid::new(&config.grid));
        world.insert_resource(AgentStore::with_capacity(config.max_agents));
        world.insert_resource(Compute::default());
        world.insert_resource(SteerScratch::default());
        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_grid_update_system, steering_system, movement_system).chain());
        Self { world, schedule }
    }

    fn spawn(&mut self, job: Job, position: Position) -> usize {
        let stats = resolve_stats(&self.world.resource::<SimConfig>().combat, job, 0, None);
        self.world
            .resource_mut::<AgentStore>()
            .spawn(AgentInit {
                position,
                job,
                faction: job.default_faction(),
                stats,
                town: None,
                home: position,
                work: position,
                anchor: position,
                patrol_post: 0,
                level: 0,
                xp: 0,
            })
            .unwrap()
    }

    fn run_for(&mut self, seconds: f32) {
        let dt = self.world.resource::<SimConfig>().fixed_timestep;
        let ticks = (seconds / dt).round() as usize;
        for _ in 0..ticks {
            self.schedule.run(&mut self.world);
        }
    }

    fn agents(&self) -> &AgentStore {
        self.world.resource::<AgentStore>()
    }

    fn min_pairwise_distance(&self) -> f32 {
        let agents = self.agents();
        let living: Vec<Position> = agents.living().map(|s| agents.position[s]).collect();
        let mut min = f32::INFINITY;
        for (i, a) in living.iter().enumerate() {
            for b in &living[i + 1..] {
                min = min.min(a.distance_to(b));
            }
        }
        min
    }
}

#[test]
fn crowd_separates_without_targets() {
    let config = SimConfig::default();
    let radius = config.steering.separation_radius;
    let mut sim = Kinematics::new(config);
    for _ in 0..40 {
        sim.spawn(Job::Farmer, Position::new(100.0, 100.0));
    }

    sim.run_for(5.0);
    assert!(
        sim.min_pairwise_distance() >= radius - 0.5,
        "min distance {}",
        sim.min_pairwise_distance()
    );
}

#[test]
fn five_hundred_colocated_agents_separate_in_three_seconds() {
    let mut config = SimConfig::default();
    config.steering.separation_radius = 12.0;
    config.steering.separation_falloff = 2.0;
    config.steering.separation_strength = 20.0;
    config.combat.farmer.speed = 200.0;
    let radius = config.steering.separation_radius;

    let mut sim = Kinematics::new(config);
    for _ in 0..500 {
        sim.spawn(Job::Farmer, Position::new(500.0, 500.0));
    }
    sim.run_for(3.0);

    let min = sim.min_pairwise_distance();
    assert!(min >= radius, "min pairwise distance {min} < {radius}");
    assert_eq!(sim.agents().living_count(), 500);
}

#[test]
fn lone_agent_arrives_and_stops() {
    let config = SimConfig::default();
    let arrival = config.steering.arrival_radius;
    let step = config.combat.farmer.speed * config.fixed_timestep;
    let mut sim = Kinematics::new(config);
    let slot = sim.spawn(Job::Farmer, Position::new(0.0, 0.0));
    let target = Position::new(400.0, -300.0);
    sim.world
        .resource_mut::<AgentStore>()
        .set_target(slot, Some(target));

    sim.run_for(10.0);

    let agents = sim.agents();
    assert!(agents.arrived[slot]);
    assert!(agents.position[slot].distance_to(&target) <= arrival + step);
    assert_eq!(agents.velocity[slot], Velocity::default());
}

#[test]
fn opposing_pair_trades_projectile_damage() {
    let mut sim = SimWorld::new();
    let guard = sim
        .spawn_job(Position::new(1000.0, 1000.0), Job::Guard, SpawnConfig::default())
        .unwrap();
    let raider = sim
        .spawn_job(Position::new(1030.0, 1000.0), Job::Raider, SpawnConfig::default())
        .unwrap();
    assert_eq!(sim.agents().stats[guard].range, 150.0);
    let raider_max = sim.get_health(raider).unwrap().max;

    let mut saw_projectile = false;
    for _ in 0..180 {
        sim.run_ticks(1);
        // A shot resolved within its firing tick leaves only the cooldown behind.
        let agents = sim.agents();
        saw_projectile |= sim.projectiles().active_count() > 0
            || agents.attack_timer[guard] > 0.0
            || agents.attack_timer[raider] > 0.0;
        if sim.get_health(raider).map_or(true, |h| h.current < raider_max) {
            break;
        }
    }

    assert!(saw_projectile, "no projectile was fired");
    let health = sim.get_health(raider).map_or(0.0, |h| h.current);
    assert!(health < raider_max, "raider health {health} did not drop");
    assert!(sim.get_debug_stats().dropped_projectiles == 0);
}

#[test]
fn overkill_clamps_and_frees_slot() {
    let mut sim = SimWorld::new();
    let guard = sim
        .spawn_job(Position::new(1000.0, 1000.0), Job::Guard, SpawnConfig::default())
        .unwrap();
    let raider = sim
        .spawn_job(Position::new(1100.0, 1000.0), Job::Raider, SpawnConfig::default())
        .unwrap();

    sim.apply_damage(raider, 60.0).unwrap();
    sim.apply_damage(raider, 60.0).unwrap();
    assert!(!sim.is_alive(raider));
    assert_eq!(sim.agents().health[raider].current, 0.0);
    assert!(sim.get_health(raider).is_none());

    sim.run_ticks(60);
    let agents = sim.agents();
    assert_ne!(agents.combat_target[guard], Some(raider));
    assert!(agents.free_slots() >= 1);

    let reborn = sim
        .spawn_job(Position::new(1200.0, 1000.0), Job::Farmer, SpawnConfig::default())
        .unwrap();
    assert_eq!(reborn, raider);
    assert_eq!(sim.get_health(reborn).unwrap().fraction(), 1.0);
}

#[test]
fn bed_reservation_round_trip() {
    let mut sim = SimWorld::new();
    let town = sim
        .add_town("Ashford", Position::new(0.0, 0.0), Faction::Villager)
        .unwrap();
    for i in 0..3 {
        sim.add_bed(town, Position::new(10.0 * i as f32, 20.0)).unwrap();
    }

    assert_eq!(sim.free_beds(town), Some(3));
    let bed = sim.reserve_bed(town, Position::new(0.0, 0.0)).unwrap();
    assert_eq!(sim.free_beds(town), Some(2));
    assert!(sim.release_bed(town, bed));
    assert_eq!(sim.free_beds(town), Some(3));
}

#[test]
fn village_day_runs_without_losing_agents() {
    let mut sim = SimWorld::new();
    let town = sim
        .add_town("Ashford", Position::new(0.0, 0.0), Faction::Villager)
        .unwrap();
    for i in 0..4 {
        let x = -60.0 + 40.0 * i as f32;
        sim.add_farm(town, Position::new(x, 150.0)).unwrap();
        sim.add_bed(town, Position::new(x, -80.0)).unwrap();
        sim.add_guard_post(town, Position::new(x * 2.0, 200.0)).unwrap();
    }
    sim.add_town_food(town, 20).unwrap();

    let member = SpawnConfig {
        town: Some(town),
        ..Default::default()
    };
    for i in 0..4 {
        let p = Position::new(i as f32 * 5.0, 0.0);
        sim.spawn_job(p, Job::Farmer, member).unwrap();
        sim.spawn_job(p, Job::Guard, member).unwrap();
    }

    for _ in 0..600 {
        sim.step(1.0 / 60.0);
    }

    assert_eq!(sim.living_count(), 8);
    assert_eq!(sim.free_farms(town), Some(0), "every farmer holds a farm");
    let buffer = sim.render_buffer();
    assert_eq!(render_bridge::parse_counts(&buffer).map(|(a, _)| a), Some(8));
}

#[test]
fn starving_guard_finishes_recovery_in_a_famine() {
    let mut sim = SimWorld::new();
    let town = sim
        .add_town("Ashford", Position::new(0.0, 0.0), Faction::Villager)
        .unwrap();
    let guard = sim
        .spawn_job(Position::new(0.0, 0.0), Job::Guard, SpawnConfig { town: Some(town), ..Default::default() })
        .unwrap();
    {
        let mut agents = sim.world_mut().resource_mut::<AgentStore>();
        agents.hunger[guard] = 90.0;
        agents.health[guard].current = 10.0;
    }

    sim.run_ticks(7200);

    let agents = sim.agents();
    assert_eq!(sim.town_food(town), Some(0));
    assert!(agents.hunger[guard] >= sim.config().needs.starving);
    assert!(!agents.recovering[guard], "state {:?}", agents.state[guard]);
    assert!(!matches!(
        agents.state[guard],
        BehaviorState::Guard(GuardState::Recovering | GuardState::Fleeing)
    ));
    assert!((agents.health[guard].current - 50.0).abs() < 1e-3);
}

#[test]
fn starving_farmer_harvests_an_empty_store_back_to_food() {
    let mut sim = SimWorld::new();
    let town = sim
        .add_town("Ashford", Position::new(0.0, 0.0), Faction::Villager)
        .unwrap();
    sim.add_farm(town, Position::new(60.0, 0.0)).unwrap();
    let farmer = sim
        .spawn_job(Position::new(0.0, 0.0), Job::Farmer, SpawnConfig { town: Some(town), ..Default::default() })
        .unwrap();
    sim.world_mut().resource_mut::<AgentStore>().hunger[farmer] = 90.0;

    let mut harvested = false;
    for _ in 0..3600 {
        sim.run_ticks(1);
        harvested |= sim.town_food(town).is_some_and(|food| food > 0);
    }

    assert!(harvested, "the store never received food");
    let hunger = sim.agents().hunger[farmer];
    assert!(hunger < sim.config().needs.starving, "farmer never ate, hunger {hunger}");
    assert!(sim.town_food(town).is_some_and(|food| food > 0));
}
