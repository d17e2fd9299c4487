//! A village with farmers and guards, raided from a nearby camp.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=hearth_sim=debug` for lifecycle logs, and pass a TOML path
//! as the first argument to override the default config.

use hearth_sim::{BackendKind, Faction, Job, Position, SimConfig, SimResult, SimWorld, SpawnConfig, UpgradeKind};

fn main() -> SimResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    let mut sim = SimWorld::from_config(config, BackendKind::Parallel)?;

    let village = sim.add_town("Millbrook", Position::new(0.0, 0.0), Faction::Villager)?;
    for i in 0..6 {
        let x = -150.0 + 60.0 * i as f32;
        sim.add_farm(village, Position::new(x, 180.0))?;
        sim.add_bed(village, Position::new(x, -120.0))?;
    }
    for (x, y) in [(250.0, 0.0), (0.0, 250.0), (-250.0, 0.0), (0.0, -250.0)] {
        sim.add_guard_post(village, Position::new(x, y))?;
    }
    sim.add_town_food(village, 10)?;
    sim.set_upgrade_level(village, UpgradeKind::GuardHealth, 3)?;

    let camp_center = Position::new(900.0, 300.0);
    let camp = sim.add_town("Ashen Camp", camp_center, Faction::Raider)?;

    let member = |town| SpawnConfig {
        town: Some(town),
        ..Default::default()
    };
    for i in 0..6 {
        sim.spawn_job(Position::new(i as f32 * 8.0, 0.0), Job::Farmer, member(village))?;
    }
    for i in 0..4 {
        let spawn = SpawnConfig {
            patrol_post: i,
            ..member(village)
        };
        sim.spawn_job(Position::new(0.0, i as f32 * 8.0), Job::Guard, spawn)?;
    }
    for i in 0..5 {
        let p = Position::new(camp_center.x + i as f32 * 10.0, camp_center.y);
        sim.spawn_job(p, Job::Raider, member(camp))?;
    }

    tracing::info!(agents = sim.living_count(), "world populated");

    let frame = 1.0 / 60.0;
    for second in 1..=60 {
        for _ in 0..60 {
            sim.step(frame);
        }
        if second % 10 == 0 {
            let stats = sim.get_debug_stats();
            tracing::info!(
                second,
                hour = sim.clock().hour(),
                living = stats.living_agents,
                arrived = stats.arrived,
                projectiles = stats.active_projectiles,
                deaths = stats.deaths,
                village_food = sim.town_food(village).unwrap_or(0),
                camp_food = sim.town_food(camp).unwrap_or(0),
                "tick {}",
                stats.tick
            );
        }
        for death in sim.drain_deaths() {
            tracing::info!(slot = death.slot, job = death.job.name(), killer = ?death.killer, "death");
        }
    }

    let render = sim.render_buffer();
    tracing::info!(floats = render.len(), "render buffer");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(%err, "snapshot serialization failed"),
    }
    Ok(())
}
