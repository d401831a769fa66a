use clap::Parser;
use compound_cloud_core::{
    CompoundBag, CompoundCloudConfig, CompoundCloudManager, CompoundId, CompoundSpec,
    CompoundStorage, RayonTaskRunner, Vec2,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compound cloud demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "compound-cloud-demo")]
#[command(about = "Headless compound cloud simulation demo", long_about = None)]
struct Args {
    /// Simulation duration in seconds
    #[arg(short, long, default_value_t = 30.0)]
    duration: f32,

    /// Timestep in seconds
    #[arg(long, default_value_t = 0.1)]
    dt: f32,

    /// Number of simulated organisms
    #[arg(short, long, default_value_t = 200)]
    organisms: usize,

    /// Number of compounds (ignored when a config file lists them)
    #[arg(short, long, default_value_t = 6)]
    compounds: u16,

    /// Speed of the tracked entity in world units per second
    #[arg(long, default_value_t = 6.0)]
    player_speed: f32,

    /// Strength of the swirling current
    #[arg(long, default_value_t = 40.0)]
    swirl: f32,

    /// Solver threads (0 = rayon's global pool)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Report interval in seconds
    #[arg(short, long, default_value_t = 5.0)]
    report_interval: f32,

    /// JSON file with `cloud` and `compounds` sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for organism placement
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

/// Layout of the optional JSON config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoConfig {
    cloud: CompoundCloudConfig,
    compounds: Vec<CompoundSpec>,
}

/// Organism wandering near the player, feeding on one compound and excreting another
struct Organism {
    position: Vec2,
    heading: f32,
    eats: CompoundId,
    excretes: CompoundId,
    storage: CompoundBag,
}

impl Organism {
    fn update(&mut self, manager: &CompoundCloudManager, centre: Vec2, dt: f32, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.heading += rng.random_range(-0.5..0.5);
        self.position += Vec2::new(self.heading.cos(), self.heading.sin()) * 2.0 * dt;

        // Wandered out of the window: respawn near the player
        if !manager.contains(self.position) {
            self.position = centre
                + Vec2::new(rng.random_range(-20.0..20.0), rng.random_range(-20.0..20.0));
        }

        // Head toward food when some is close by
        if let Ok(Some(food)) = manager.find_compound_near(self.eats, self.position, 8.0, 0.5) {
            let to_food = food - self.position;
            self.heading = to_food.y.atan2(to_food.x);
        }

        if let Ok(absorbed) =
            manager.absorb_in_radius(self.position, 1.5, &mut self.storage, 0.2)
        {
            let eaten = absorbed.get(&self.eats).copied().unwrap_or(0.0);
            let waste = self.storage.take(self.eats, eaten * 0.5);
            if waste > 0.0 {
                let _ = manager.add_compound(self.excretes, self.position, waste);
            }
        }
    }
}

fn load_config(args: &Args) -> Result<DemoConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<DemoConfig>(&text)?
        }
        None => DemoConfig::default(),
    };
    if config.compounds.is_empty() {
        config.compounds = (0..args.compounds)
            .map(|i| CompoundSpec::new(CompoundId(i), if i % 2 == 0 { 1.0 } else { 0.995 }))
            .collect();
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    println!("=== Compound Cloud Demo ===\n");

    let config = load_config(&args)?;
    let mut manager = CompoundCloudManager::new(&config.cloud, &config.compounds)?;
    let runner = if args.threads == 0 {
        RayonTaskRunner::global()
    } else {
        RayonTaskRunner::with_threads(args.threads)?
    };
    println!(
        "{} compounds over {} grids of {}x{} cells ({:.1} world units per cell), {} solver threads",
        config.compounds.len(),
        manager.grids().len(),
        config.cloud.size,
        config.cloud.size,
        config.cloud.resolution,
        runner.thread_count()
    );

    let ids: Vec<CompoundId> = config.compounds.iter().map(|spec| spec.id).collect();
    if ids.is_empty() {
        return Err("at least one compound is required".into());
    }
    let mut rng = StdRng::seed_from_u64(args.seed);

    // Seed a few blobs of every compound
    for &id in &ids {
        for _ in 0..8 {
            let spot = Vec2::new(rng.random_range(-60.0..60.0), rng.random_range(-60.0..60.0));
            manager.add_compound(id, spot, rng.random_range(50.0..200.0))?;
        }
    }

    let mut organisms: Vec<Organism> = (0..args.organisms)
        .map(|i| -> Result<Organism, Box<dyn Error>> {
            Ok(Organism {
                position: Vec2::new(rng.random_range(-40.0..40.0), rng.random_range(-40.0..40.0)),
                heading: rng.random_range(0.0..std::f32::consts::TAU),
                eats: ids[i % ids.len()],
                excretes: ids[(i + 1) % ids.len()],
                storage: CompoundBag::new(25.0)?,
            })
        })
        .collect::<Result<_, _>>()?;
    info!("Spawned {} organisms", organisms.len());

    let swirl = args.swirl;
    let current = move |p: Vec2| {
        let r2 = p.norm_squared() + 400.0;
        Vec2::new(-p.y, p.x) * (swirl / r2)
    };

    println!("\nTime(s) | Anchor    | Cloud total | Stored in organisms | Tick(ms)");
    println!("--------|-----------|-------------|---------------------|---------");

    let steps = (args.duration / args.dt).ceil() as u64;
    let report_every = ((args.report_interval / args.dt).round() as u64).max(1);
    let mut player = Vec2::zeros();
    let mut tick_ms = 0.0;

    for step in 0..steps {
        let time = step as f32 * args.dt;
        player += Vec2::new(args.player_speed, args.player_speed * 0.3) * args.dt;
        manager.update_anchor(player)?;

        let stats = manager.tick(args.dt, &runner, &current);
        tick_ms += stats.total_ms;

        let manager_ref = &manager;
        organisms.par_iter_mut().enumerate().for_each(|(i, organism)| {
            organism.update(manager_ref, player, args.dt, args.seed ^ (step << 20) ^ i as u64);
        });

        if (step + 1) % report_every == 0 {
            let cloud_total: f64 = ids
                .iter()
                .map(|&id| manager.total_compound(id).unwrap_or(0.0))
                .sum();
            let stored: f32 = organisms
                .iter()
                .map(|o| ids.iter().map(|&id| o.storage.amount(id)).sum::<f32>())
                .sum();
            let anchor = manager.anchor();
            println!(
                "{:7.1} | {:>4},{:<4} | {:11.2} | {:19.2} | {:8.2}",
                time + args.dt,
                anchor.x,
                anchor.y,
                cloud_total,
                stored,
                tick_ms / report_every as f64
            );
            tick_ms = 0.0;
        }
    }

    println!("\n=== Simulation Complete ===");
    for &id in &ids {
        let free: f32 = organisms.iter().map(|o| o.storage.free_space(id)).sum();
        println!(
            "{}: {:.2} in clouds, {:.2} free organism capacity",
            id,
            manager.total_compound(id)?,
            free
        );
    }
    Ok(())
}
