use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use terrasim_core::grid::{CellPos, Terrain};
use terrasim_core::snapshot::Snapshot;
use terrasim_core::state::{PolityType, World};
use terrasim_core::SimConfig;

mod loader;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic historical world simulator", long_about = None)]
struct Args {
    /// Path to the TOML config (compiled defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// World seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Start year (overrides the config)
    #[arg(long, allow_negative_numbers = true)]
    start: Option<i32>,

    /// End year (overrides the config)
    #[arg(long, allow_negative_numbers = true)]
    end: Option<i32>,

    /// Base map image (land/water palette). A synthetic flat world is used
    /// when omitted.
    #[arg(long)]
    map: Option<PathBuf>,

    /// Resource overlay image (required with --map)
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Optional spawn-zone image (magenta marks founding zones)
    #[arg(long)]
    spawn_zones: Option<PathBuf>,

    /// Number of polities to found at start
    #[arg(long, default_value_t = 8)]
    polities: usize,

    /// Write the end-of-run snapshot archive here
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Print a per-phase timing summary at end
    #[arg(long)]
    benchmark: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    // An explicitly named config that cannot be loaded is a hard failure;
    // everything else about the config is clamp-and-continue.
    let mut config = match &args.config {
        Some(path) => match SimConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::from(1);
            }
        },
        None => SimConfig::default(),
    };
    if let Some(start) = args.start {
        config.world.start_year = start;
    }
    if let Some(end) = args.end {
        config.world.end_year = end;
    }

    match run(args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args, config: SimConfig) -> Result<()> {
    let (terrain, spawn_cells) = match (&args.map, &args.resources) {
        (Some(base), Some(resources)) => {
            let map = loader::load_map(
                base,
                resources,
                args.spawn_zones.as_deref(),
                &config.food,
            )?;
            (map.terrain, map.spawn_cells)
        }
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("--map and --resources must be given together")
        }
        (None, None) => {
            log::info!("no map images given; running a synthetic 64x64 world");
            (Terrain::uniform_land(64, 64, 4.0), Vec::new())
        }
    };

    let mut world = World::new(config, terrain, args.seed);
    found_polities(&mut world, args.polities, &spawn_cells);
    log::info!(
        "world ready: seed {}, {} polities, years {}..{} (config {})",
        world.seed,
        world.polities.len(),
        world.config.world.start_year,
        world.config.world.end_year,
        world.config.content_hash
    );

    let start_year = world.year;
    let end_year = world.config.world.end_year;
    let mut metrics = terrasim_core::SimMetrics::default();
    while world.year < end_year {
        terrasim_core::step::advance_year_with(&mut world, false, Some(&mut metrics));
        if world.year.rem_euclid(500) == 0 {
            let alive = world.polities.iter().filter(|p| p.alive()).count();
            let population: i64 = world.polities.iter().map(|p| p.population).sum();
            log::info!("year {}: {alive} polities, {population} people", world.year);
        }
    }

    let alive = world.polities.iter().filter(|p| p.alive()).count();
    let population: i64 = world.polities.iter().map(|p| p.population).sum();
    log::info!(
        "finished at year {}: {alive}/{} polities alive, total population {population}",
        world.year,
        world.polities.len()
    );
    if args.benchmark {
        let years = (world.year - start_year) as f64;
        println!(
            "{} | {:.0} years/s",
            metrics.summary(),
            metrics.years_per_second(years)
        );
    }

    if let Some(path) = &args.snapshot_out {
        let mut snapshot = Snapshot::capture(&world);
        snapshot.canonicalize(terrasim_core::FINE_SCALE, terrasim_core::GOV_SCALE);
        snapshot.save(path)?;
        log::info!("snapshot written to {}", path.display());
    }
    Ok(())
}

/// Found `count` polities on distinct land cells, restricted to the spawn
/// zones when any were decoded. All draws come from the world stream.
fn found_polities(world: &mut World, count: usize, spawn_cells: &[CellPos]) {
    let kinds = [
        PolityType::Warmonger,
        PolityType::Pacifist,
        PolityType::Trader,
    ];
    let mut taken: Vec<CellPos> = Vec::new();
    for i in 0..count {
        let cell = pick_spawn_cell(world, spawn_cells, &taken);
        let Some(cell) = cell else {
            log::warn!("no free land cell for polity {i}; founded {} instead", taken.len());
            break;
        };
        taken.push(cell);
        let kind = kinds[(world.rng.next_u64() % kinds.len() as u64) as usize];
        let name = format!(
            "{} Tribe",
            terrasim_core::names::generate_name(&mut world.rng)
        );
        let population = 1_000 + (world.rng.next_u64() % 9_000) as i64;
        world.spawn_polity(name, kind, cell, population);
    }
}

fn pick_spawn_cell(
    world: &mut World,
    spawn_cells: &[CellPos],
    taken: &[CellPos],
) -> Option<CellPos> {
    for _ in 0..4_096 {
        let cell = if spawn_cells.is_empty() {
            CellPos::new(
                (world.rng.next_u64() % world.grid.width() as u64) as i32,
                (world.rng.next_u64() % world.grid.height() as u64) as i32,
            )
        } else {
            spawn_cells[(world.rng.next_u64() % spawn_cells.len() as u64) as usize]
        };
        let clear = world.grid.terrain().is_land(cell)
            && !taken.iter().any(|t| t.chebyshev(cell) < 4);
        if clear {
            return Some(cell);
        }
    }
    None
}
