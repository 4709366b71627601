//! Replay determinism checker.
//!
//! Builds the same world twice from `(seed, config)`. The first run advances
//! N years, captures a snapshot, then advances N more; the second runs 2N
//! years straight through. The two canonicalized end snapshots must compare
//! byte-equal, or the process exits with code 2.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use terrasim_core::grid::Terrain;
use terrasim_core::snapshot::Snapshot;
use terrasim_core::state::{PolityType, World};
use terrasim_core::{advance_year, SimConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Verify terrasim replay determinism", long_about = None)]
struct Args {
    /// Path to the TOML config (compiled defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// World seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Years per half-run; the comparison covers 2N years
    #[arg(long, default_value_t = 50)]
    years: i32,

    /// Side length of the synthetic square world
    #[arg(long, default_value_t = 48)]
    size: i32,

    /// Number of polities to found
    #[arg(long, default_value_t = 6)]
    polities: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::init();

    let config = match &args.config {
        Some(path) => match SimConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::from(1);
            }
        },
        None => SimConfig::default(),
    };

    match check(&args, &config) {
        Ok(true) => {
            log::info!("replay determinism holds over {} years", 2 * args.years);
            ExitCode::SUCCESS
        }
        Ok(false) => {
            log::error!("replay determinism FAILED over {} years", 2 * args.years);
            ExitCode::from(2)
        }
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn check(args: &Args, config: &SimConfig) -> Result<bool> {
    let build = || {
        let mut world = World::new(
            config.clone(),
            Terrain::uniform_land(args.size, args.size, 4.0),
            args.seed,
        );
        found_polities(&mut world, args.polities);
        world
    };

    let mut split_run = build();
    for _ in 0..args.years {
        advance_year(&mut split_run);
    }
    let midpoint = Snapshot::capture(&split_run);
    log::info!("midpoint checksum {}", midpoint.checksum()?);
    for _ in 0..args.years {
        advance_year(&mut split_run);
    }

    let mut straight_run = build();
    for _ in 0..(2 * args.years) {
        advance_year(&mut straight_run);
    }

    let a = Snapshot::capture(&split_run);
    let b = Snapshot::capture(&straight_run);
    a.matches(&b).map_err(Into::into)
}

fn found_polities(world: &mut World, count: usize) {
    let kinds = [
        PolityType::Warmonger,
        PolityType::Pacifist,
        PolityType::Trader,
    ];
    let width = world.grid.width();
    let height = world.grid.height();
    let columns = (count as i32).min(4).max(1);
    for i in 0..count as i32 {
        let x = (i % columns + 1) * width / (columns + 1);
        let y = (i / columns + 1) * height / ((count as i32 / columns) + 2);
        let kind = kinds[(world.rng.next_u64() % kinds.len() as u64) as usize];
        let name = format!(
            "{} Tribe",
            terrasim_core::names::generate_name(&mut world.rng)
        );
        world.spawn_polity(name, kind, terrasim_core::CellPos::new(x, y), 5_000);
    }
}
