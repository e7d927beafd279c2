//! `harbor`: inspect and edit occupancy masks from the shell.

use std::fmt::Display;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;

use harbor_cli::commands::{self, checked_point, parse_point};
use harbor_core::{CellKind, FileMaskStore, PathfinderConfig};

/// Occupancy mask tools for hybrid land/sea navigation
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding default_mask.* and user_mask.*
    #[arg(long, global = true, default_value = "assets")]
    mask_dir: PathBuf,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grid size and water/land area
    Stats,
    /// Is a coordinate navigable?
    Check {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
    },
    /// Nearest navigable water to a coordinate
    Nearest {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Search radius in cells
        #[arg(long, default_value_t = 50)]
        radius: usize,
    },
    /// Water-only route between two coordinates
    Plan {
        #[arg(allow_negative_numbers = true)]
        from_lon: f64,
        #[arg(allow_negative_numbers = true)]
        from_lat: f64,
        #[arg(allow_negative_numbers = true)]
        to_lon: f64,
        #[arg(allow_negative_numbers = true)]
        to_lat: f64,
        /// Drop intermediate points on straight runs
        #[arg(long)]
        simplify: bool,
    },
    /// Paint a circular brush and save the user mask
    Paint(PaintArgs),
    /// Discard the user mask
    Reset,
    /// Check a sequence of lon,lat points against the mask
    Validate {
        #[arg(required = true, allow_hyphen_values = true)]
        points: Vec<String>,
    },
}

#[derive(ClapArgs, Debug)]
struct PaintArgs {
    #[arg(allow_negative_numbers = true)]
    lon: f64,
    #[arg(allow_negative_numbers = true)]
    lat: f64,
    /// Brush radius in cells
    #[arg(long, default_value_t = 0)]
    radius: usize,
    /// Mark cells navigable
    #[arg(long, conflicts_with = "land")]
    water: bool,
    /// Mark cells as land
    #[arg(long)]
    land: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store = FileMaskStore::in_dir(&args.mask_dir);

    match args.command {
        Command::Stats => emit(args.json, &commands::stats(&store)?),
        Command::Check { lon, lat } => {
            checked_point(lon, lat)?;
            emit(args.json, &commands::check(&store.load()?, lon, lat))
        }
        Command::Nearest { lon, lat, radius } => {
            checked_point(lon, lat)?;
            emit(args.json, &commands::nearest(&store.load()?, lon, lat, radius))
        }
        Command::Plan {
            from_lon,
            from_lat,
            to_lon,
            to_lat,
            simplify,
        } => {
            let config = PathfinderConfig {
                simplify,
                ..PathfinderConfig::default()
            };
            let report = commands::plan(
                &store.load()?,
                checked_point(from_lon, from_lat)?,
                checked_point(to_lon, to_lat)?,
                &config,
            )?;
            emit(args.json, &report)
        }
        Command::Paint(paint) => {
            if paint.water == paint.land {
                bail!("pass exactly one of --water or --land");
            }
            let kind = CellKind::from_navigable(paint.water);
            let report = commands::paint(&store, paint.lon, paint.lat, paint.radius, kind)?;
            emit(args.json, &report)
        }
        Command::Reset => emit(args.json, &commands::reset(&store)?),
        Command::Validate { points } => {
            let points = points
                .iter()
                .map(|text| parse_point(text))
                .collect::<Result<Vec<_>>>()?;
            emit(args.json, &commands::validate(&store.load()?, &points))
        }
    }
}

fn emit<T: Serialize + Display>(json: bool, report: &T) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
