use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use galaxygen::config::GalaxyConfig;
use galaxygen::{io, pipeline};

/// Procedural star-map generator.
#[derive(Parser)]
#[command(name = "galaxygen")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(short, long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new galaxy and save it
    Generate {
        /// Output galaxy file (.json or .yaml)
        #[arg(short, long, default_value = "galaxy.json")]
        output: PathBuf,

        /// Override the number of stars
        #[arg(short = 'n', long)]
        stars: Option<usize>,

        /// Layout iterations to run after labeling (defaults to `layout.iterations`)
        #[arg(short = 'i', long)]
        layout_iterations: Option<usize>,
    },
    /// Run force layout on an existing galaxy
    Layout {
        /// Input galaxy file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of iterations to run
        #[arg(short = 'i', long)]
        iterations: Option<usize>,

        /// Stop after this many seconds
        #[arg(short, long)]
        time_limit: Option<f64>,
    },
    /// Prune an existing galaxy and recompute its regions
    Regions {
        /// Input galaxy file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a summary of a galaxy file
    Stats {
        /// Input galaxy file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn load_config(path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<GalaxyConfig> {
    let mut config = match path {
        Some(path) => io::load_config(path)?,
        None => GalaxyConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "galaxygen=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref(), cli.seed)?;

    match cli.command {
        Commands::Generate {
            output,
            stars,
            layout_iterations,
        } => {
            if let Some(stars) = stars {
                config.generator.num_vertices = stars;
            }
            if let Some(iterations) = layout_iterations {
                config.layout.iterations = iterations;
            }
            let synthesis = pipeline::generate(&config)?;
            io::save_galaxy(&synthesis.galaxy, &output)?;
            println!(
                "Generated {} stars ({} regions, {} constellations) in {}",
                synthesis.galaxy.len(),
                synthesis.regions.regions,
                synthesis.regions.constellations,
                output.display()
            );
        }
        Commands::Layout {
            input,
            output,
            iterations,
            time_limit,
        } => {
            if let Some(iterations) = iterations {
                config.layout.iterations = iterations;
            }
            if time_limit.is_some() {
                config.layout.time_limit_secs = time_limit;
            }
            let mut galaxy = io::load_galaxy(&input)?;
            let report = pipeline::relayout(&mut galaxy, &config)?;
            let output = output.unwrap_or(input);
            io::save_galaxy(&galaxy, &output)?;
            println!(
                "Ran {} layout iterations, saved to {}",
                report.iterations_run,
                output.display()
            );
        }
        Commands::Regions { input, output } => {
            let galaxy = io::load_galaxy(&input)?;
            let (galaxy, _, regions) = pipeline::analyze(galaxy, &config)?;
            let output = output.unwrap_or(input);
            io::save_galaxy(&galaxy, &output)?;
            println!(
                "Found {} regions and {} constellations, saved to {}",
                regions.regions,
                regions.constellations,
                output.display()
            );
        }
        Commands::Stats { input } => {
            let galaxy = io::load_galaxy(&input)?;
            println!("stars: {}", galaxy.len());
            println!("edges: {}", galaxy.edge_count());
            println!("connected: {}", galaxy.is_connected());
            println!("regions: {}", galaxy.region_count());
            println!("constellations: {}", galaxy.constellation_count());
        }
    }

    Ok(())
}
