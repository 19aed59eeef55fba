//! Ricart-Agrawala Simulator CLI
//!
//! Runs configurations to completion and generates configuration files.

use clap::{Parser, Subcommand};
use ricart_simulation::{SimulationConfig, DEFAULT_STEP_LIMIT};
use ricart_simulator::{parse_request_spec, ConfigFile, ConfigRandomizer, Simulator};
use ricart_types::{
    DelayRange, VirtualTime, DEFAULT_CS_DURATION, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY,
    DEFAULT_NUM_NODES,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ricart-sim")]
#[command(about = "Deterministic Ricart-Agrawala mutual exclusion simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print a report
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of nodes when no configuration file is given
        #[arg(short, long, default_value_t = DEFAULT_NUM_NODES)]
        nodes: u32,

        /// Seed for delay sampling
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Virtual time to run for
        #[arg(short, long, conflicts_with = "until_idle")]
        duration: Option<VirtualTime>,

        /// Run until no events remain (the default)
        #[arg(long)]
        until_idle: bool,

        /// Event limit when running until idle
        #[arg(long, default_value_t = DEFAULT_STEP_LIMIT)]
        max_events: usize,

        /// Write the full history as JSON
        #[arg(long)]
        history_out: Option<PathBuf>,

        /// Additional request, e.g. `2@40` (repeatable)
        #[arg(short, long = "request", value_name = "NODE@TIME")]
        requests: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a complete configuration template
    Template {
        /// Number of nodes
        #[arg(long, default_value_t = DEFAULT_NUM_NODES)]
        nodes: u32,

        /// Critical-section duration for every node
        #[arg(long, default_value_t = DEFAULT_CS_DURATION)]
        cs_duration: VirtualTime,

        /// Minimum delay for every edge
        #[arg(long, default_value_t = DEFAULT_MIN_DELAY)]
        min_delay: VirtualTime,

        /// Maximum delay for every edge
        #[arg(long, default_value_t = DEFAULT_MAX_DELAY)]
        max_delay: VirtualTime,
    },

    /// Generate a random configuration
    Randomize {
        /// Number of nodes
        #[arg(long, default_value_t = DEFAULT_NUM_NODES)]
        nodes: u32,

        /// Seed for the generator
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,ricart_simulator=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            nodes,
            seed,
            duration,
            until_idle,
            max_events,
            history_out,
            requests,
            json,
        } => {
            init_tracing();

            let mut sim_config = match config {
                Some(path) => ConfigFile::load(&path)?.into_simulation_config()?,
                None => SimulationConfig::new(nodes),
            }
            .with_seed(seed);
            for spec in &requests {
                let (node, at) = parse_request_spec(spec)?;
                sim_config = sim_config.with_scheduled_request(node, at);
            }

            let mut simulator = Simulator::new(sim_config)?;
            let report = match duration.filter(|_| !until_idle) {
                Some(duration) => simulator.run_for(duration),
                None => simulator.run_until_idle(max_events),
            };

            if let Some(path) = history_out {
                let history = serde_json::to_string_pretty(simulator.simulation().history())?;
                std::fs::write(&path, history)?;
                tracing::info!(path = %path.display(), "Wrote history");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }

            if !report.mutual_exclusion_held() {
                return Err("mutual exclusion violated".into());
            }
        }

        // Don't initialize tracing for generators - output goes to stdout
        Commands::Template {
            nodes,
            cs_duration,
            min_delay,
            max_delay,
        } => {
            if !DelayRange::new(min_delay, max_delay).is_valid() {
                return Err(format!("min delay {min_delay} exceeds max delay {max_delay}").into());
            }
            let template = ConfigFile::template(nodes, cs_duration, min_delay, max_delay);
            println!("{}", template.to_json_string_pretty()?);
        }

        Commands::Randomize {
            nodes,
            seed,
            output,
        } => {
            let file = ConfigRandomizer::new(seed).generate(nodes);
            match output {
                Some(path) => file.save(path)?,
                None => println!("{}", file.to_json_string_pretty()?),
            }
        }
    }

    Ok(())
}
