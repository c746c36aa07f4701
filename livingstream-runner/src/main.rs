use clap::{Parser, Subcommand};
use glam::Vec2;
use livingstream_config::{load_config, Config, MappingConfig};
use livingstream_transport::UdpSender;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::process;

mod emit;
mod error;
mod run;
mod setup;

use emit::{emit, EmitOptions};
use error::RunnerError;
use run::{run, shutdown_signal, RunOptions};

const DEFAULT_CONFIG: &str = "config.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "LivingStream installation host", long_about = None)]
struct Args {
    /// Path to the configuration file (JSON, or TOML by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive detections and tick the scene (default)
    Run {
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
        /// Seed for fish placement
        #[arg(long)]
        seed: Option<u64>,
        /// Toggle the tide whenever Enter is pressed
        #[arg(long)]
        tide_on_enter: bool,
    },
    /// Send synthetic detections, standing in for the camera process
    Emit {
        /// Destination, defaults to localhost on the configured receiver port
        #[arg(short, long)]
        target: Option<String>,
        #[arg(short, long, default_value_t = 3)]
        walkers: usize,
        #[arg(long, default_value_t = 15.0)]
        rate: f32,
        /// Seconds to run; runs until Ctrl+C when omitted
        #[arg(long)]
        seconds: Option<f32>,
        /// Send 3D positions instead of pixel centers
        #[arg(long)]
        metric: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = execute(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn execute(args: Args) -> Result<(), RunnerError> {
    let config = resolve_config(args.config.as_deref())?;
    let shutdown = shutdown_signal()?;

    let command = args.command.unwrap_or(Command::Run {
        frames: None,
        seed: None,
        tide_on_enter: false,
    });
    match command {
        Command::Run {
            frames,
            seed,
            tide_on_enter,
        } => run(
            &config,
            RunOptions {
                max_frames: frames,
                seed,
                tide_on_enter,
            },
            shutdown,
        ),
        Command::Emit {
            target,
            walkers,
            rate,
            seconds,
            metric,
            seed,
        } => {
            let target = target.unwrap_or_else(|| format!("127.0.0.1:{}", config.receiver.port));
            let sender = UdpSender::new(target.as_str())?;
            let options = EmitOptions {
                walkers,
                rate_hz: rate,
                duration: seconds.map(|value| setup::seconds("emit duration", value)).transpose()?,
                metric,
                frame_size: sensor_frame(&config),
            };
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            emit(&sender, &options, rng, &shutdown).map(|_| ())
        }
    }
}

/// An explicit `--config` must load; the implicit default may be absent
fn resolve_config(explicit: Option<&Path>) -> Result<Config, RunnerError> {
    match explicit {
        Some(path) => {
            let config = load_config(path)?;
            info!("Using configuration from {}", path.display());
            Ok(config)
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            let config = load_config(Path::new(DEFAULT_CONFIG))?;
            info!("Using configuration from {}", DEFAULT_CONFIG);
            Ok(config)
        }
        None => {
            info!("No {} found, using built-in defaults", DEFAULT_CONFIG);
            Ok(Config::default())
        }
    }
}

fn sensor_frame(config: &Config) -> Vec2 {
    match &config.mapping {
        MappingConfig::Planar(options) => Vec2::new(options.sensor_width, options.sensor_height),
        _ => Vec2::new(640.0, 480.0),
    }
}
