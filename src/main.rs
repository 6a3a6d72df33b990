//! Headless session runner.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use survivor_sim::game::movement::OrbitInput;
use survivor_sim::game::presentation::LogUi;
use survivor_sim::{profiler, Collaborators, Game, GameConfig};

/// Runs an arena-survival session without rendering.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file. Defaults apply to every missing field.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Maximum number of ticks to run.
    #[arg(long, default_value_t = 3600)]
    ticks: u64,

    /// Overrides the spawner seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Writes the final frame snapshot as JSON.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Writes a Chrome trace (requires the `profiling` feature).
    #[arg(long, value_name = "PATH")]
    trace: Option<PathBuf>,

    /// Ticks for one lap of the scripted player input.
    #[arg(long, default_value_t = 600)]
    orbit_period: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.spawner.seed = seed;
    }

    if let Some(path) = &cli.trace {
        profiler::init(path);
    }

    let collaborators = Collaborators {
        input: Arc::new(OrbitInput { period: cli.orbit_period }),
        ui: Arc::new(LogUi),
        ..Collaborators::default()
    };
    let mut game = Game::new(config, collaborators)?;
    let ran = game.run(cli.ticks)?;

    let snapshot = game.snapshot()?;
    log::info!(
        "ran {ran} ticks ({:.1}s): {} entities, {} gems, game over: {}",
        snapshot.elapsed,
        snapshot.entities.len(),
        snapshot.gems_collected,
        snapshot.game_over
    );

    if let Some(path) = &cli.snapshot {
        std::fs::write(path, snapshot.to_json()?)?;
        log::info!("snapshot written to {}", path.display());
    }
    if cli.trace.is_some() {
        profiler::shutdown();
    }
    Ok(())
}
