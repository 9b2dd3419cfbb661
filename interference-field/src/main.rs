use anyhow::Result;
use clap::Parser;
use interference_field::config::Config;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Headless run of a wave-field scene
#[derive(Parser, Debug)]
#[command(name = "interference-field", version, about)]
struct Cli {
    /// Scene file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of steps
    #[arg(short, long)]
    steps: Option<u64>,

    /// Debug-level logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_toml(DEFAULT_SCENE)?,
    };
    if let Some(steps) = cli.steps {
        config.run.steps = steps;
    }
    config.log_summary();

    run(&config)
}

const DEFAULT_SCENE: &str = include_str!("../scenes/double_slit.toml");

fn run(config: &Config) -> Result<()> {
    let mut sim = config.build_simulation()?;
    let total = config.run.steps;
    let started = Instant::now();
    let mut clamped_total = 0usize;

    info!("Starting simulation...");
    for step in 0..total {
        for impulse in config.impulses.iter().filter(|imp| imp.fires_at(step)) {
            if let Err(e) = sim.inject_impulse(impulse.u, impulse.v, impulse.radius, impulse.strength)
            {
                warn!("Dropped impulse at step {}: {}", step, e);
            }
        }

        let report = sim.step()?;
        clamped_total += report.clamped_cells + report.non_finite_cells;

        if report.step % config.run.report_period == 0 {
            let field = sim.current();
            info!(
                "Step {}/{}: peak={:.4} energy={:.4}",
                report.step,
                total,
                field.peak_abs(),
                field.energy()
            );
        }
    }

    let elapsed = started.elapsed();
    let per_step = if total > 0 {
        elapsed.as_secs_f64() * 1e3 / total as f64
    } else {
        0.0
    };
    info!(
        "Simulation complete! {} steps in {:.2?} ({:.3} ms/step)",
        total, elapsed, per_step
    );
    if clamped_total > 0 {
        warn!("Safety clamp engaged on {} cell updates", clamped_total);
    }
    Ok(())
}
