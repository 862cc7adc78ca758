use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use gameplan_core::scenarios::{ScenarioConfig, run_scenarios};

mod config;
mod logging;
mod report;

use config::Plan;
use logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "gameplan")]
#[command(about = "Project savings and net worth from a YAML plan")]
struct Args {
    /// Plan definition (YAML)
    #[arg(short, long)]
    plan: PathBuf,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write logs to `<dir>/gameplan.log` instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Override the plan's random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Run this many seeded projections and print net worth percentiles
    #[arg(long)]
    scenarios: Option<usize>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(args.log_dir.as_deref(), &args.log_level)?;

    let plan = Plan::load(&args.plan)?;
    let seed = args.seed.unwrap_or(plan.config().seed);
    tracing::info!(plan = %args.plan.display(), seed, "running plan");

    if let Some(iterations) = args.scenarios {
        let config = ScenarioConfig {
            iterations,
            seed,
            ..ScenarioConfig::default()
        };
        let batch = run_scenarios(&config, |run_seed| Ok(plan.build(run_seed)?.net_worth()))
            .wrap_err("Scenario batch failed")?;
        let bands = batch.bands(&config.percentiles)?;
        print!("{}", report::render_bands(&bands));
        return Ok(());
    }

    let portfolio = plan.build(seed).wrap_err("Failed to build portfolio")?;
    let rows = report::yearly_summaries(&portfolio)?;
    print!("{}", report::render_summaries(&rows));

    tracing::info!(years = rows.len(), "projection complete");
    Ok(())
}
