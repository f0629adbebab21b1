// dcsim command-line runner
// Evaluates baseline controllers on a configured data center and prints a JSON report

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use dcsim_agent::{evaluate_seeds, BaselineKind, Comparison, EvaluationReport, ParallelOptions};
use dcsim_env::{list_presets, preset, SimConfig};
use indexmap::IndexMap;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dcsim")]
#[command(about = "Data-center thermal simulation runner", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a baseline controller over several seeds
    Run(RunArgs),

    /// List registered presets
    Presets,

    /// Print a configuration as TOML
    Config {
        #[command(flatten)]
        source: ConfigSource,
    },
}

#[derive(Args)]
struct ConfigSource {
    /// Named preset
    #[arg(short, long, default_value = "default")]
    preset: String,

    /// Configuration file (.toml or .json), overrides the preset
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ConfigSource {
    fn load(&self) -> Result<(String, SimConfig)> {
        match &self.config {
            Some(path) => {
                let config = SimConfig::from_path(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                Ok((path.display().to_string(), config))
            }
            None => {
                let config = preset(&self.preset)?;
                Ok((self.preset.clone(), config))
            }
        }
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    source: ConfigSource,

    /// Controller to evaluate (pid, constant, random)
    #[arg(long, default_value = "pid")]
    policy: BaselineKind,

    /// Controller to compare against
    #[arg(long)]
    against: Option<BaselineKind>,

    /// Setpoint of the constant controller
    #[arg(long, default_value = "0.7")]
    setpoint: f64,

    /// Number of seeds to evaluate
    #[arg(short = 'n', long, default_value = "4")]
    seeds: u64,

    /// First seed
    #[arg(long, default_value = "42")]
    seed_start: u64,

    /// Cut episodes after this many steps
    #[arg(long)]
    max_steps: Option<u64>,

    /// Write the evaluated controller's step log as JSON lines
    #[arg(long)]
    log: Option<PathBuf>,

    /// Publish diagnostics through the metrics facade
    #[arg(long)]
    metrics: bool,
}

#[derive(Serialize)]
struct RunReport {
    generated_at: DateTime<Utc>,
    source: String,
    seeds: Vec<u64>,
    reports: IndexMap<String, EvaluationReport>,
    comparison: Option<Comparison>,
}

async fn evaluate(
    config: &SimConfig,
    seeds: &[u64],
    kind: BaselineKind,
    setpoint: f64,
    options: ParallelOptions,
) -> Result<(EvaluationReport, Vec<Vec<u8>>)> {
    let run = evaluate_seeds(config, seeds, options, move |layout, seed| {
        kind.build(layout, seed, setpoint)
    })
    .await?;
    Ok((run.report, run.logs))
}

async fn run(args: RunArgs) -> Result<()> {
    if args.seeds == 0 {
        bail!("--seeds must be at least 1");
    }
    let (source, config) = args.source.load()?;
    let seeds: Vec<u64> = (args.seed_start..).take(usize::try_from(args.seeds)?).collect();
    info!(
        source = %source,
        policy = args.policy.as_str(),
        episodes = seeds.len(),
        "starting evaluation"
    );

    let options = ParallelOptions {
        max_steps: args.max_steps,
        capture_log: args.log.is_some(),
        publish_metrics: args.metrics,
    };
    let (candidate, logs) = evaluate(&config, &seeds, args.policy, args.setpoint, options).await?;

    if let Some(path) = &args.log {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for log in &logs {
            file.write_all(log)?;
        }
        info!(path = %path.display(), "step log written");
    }

    let mut reports = IndexMap::new();
    let mut comparison = None;
    match args.against {
        Some(kind) if kind == args.policy => {
            warn!(policy = kind.as_str(), "skipping comparison against the same controller");
        }
        Some(kind) => {
            let options = ParallelOptions {
                capture_log: false,
                ..options
            };
            let (baseline, _) = evaluate(&config, &seeds, kind, args.setpoint, options).await?;
            let result = Comparison::between(&baseline, &candidate);
            info!(
                energy_savings_pct = result.energy_savings_pct,
                violation_delta = result.violation_delta,
                "comparison finished"
            );
            comparison = Some(result);
            reports.insert(kind.as_str().to_string(), baseline);
        }
        None => {}
    }
    reports.insert(args.policy.as_str().to_string(), candidate);

    let report = RunReport {
        generated_at: Utc::now(),
        source,
        seeds,
        reports,
        comparison,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await?,
        Commands::Presets => {
            for name in list_presets()? {
                println!("{name}");
            }
        }
        Commands::Config { source } => {
            let (_, config) = source.load()?;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
