use anyhow::Context;
use clap::{Parser, Subcommand};
use sla_breach_predictor::{
    config::{Config, ObservabilityConfig},
    dataset::{write_features_csv, EventLog},
    generator::IncidentGenerator,
    ml::SlaPipeline,
};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use validator::Validate;

#[derive(Parser)]
#[command(name = "sla-breach-predictor")]
#[command(about = "Early-warning SLA breach prediction for IT incidents")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (TOML); overrides the built-in defaults
    #[arg(short, long, global = true, env = "SLA_BP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic incident event log
    Generate {
        /// Number of incidents
        #[arg(short = 'n', long)]
        incidents: Option<usize>,

        /// RNG seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the prediction pipeline on an event log
    Analyze {
        /// Input CSV path
        #[arg(short, long)]
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also write the engineered feature matrix as CSV
        #[arg(long, value_name = "PATH")]
        features_out: Option<PathBuf>,
    },

    /// Generate a log in memory and analyze it
    Run {
        /// Number of incidents
        #[arg(short = 'n', long)]
        incidents: Option<usize>,

        /// RNG seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("sla_breach_predictor={}", observability.log_level))
    });
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the report
    if observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.observability);

    tracing::info!("Starting SLA breach predictor v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Generate {
            incidents,
            seed,
            output,
        } => {
            apply_generator_overrides(&mut config, incidents, seed)?;
            let log = IncidentGenerator::new(config.generator.clone()).generate()?;
            log.to_csv_path(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Generated {} events for {} incidents into {}",
                log.len(),
                config.generator.n_incidents,
                output.display()
            );
        }

        Commands::Analyze {
            input,
            json,
            features_out,
        } => {
            let log = EventLog::from_csv_path(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let output = SlaPipeline::new(config.pipeline.clone()).run(&log)?;

            if let Some(path) = features_out {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_features_csv(&output.features, file)?;
                tracing::info!(path = %path.display(), "Wrote feature matrix");
            }

            print_report(&output.report, json)?;
        }

        Commands::Run {
            incidents,
            seed,
            json,
        } => {
            apply_generator_overrides(&mut config, incidents, seed)?;
            let log = IncidentGenerator::new(config.generator.clone()).generate()?;
            let output = SlaPipeline::new(config.pipeline.clone()).run(&log)?;
            print_report(&output.report, json)?;
        }
    }

    Ok(())
}

/// Apply command-line generator flags and re-check the result
fn apply_generator_overrides(
    config: &mut Config,
    incidents: Option<usize>,
    seed: Option<u64>,
) -> sla_breach_predictor::Result<()> {
    if let Some(n) = incidents {
        config.generator.n_incidents = n;
    }
    if seed.is_some() {
        config.generator.seed = seed;
    }
    config.generator.validate()?;
    Ok(())
}

fn print_report(report: &sla_breach_predictor::PipelineReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_overrides_are_validated() {
        let mut config = Config::default();
        apply_generator_overrides(&mut config, Some(25), Some(9)).unwrap();
        assert_eq!(config.generator.n_incidents, 25);
        assert_eq!(config.generator.seed, Some(9));

        let err = apply_generator_overrides(&mut config, Some(0), None).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
