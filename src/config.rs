use crate::error::Result;
use crate::ml::models::PipelineConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "SLA_BP_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Early-prediction pipeline configuration
    #[validate(nested)]
    pub pipeline: PipelineConfig,

    /// Synthetic dataset generation
    #[validate(nested)]
    pub generator: GeneratorConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        // Override with config file if given
        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
                    builder =
                        builder.add_source(config::File::with_name(&env_path).required(false));
                }
            }
        }

        let config: Config = builder
            // Override with environment variables (prefix: SLA_BP_)
            .add_source(
                config::Environment::with_prefix("SLA_BP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            generator: GeneratorConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GeneratorConfig {
    /// Number of incidents to synthesize
    #[serde(default = "default_n_incidents")]
    #[validate(range(min = 1))]
    pub n_incidents: usize,

    /// RNG seed; a fresh entropy seed is used when unset
    #[serde(default)]
    pub seed: Option<u64>,

    /// First possible incident start date
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    /// Incident start dates are spread over this many days after `start_date`
    #[serde(default = "default_start_window_days")]
    pub start_window_days: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n_incidents: default_n_incidents(),
            seed: None,
            start_date: default_start_date(),
            start_window_days: default_start_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_n_incidents() -> usize {
    1000
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn default_start_window_days() -> u32 {
    180
}

fn default_log_level() -> String {
    "info".to_string()
}
