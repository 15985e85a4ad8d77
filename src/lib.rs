//! Early-warning SLA breach prediction for IT incidents.
//!
//! Incident lifecycles are cut down to their first few events, summarized into
//! one feature row per incident, and used to train a gradient-boosted tree
//! ensemble that is compared against a majority-class baseline.

pub mod config;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod ml;
pub mod models;
pub mod report;

pub use config::Config;
pub use dataset::{DatasetSummary, EventLog};
pub use error::{AppError, Result};
pub use generator::{generate_incidents, IncidentGenerator};
pub use ml::{PipelineConfig, PipelineOutput, SlaPipeline};
pub use report::PipelineReport;
