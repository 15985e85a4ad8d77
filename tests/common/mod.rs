//! Common test utilities for pipeline testing
//!
//! Builders for hand-written incident lifecycles and seeded synthetic logs.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use sla_breach_predictor::{
    config::GeneratorConfig,
    dataset::EventLog,
    generator::generate_incidents,
    ml::{BoostingConfig, PipelineConfig},
    models::{Event, EventType},
};

/// Monday 2024-01-01 at the given hour and minute
pub fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// One incident with events at the given minute offsets from `start`
pub fn incident(
    id: &str,
    priority: &str,
    breached: bool,
    start: NaiveDateTime,
    steps: &[(i64, EventType)],
) -> Vec<Event> {
    steps
        .iter()
        .enumerate()
        .map(|(k, &(offset, event_type))| {
            let event = Event::new(id, k as u32 + 1, start + Duration::minutes(offset), event_type)
                .with_incident("Server Down", priority, "CRM")
                .with_outcome(600.0, breached);
            if k == 0 {
                event.with_impact(50.0, 5.0)
            } else {
                event
            }
        })
        .collect()
}

/// Seeded synthetic event log
pub fn synthetic_log(n_incidents: usize, seed: u64) -> EventLog {
    generate_incidents(&GeneratorConfig {
        n_incidents,
        seed: Some(seed),
        ..Default::default()
    })
    .unwrap()
}

/// Pipeline settings with a small ensemble and a fixed probe seed
pub fn fast_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        probe_seed: Some(7),
        model: BoostingConfig {
            n_estimators: 30,
            max_depth: 4,
            ..Default::default()
        },
        ..Default::default()
    }
}
