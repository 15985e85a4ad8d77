//! Synthetic incident event logs for demos and tests

use crate::config::GeneratorConfig;
use crate::dataset::EventLog;
use crate::error::{AppError, Result};
use crate::models::{Event, EventType, Priority};
use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use strum::IntoEnumIterator;
use tracing::info;

pub const INCIDENT_TYPES: [&str; 8] = [
    "Network Outage",
    "Server Down",
    "Application Error",
    "Database Issue",
    "Security Alert",
    "Hardware Failure",
    "User Access Issue",
    "Performance Degradation",
];

pub const AFFECTED_SYSTEMS: [&str; 9] = [
    "ERP System",
    "Email Server",
    "CRM",
    "Database Server",
    "Web Portal",
    "File Server",
    "VPN",
    "Backup System",
    "Monitoring System",
];

const MIN_EVENTS: usize = 3;
const MAX_EVENTS: usize = 10;

/// Produces incident lifecycles whose breach outcome depends on priority
pub struct IncidentGenerator {
    config: GeneratorConfig,
    rng: StdRng,
}

impl IncidentGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// Generate `n_incidents` incidents with ids `INC000001` onwards
    pub fn generate(&mut self) -> Result<EventLog> {
        let origin = self
            .config
            .start_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::Configuration("Invalid generator start date".to_string()))?;

        let mut events = Vec::new();
        for number in 1..=self.config.n_incidents {
            events.extend(self.generate_incident(number, origin));
        }

        let log = EventLog::new(events);
        info!(
            incidents = self.config.n_incidents,
            events = log.len(),
            "Generated synthetic incident log"
        );
        Ok(log)
    }

    fn generate_incident(&mut self, number: usize, origin: NaiveDateTime) -> Vec<Event> {
        let rng = &mut self.rng;
        let incident_id = format!("INC{:06}", number);
        let incident_type = *INCIDENT_TYPES.choose(rng).unwrap_or(&INCIDENT_TYPES[0]);
        let priorities: Vec<Priority> = Priority::iter().collect();
        let priority = *priorities.choose(rng).unwrap_or(&Priority::Low);
        let affected_system = *AFFECTED_SYSTEMS.choose(rng).unwrap_or(&AFFECTED_SYSTEMS[0]);

        let start = origin
            + Duration::days(rng.gen_range(0..=i64::from(self.config.start_window_days)))
            + Duration::hours(rng.gen_range(0..=23))
            + Duration::minutes(rng.gen_range(0..=59));

        let breached = rng.gen::<f64>() < priority.breach_probability();
        let limit = priority.sla_limit_mins();
        let resolution_mins = if breached {
            rng.gen_range(limit * 1.1..limit * 2.0)
        } else {
            rng.gen_range(limit * 0.2..limit * 0.9)
        };

        let n_events = rng.gen_range(MIN_EVENTS..=MAX_EVENTS);
        let mut offsets: Vec<f64> = (0..n_events)
            .map(|k| resolution_mins * (k + 1) as f64 / n_events as f64 * rng.gen_range(0.8..1.2))
            .collect();
        // Jitter may reorder neighbours; keep timestamps non-decreasing
        offsets.sort_by(f64::total_cmp);

        let middle_types: Vec<EventType> = EventType::iter()
            .filter(|t| {
                !matches!(
                    t,
                    EventType::Reported | EventType::Resolved | EventType::Closed
                )
            })
            .collect();

        offsets
            .iter()
            .enumerate()
            .map(|(k, &offset_mins)| {
                let event_type = match k {
                    0 => EventType::Reported,
                    1 => EventType::Acknowledged,
                    k if k == n_events - 1 => EventType::Resolved,
                    _ => *middle_types.choose(rng).unwrap_or(&EventType::Investigating),
                };
                let timestamp = start + Duration::microseconds((offset_mins * 60_000_000.0) as i64);

                let event = Event::new(incident_id.as_str(), (k + 1) as u32, timestamp, event_type)
                    .with_incident(incident_type, priority.to_string(), affected_system)
                    .with_outcome(resolution_mins, breached);

                if event_type == EventType::Reported {
                    event.with_impact(
                        f64::from(rng.gen_range(1..=500u32)),
                        f64::from(rng.gen_range(1..=10u32)),
                    )
                } else {
                    event
                }
            })
            .collect()
    }
}

/// Generate a log from configuration in one call
pub fn generate_incidents(config: &GeneratorConfig) -> Result<EventLog> {
    IncidentGenerator::new(config.clone()).generate()
}
