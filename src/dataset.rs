//! Tabular event log I/O and summary statistics

use crate::error::Result;
use crate::ml::features::IncidentFeatures;
use crate::models::Event;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// In-memory incident event log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Read a CSV file with a header row
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let log = Self::from_reader(File::open(path)?)?;
        info!(path = %path.display(), events = log.len(), "Loaded event log");
        Ok(log)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let events = rdr
            .deserialize::<Event>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { events })
    }

    pub fn to_csv_path(&self, path: &Path) -> Result<()> {
        self.to_writer(File::create(path)?)?;
        info!(path = %path.display(), events = self.len(), "Wrote event log");
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        for event in &self.events {
            wtr.serialize(event)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event count, incident count, data quality and breach rate
    pub fn summary(&self) -> DatasetSummary {
        let mut first_events: BTreeMap<&str, &Event> = BTreeMap::new();
        let mut keys = HashSet::new();
        let mut duplicate_keys = 0;
        let mut missing_values = 0;

        for event in &self.events {
            missing_values += event.missing_values();
            if !keys.insert((event.incident_id.as_str(), event.event_sequence)) {
                duplicate_keys += 1;
            }
            first_events
                .entry(event.incident_id.as_str())
                .and_modify(|first| {
                    if event.event_sequence < first.event_sequence {
                        *first = event;
                    }
                })
                .or_insert(event);
        }

        let n_incidents = first_events.len();
        let breached = first_events.values().filter(|e| e.sla_breached).count();

        DatasetSummary {
            n_events: self.events.len(),
            n_incidents,
            missing_values,
            duplicate_keys,
            breached_incidents: breached,
            breach_rate: if n_incidents > 0 {
                breached as f64 / n_incidents as f64
            } else {
                0.0
            },
        }
    }
}

impl From<Vec<Event>> for EventLog {
    fn from(events: Vec<Event>) -> Self {
        Self::new(events)
    }
}

/// Data exploration statistics of an event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_events: usize,
    pub n_incidents: usize,

    /// Absent optional numeric cells
    pub missing_values: usize,

    /// Repeated `(incident_id, event_sequence)` keys
    pub duplicate_keys: usize,

    pub breached_incidents: usize,

    /// Share of incidents whose first event is flagged breached
    pub breach_rate: f64,
}

/// Write engineered feature rows as CSV, label last
pub fn write_features_csv<W: Write>(rows: &[IncidentFeatures], writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
