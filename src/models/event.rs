use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A single lifecycle event of an incident.
///
/// Incident-level attributes (type, priority, affected system and the
/// retrospective outcome) are replicated on every event of the incident.
/// Only the first event carries the initial user impact and severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Incident identifier
    pub incident_id: String,

    /// 1-based position in the incident lifecycle
    pub event_sequence: u32,

    /// When the event happened
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,

    /// Lifecycle event type
    pub event_type: EventType,

    /// Incident type (categorical)
    pub incident_type: String,

    /// Priority level (categorical, ordinal-like)
    pub priority: String,

    /// Affected system (categorical)
    pub affected_system: String,

    /// Eventual total resolution time in minutes
    pub total_resolution_time_mins: f64,

    /// Eventual SLA breach outcome
    #[serde(deserialize_with = "deserialize_flag")]
    pub sla_breached: bool,

    /// Number of impacted users, first event only
    #[serde(default)]
    pub user_impact_count: Option<f64>,

    /// Initial severity score, first event only
    #[serde(default)]
    pub severity_score: Option<f64>,
}

impl Event {
    /// Create an event with empty incident attributes
    pub fn new(
        incident_id: impl Into<String>,
        event_sequence: u32,
        timestamp: NaiveDateTime,
        event_type: EventType,
    ) -> Self {
        Self {
            incident_id: incident_id.into(),
            event_sequence,
            timestamp,
            event_type,
            incident_type: String::new(),
            priority: String::new(),
            affected_system: String::new(),
            total_resolution_time_mins: 0.0,
            sla_breached: false,
            user_impact_count: None,
            severity_score: None,
        }
    }

    pub fn with_incident(
        mut self,
        incident_type: impl Into<String>,
        priority: impl Into<String>,
        affected_system: impl Into<String>,
    ) -> Self {
        self.incident_type = incident_type.into();
        self.priority = priority.into();
        self.affected_system = affected_system.into();
        self
    }

    pub fn with_outcome(mut self, total_resolution_time_mins: f64, sla_breached: bool) -> Self {
        self.total_resolution_time_mins = total_resolution_time_mins;
        self.sla_breached = sla_breached;
        self
    }

    pub fn with_impact(mut self, user_impact_count: f64, severity_score: f64) -> Self {
        self.user_impact_count = Some(user_impact_count);
        self.severity_score = Some(severity_score);
        self
    }

    /// Replace missing optional numeric fields with 0
    pub fn fill_missing_numeric(&mut self) {
        self.user_impact_count.get_or_insert(0.0);
        self.severity_score.get_or_insert(0.0);
    }

    /// Number of optional numeric fields that are absent
    pub fn missing_values(&self) -> usize {
        usize::from(self.user_impact_count.is_none()) + usize::from(self.severity_score.is_none())
    }

    pub fn is_escalation(&self) -> bool {
        self.event_type == EventType::Escalated
    }
}

/// Lifecycle event types
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    Display,
    EnumIter,
)]
pub enum EventType {
    Reported,
    Acknowledged,
    Investigating,
    #[serde(rename = "Workaround Applied")]
    #[strum(serialize = "Workaround Applied")]
    WorkaroundApplied,
    #[serde(rename = "Fix Applied")]
    #[strum(serialize = "Fix Applied")]
    FixApplied,
    Testing,
    Resolved,
    Closed,
    Escalated,
    Reopened,
}

/// Incident priority levels, ordered from least to most urgent
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
    EnumIter,
)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Ordinal level (0 = Low .. 3 = Critical)
    pub fn level(&self) -> usize {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::Critical => 3,
        }
    }

    /// Resolution deadline in minutes
    pub fn sla_limit_mins(&self) -> f64 {
        match self {
            Priority::Critical => 240.0,
            Priority::High => 480.0,
            Priority::Medium => 1440.0,
            Priority::Low => 2880.0,
        }
    }

    /// Probability that a synthesized incident of this priority breaches its SLA
    pub fn breach_probability(&self) -> f64 {
        match self {
            Priority::Critical => 0.4,
            Priority::High => 0.3,
            Priority::Medium => 0.2,
            Priority::Low => 0.1,
        }
    }
}

/// Accepts `true`/`false` in any case as well as `1`/`0`
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" => Ok(true),
        "false" | "0" | "0.0" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid boolean flag '{}'",
            other
        ))),
    }
}

pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
    const READ_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.format(WRITE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(raw.trim()).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, String> {
        READ_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .ok_or_else(|| format!("invalid timestamp '{}'", raw))
    }
}
