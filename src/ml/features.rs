use crate::models::Event;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model input columns, in matrix order
pub const FEATURE_NAMES: [&str; 11] = [
    "incident_type",
    "priority",
    "affected_system",
    "initial_user_impact",
    "initial_severity",
    "hour_of_day",
    "day_of_week",
    "is_weekend",
    "time_to_acknowledge_mins",
    "time_between_event2_3_mins",
    "has_escalation_early",
];

/// Name of the ordinal priority column
pub const PRIORITY_FEATURE: &str = "priority";

/// Columns holding category values that need encoding
pub const CATEGORICAL_FEATURES: [&str; 3] = ["incident_type", "priority", "affected_system"];

/// Early-window summary of one incident plus its ground-truth label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentFeatures {
    pub incident_id: String,
    pub incident_type: String,
    pub priority: String,
    pub affected_system: String,
    pub initial_user_impact: f64,
    pub initial_severity: f64,
    pub hour_of_day: u32,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    pub is_weekend: u8,
    /// Signed; negative when event 2 precedes event 1
    pub time_to_acknowledge_mins: f64,
    pub time_between_event2_3_mins: f64,
    pub has_escalation_early: u8,
    pub sla_breached: bool,
}

impl IncidentFeatures {
    /// Category values in `CATEGORICAL_FEATURES` order
    pub fn categorical_values(&self) -> [&str; 3] {
        [&self.incident_type, &self.priority, &self.affected_system]
    }

    /// Numeric values in the order they follow the categorical columns
    pub fn numeric_values(&self) -> [f64; 8] {
        [
            self.initial_user_impact,
            self.initial_severity,
            self.hour_of_day as f64,
            self.day_of_week as f64,
            self.is_weekend as f64,
            self.time_to_acknowledge_mins,
            self.time_between_event2_3_mins,
            self.has_escalation_early as f64,
        ]
    }

    /// Class label (1 = breached)
    pub fn label(&self) -> usize {
        usize::from(self.sla_breached)
    }
}

/// Reduces early-window events to one feature row per incident
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Group events by incident and extract one row per group, ordered by incident id
    pub fn extract(events: &[Event]) -> Vec<IncidentFeatures> {
        let groups = events
            .iter()
            .fold(BTreeMap::<&str, Vec<&Event>>::new(), |mut groups, event| {
                groups
                    .entry(event.incident_id.as_str())
                    .or_default()
                    .push(event);
                groups
            });

        groups
            .into_values()
            .filter_map(|group| Self::extract_incident(&group))
            .collect()
    }

    /// Feature row for the events of a single incident; `None` for an empty group
    pub fn extract_incident(group: &[&Event]) -> Option<IncidentFeatures> {
        let mut events = group.to_vec();
        events.sort_by_key(|event| event.event_sequence);

        let anchor = *events.first()?;
        let (hour_of_day, day_of_week, is_weekend) = Self::temporal_features(&anchor.timestamp);

        let time_to_acknowledge_mins = events
            .get(1)
            .map(|second| minutes_between(&anchor.timestamp, &second.timestamp))
            .unwrap_or(0.0);

        let time_between_event2_3_mins = match (events.get(1), events.get(2)) {
            (Some(second), Some(third)) => minutes_between(&second.timestamp, &third.timestamp),
            _ => 0.0,
        };

        let has_escalation_early = u8::from(events.iter().any(|event| event.is_escalation()));

        Some(IncidentFeatures {
            incident_id: anchor.incident_id.clone(),
            incident_type: anchor.incident_type.clone(),
            priority: anchor.priority.clone(),
            affected_system: anchor.affected_system.clone(),
            initial_user_impact: anchor.user_impact_count.unwrap_or(0.0),
            initial_severity: anchor.severity_score.unwrap_or(0.0),
            hour_of_day,
            day_of_week,
            is_weekend,
            time_to_acknowledge_mins,
            time_between_event2_3_mins,
            has_escalation_early,
            sla_breached: anchor.sla_breached,
        })
    }

    /// Hour of day, day of week (Monday = 0) and weekend flag
    fn temporal_features(timestamp: &NaiveDateTime) -> (u32, u32, u8) {
        let hour = timestamp.hour();
        let day_of_week = timestamp.weekday().num_days_from_monday();
        let is_weekend = u8::from(day_of_week >= 5);
        (hour, day_of_week, is_weekend)
    }
}

/// Signed elapsed minutes from `from` to `to`
pub fn minutes_between(from: &NaiveDateTime, to: &NaiveDateTime) -> f64 {
    let delta = *to - *from;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 60_000_000.0,
        None => delta.num_milliseconds() as f64 / 60_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::{Duration, NaiveDate};

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        // 2024-01-01 is a Monday
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn event(
        id: &str,
        seq: u32,
        ts: NaiveDateTime,
        event_type: EventType,
        breached: bool,
    ) -> Event {
        Event::new(id, seq, ts, event_type)
            .with_incident("Server Down", "Critical", "CRM")
            .with_outcome(500.0, breached)
    }

    #[test]
    fn test_worked_example() {
        let t = at(3, 10, 0);
        let events = vec![
            event("INC000001", 1, t, EventType::Reported, true).with_impact(120.0, 8.0),
            event("INC000001", 2, t + Duration::minutes(12), EventType::Acknowledged, true),
            event("INC000001", 3, t + Duration::minutes(50), EventType::Investigating, true),
        ];

        let rows = FeatureExtractor::extract(&events);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.priority, "Critical");
        assert_eq!(row.time_to_acknowledge_mins, 12.0);
        assert_eq!(row.time_between_event2_3_mins, 38.0);
        assert_eq!(row.has_escalation_early, 0);
        assert!(row.sla_breached);
        assert_eq!(row.initial_user_impact, 120.0);
        assert_eq!(row.initial_severity, 8.0);
    }

    #[test]
    fn test_events_are_sorted_by_sequence() {
        let t = at(3, 10, 0);
        let events = vec![
            event("INC000001", 3, t + Duration::minutes(50), EventType::Escalated, false),
            event("INC000001", 1, t, EventType::Reported, false),
            event("INC000001", 2, t + Duration::minutes(5), EventType::Acknowledged, false),
        ];

        let row = &FeatureExtractor::extract(&events)[0];
        assert_eq!(row.time_to_acknowledge_mins, 5.0);
        assert_eq!(row.time_between_event2_3_mins, 45.0);
        assert_eq!(row.has_escalation_early, 1);
    }

    #[test]
    fn test_single_event_incident() {
        let events = vec![event("INC000009", 1, at(2, 23, 59), EventType::Reported, false)];
        let row = &FeatureExtractor::extract(&events)[0];

        assert_eq!(row.time_to_acknowledge_mins, 0.0);
        assert_eq!(row.time_between_event2_3_mins, 0.0);
        assert_eq!(row.has_escalation_early, 0);
        assert_eq!(row.hour_of_day, 23);
        assert_eq!(row.day_of_week, 1);
        assert_eq!(row.is_weekend, 0);
    }

    #[test]
    fn test_two_event_incident_ignores_event_two_type() {
        let t = at(6, 7, 0);
        let events = vec![
            event("INC000002", 1, t, EventType::Reported, false),
            event("INC000002", 2, t + Duration::minutes(30), EventType::Escalated, false),
        ];

        let row = &FeatureExtractor::extract(&events)[0];
        assert_eq!(row.time_to_acknowledge_mins, 30.0);
        assert_eq!(row.time_between_event2_3_mins, 0.0);
        assert_eq!(row.has_escalation_early, 1);
        // Saturday
        assert_eq!(row.day_of_week, 5);
        assert_eq!(row.is_weekend, 1);
    }

    #[test]
    fn test_negative_acknowledge_time_is_kept() {
        let t = at(4, 12, 0);
        let events = vec![
            event("INC000003", 1, t, EventType::Reported, false),
            event("INC000003", 2, t - Duration::seconds(90), EventType::Acknowledged, false),
        ];

        let row = &FeatureExtractor::extract(&events)[0];
        assert_eq!(row.time_to_acknowledge_mins, -1.5);
    }

    #[test]
    fn test_one_row_per_incident_in_id_order() {
        let t = at(1, 9, 0);
        let events = vec![
            event("INC000002", 1, t, EventType::Reported, true),
            event("INC000001", 1, t, EventType::Reported, false),
            event("INC000002", 2, t + Duration::minutes(3), EventType::Acknowledged, true),
        ];

        let rows = FeatureExtractor::extract(&events);
        let ids: Vec<_> = rows.iter().map(|r| r.incident_id.as_str()).collect();
        assert_eq!(ids, vec!["INC000001", "INC000002"]);
        assert_eq!(rows[1].label(), 1);
    }

    #[test]
    fn test_value_layout_matches_feature_names() {
        let events = [event("INC1", 1, at(1, 9, 0), EventType::Reported, false)];
        let row = &FeatureExtractor::extract(&events)[0];
        assert_eq!(
            row.categorical_values().len() + row.numeric_values().len(),
            FEATURE_NAMES.len()
        );
        assert_eq!(&FEATURE_NAMES[..3], &CATEGORICAL_FEATURES[..]);
    }

    #[test]
    fn test_minutes_between_fractional() {
        let from = at(1, 0, 0);
        assert_eq!(minutes_between(&from, &(from + Duration::seconds(30))), 0.5);
        assert_eq!(minutes_between(&from, &from), 0.0);
    }
}
