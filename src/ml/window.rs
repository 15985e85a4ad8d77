use crate::models::Event;
use tracing::debug;

/// Events per incident visible at prediction time
pub const DEFAULT_WINDOW_SIZE: u32 = 3;

/// Restricts an event log to the first `window_size` events of every incident
#[derive(Debug, Clone, Copy)]
pub struct EarlyWindowFilter {
    window_size: u32,
}

impl EarlyWindowFilter {
    pub fn new(window_size: u32) -> Self {
        Self { window_size }
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Keep events with `event_sequence <= window_size`.
    ///
    /// Incidents with fewer events keep all of them. Missing optional numeric
    /// fields of the kept events are filled with 0.
    pub fn apply(&self, events: &[Event]) -> Vec<Event> {
        let filtered: Vec<Event> = events
            .iter()
            .filter(|event| event.event_sequence <= self.window_size)
            .cloned()
            .map(|mut event| {
                event.fill_missing_numeric();
                event
            })
            .collect();

        debug!(
            window_size = self.window_size,
            total_events = events.len(),
            kept_events = filtered.len(),
            "Applied early-window filter"
        );

        filtered
    }
}

impl Default for EarlyWindowFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
