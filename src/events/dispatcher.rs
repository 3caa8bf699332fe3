// Event classification and ordering rules for one forecast job
use super::payload::{DecodeError, ForecastEvent, RawEvent};
use log::{debug, warn};

/// Classifies raw channel messages and enforces the per-job ordering rules:
/// `progress` may repeat, `model-loaded` and `validation` are accepted at most
/// once, and the first of `complete`/`error` ends the stream.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    model_loaded_seen: bool,
    validation_seen: bool,
    terminal_seen: bool,
    dropped: usize,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the typed event to handle, or `None` when the message is dropped
    pub fn dispatch(&mut self, raw: &RawEvent) -> Option<ForecastEvent> {
        if self.terminal_seen {
            debug!("Ignoring '{}' event received after job end", raw.kind);
            self.dropped += 1;
            return None;
        }

        let event = match ForecastEvent::decode(raw) {
            Ok(event) => event,
            Err(DecodeError::UnknownKind(kind)) => {
                warn!("Dropping event of unknown kind '{}'", kind);
                self.dropped += 1;
                return None;
            }
            Err(e) => {
                warn!("Dropping event: {}", e);
                self.dropped += 1;
                return None;
            }
        };

        match &event {
            ForecastEvent::ModelLoaded(_) if self.model_loaded_seen => {
                warn!("Dropping repeated 'model-loaded' event");
                self.dropped += 1;
                return None;
            }
            ForecastEvent::Validation(_) if self.validation_seen => {
                warn!("Dropping repeated 'validation' event");
                self.dropped += 1;
                return None;
            }
            ForecastEvent::ModelLoaded(_) => self.model_loaded_seen = true,
            ForecastEvent::Validation(_) => self.validation_seen = true,
            ForecastEvent::Complete(_) | ForecastEvent::Error(_) => self.terminal_seen = true,
            ForecastEvent::Progress(_) => {}
        }

        Some(event)
    }

    pub fn is_finished(&self) -> bool {
        self.terminal_seen
    }

    pub fn validation_seen(&self) -> bool {
        self.validation_seen
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(iterations: u32) -> RawEvent {
        RawEvent::new(
            "progress",
            format!(r#"{{"iterations": {}, "error": 0.1, "errorThreshold": 0.01}}"#, iterations),
        )
    }

    #[test]
    fn test_progress_repeats_until_terminal() {
        let mut dispatcher = EventDispatcher::new();
        for i in 0..5 {
            assert!(matches!(
                dispatcher.dispatch(&progress(i * 100)),
                Some(ForecastEvent::Progress(_))
            ));
        }
        assert!(!dispatcher.is_finished());
    }

    #[test]
    fn test_second_terminal_event_is_ignored() {
        let mut dispatcher = EventDispatcher::new();
        let error = RawEvent::new("error", r#"{"message": "model diverged"}"#);
        let complete = RawEvent::new("complete", r#"{"predictions": []}"#);

        assert!(matches!(dispatcher.dispatch(&error), Some(ForecastEvent::Error(_))));
        assert!(dispatcher.is_finished());
        assert!(dispatcher.dispatch(&complete).is_none());
        assert!(dispatcher.dispatch(&progress(1)).is_none());
        assert_eq!(dispatcher.dropped_count(), 2);
    }

    #[test]
    fn test_validation_accepted_once() {
        let mut dispatcher = EventDispatcher::new();
        let validation = RawEvent::new("validation", r#"{"mse": "1", "mape": "2", "details": []}"#);
        assert!(dispatcher.dispatch(&validation).is_some());
        assert!(dispatcher.validation_seen());
        assert!(dispatcher.dispatch(&validation).is_none());
    }

    #[test]
    fn test_unknown_and_malformed_events_do_not_end_job() {
        let mut dispatcher = EventDispatcher::new();
        assert!(dispatcher.dispatch(&RawEvent::new("heartbeat", "{}")).is_none());
        assert!(dispatcher.dispatch(&RawEvent::new("progress", "not json")).is_none());
        assert!(!dispatcher.is_finished());
        assert!(dispatcher.dispatch(&progress(10)).is_some());
        assert_eq!(dispatcher.dropped_count(), 2);
    }
}
