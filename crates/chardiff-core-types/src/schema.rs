//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names consistent between the detection
//! pipeline, its error reporting, and the test capture layer.

// Field keys every boundary event carries
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Detection run fields
pub const FIELD_RUN_ID: &str = "run_id";
pub const FIELD_CHARACTER_ID: &str = "character_id";
pub const FIELD_DETECTOR: &str = "detector";
pub const FIELD_CHANGE_COUNT: &str = "change_count";

// Set by `log_op_error!` and on detector failures
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_DETECTOR_FAILED: &str = "detector_failed";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessibility() {
        assert!(!FIELD_COMPONENT.is_empty());
        assert!(!FIELD_OP.is_empty());
        assert!(!FIELD_DETECTOR.is_empty());
        assert!(!EVENT_START.is_empty());
        assert!(!EVENT_END.is_empty());
        assert!(!EVENT_END_ERROR.is_empty());
    }

    #[test]
    fn test_event_names_are_distinct() {
        let events = [EVENT_START, EVENT_END, EVENT_END_ERROR, EVENT_DETECTOR_FAILED];
        for (i, a) in events.iter().enumerate() {
            for b in events.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
