use crate::model::kinds::{ChangeCategory, ChangeKind, ChangePriority, SignificanceLevel};
use crate::model::metadata::Metadata;
use crate::util::compare;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One detected difference between two character snapshots.
///
/// `old_value` / `new_value` are `None` when the side is absent (the field
/// was added or removed). Construct with [`FieldChange::new`] and refine
/// with the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Dotted path of the changed value, e.g. `combat.armor_class`
    pub field_path: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub change_kind: ChangeKind,
    #[serde(default)]
    pub priority: ChangePriority,
    #[serde(default)]
    pub category: ChangeCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Detector confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub detected_at: DateTime<Utc>,
    /// Filled in by the significance pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<SignificanceLevel>,
}

fn default_confidence() -> f64 {
    1.0
}

impl FieldChange {
    /// Create a change with Medium priority, full confidence and the current time.
    pub fn new(
        field_path: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
        change_kind: ChangeKind,
        category: ChangeCategory,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            old_value,
            new_value,
            change_kind,
            priority: ChangePriority::default(),
            category,
            description: None,
            confidence: default_confidence(),
            metadata: Metadata::new(),
            detected_at: Utc::now(),
            significance: None,
        }
    }

    pub fn with_priority(mut self, priority: ChangePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the confidence, clamped into [0, 1]. NaN falls back to 1.0.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            default_confidence()
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.set(key, value);
        self
    }

    pub fn with_detected_at(mut self, detected_at: DateTime<Utc>) -> Self {
        self.detected_at = detected_at;
        self
    }

    /// Size of the change, `None` when the two sides are not comparable.
    pub fn magnitude(&self) -> Option<f64> {
        compare::magnitude(self.old_value.as_ref(), self.new_value.as_ref())
    }

    /// Signed numeric delta (new - old) when both sides are numbers.
    pub fn numeric_delta(&self) -> Option<f64> {
        let old = self.old_value.as_ref().and_then(Value::as_f64)?;
        let new = self.new_value.as_ref().and_then(Value::as_f64)?;
        Some(new - old)
    }

    /// Path segments of `field_path`
    pub fn segments(&self) -> Vec<String> {
        crate::util::path::split(&self.field_path)
    }
}
