use crate::model::change::FieldChange;
use serde::{Deserialize, Serialize};

/// Per-detector execution record, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detector_name: String,
    pub changes: Vec<FieldChange>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DetectionResult {
    pub fn success(
        detector_name: impl Into<String>,
        changes: Vec<FieldChange>,
        duration_ms: u64,
    ) -> Self {
        Self {
            detector_name: detector_name.into(),
            changes,
            duration_ms,
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failure(detector_name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            detector_name: detector_name.into(),
            changes: Vec::new(),
            duration_ms,
            success: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }
}
