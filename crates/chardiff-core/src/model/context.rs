use crate::errors::{DetectError, Result};
use crate::model::kinds::SignificanceLevel;
use crate::util::path;
use chardiff_core_types::RequestId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default rule-version tag stamped on change sets
pub const DEFAULT_RULE_VERSION: &str = "1.0";

/// Read-only parameters for one detection run.
///
/// Include/exclude patterns gate which field paths are considered at all;
/// `flags` are the boolean context signals (e.g. `level_up`, `in_combat`)
/// whose multipliers feed the priority and significance context passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionContext {
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: SignificanceLevel,
    #[serde(default = "default_rule_version")]
    pub rule_version: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub run_id: RequestId,
}

fn default_rule_version() -> String {
    DEFAULT_RULE_VERSION.to_string()
}

/// Minor and above is kept unless the caller lowers the threshold
fn default_significance_threshold() -> SignificanceLevel {
    SignificanceLevel::Minor
}

impl Default for DetectionContext {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            significance_threshold: default_significance_threshold(),
            rule_version: default_rule_version(),
            flags: BTreeMap::new(),
            run_id: RequestId::new(),
        }
    }
}

impl DetectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_paths.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_paths.push(pattern.into());
        self
    }

    pub fn with_significance_threshold(mut self, threshold: SignificanceLevel) -> Self {
        self.significance_threshold = threshold;
        self
    }

    pub fn with_rule_version(mut self, rule_version: impl Into<String>) -> Self {
        self.rule_version = rule_version.into();
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, active: bool) -> Self {
        self.flags.insert(name.into(), active);
        self
    }

    pub fn with_run_id(mut self, run_id: RequestId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Names of the flags currently set to `true`
    pub fn active_flags(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name.as_str())
    }

    pub fn is_flag_active(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Whether a field path passes the include/exclude filters.
    ///
    /// A pattern covers a path when it glob-matches it or names one of its
    /// ancestors. Exclusion wins over inclusion; an empty include list
    /// includes everything.
    pub fn is_path_included(&self, field_path: &str) -> bool {
        let normalized = path::normalize(field_path);
        if self
            .exclude_paths
            .iter()
            .any(|p| pattern_covers(p, &normalized))
        {
            return false;
        }
        self.include_paths.is_empty()
            || self
                .include_paths
                .iter()
                .any(|p| pattern_covers(p, &normalized))
    }

    /// Reject contexts that cannot drive a run.
    ///
    /// # Errors
    ///
    /// `DetectError::InvalidContext` for a blank rule version, a blank
    /// include/exclude pattern, or a blank flag name.
    pub fn validate(&self) -> Result<()> {
        if self.rule_version.trim().is_empty() {
            return Err(DetectError::InvalidContext {
                reason: "rule_version must not be blank".to_string(),
            });
        }
        for pattern in self.include_paths.iter().chain(self.exclude_paths.iter()) {
            if path::normalize(pattern).is_empty() {
                return Err(DetectError::InvalidContext {
                    reason: format!("path filter {:?} is blank", pattern),
                });
            }
        }
        if self.flags.keys().any(|k| k.trim().is_empty()) {
            return Err(DetectError::InvalidContext {
                reason: "context flag names must not be blank".to_string(),
            });
        }
        Ok(())
    }
}

fn pattern_covers(pattern: &str, field_path: &str) -> bool {
    let pattern = path::normalize(pattern);
    path::matches_pattern(field_path, &pattern) || path::is_descendant(field_path, &pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context_includes_everything() {
        let ctx = DetectionContext::default();
        assert!(ctx.is_path_included("combat.armor_class"));
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_default_threshold_is_minor() {
        assert_eq!(
            DetectionContext::default().significance_threshold,
            SignificanceLevel::Minor
        );
        let parsed: DetectionContext = serde_json::from_str(r#"{"rule_version": "v2"}"#).unwrap();
        assert_eq!(parsed.significance_threshold, SignificanceLevel::Minor);
        assert_eq!(parsed.rule_version, "v2");
    }

    #[test]
    fn test_include_covers_descendants() {
        let ctx = DetectionContext::new().include("spellcasting");
        assert!(ctx.is_path_included("spellcasting.spell_slots.1"));
        assert!(!ctx.is_path_included("combat.armor_class"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let ctx = DetectionContext::new()
            .include("combat.*")
            .exclude("combat.resources");
        assert!(ctx.is_path_included("combat.armor_class"));
        assert!(!ctx.is_path_included("combat.resources.wizard.arcane_recovery"));
    }

    #[test]
    fn test_active_flags() {
        let ctx = DetectionContext::new()
            .with_flag("level_up", true)
            .with_flag("in_combat", false);
        let active: Vec<&str> = ctx.active_flags().collect();
        assert_eq!(active, vec!["level_up"]);
        assert!(ctx.is_flag_active("level_up"));
        assert!(!ctx.is_flag_active("long_rest"));
    }

    #[test]
    fn test_validate_rejects_blank_values() {
        let ctx = DetectionContext::new().with_rule_version("  ");
        assert!(matches!(
            ctx.validate(),
            Err(DetectError::InvalidContext { .. })
        ));

        let ctx = DetectionContext::new().include("..");
        assert!(ctx.validate().is_err());

        let ctx = DetectionContext::new().with_flag(" ", true);
        assert!(ctx.validate().is_err());
    }
}
