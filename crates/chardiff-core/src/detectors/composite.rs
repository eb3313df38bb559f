//! Ordered registry of detectors with per-detector failure isolation.
//!
//! Detectors run in ascending `order`, ties broken by name. A detector that
//! returns an error or panics is logged with `event = detector_failed` and
//! contributes nothing; the remaining detectors still run.

use super::{
    AbilityScoresDetector, BasicInfoDetector, ChangeDetector, CombatDetector, EquipmentDetector,
    FeaturesDetector, SkillsDetector, SpellsDetector,
};
use crate::errors::{DetectError, ExError, Result};
use crate::model::{DetectionContext, DetectionResult, FieldChange};
use chardiff_core_types::schema::EVENT_DETECTOR_FAILED;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

struct Registration {
    order: u32,
    detector: Box<dyn ChangeDetector>,
}

/// Runs every registered detector and concatenates their output.
#[derive(Default)]
pub struct CompositeDetector {
    registry: BTreeMap<String, Registration>,
}

impl fmt::Debug for CompositeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDetector")
            .field("detectors", &self.detector_names())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl CompositeDetector {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the seven built-in detectors.
    pub fn with_default_detectors() -> Self {
        let mut composite = Self::new();
        let defaults: [(u32, Box<dyn ChangeDetector>); 7] = [
            (10, Box::new(BasicInfoDetector::new())),
            (20, Box::new(AbilityScoresDetector::new())),
            (30, Box::new(SkillsDetector::new())),
            (40, Box::new(CombatDetector::new())),
            (50, Box::new(SpellsDetector::new())),
            (60, Box::new(EquipmentDetector::new())),
            (70, Box::new(FeaturesDetector::new())),
        ];
        for (order, detector) in defaults {
            composite.insert(order, detector);
        }
        composite
    }

    fn insert(&mut self, order: u32, detector: Box<dyn ChangeDetector>) {
        self.registry
            .insert(detector.name().to_string(), Registration { order, detector });
    }

    /// Add a detector under its own name.
    ///
    /// # Errors
    ///
    /// `DetectError::DuplicateDetector` when the name is already registered.
    pub fn register(&mut self, order: u32, detector: Box<dyn ChangeDetector>) -> Result<()> {
        let name = detector.name().to_string();
        if self.registry.contains_key(&name) {
            return Err(DetectError::DuplicateDetector { name });
        }
        self.insert(order, detector);
        Ok(())
    }

    /// Remove a detector and hand it back.
    ///
    /// # Errors
    ///
    /// `DetectError::DetectorNotFound` when no detector has that name.
    pub fn unregister(&mut self, name: &str) -> Result<Box<dyn ChangeDetector>> {
        self.registry
            .remove(name)
            .map(|r| r.detector)
            .ok_or_else(|| DetectError::DetectorNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn ordered(&self) -> Vec<(&str, &Registration)> {
        let mut entries: Vec<(&str, &Registration)> = self
            .registry
            .iter()
            .map(|(name, reg)| (name.as_str(), reg))
            .collect();
        entries.sort_by(|(a_name, a), (b_name, b)| a.order.cmp(&b.order).then(a_name.cmp(b_name)));
        entries
    }

    /// Detector names in execution order
    pub fn detector_names(&self) -> Vec<&str> {
        self.ordered().into_iter().map(|(name, _)| name).collect()
    }

    /// Run every detector and keep a per-detector record.
    ///
    /// Changes outside the context's include/exclude filters are dropped
    /// before they are recorded.
    pub fn detect_with_results(
        &self,
        old: &Value,
        new: &Value,
        ctx: &DetectionContext,
    ) -> Vec<DetectionResult> {
        self.ordered()
            .into_iter()
            .map(|(name, reg)| run_isolated(name, reg.detector.as_ref(), old, new, ctx))
            .collect()
    }
}

fn run_isolated(
    name: &str,
    detector: &dyn ChangeDetector,
    old: &Value,
    new: &Value,
    ctx: &DetectionContext,
) -> DetectionResult {
    let start = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let changes = detector.detect(old, new, ctx)?;
        let skipped: Vec<String> = [("old", old), ("new", new)]
            .into_iter()
            .flat_map(|(side, state)| {
                detector
                    .skipped_entries(state)
                    .into_iter()
                    .map(move |note| format!("{} snapshot: {}", side, note))
            })
            .collect();
        Ok::<_, DetectError>((changes, skipped))
    }));
    let duration_ms = elapsed_ms(start);

    let err = match outcome {
        Ok(Ok((changes, skipped))) => {
            let changes: Vec<FieldChange> = changes
                .into_iter()
                .filter(|c| ctx.is_path_included(&c.field_path))
                .collect();
            tracing::debug!(
                detector = name,
                change_count = changes.len(),
                skipped_entries = skipped.len(),
                duration_ms,
                "detector finished"
            );
            return skipped.into_iter().fold(
                DetectionResult::success(name, changes, duration_ms),
                DetectionResult::with_warning,
            );
        }
        Ok(Err(err)) => err,
        Err(payload) => DetectError::DetectorPanicked {
            detector: name.to_string(),
            reason: panic_message(payload.as_ref()),
        },
    };

    let message = err.to_string();
    let ex_err: ExError = err.into();
    tracing::warn!(
        component = module_path!(),
        op = "detect",
        event = EVENT_DETECTOR_FAILED,
        detector = name,
        run_id = %ctx.run_id,
        duration_ms,
        err.kind = ?ex_err.kind(),
        err.code = ex_err.code(),
        error = %message,
    );
    DetectionResult::failure(name, message, duration_ms)
}

impl ChangeDetector for CompositeDetector {
    fn name(&self) -> &str {
        "composite"
    }

    /// Never fails; failing members are skipped.
    fn detect(&self, old: &Value, new: &Value, ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        Ok(self
            .detect_with_results(old, new, ctx)
            .into_iter()
            .flat_map(|result| result.changes)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeCategory, ChangeKind};
    use serde_json::json;

    struct Fixed {
        name: &'static str,
        path: &'static str,
    }

    impl ChangeDetector for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn detect(&self, _old: &Value, _new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
            Ok(vec![FieldChange::new(
                self.path,
                None,
                Some(json!(1)),
                ChangeKind::Added,
                ChangeCategory::Metadata,
            )])
        }
    }

    struct Failing;

    impl ChangeDetector for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _old: &Value, _new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
            Err(DetectError::DetectorFailed {
                detector: "failing".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    struct Panicking;

    impl ChangeDetector for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn detect(&self, _old: &Value, _new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
            panic!("detector exploded")
        }
    }

    #[test]
    fn test_default_order() {
        let composite = CompositeDetector::with_default_detectors();
        assert_eq!(
            composite.detector_names(),
            vec!["basic_info", "abilities", "skills", "combat", "spells", "equipment", "features"]
        );
    }

    #[test]
    fn test_order_ties_break_by_name() {
        let mut composite = CompositeDetector::new();
        composite.register(5, Box::new(Fixed { name: "zeta", path: "z" })).unwrap();
        composite.register(5, Box::new(Fixed { name: "alpha", path: "a" })).unwrap();
        composite.register(1, Box::new(Fixed { name: "omega", path: "o" })).unwrap();
        assert_eq!(composite.detector_names(), vec!["omega", "alpha", "zeta"]);
    }

    #[test]
    fn test_register_duplicate_and_unregister() {
        let mut composite = CompositeDetector::new();
        composite.register(1, Box::new(Failing)).unwrap();
        assert!(matches!(
            composite.register(2, Box::new(Failing)),
            Err(DetectError::DuplicateDetector { .. })
        ));
        assert_eq!(composite.unregister("failing").unwrap().name(), "failing");
        assert!(matches!(
            composite.unregister("failing"),
            Err(DetectError::DetectorNotFound { .. })
        ));
        assert!(composite.is_empty());
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut composite = CompositeDetector::new();
        composite.register(1, Box::new(Failing)).unwrap();
        composite.register(2, Box::new(Panicking)).unwrap();
        composite.register(3, Box::new(Fixed { name: "ok", path: "notes.mood" })).unwrap();

        let ctx = DetectionContext::default();
        let results = composite.detect_with_results(&json!({}), &json!({}), &ctx);
        let outcome: Vec<(&str, bool)> = results
            .iter()
            .map(|r| (r.detector_name.as_str(), r.success))
            .collect();
        assert_eq!(outcome, vec![("failing", false), ("panicking", false), ("ok", true)]);
        assert!(results[1].errors[0].contains("detector exploded"));

        let changes = composite.detect(&json!({}), &json!({}), &ctx).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_path, "notes.mood");
    }

    #[test]
    fn test_skipped_entries_become_warnings() {
        let composite = CompositeDetector::with_default_detectors();
        let old = json!({"equipment": {"basic_equipment": ["Rope"], "gold": 15}});
        let new = json!({
            "equipment": {"basic_equipment": ["Rope", {"quantity": 2}], "gold": 12},
            "features": {"feats": ["Alert", ""]}
        });
        let results = composite.detect_with_results(&old, &new, &DetectionContext::default());

        let equipment = results.iter().find(|r| r.detector_name == "equipment").unwrap();
        assert!(equipment.success);
        assert!(equipment.changes.is_empty());
        assert_eq!(
            equipment.warnings,
            vec![
                "old snapshot: equipment.gold: not an item list",
                "new snapshot: equipment.basic_equipment.1: entry has no name",
                "new snapshot: equipment.gold: not an item list",
            ]
        );

        let features = results.iter().find(|r| r.detector_name == "features").unwrap();
        assert_eq!(features.warnings, vec!["new snapshot: features.feats.1: entry has no name"]);
        assert_eq!(features.change_count(), 1);

        let skills = results.iter().find(|r| r.detector_name == "skills").unwrap();
        assert!(skills.warnings.is_empty());
    }

    #[test]
    fn test_context_filters_output() {
        let mut composite = CompositeDetector::new();
        composite.register(1, Box::new(Fixed { name: "a", path: "combat.armor_class" })).unwrap();
        composite.register(2, Box::new(Fixed { name: "b", path: "equipment.rope" })).unwrap();

        let ctx = DetectionContext::default().exclude("equipment");
        let changes = composite.detect(&json!({}), &json!({}), &ctx).unwrap();
        let paths: Vec<&str> = changes.iter().map(|c| c.field_path.as_str()).collect();
        assert_eq!(paths, vec!["combat.armor_class"]);
    }
}
