//! Change detection pipeline.
//!
//! [`ChangeEngine::analyze`] turns two character snapshots into a
//! [`CharacterChangeSet`]: detection, scoring, filtering, grouping and the
//! rendered summary.

#![allow(clippy::result_large_err)]

use crate::analysis::{PriorityAnalyzer, SignificanceAnalyzer};
use crate::config::EngineConfig;
use crate::detectors::CompositeDetector;
use crate::errors::ExError;
use crate::grouping;
use crate::model::{CharacterChangeSet, DetectionContext, FieldChange};
use crate::summary::render_summary;
use crate::{log_op_end, log_op_error, log_op_start};
use serde_json::Value;
use std::time::Instant;

const OP_ANALYZE: &str = "analyze";

/// Detectors plus analyzers, built once from an [`EngineConfig`].
///
/// Holds no mutable state after construction; share it behind an `Arc`.
#[derive(Debug)]
pub struct ChangeEngine {
    config: EngineConfig,
    composite: CompositeDetector,
    priority: PriorityAnalyzer,
    significance: SignificanceAnalyzer,
}

impl Default for ChangeEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ChangeEngine {
    /// Engine with the built-in detectors and the given rule tables.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            priority: PriorityAnalyzer::new(config.priority.clone()),
            significance: SignificanceAnalyzer::new(config.significance.clone()),
            composite: CompositeDetector::with_default_detectors(),
            config,
        }
    }

    /// Like [`ChangeEngine::new`] but rejects an unusable configuration.
    ///
    /// # Errors
    ///
    /// `ERR_INVALID_CONFIG` when [`EngineConfig::validate`] fails.
    pub fn try_new(config: EngineConfig) -> Result<Self, ExError> {
        config
            .validate()
            .map_err(|e| ExError::from(e).with_op("configure"))?;
        Ok(Self::new(config))
    }

    /// Replace the detector registry.
    pub fn with_composite(mut self, composite: CompositeDetector) -> Self {
        self.composite = composite;
        self
    }

    pub fn composite(&self) -> &CompositeDetector {
        &self.composite
    }

    pub fn composite_mut(&mut self) -> &mut CompositeDetector {
        &mut self.composite
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn priority_analyzer(&self) -> &PriorityAnalyzer {
        &self.priority
    }

    pub fn significance_analyzer(&self) -> &SignificanceAnalyzer {
        &self.significance
    }

    /// Diff two snapshots of one character.
    ///
    /// Detector failures never abort the run; they are recorded in
    /// `detector_results`.
    ///
    /// # Errors
    ///
    /// `ERR_INVALID_CONTEXT` when the context fails validation.
    pub fn analyze(
        &self,
        character_id: &str,
        old: &Value,
        new: &Value,
        ctx: &DetectionContext,
    ) -> Result<CharacterChangeSet, ExError> {
        let start = Instant::now();
        log_op_start!(
            OP_ANALYZE,
            character_id = character_id,
            run_id = %ctx.run_id,
            rule_version = ctx.rule_version.as_str(),
        );

        // 1. Context
        if let Err(err) = ctx.validate() {
            log_op_error!(
                OP_ANALYZE,
                err.clone(),
                duration_ms = elapsed_ms(start),
                character_id = character_id,
            );
            return Err(ExError::from(err)
                .with_op(OP_ANALYZE)
                .with_request_id(ctx.run_id.clone()));
        }

        // 2. Detection
        let detector_results = self.composite.detect_with_results(old, new, ctx);
        let mut changes: Vec<FieldChange> = detector_results
            .iter()
            .flat_map(|r| r.changes.iter().cloned())
            .collect();

        // 3. Priority, then the batch pass
        self.priority.prioritize(&mut changes, ctx);

        // 4. Significance and threshold
        self.significance.annotate(&mut changes, ctx);
        let mut changes =
            self.significance
                .filter_significant(changes, ctx.significance_threshold, ctx);

        // 5. Merge and dedup
        if self.config.grouping.merge_consecutive {
            changes = grouping::merge_consecutive(changes);
        }
        let changes = grouping::deduplicate(changes);

        // 6. Groups and roll-up
        let groups = grouping::find_related(&changes, self.config.grouping.related_distance);
        let overall = self.significance.summarize(&changes, ctx).overall;

        let mut set = CharacterChangeSet::new(character_id, ctx.rule_version.as_str());
        set.changes = changes;
        set.groups = groups;
        set.overall_significance = overall;
        set.detector_results = detector_results;
        set.summary = render_summary(&set);

        let failed = set.detector_results.iter().filter(|r| !r.success).count();
        log_op_end!(
            OP_ANALYZE,
            duration_ms = elapsed_ms(start),
            character_id = character_id,
            change_count = set.changes.len(),
            group_count = set.groups.len(),
            failed_detectors = failed,
            overall_significance = set.overall_significance.as_str(),
        );
        Ok(set)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
