//! Priority scoring.
//!
//! Five signals, each a priority level, are combined in a weighted average
//! over their ordinals:
//!
//! 1. base: the priority the detector assigned
//! 2. field: the first matching field rule, else field importance
//! 3. kind: the first matching kind rule
//! 4. magnitude: the highest satisfied magnitude rule, else default bands
//! 5. context: the base stepped up or down by the active flag multipliers
//!
//! A batch pass then dampens large batches and promotes Low changes that sit
//! next to a Critical one.

use crate::config::PriorityConfig;
use crate::model::{ChangePriority, DetectionContext, FieldChange};
use crate::util::path;
use serde::{Deserialize, Serialize};

/// Metadata key recording a batch adjustment on a change
pub const META_BATCH_ADJUSTMENT: &str = "batch_adjustment";

/// Every signal behind a priority decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub base: ChangePriority,
    pub field: ChangePriority,
    pub kind: ChangePriority,
    pub magnitude: ChangePriority,
    pub context: ChangePriority,
    /// Product of the active context multipliers
    pub context_multiplier: f64,
    /// Weighted average of the signal ordinals
    pub score: f64,
    pub priority: ChangePriority,
}

#[derive(Debug, Clone, Default)]
pub struct PriorityAnalyzer {
    config: PriorityConfig,
}

impl PriorityAnalyzer {
    pub fn new(config: PriorityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PriorityConfig {
        &self.config
    }

    pub fn analyze(&self, change: &FieldChange, ctx: &DetectionContext) -> ChangePriority {
        self.explain(change, ctx).priority
    }

    pub fn explain(&self, change: &FieldChange, ctx: &DetectionContext) -> PriorityBreakdown {
        let base = change.priority;
        let field = self.field_priority(change);
        let kind = self.kind_priority(change);
        let magnitude = self.magnitude_priority(change);
        let context_multiplier = self.context_multiplier(ctx);
        let context = self.context_priority(base, context_multiplier);

        let w = &self.config.weights;
        let weighted = w.base * f64::from(base.ordinal())
            + w.field * f64::from(field.ordinal())
            + w.kind * f64::from(kind.ordinal())
            + w.magnitude * f64::from(magnitude.ordinal())
            + w.context * f64::from(context.ordinal());
        let total = w.total();
        let score = if total > 0.0 {
            weighted / total
        } else {
            f64::from(base.ordinal())
        };

        PriorityBreakdown {
            base,
            field,
            kind,
            magnitude,
            context,
            context_multiplier,
            score,
            priority: ChangePriority::from_score(score),
        }
    }

    /// First matching field rule, else the importance of the path.
    pub fn field_priority(&self, change: &FieldChange) -> ChangePriority {
        self.config
            .field_rules
            .iter()
            .find(|rule| rule.matches(change))
            .map(|rule| rule.priority)
            .unwrap_or_else(|| {
                self.config
                    .importance_bands
                    .classify(self.field_importance(&change.field_path))
            })
    }

    /// Importance scalar of a path: exact, pattern, then decayed ancestor.
    pub fn field_importance(&self, field_path: &str) -> f64 {
        self.config
            .field_importance
            .lookup(field_path, self.config.importance_decay)
            .unwrap_or(self.config.default_importance)
    }

    /// First matching kind rule; Medium when none applies.
    pub fn kind_priority(&self, change: &FieldChange) -> ChangePriority {
        self.config
            .kind_rules
            .iter()
            .find(|rule| rule.matches(change))
            .map(|rule| rule.priority)
            .unwrap_or_default()
    }

    /// Highest priority among the magnitude rules whose pattern matches and
    /// whose threshold is reached, else the default bands.
    ///
    /// A change without a magnitude keeps its base priority.
    pub fn magnitude_priority(&self, change: &FieldChange) -> ChangePriority {
        let Some(magnitude) = change.magnitude() else {
            return change.priority;
        };
        self.config
            .magnitude_rules
            .iter()
            .filter(|rule| {
                path::matches_pattern(&change.field_path, &rule.pattern) && magnitude >= rule.threshold
            })
            .map(|rule| rule.priority)
            .max()
            .unwrap_or_else(|| self.config.magnitude_bands.classify(magnitude))
    }

    /// Product of the multipliers of every active flag; unknown flags count as 1.
    pub fn context_multiplier(&self, ctx: &DetectionContext) -> f64 {
        ctx.active_flags()
            .filter_map(|flag| self.config.context_multipliers.get(flag))
            .product()
    }

    pub fn context_priority(&self, base: ChangePriority, multiplier: f64) -> ChangePriority {
        if multiplier >= self.config.context_step_up {
            base.step_up()
        } else if multiplier <= self.config.context_step_down {
            base.step_down()
        } else {
            base
        }
    }

    /// Score every change, then apply the batch pass.
    pub fn prioritize(&self, changes: &mut [FieldChange], ctx: &DetectionContext) {
        for change in changes.iter_mut() {
            change.priority = self.analyze(change, ctx);
        }
        self.adjust_batch(changes);
    }

    /// Batch heuristics over already-scored changes.
    ///
    /// Criticals are collected first. A batch larger than the dampening
    /// threshold then steps every change above Low down one level. Finally
    /// every Low change sharing enough leading segments with one of the
    /// collected Criticals (other than itself) is promoted to Medium.
    pub fn adjust_batch(&self, changes: &mut [FieldChange]) {
        let batch = &self.config.batch;
        let criticals: Vec<(usize, String)> = changes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.priority == ChangePriority::Critical)
            .map(|(i, c)| (i, c.field_path.clone()))
            .collect();

        if changes.len() > batch.dampening_threshold {
            tracing::debug!(
                change_count = changes.len(),
                threshold = batch.dampening_threshold,
                "dampening large batch"
            );
            for change in changes.iter_mut() {
                if change.priority > ChangePriority::Low {
                    change.priority = change.priority.step_down();
                    change.metadata.set(META_BATCH_ADJUSTMENT, "dampened");
                }
            }
        }

        if criticals.is_empty() {
            return;
        }
        for (i, change) in changes.iter_mut().enumerate() {
            if change.priority != ChangePriority::Low {
                continue;
            }
            let related = criticals.iter().any(|(ci, critical_path)| {
                *ci != i
                    && path::shared_prefix_len(critical_path, &change.field_path)
                        >= batch.related_segment_depth
            });
            if related {
                change.priority = ChangePriority::Medium;
                change.metadata.set(META_BATCH_ADJUSTMENT, "promoted");
            }
        }
    }
}
