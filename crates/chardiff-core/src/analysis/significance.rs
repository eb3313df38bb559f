//! Significance scoring on the Trivial..Critical scale.
//!
//! Four signals (base, field, magnitude, context) are combined by taking the
//! maximum, stepped down one level when the mean trails it by more than the
//! configured damping gap.

use crate::config::SignificanceConfig;
use crate::model::{DetectionContext, FieldChange, SignificanceLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every signal behind a significance decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceBreakdown {
    pub base: SignificanceLevel,
    pub field: SignificanceLevel,
    pub magnitude: SignificanceLevel,
    pub context: SignificanceLevel,
    pub damped: bool,
    pub significance: SignificanceLevel,
}

/// Roll-up of a batch of changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceSummary {
    pub overall: SignificanceLevel,
    pub total: usize,
    /// Changes at Minor or above
    pub significant: usize,
    pub counts: BTreeMap<SignificanceLevel, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SignificanceAnalyzer {
    config: SignificanceConfig,
}

impl SignificanceAnalyzer {
    pub fn new(config: SignificanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignificanceConfig {
        &self.config
    }

    pub fn analyze(&self, change: &FieldChange, ctx: &DetectionContext) -> SignificanceLevel {
        self.explain(change, ctx).significance
    }

    pub fn explain(&self, change: &FieldChange, ctx: &DetectionContext) -> SignificanceBreakdown {
        let base = SignificanceLevel::from_priority(change.priority);
        let field = self.field_significance(change);
        let magnitude = self.magnitude_significance(change);
        let context = self.context_significance(base, ctx);

        let signals = [base, field, magnitude, context];
        let max = signals.iter().copied().max().unwrap_or_default();
        let mean = signals.iter().map(|s| f64::from(s.value())).sum::<f64>() / signals.len() as f64;
        let damped = f64::from(max.value()) - mean > self.config.damping_gap;
        let significance = if damped { max.step_down() } else { max };

        SignificanceBreakdown {
            base,
            field,
            magnitude,
            context,
            damped,
            significance,
        }
    }

    /// First matching threshold rule, else the field weight mapped onto the
    /// weight bands.
    pub fn field_significance(&self, change: &FieldChange) -> SignificanceLevel {
        self.config
            .rules
            .iter()
            .find(|rule| rule.matches(change))
            .map(|rule| rule.significance)
            .unwrap_or_else(|| {
                SignificanceLevel::from_thresholds(
                    self.config.field_weight(&change.field_path),
                    &self.config.weight_thresholds,
                )
            })
    }

    /// Magnitude times field weight against the magnitude bands. Without a
    /// magnitude the signal follows the base level.
    pub fn magnitude_significance(&self, change: &FieldChange) -> SignificanceLevel {
        match change.magnitude() {
            Some(magnitude) => SignificanceLevel::from_thresholds(
                magnitude * self.config.field_weight(&change.field_path),
                &self.config.magnitude_thresholds,
            ),
            None => SignificanceLevel::from_priority(change.priority),
        }
    }

    pub fn context_multiplier(&self, ctx: &DetectionContext) -> f64 {
        ctx.active_flags()
            .filter_map(|flag| self.config.context_multipliers.get(flag))
            .product()
    }

    pub fn context_significance(
        &self,
        base: SignificanceLevel,
        ctx: &DetectionContext,
    ) -> SignificanceLevel {
        SignificanceLevel::from_thresholds(
            f64::from(base.value()) * self.context_multiplier(ctx),
            &self.config.context_thresholds,
        )
    }

    /// Store each change's significance on the change itself.
    pub fn annotate(&self, changes: &mut [FieldChange], ctx: &DetectionContext) {
        for change in changes.iter_mut() {
            change.significance = Some(self.analyze(change, ctx));
        }
    }

    fn level_of(&self, change: &FieldChange, ctx: &DetectionContext) -> SignificanceLevel {
        change
            .significance
            .unwrap_or_else(|| self.analyze(change, ctx))
    }

    /// Changes at or above `min`, in their original order.
    pub fn filter_significant(
        &self,
        changes: Vec<FieldChange>,
        min: SignificanceLevel,
        ctx: &DetectionContext,
    ) -> Vec<FieldChange> {
        changes
            .into_iter()
            .filter(|c| self.level_of(c, ctx) >= min)
            .collect()
    }

    pub fn overall(&self, changes: &[FieldChange], ctx: &DetectionContext) -> SignificanceLevel {
        self.summarize(changes, ctx).overall
    }

    pub fn summarize(&self, changes: &[FieldChange], ctx: &DetectionContext) -> SignificanceSummary {
        let levels: Vec<SignificanceLevel> = changes.iter().map(|c| self.level_of(c, ctx)).collect();
        rollup(&levels)
    }
}

/// Batch roll-up of individual levels.
///
/// Critical if any member is Critical; Major when Major members make up at
/// least 20%; Moderate at 30% Moderate; Minor at 40% Minor; Trivial when
/// fewer than 10% of members reach Minor; Minor otherwise.
pub fn rollup(levels: &[SignificanceLevel]) -> SignificanceSummary {
    let mut counts: BTreeMap<SignificanceLevel, usize> = BTreeMap::new();
    for level in levels {
        *counts.entry(*level).or_default() += 1;
    }
    let total = levels.len();
    let significant = levels
        .iter()
        .filter(|l| **l >= SignificanceLevel::Minor)
        .count();

    let share = |level: SignificanceLevel| {
        counts.get(&level).copied().unwrap_or(0) as f64 / total.max(1) as f64
    };
    let overall = if total == 0 {
        SignificanceLevel::Trivial
    } else if counts.contains_key(&SignificanceLevel::Critical) {
        SignificanceLevel::Critical
    } else if share(SignificanceLevel::Major) >= 0.2 {
        SignificanceLevel::Major
    } else if share(SignificanceLevel::Moderate) >= 0.3 {
        SignificanceLevel::Moderate
    } else if share(SignificanceLevel::Minor) >= 0.4 {
        SignificanceLevel::Minor
    } else if (significant as f64) < 0.1 * total as f64 {
        SignificanceLevel::Trivial
    } else {
        SignificanceLevel::Minor
    };

    SignificanceSummary {
        overall,
        total,
        significant,
        counts,
    }
}
