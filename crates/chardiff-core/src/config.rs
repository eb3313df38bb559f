//! Engine configuration.
//!
//! Every rule table is an ordered list of immutable records. The built-in
//! tables are the `Default` of each section, so a TOML file only needs to
//! name what it overrides. A table given in TOML replaces the built-in one
//! wholesale; individual records are never merged.

use crate::errors::{DetectError, Result};
use crate::model::{ChangeCategory, ChangeKind, ChangePriority, FieldChange, SignificanceLevel};
use crate::util::path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level configuration for [`crate::engine::ChangeEngine`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub priority: PriorityConfig,
    pub significance: SignificanceConfig,
    pub grouping: GroupingConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// `DetectError::ConfigParse` for malformed TOML, `DetectError::InvalidConfig`
    /// when the parsed tables fail [`EngineConfig::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let source = std::fs::read_to_string(file).map_err(|e| DetectError::Io {
            path: file.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| DetectError::Serialization {
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.priority.validate()?;
        self.significance.validate()?;
        self.grouping.validate()
    }
}

fn invalid(reason: impl Into<String>) -> DetectError {
    DetectError::InvalidConfig {
        reason: reason.into(),
    }
}

fn check_pattern(table: &str, pattern: &str) -> Result<()> {
    if path::normalize(pattern).is_empty() {
        return Err(invalid(format!("{}: blank field pattern", table)));
    }
    Ok(())
}

fn check_multipliers(table: &str, multipliers: &BTreeMap<String, f64>) -> Result<()> {
    for (flag, multiplier) in multipliers {
        if !(multiplier.is_finite() && *multiplier > 0.0) {
            return Err(invalid(format!(
                "{}: multiplier for {:?} must be positive, got {}",
                table, flag, multiplier
            )));
        }
    }
    Ok(())
}

fn check_descending(table: &str, thresholds: &[f64]) -> Result<()> {
    if thresholds.windows(2).any(|w| w[0] < w[1]) || thresholds.iter().any(|t| !t.is_finite()) {
        return Err(invalid(format!(
            "{}: thresholds must be finite and descending, got {:?}",
            table, thresholds
        )));
    }
    Ok(())
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

// ---------------------------------------------------------------------------
// Field weight tables
// ---------------------------------------------------------------------------

/// One `(pattern, weight)` entry of a [`FieldWeightTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWeight {
    pub pattern: String,
    pub weight: f64,
}

impl FieldWeight {
    pub fn new(pattern: impl Into<String>, weight: f64) -> Self {
        Self {
            pattern: pattern.into(),
            weight,
        }
    }
}

/// Ordered path -> weight table shared by priority importance and
/// significance weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldWeightTable(Vec<FieldWeight>);

impl FieldWeightTable {
    pub fn new(entries: Vec<FieldWeight>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[FieldWeight] {
        &self.0
    }

    fn exact(&self, field_path: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|e| !is_glob(&e.pattern) && path::normalize(&e.pattern) == field_path)
            .map(|e| e.weight)
    }

    fn by_pattern(&self, field_path: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|e| is_glob(&e.pattern) && path::matches_pattern(field_path, &e.pattern))
            .map(|e| e.weight)
    }

    /// Weight for a path: exact entry, then first matching glob, then the
    /// nearest ancestor with an exact entry, its weight multiplied by
    /// `decay` once per level walked.
    pub fn lookup(&self, field_path: &str, decay: f64) -> Option<f64> {
        let field_path = path::normalize(field_path);
        if let Some(weight) = self.exact(&field_path).or_else(|| self.by_pattern(&field_path)) {
            return Some(weight);
        }
        let mut factor = decay;
        let mut current = path::parent(&field_path);
        while let Some(ancestor) = current {
            if let Some(weight) = self.exact(&ancestor) {
                return Some(weight * factor);
            }
            factor *= decay;
            current = path::parent(&ancestor);
        }
        None
    }

    fn validate(&self, table: &str) -> Result<()> {
        for entry in &self.0 {
            check_pattern(table, &entry.pattern)?;
            if !(entry.weight.is_finite() && entry.weight >= 0.0) {
                return Err(invalid(format!(
                    "{}: weight for {:?} must be non-negative, got {}",
                    table, entry.pattern, entry.weight
                )));
            }
        }
        Ok(())
    }
}

fn default_context_multipliers() -> BTreeMap<String, f64> {
    [
        ("level_up", 1.5),
        ("in_combat", 1.2),
        ("long_rest", 0.8),
        ("bulk_update", 0.5),
        ("initial_import", 0.5),
    ]
    .into_iter()
    .map(|(flag, m)| (flag.to_string(), m))
    .collect()
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Field rule: pattern plus optional kind and magnitude conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPriorityRule {
    pub pattern: String,
    /// Empty means any kind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<ChangeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_magnitude: Option<f64>,
    pub priority: ChangePriority,
}

impl FieldPriorityRule {
    pub fn new(pattern: impl Into<String>, priority: ChangePriority) -> Self {
        Self {
            pattern: pattern.into(),
            kinds: Vec::new(),
            min_magnitude: None,
            priority,
        }
    }

    pub fn with_kinds(mut self, kinds: &[ChangeKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn with_min_magnitude(mut self, min_magnitude: f64) -> Self {
        self.min_magnitude = Some(min_magnitude);
        self
    }

    /// A minimum magnitude is never met by a change without one.
    pub fn matches(&self, change: &FieldChange) -> bool {
        path::matches_pattern(&change.field_path, &self.pattern)
            && (self.kinds.is_empty() || self.kinds.contains(&change.change_kind))
            && self
                .min_magnitude
                .map_or(true, |min| change.magnitude().is_some_and(|m| m >= min))
    }
}

/// Kind rule, optionally narrowed to a field pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindPriorityRule {
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub priority: ChangePriority,
}

impl KindPriorityRule {
    pub fn new(kind: ChangeKind, priority: ChangePriority) -> Self {
        Self {
            kind,
            pattern: None,
            priority,
        }
    }

    pub fn for_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn matches(&self, change: &FieldChange) -> bool {
        self.kind == change.change_kind
            && self
                .pattern
                .as_deref()
                .map_or(true, |p| path::matches_pattern(&change.field_path, p))
    }
}

/// Magnitude rule: `priority` applies once |Δ| reaches `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnitudePriorityRule {
    pub pattern: String,
    pub threshold: f64,
    pub priority: ChangePriority,
}

impl MagnitudePriorityRule {
    pub fn new(pattern: impl Into<String>, threshold: f64, priority: ChangePriority) -> Self {
        Self {
            pattern: pattern.into(),
            threshold,
            priority,
        }
    }
}

/// Fallback magnitude bands when no magnitude rule applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnitudeBands {
    pub high: f64,
    pub medium: f64,
}

impl Default for MagnitudeBands {
    fn default() -> Self {
        Self {
            high: 10.0,
            medium: 5.0,
        }
    }
}

impl MagnitudeBands {
    pub fn classify(&self, magnitude: f64) -> ChangePriority {
        if magnitude >= self.high {
            ChangePriority::High
        } else if magnitude >= self.medium {
            ChangePriority::Medium
        } else {
            ChangePriority::Low
        }
    }
}

/// Bands mapping a field-importance scalar onto a priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceBands {
    pub high: f64,
    pub medium: f64,
}

impl Default for ImportanceBands {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.6,
        }
    }
}

impl ImportanceBands {
    pub fn classify(&self, importance: f64) -> ChangePriority {
        if importance >= self.high {
            ChangePriority::High
        } else if importance >= self.medium {
            ChangePriority::Medium
        } else {
            ChangePriority::Low
        }
    }
}

/// Weights of the five priority signals in the weighted average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub base: f64,
    pub field: f64,
    pub kind: f64,
    pub magnitude: f64,
    pub context: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            base: 1.0,
            field: 2.0,
            kind: 1.5,
            magnitude: 1.0,
            context: 1.5,
        }
    }
}

impl PriorityWeights {
    pub fn total(&self) -> f64 {
        self.base + self.field + self.kind + self.magnitude + self.context
    }

    fn as_array(&self) -> [f64; 5] {
        [self.base, self.field, self.kind, self.magnitude, self.context]
    }
}

/// Batch heuristics applied after individual scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Batches strictly larger than this are dampened
    pub dampening_threshold: usize,
    /// Leading segments a Low change must share with a Critical one to be promoted
    pub related_segment_depth: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            dampening_threshold: 20,
            related_segment_depth: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub field_rules: Vec<FieldPriorityRule>,
    pub field_importance: FieldWeightTable,
    pub importance_decay: f64,
    pub default_importance: f64,
    pub importance_bands: ImportanceBands,
    pub kind_rules: Vec<KindPriorityRule>,
    pub magnitude_rules: Vec<MagnitudePriorityRule>,
    pub magnitude_bands: MagnitudeBands,
    pub context_multipliers: BTreeMap<String, f64>,
    /// Multiplier product at or above which the base priority steps up
    pub context_step_up: f64,
    /// Multiplier product at or below which the base priority steps down
    pub context_step_down: f64,
    pub weights: PriorityWeights,
    pub batch: BatchConfig,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        use ChangeKind::*;
        use ChangePriority::*;

        let field_rules = vec![
            FieldPriorityRule::new("character_info.level", Critical),
            FieldPriorityRule::new("character_info.hit_points", High),
            FieldPriorityRule::new("character_info.armor_class", High),
            FieldPriorityRule::new("character_info.class", High),
            FieldPriorityRule::new("character_info.race", High),
            FieldPriorityRule::new("combat.armor_class", High),
            FieldPriorityRule::new("combat.max_hit_points", High),
            FieldPriorityRule::new("combat.resources.*", High).with_kinds(&[Added, Removed]),
            FieldPriorityRule::new("spellcasting.spell_slots.*", High),
            FieldPriorityRule::new("spellcasting.known_spells.*", High)
                .with_kinds(&[Added, Removed]),
            FieldPriorityRule::new("features.*", High).with_kinds(&[Added, Removed]),
            FieldPriorityRule::new("abilities.*", High).with_min_magnitude(3.0),
            FieldPriorityRule::new("skills.*.expertise", High),
        ];

        let field_importance = FieldWeightTable::new(vec![
            FieldWeight::new("character_info.level", 1.0),
            FieldWeight::new("character_info.*", 0.6),
            FieldWeight::new("abilities.*", 0.7),
            FieldWeight::new("combat.*", 0.6),
            FieldWeight::new("equipment.*", 0.6),
            FieldWeight::new("features", 0.8),
            FieldWeight::new("spellcasting", 0.6),
            FieldWeight::new("skills", 0.5),
        ]);

        let kind_rules = vec![
            KindPriorityRule::new(Incremented, Critical).for_pattern("character_info.level"),
            KindPriorityRule::new(Added, Medium),
            KindPriorityRule::new(Removed, Medium),
            KindPriorityRule::new(Modified, Medium),
            KindPriorityRule::new(Incremented, Low),
            KindPriorityRule::new(Decremented, Low),
            KindPriorityRule::new(Renamed, Low),
            KindPriorityRule::new(Reordered, Low),
            KindPriorityRule::new(Moved, Low),
        ];

        let magnitude_rules = vec![
            MagnitudePriorityRule::new("character_info.level", 1.0, Critical),
            MagnitudePriorityRule::new("character_info.hit_points", 1.0, High),
            MagnitudePriorityRule::new("combat.armor_class", 1.0, High),
            MagnitudePriorityRule::new("combat.max_hit_points", 1.0, High),
            MagnitudePriorityRule::new("spellcasting.spell_slots.*", 1.0, High),
            MagnitudePriorityRule::new("abilities.*", 2.0, High),
        ];

        Self {
            field_rules,
            field_importance,
            importance_decay: 0.8,
            default_importance: 0.5,
            importance_bands: ImportanceBands::default(),
            kind_rules,
            magnitude_rules,
            magnitude_bands: MagnitudeBands::default(),
            context_multipliers: default_context_multipliers(),
            context_step_up: 1.5,
            context_step_down: 0.7,
            weights: PriorityWeights::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl PriorityConfig {
    pub fn validate(&self) -> Result<()> {
        if self
            .weights
            .as_array()
            .iter()
            .any(|w| !(w.is_finite() && *w >= 0.0))
        {
            return Err(invalid("priority.weights must be non-negative"));
        }
        if self.weights.total() <= 0.0 {
            return Err(invalid("priority.weights must not all be zero"));
        }
        for rule in &self.field_rules {
            check_pattern("priority.field_rules", &rule.pattern)?;
            if rule.min_magnitude.is_some_and(|m| !(m >= 0.0)) {
                return Err(invalid(format!(
                    "priority.field_rules: min_magnitude for {:?} must be non-negative",
                    rule.pattern
                )));
            }
        }
        for rule in &self.kind_rules {
            if let Some(pattern) = &rule.pattern {
                check_pattern("priority.kind_rules", pattern)?;
            }
        }
        for rule in &self.magnitude_rules {
            check_pattern("priority.magnitude_rules", &rule.pattern)?;
            if !(rule.threshold >= 0.0) {
                return Err(invalid(format!(
                    "priority.magnitude_rules: threshold for {:?} must be non-negative",
                    rule.pattern
                )));
            }
        }
        self.field_importance.validate("priority.field_importance")?;
        if !(self.importance_decay > 0.0 && self.importance_decay <= 1.0) {
            return Err(invalid("priority.importance_decay must be in (0, 1]"));
        }
        check_descending(
            "priority.importance_bands",
            &[self.importance_bands.high, self.importance_bands.medium],
        )?;
        check_descending(
            "priority.magnitude_bands",
            &[self.magnitude_bands.high, self.magnitude_bands.medium, 0.0],
        )?;
        check_multipliers("priority.context_multipliers", &self.context_multipliers)?;
        if !(self.context_step_up > self.context_step_down) {
            return Err(invalid(
                "priority.context_step_up must be greater than context_step_down",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Significance
// ---------------------------------------------------------------------------

/// Significance threshold rule; every condition that is set must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ChangeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_kind: Option<ChangeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<ChangePriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_magnitude: Option<f64>,
    pub significance: SignificanceLevel,
}

impl SignificanceRule {
    pub fn new(significance: SignificanceLevel) -> Self {
        Self {
            category: None,
            change_kind: None,
            min_priority: None,
            min_magnitude: None,
            significance,
        }
    }

    pub fn in_category(mut self, category: ChangeCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn of_kind(mut self, kind: ChangeKind) -> Self {
        self.change_kind = Some(kind);
        self
    }

    pub fn at_least(mut self, priority: ChangePriority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn with_min_magnitude(mut self, min_magnitude: f64) -> Self {
        self.min_magnitude = Some(min_magnitude);
        self
    }

    fn has_condition(&self) -> bool {
        self.category.is_some()
            || self.change_kind.is_some()
            || self.min_priority.is_some()
            || self.min_magnitude.is_some()
    }

    pub fn matches(&self, change: &FieldChange) -> bool {
        self.category.map_or(true, |c| c == change.category)
            && self.change_kind.map_or(true, |k| k == change.change_kind)
            && self.min_priority.map_or(true, |p| change.priority >= p)
            && self
                .min_magnitude
                .map_or(true, |min| change.magnitude().is_some_and(|m| m >= min))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceConfig {
    pub rules: Vec<SignificanceRule>,
    pub field_weights: FieldWeightTable,
    pub default_field_weight: f64,
    /// Descending `[critical, major, moderate, minor]` bands for the field weight
    pub weight_thresholds: [f64; 4],
    /// Bands for magnitude × field weight
    pub magnitude_thresholds: [f64; 4],
    /// Bands for base value × context multiplier product
    pub context_thresholds: [f64; 4],
    pub context_multipliers: BTreeMap<String, f64>,
    /// Step the combined level down when the mean trails the max by more than this
    pub damping_gap: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        use ChangeCategory as Cat;
        use SignificanceLevel::*;

        let rules = vec![
            SignificanceRule::new(Critical).at_least(ChangePriority::Critical),
            SignificanceRule::new(Major)
                .in_category(Cat::Features)
                .of_kind(ChangeKind::Added),
            SignificanceRule::new(Major)
                .in_category(Cat::Features)
                .of_kind(ChangeKind::Removed),
            SignificanceRule::new(Major)
                .in_category(Cat::Spells)
                .of_kind(ChangeKind::Added),
            SignificanceRule::new(Moderate)
                .in_category(Cat::Spells)
                .of_kind(ChangeKind::Removed),
            SignificanceRule::new(Major)
                .in_category(Cat::Progression)
                .at_least(ChangePriority::High),
        ];

        let field_weights = FieldWeightTable::new(vec![
            FieldWeight::new("character_info.level", 5.0),
            FieldWeight::new("character_info", 2.0),
            FieldWeight::new("combat.armor_class", 3.0),
            FieldWeight::new("combat.max_hit_points", 3.0),
            FieldWeight::new("combat", 2.0),
            FieldWeight::new("spellcasting.spell_slots", 2.5),
            FieldWeight::new("spellcasting.known_spells", 3.0),
            FieldWeight::new("features", 3.0),
            FieldWeight::new("abilities", 2.5),
            FieldWeight::new("skills", 1.5),
            FieldWeight::new("equipment", 1.0),
        ]);

        Self {
            rules,
            field_weights,
            default_field_weight: 1.0,
            weight_thresholds: [4.0, 3.0, 2.0, 1.0],
            magnitude_thresholds: [20.0, 10.0, 5.0, 1.0],
            context_thresholds: [4.0, 3.0, 2.0, 1.0],
            context_multipliers: default_context_multipliers(),
            damping_gap: 1.5,
        }
    }
}

impl SignificanceConfig {
    /// Field weight for a path; ancestors inherit their weight undecayed.
    pub fn field_weight(&self, field_path: &str) -> f64 {
        self.field_weights
            .lookup(field_path, 1.0)
            .unwrap_or(self.default_field_weight)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            if !rule.has_condition() {
                return Err(invalid(format!(
                    "significance.rules[{}] has no condition and would match everything",
                    i
                )));
            }
            if rule.min_magnitude.is_some_and(|m| !(m >= 0.0)) {
                return Err(invalid(format!(
                    "significance.rules[{}]: min_magnitude must be non-negative",
                    i
                )));
            }
        }
        self.field_weights.validate("significance.field_weights")?;
        if !(self.default_field_weight.is_finite() && self.default_field_weight >= 0.0) {
            return Err(invalid("significance.default_field_weight must be non-negative"));
        }
        check_descending("significance.weight_thresholds", &self.weight_thresholds)?;
        check_descending("significance.magnitude_thresholds", &self.magnitude_thresholds)?;
        check_descending("significance.context_thresholds", &self.context_thresholds)?;
        check_multipliers("significance.context_multipliers", &self.context_multipliers)?;
        if !(self.damping_gap >= 0.0) {
            return Err(invalid("significance.damping_gap must be non-negative"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Maximum segment distance between two related change paths
    pub related_distance: usize,
    /// Collapse same-path numeric runs before deduplication
    pub merge_consecutive: bool,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            related_distance: 2,
            merge_consecutive: false,
        }
    }
}

impl GroupingConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}
