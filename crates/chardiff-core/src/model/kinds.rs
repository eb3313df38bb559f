//! Closed enumerations used throughout detection and scoring.
//!
//! Priority and category deserialize through `From<String>` so that an
//! unknown or misspelled value coerces to the default instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The inferred nature of a difference between two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Incremented,
    Decremented,
    Reordered,
    Renamed,
    Moved,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 8] = [
        ChangeKind::Added,
        ChangeKind::Removed,
        ChangeKind::Modified,
        ChangeKind::Incremented,
        ChangeKind::Decremented,
        ChangeKind::Reordered,
        ChangeKind::Renamed,
        ChangeKind::Moved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
            ChangeKind::Incremented => "incremented",
            ChangeKind::Decremented => "decremented",
            ChangeKind::Reordered => "reordered",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Moved => "moved",
        }
    }

    /// True for the two numeric-delta kinds
    pub fn is_numeric_delta(&self) -> bool {
        matches!(self, ChangeKind::Incremented | ChangeKind::Decremented)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ChangeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| format!("unknown change kind: {}", s))
    }
}

/// Urgency of a change, ordinal 1 (Low) to 4 (Critical).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ChangePriority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl ChangePriority {
    pub const ALL: [ChangePriority; 4] = [
        ChangePriority::Low,
        ChangePriority::Medium,
        ChangePriority::High,
        ChangePriority::Critical,
    ];

    /// Ordinal value (1-4) used by weighted scoring
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(ChangePriority::Low),
            2 => Some(ChangePriority::Medium),
            3 => Some(ChangePriority::High),
            4 => Some(ChangePriority::Critical),
            _ => None,
        }
    }

    /// Map a weighted score back onto a level: ≥3.5 Critical, ≥2.5 High, ≥1.5 Medium.
    pub fn from_score(score: f64) -> Self {
        if score >= 3.5 {
            ChangePriority::Critical
        } else if score >= 2.5 {
            ChangePriority::High
        } else if score >= 1.5 {
            ChangePriority::Medium
        } else {
            ChangePriority::Low
        }
    }

    /// One level up, saturating at Critical
    pub fn step_up(&self) -> Self {
        Self::from_ordinal(self.ordinal() + 1).unwrap_or(ChangePriority::Critical)
    }

    /// One level down, saturating at Low
    pub fn step_down(&self) -> Self {
        Self::from_ordinal(self.ordinal().saturating_sub(1)).unwrap_or(ChangePriority::Low)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangePriority::Low => "low",
            ChangePriority::Medium => "medium",
            ChangePriority::High => "high",
            ChangePriority::Critical => "critical",
        }
    }

    /// Parse a name or ordinal, falling back to Medium
    pub fn coerce(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for ChangePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if let Ok(ordinal) = needle.parse::<u8>() {
            return Self::from_ordinal(ordinal).ok_or_else(|| format!("priority out of range: {}", s));
        }
        ChangePriority::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| format!("unknown priority: {}", s))
    }
}

impl From<String> for ChangePriority {
    fn from(value: String) -> Self {
        Self::coerce(&value)
    }
}

/// Subdomain of the character sheet a change belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ChangeCategory {
    BasicInfo,
    Abilities,
    Skills,
    Combat,
    Spells,
    Features,
    Equipment,
    Inventory,
    Progression,
    Social,
    #[default]
    Metadata,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 11] = [
        ChangeCategory::BasicInfo,
        ChangeCategory::Abilities,
        ChangeCategory::Skills,
        ChangeCategory::Combat,
        ChangeCategory::Spells,
        ChangeCategory::Features,
        ChangeCategory::Equipment,
        ChangeCategory::Inventory,
        ChangeCategory::Progression,
        ChangeCategory::Social,
        ChangeCategory::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::BasicInfo => "basic_info",
            ChangeCategory::Abilities => "abilities",
            ChangeCategory::Skills => "skills",
            ChangeCategory::Combat => "combat",
            ChangeCategory::Spells => "spells",
            ChangeCategory::Features => "features",
            ChangeCategory::Equipment => "equipment",
            ChangeCategory::Inventory => "inventory",
            ChangeCategory::Progression => "progression",
            ChangeCategory::Social => "social",
            ChangeCategory::Metadata => "metadata",
        }
    }

    /// Parse a category name, falling back to Metadata
    pub fn coerce(value: &str) -> Self {
        let needle = value.trim().to_ascii_lowercase();
        ChangeCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .unwrap_or_default()
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ChangeCategory {
    fn from(value: String) -> Self {
        Self::coerce(&value)
    }
}

/// How worth reporting a change is, 0 (Trivial) to 4 (Critical).
///
/// Independent of [`ChangePriority`]: priority drives how loudly a change is
/// surfaced, significance drives whether it is mentioned at all.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceLevel {
    #[default]
    Trivial = 0,
    Minor = 1,
    Moderate = 2,
    Major = 3,
    Critical = 4,
}

impl SignificanceLevel {
    pub const ALL: [SignificanceLevel; 5] = [
        SignificanceLevel::Trivial,
        SignificanceLevel::Minor,
        SignificanceLevel::Moderate,
        SignificanceLevel::Major,
        SignificanceLevel::Critical,
    ];

    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Clamp an arbitrary integer into the 0-4 range
    pub fn from_value(value: i64) -> Self {
        match value {
            i64::MIN..=0 => SignificanceLevel::Trivial,
            1 => SignificanceLevel::Minor,
            2 => SignificanceLevel::Moderate,
            3 => SignificanceLevel::Major,
            _ => SignificanceLevel::Critical,
        }
    }

    /// Critical→Critical, High→Major, Medium→Moderate, Low→Minor
    pub fn from_priority(priority: ChangePriority) -> Self {
        match priority {
            ChangePriority::Critical => SignificanceLevel::Critical,
            ChangePriority::High => SignificanceLevel::Major,
            ChangePriority::Medium => SignificanceLevel::Moderate,
            ChangePriority::Low => SignificanceLevel::Minor,
        }
    }

    /// Map a score against descending `[critical, major, moderate, minor]` thresholds
    pub fn from_thresholds(score: f64, thresholds: &[f64; 4]) -> Self {
        if score >= thresholds[0] {
            SignificanceLevel::Critical
        } else if score >= thresholds[1] {
            SignificanceLevel::Major
        } else if score >= thresholds[2] {
            SignificanceLevel::Moderate
        } else if score >= thresholds[3] {
            SignificanceLevel::Minor
        } else {
            SignificanceLevel::Trivial
        }
    }

    pub fn step_down(&self) -> Self {
        Self::from_value(i64::from(self.value()) - 1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignificanceLevel::Trivial => "trivial",
            SignificanceLevel::Minor => "minor",
            SignificanceLevel::Moderate => "moderate",
            SignificanceLevel::Major => "major",
            SignificanceLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for SignificanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
