use crate::model::change::FieldChange;
use crate::model::group::ChangeGroup;
use crate::model::kinds::{ChangeCategory, ChangePriority, SignificanceLevel};
use crate::model::result::DetectionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full diff result for one character transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterChangeSet {
    pub character_id: String,
    /// Changes in pipeline order (detector execution order, deduplicated)
    pub changes: Vec<FieldChange>,
    pub groups: Vec<ChangeGroup>,
    pub summary: String,
    pub rule_version: String,
    pub overall_significance: SignificanceLevel,
    pub created_at: DateTime<Utc>,
    /// Per-detector diagnostics from the composite run
    #[serde(default)]
    pub detector_results: Vec<DetectionResult>,
}

/// Counts derived from a change set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChangeStatistics {
    pub total: usize,
    pub by_category: BTreeMap<ChangeCategory, usize>,
    pub by_priority: BTreeMap<ChangePriority, usize>,
    pub has_critical: bool,
    pub has_high_priority: bool,
}

impl ChangeStatistics {
    pub fn from_changes(changes: &[FieldChange]) -> Self {
        let mut stats = ChangeStatistics {
            total: changes.len(),
            ..Default::default()
        };
        for change in changes {
            *stats.by_category.entry(change.category).or_insert(0) += 1;
            *stats.by_priority.entry(change.priority).or_insert(0) += 1;
        }
        stats.has_critical = stats.by_priority.contains_key(&ChangePriority::Critical);
        stats.has_high_priority =
            stats.has_critical || stats.by_priority.contains_key(&ChangePriority::High);
        stats
    }
}

impl CharacterChangeSet {
    pub fn new(character_id: impl Into<String>, rule_version: impl Into<String>) -> Self {
        Self {
            character_id: character_id.into(),
            changes: Vec::new(),
            groups: Vec::new(),
            summary: String::new(),
            rule_version: rule_version.into(),
            overall_significance: SignificanceLevel::Trivial,
            created_at: Utc::now(),
            detector_results: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn statistics(&self) -> ChangeStatistics {
        ChangeStatistics::from_changes(&self.changes)
    }

    pub fn count_by_category(&self) -> BTreeMap<ChangeCategory, usize> {
        self.statistics().by_category
    }

    pub fn count_by_priority(&self) -> BTreeMap<ChangePriority, usize> {
        self.statistics().by_priority
    }

    pub fn has_critical(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.priority == ChangePriority::Critical)
    }

    /// True when any change is High or Critical
    pub fn has_high_priority(&self) -> bool {
        self.changes.iter().any(|c| c.priority >= ChangePriority::High)
    }

    pub fn changes_in(&self, category: ChangeCategory) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(move |c| c.category == category)
    }

    pub fn find(&self, field_path: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field_path == field_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::kinds::ChangeKind;

    fn change(path: &str, category: ChangeCategory, priority: ChangePriority) -> FieldChange {
        FieldChange::new(path, None, None, ChangeKind::Modified, category).with_priority(priority)
    }

    #[test]
    fn test_statistics() {
        let mut set = CharacterChangeSet::new("c-1", "1.0");
        set.changes = vec![
            change("combat.armor_class", ChangeCategory::Combat, ChangePriority::High),
            change("combat.attacks.dagger", ChangeCategory::Combat, ChangePriority::Medium),
            change("skills.arcana.bonus", ChangeCategory::Skills, ChangePriority::Low),
        ];

        let stats = set.statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category.get(&ChangeCategory::Combat), Some(&2));
        assert_eq!(stats.by_priority.get(&ChangePriority::Low), Some(&1));
        assert!(!stats.has_critical);
        assert!(stats.has_high_priority);
        assert!(set.has_high_priority());
        assert!(!set.has_critical());
        assert_eq!(set.changes_in(ChangeCategory::Combat).count(), 2);
        assert!(set.find("skills.arcana.bonus").is_some());
    }

    #[test]
    fn test_empty_set_statistics() {
        let set = CharacterChangeSet::new("c-2", "1.0");
        let stats = set.statistics();
        assert_eq!(stats.total, 0);
        assert!(!stats.has_high_priority);
        assert!(set.is_empty());
    }
}
