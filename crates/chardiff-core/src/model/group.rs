use crate::model::change::FieldChange;
use crate::model::kinds::ChangePriority;
use serde::{Deserialize, Serialize};

/// A named cluster of related changes treated as one logical event.
///
/// `priority` is the maximum priority among members and is kept current by
/// [`ChangeGroup::add_change`]. An empty group reports Low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub changes: Vec<FieldChange>,
    pub priority: ChangePriority,
}

impl ChangeGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            changes: Vec::new(),
            priority: ChangePriority::Low,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build a group from existing changes, computing the rollup priority.
    pub fn from_changes(name: impl Into<String>, changes: Vec<FieldChange>) -> Self {
        let mut group = Self::new(name);
        for change in changes {
            group.add_change(change);
        }
        group
    }

    pub fn add_change(&mut self, change: FieldChange) {
        if self.changes.is_empty() || change.priority > self.priority {
            self.priority = change.priority;
        }
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn field_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.field_path.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::kinds::{ChangeCategory, ChangeKind};

    fn change(path: &str, priority: ChangePriority) -> FieldChange {
        FieldChange::new(path, None, None, ChangeKind::Modified, ChangeCategory::Metadata)
            .with_priority(priority)
    }

    #[test]
    fn test_rollup_priority_tracks_maximum() {
        let mut group = ChangeGroup::new("combat");
        assert_eq!(group.priority, ChangePriority::Low);

        group.add_change(change("combat.a", ChangePriority::Medium));
        assert_eq!(group.priority, ChangePriority::Medium);

        group.add_change(change("combat.b", ChangePriority::Critical));
        group.add_change(change("combat.c", ChangePriority::Low));
        assert_eq!(group.priority, ChangePriority::Critical);
        assert_eq!(group.len(), 3);
        assert_eq!(group.field_paths(), vec!["combat.a", "combat.b", "combat.c"]);
    }
}
