use super::{object_at, scalar_change, ChangeDetector};
use crate::errors::Result;
use crate::model::{ChangeCategory, ChangePriority, DetectionContext, FieldChange};
use serde_json::Value;

const SUBTREE: &str = "character_info";

/// (field, label, default priority, category)
const FIELDS: &[(&str, &str, ChangePriority, ChangeCategory)] = &[
    ("name", "Name", ChangePriority::Medium, ChangeCategory::BasicInfo),
    ("level", "Level", ChangePriority::Critical, ChangeCategory::Progression),
    ("class", "Class", ChangePriority::High, ChangeCategory::BasicInfo),
    ("race", "Race", ChangePriority::High, ChangeCategory::BasicInfo),
    ("background", "Background", ChangePriority::Medium, ChangeCategory::BasicInfo),
    ("alignment", "Alignment", ChangePriority::Medium, ChangeCategory::BasicInfo),
    ("experience", "Experience", ChangePriority::Medium, ChangeCategory::Progression),
    ("hit_points", "Hit Points", ChangePriority::High, ChangeCategory::BasicInfo),
    ("armor_class", "Armor Class", ChangePriority::High, ChangeCategory::BasicInfo),
];

/// Identity and headline numbers under `character_info`.
#[derive(Debug, Default, Clone)]
pub struct BasicInfoDetector;

impl BasicInfoDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ChangeDetector for BasicInfoDetector {
    fn name(&self) -> &str {
        "basic_info"
    }

    fn detect(&self, old: &Value, new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        let old_info = object_at(old, SUBTREE)?;
        let new_info = object_at(new, SUBTREE)?;

        let changes = FIELDS
            .iter()
            .filter_map(|(field, label, priority, category)| {
                scalar_change(
                    &format!("{}.{}", SUBTREE, field),
                    label,
                    old_info.and_then(|m| m.get(*field)),
                    new_info.and_then(|m| m.get(*field)),
                    *category,
                    *priority,
                )
            })
            .collect();
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeKind;
    use serde_json::json;

    fn detect(old: Value, new: Value) -> Vec<FieldChange> {
        BasicInfoDetector::new()
            .detect(&old, &new, &DetectionContext::default())
            .unwrap()
    }

    #[test]
    fn test_level_up_is_critical_progression() {
        let changes = detect(
            json!({"character_info": {"name": "Mira", "level": 4}}),
            json!({"character_info": {"name": "Mira", "level": 5}}),
        );
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.field_path, "character_info.level");
        assert_eq!(change.change_kind, ChangeKind::Incremented);
        assert_eq!(change.priority, ChangePriority::Critical);
        assert_eq!(change.category, ChangeCategory::Progression);
        assert_eq!(change.description.as_deref(), Some("Level increased from 4 to 5 (+1)"));
    }

    #[test]
    fn test_field_priorities() {
        let changes = detect(
            json!({"character_info": {"race": "Elf", "alignment": "Neutral", "hit_points": 30}}),
            json!({"character_info": {"race": "Half-Elf", "alignment": "Chaotic Good", "hit_points": 22}}),
        );
        let by_path: Vec<(&str, ChangeKind, ChangePriority)> = changes
            .iter()
            .map(|c| (c.field_path.as_str(), c.change_kind, c.priority))
            .collect();
        assert_eq!(
            by_path,
            vec![
                ("character_info.race", ChangeKind::Modified, ChangePriority::High),
                ("character_info.alignment", ChangeKind::Modified, ChangePriority::Medium),
                ("character_info.hit_points", ChangeKind::Decremented, ChangePriority::High),
            ]
        );
    }

    #[test]
    fn test_missing_subtree_reads_as_empty() {
        let changes = detect(json!({}), json!({"character_info": {"background": "Sage"}}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_kind, ChangeKind::Added);
    }

    #[test]
    fn test_malformed_subtree() {
        let result = BasicInfoDetector::new().detect(
            &json!({"character_info": "oops"}),
            &json!({}),
            &DetectionContext::default(),
        );
        assert!(result.is_err());
    }
}
