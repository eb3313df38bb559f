use super::{
    bool_field, entry_name, malformed, number_field, number_value, scalar_change, unnamed_entries,
    ChangeDetector,
};
use crate::errors::Result;
use crate::model::{ChangeCategory, ChangeKind, ChangePriority, DetectionContext, FieldChange};
use crate::util::{extract, path};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const SUBTREE: &str = "skills";

/// Canonical skill record, independent of the storage shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillRecord {
    pub name: String,
    pub proficient: bool,
    pub expertise: bool,
    pub bonus: Option<f64>,
}

impl SkillRecord {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn from_record(name: &str, record: &serde_json::Map<String, Value>) -> Self {
        Self {
            name: name.to_string(),
            proficient: bool_field(record, &["proficient", "proficiency"]).unwrap_or(false),
            expertise: bool_field(record, &["expertise"]).unwrap_or(false),
            bonus: number_field(record, &["bonus", "modifier"]),
        }
    }
}

/// Normalize either skills shape into records keyed by slug.
///
/// The enhanced shape is a list of `{name, proficient, expertise, bonus}`;
/// the legacy shape maps a skill name to a record, a proficiency flag, or a
/// bare bonus.
pub fn normalize_skills(state: &Value) -> Result<BTreeMap<String, SkillRecord>> {
    let mut records = BTreeMap::new();
    match extract::get_path(state, SUBTREE) {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            for entry in entries {
                let Some(name) = entry_name(entry) else {
                    continue;
                };
                let key = path::segment_key(name);
                if key.is_empty() {
                    continue;
                }
                let record = match entry {
                    Value::Object(map) => SkillRecord::from_record(name, map),
                    _ => SkillRecord {
                        proficient: true,
                        ..SkillRecord::named(name)
                    },
                };
                records.insert(key, record);
            }
        }
        Some(Value::Object(map)) => {
            for (name, value) in map {
                let key = path::segment_key(name);
                if key.is_empty() {
                    continue;
                }
                let record = match value {
                    Value::Object(inner) => SkillRecord::from_record(name, inner),
                    Value::Bool(proficient) => SkillRecord {
                        proficient: *proficient,
                        ..SkillRecord::named(name)
                    },
                    Value::Number(n) => SkillRecord {
                        bonus: n.as_f64(),
                        ..SkillRecord::named(name)
                    },
                    _ => SkillRecord::named(name),
                };
                records.insert(key, record);
            }
        }
        Some(other) => return Err(malformed(SUBTREE, "array or object", other)),
    }
    Ok(records)
}

/// Proficiency, expertise and bonus changes for every skill.
#[derive(Debug, Default, Clone)]
pub struct SkillsDetector;

impl SkillsDetector {
    pub fn new() -> Self {
        Self
    }
}

fn toggle(
    field_path: String,
    was: bool,
    is: bool,
    priority: ChangePriority,
    description: String,
) -> Option<FieldChange> {
    if was == is {
        return None;
    }
    let (kind, old, new) = if is {
        (ChangeKind::Added, None, Some(Value::Bool(true)))
    } else {
        (ChangeKind::Removed, Some(Value::Bool(true)), None)
    };
    Some(
        FieldChange::new(field_path, old, new, kind, ChangeCategory::Skills)
            .with_priority(priority)
            .with_description(description),
    )
}

impl ChangeDetector for SkillsDetector {
    fn name(&self) -> &str {
        "skills"
    }

    fn detect(&self, old: &Value, new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        let old_skills = normalize_skills(old)?;
        let new_skills = normalize_skills(new)?;
        let keys: BTreeSet<&String> = old_skills.keys().chain(new_skills.keys()).collect();

        let mut changes = Vec::new();
        for key in keys {
            let o = old_skills.get(key);
            let n = new_skills.get(key);
            let name = n.or(o).map(|r| r.name.as_str()).unwrap_or(key.as_str());
            let base = format!("{}.{}", SUBTREE, key);

            let was = o.map_or(false, |r| r.proficient);
            let is = n.map_or(false, |r| r.proficient);
            let verb = if is { "Gained" } else { "Lost" };
            changes.extend(toggle(
                format!("{}.proficiency", base),
                was,
                is,
                ChangePriority::Medium,
                format!("{} proficiency in {}", verb, name),
            ));

            let was = o.map_or(false, |r| r.expertise);
            let is = n.map_or(false, |r| r.expertise);
            let verb = if is { "Gained" } else { "Lost" };
            changes.extend(toggle(
                format!("{}.expertise", base),
                was,
                is,
                ChangePriority::High,
                format!("{} expertise in {}", verb, name),
            ));

            let old_bonus = o.and_then(|r| r.bonus).map(number_value);
            let new_bonus = n.and_then(|r| r.bonus).map(number_value);
            changes.extend(scalar_change(
                &format!("{}.bonus", base),
                &format!("{} bonus", name),
                old_bonus.as_ref(),
                new_bonus.as_ref(),
                ChangeCategory::Skills,
                ChangePriority::Low,
            ));
        }
        Ok(changes)
    }

    fn skipped_entries(&self, state: &Value) -> Vec<String> {
        unnamed_entries(state, SUBTREE)
    }
}
