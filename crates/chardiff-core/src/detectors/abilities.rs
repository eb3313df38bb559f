use super::{humanize, number_value, object_at, scalar_change, ChangeDetector};
use crate::errors::Result;
use crate::model::{ChangeCategory, ChangePriority, DetectionContext, FieldChange};
use serde_json::{Map, Value};

const SUBTREE: &str = "abilities";

pub const ABILITIES: [&str; 6] = [
    "strength",
    "dexterity",
    "constitution",
    "intelligence",
    "wisdom",
    "charisma",
];

/// A score change larger than this is High priority
const HIGH_DELTA: f64 = 2.0;

/// The six ability scores, stored as plain numbers or `{score}` / `{value}` objects.
#[derive(Debug, Default, Clone)]
pub struct AbilityScoresDetector;

impl AbilityScoresDetector {
    pub fn new() -> Self {
        Self
    }
}

fn score(abilities: Option<&Map<String, Value>>, name: &str) -> Option<Value> {
    match abilities?.get(name)? {
        Value::Object(record) => ["score", "value"]
            .iter()
            .find_map(|k| record.get(*k).filter(|v| !v.is_null()).cloned()),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

/// Standard ability modifier: floor((score - 10) / 2)
pub fn modifier(score: f64) -> i64 {
    ((score - 10.0) / 2.0).floor() as i64
}

impl ChangeDetector for AbilityScoresDetector {
    fn name(&self) -> &str {
        "abilities"
    }

    fn detect(&self, old: &Value, new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        let old_scores = object_at(old, SUBTREE)?;
        let new_scores = object_at(new, SUBTREE)?;

        let mut changes = Vec::new();
        for name in ABILITIES {
            let o = score(old_scores, name);
            let n = score(new_scores, name);
            let delta = match (o.as_ref().and_then(Value::as_f64), n.as_ref().and_then(Value::as_f64)) {
                (Some(o), Some(n)) => Some((o, n)),
                _ => None,
            };
            let priority = match delta {
                Some((o, n)) if (n - o).abs() > HIGH_DELTA => ChangePriority::High,
                _ => ChangePriority::Medium,
            };
            let Some(mut change) = scalar_change(
                &format!("{}.{}", SUBTREE, name),
                &humanize(name),
                o.as_ref(),
                n.as_ref(),
                ChangeCategory::Abilities,
                priority,
            ) else {
                continue;
            };
            if let Some((o, n)) = delta {
                let (old_mod, new_mod) = (modifier(o), modifier(n));
                if old_mod != new_mod {
                    change.metadata.set("old_modifier", number_value(old_mod as f64));
                    change.metadata.set("new_modifier", number_value(new_mod as f64));
                }
            }
            changes.push(change);
        }
        Ok(changes)
    }
}
