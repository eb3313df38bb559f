use super::{array_at, entry_name, object_at, presence_change, unnamed_entries, ChangeDetector};
use crate::errors::Result;
use crate::model::{ChangeCategory, ChangePriority, DetectionContext, FieldChange};
use crate::util::path;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const SUBTREE: &str = "features";

/// (list key, singular label)
const LISTS: [(&str, &str); 3] = [
    ("class_features", "class feature"),
    ("racial_traits", "racial trait"),
    ("feats", "feat"),
];

/// Gains and losses across class features, racial traits and feats.
#[derive(Debug, Default, Clone)]
pub struct FeaturesDetector;

impl FeaturesDetector {
    pub fn new() -> Self {
        Self
    }
}

fn names(state: &Value, list: &str) -> Result<BTreeMap<String, String>> {
    let entries = array_at(state, &format!("{}.{}", SUBTREE, list))?;
    Ok(entries
        .into_iter()
        .flatten()
        .filter_map(entry_name)
        .map(|name| (path::segment_key(name), name.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect())
}

impl ChangeDetector for FeaturesDetector {
    fn name(&self) -> &str {
        "features"
    }

    fn detect(&self, old: &Value, new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        object_at(old, SUBTREE)?;
        object_at(new, SUBTREE)?;

        let mut changes = Vec::new();
        for (list, label) in LISTS {
            let old_names = names(old, list)?;
            let new_names = names(new, list)?;
            let keys: BTreeSet<&String> = old_names.keys().chain(new_names.keys()).collect();
            for key in keys {
                let (o, n) = (old_names.get(key), new_names.get(key));
                if o.is_some() == n.is_some() {
                    continue;
                }
                let name = n.or(o).map(String::as_str).unwrap_or(key.as_str());
                let verb = if n.is_some() { "Gained" } else { "Lost" };
                changes.push(presence_change(
                    &format!("{}.{}.{}", SUBTREE, list, key),
                    o.map(|s| Value::String(s.clone())).as_ref(),
                    n.map(|s| Value::String(s.clone())).as_ref(),
                    ChangeCategory::Features,
                    ChangePriority::High,
                    format!("{} {}: {}", verb, label, name),
                ));
            }
        }
        Ok(changes)
    }

    fn skipped_entries(&self, state: &Value) -> Vec<String> {
        LISTS
            .iter()
            .flat_map(|(list, _)| unnamed_entries(state, &format!("{}.{}", SUBTREE, list)))
            .collect()
    }
}
