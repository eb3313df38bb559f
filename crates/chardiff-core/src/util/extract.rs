//! Nested access over `serde_json::Value` trees by dotted path.
//!
//! Missing intermediate nodes never fail: getters return `None` or the
//! caller-supplied default. Numeric segments index into arrays.

use crate::model::{ChangeCategory, ChangeKind, ChangePriority, FieldChange};
use crate::util::{compare, path};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Resolve a dotted path. The empty path resolves to `root` itself.
pub fn get_path<'a>(root: &'a Value, field_path: &str) -> Option<&'a Value> {
    path::split(field_path)
        .iter()
        .try_fold(root, |node, segment| child(node, segment))
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Resolve a dotted path, cloning `default` when it is missing or null.
pub fn get_or(root: &Value, field_path: &str, default: Value) -> Value {
    match get_path(root, field_path) {
        Some(Value::Null) | None => default,
        Some(value) => value.clone(),
    }
}

pub fn has_path(root: &Value, field_path: &str) -> bool {
    get_path(root, field_path).is_some()
}

/// Write `value` at `field_path`, creating intermediate objects.
///
/// A non-container node in the way is replaced by an object. A numeric
/// segment addressing an existing array element writes into the array.
pub fn set_path(root: &mut Value, field_path: &str, value: Value) {
    let segments = path::split(field_path);
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for segment in parents {
        node = child_mut_or_insert(node, segment);
    }
    match node {
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => items[i] = value,
            _ => {
                let mut map = Map::new();
                map.insert(last.clone(), value);
                *node = Value::Object(map);
            }
        },
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        other => {
            let mut map = Map::new();
            map.insert(last.clone(), value);
            *other = Value::Object(map);
        }
    }
}

fn child_mut_or_insert<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = segment.parse::<usize>().ok();
    let in_array = matches!((&*node, index), (Value::Array(items), Some(i)) if i < items.len());
    if !in_array && !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Array(items) => &mut items[index.unwrap_or_default()],
        Value::Object(map) => map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new())),
        other => other,
    }
}

/// Flatten a tree into `path -> leaf`.
///
/// Objects are descended; arrays, scalars and empty objects are leaves.
pub fn flatten(root: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(root, String::new(), &mut out);
    out
}

fn flatten_into(node: &Value, prefix: String, out: &mut BTreeMap<String, Value>) {
    match node {
        Value::Object(map) if !map.is_empty() => {
            for (key, value) in map {
                flatten_into(value, path::join(&[prefix.as_str(), key.as_str()]), out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.insert(prefix, node.clone());
            }
        }
    }
}

/// Every node path present in the tree (objects and array elements), sorted.
pub fn all_paths(root: &Value) -> Vec<String> {
    let mut out = BTreeSet::new();
    collect_paths(root, String::new(), &mut out);
    out.into_iter().collect()
}

fn collect_paths(node: &Value, prefix: String, out: &mut BTreeSet<String>) {
    if !prefix.is_empty() {
        out.insert(prefix.clone());
    }
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                collect_paths(value, path::join(&[prefix.as_str(), key.as_str()]), out);
            }
        }
        Value::Array(items) => {
            for (i, value) in items.iter().enumerate() {
                collect_paths(value, path::join(&[prefix.clone(), i.to_string()]), out);
            }
        }
        _ => {}
    }
}

/// Generic structural diff of two trees over their flattened leaves.
///
/// Produces one Medium-priority `Metadata` change per differing leaf, in
/// path order. Used for diagnostics and for subtrees no detector owns.
pub fn structural_diff(old: &Value, new: &Value) -> Vec<FieldChange> {
    let old_flat = flatten(old);
    let new_flat = flatten(new);
    let keys: BTreeSet<&String> = old_flat.keys().chain(new_flat.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let (o, n) = (old_flat.get(key), new_flat.get(key));
            let kind = compare::detect_change(o, n)?;
            let description = match kind {
                ChangeKind::Added => format!("{} added", key),
                ChangeKind::Removed => format!("{} removed", key),
                _ => format!("{} changed", key),
            };
            Some(
                FieldChange::new(key.clone(), o.cloned(), n.cloned(), kind, ChangeCategory::Metadata)
                    .with_priority(ChangePriority::Medium)
                    .with_description(description),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "combat": {"armor_class": {"total": 16}, "attacks": [{"name": "Dagger"}]},
            "spellcasting": {"spell_slots": [0, 4, 2]},
            "notes": {}
        })
    }

    #[test]
    fn test_get_path() {
        let v = sample();
        assert_eq!(get_path(&v, "combat.armor_class.total"), Some(&json!(16)));
        assert_eq!(get_path(&v, "spellcasting.spell_slots.1"), Some(&json!(4)));
        assert_eq!(get_path(&v, "combat.attacks.0.name"), Some(&json!("Dagger")));
        assert_eq!(get_path(&v, "combat.missing.deeper"), None);
        assert_eq!(get_path(&v, ""), Some(&v));
    }

    #[test]
    fn test_get_or_and_has() {
        let v = sample();
        assert_eq!(get_or(&v, "combat.speed", json!(30)), json!(30));
        assert_eq!(get_or(&v, "combat.armor_class.total", json!(0)), json!(16));
        assert!(has_path(&v, "notes"));
        assert!(!has_path(&v, "notes.anything"));
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut v = json!({});
        set_path(&mut v, "combat.armor_class", json!(15));
        set_path(&mut v, "spellcasting.spell_slots", json!([0, 2]));
        set_path(&mut v, "spellcasting.spell_slots.1", json!(3));
        assert_eq!(v, json!({"combat": {"armor_class": 15}, "spellcasting": {"spell_slots": [0, 3]}}));
    }

    #[test]
    fn test_set_path_replaces_scalar_in_the_way() {
        let mut v = json!({"combat": 7});
        set_path(&mut v, "combat.armor_class", json!(15));
        assert_eq!(v, json!({"combat": {"armor_class": 15}}));
    }

    #[test]
    fn test_flatten() {
        let flat = flatten(&sample());
        assert_eq!(flat.get("combat.armor_class.total"), Some(&json!(16)));
        assert_eq!(flat.get("spellcasting.spell_slots"), Some(&json!([0, 4, 2])));
        assert_eq!(flat.get("notes"), Some(&json!({})));
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn test_all_paths() {
        let paths = all_paths(&json!({"a": {"b": [1, {"c": 2}]}}));
        assert_eq!(paths, vec!["a", "a.b", "a.b.0", "a.b.1", "a.b.1.c"]);
    }

    #[test]
    fn test_structural_diff() {
        let old = json!({"a": 1, "b": {"c": "x"}, "gone": true});
        let new = json!({"a": 2, "b": {"c": "x"}, "fresh": [1]});
        let changes = structural_diff(&old, &new);
        let summary: Vec<(&str, ChangeKind)> = changes
            .iter()
            .map(|c| (c.field_path.as_str(), c.change_kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a", ChangeKind::Incremented),
                ("fresh", ChangeKind::Added),
                ("gone", ChangeKind::Removed),
            ]
        );
    }
}
