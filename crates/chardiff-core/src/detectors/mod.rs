//! Change detectors.
//!
//! Each detector scans one subtree of the character state and reports the
//! differences it understands. Missing subtrees read as empty; a subtree of
//! the wrong JSON type is reported as [`DetectError::MalformedSubtree`] and
//! isolated by the [`composite::CompositeDetector`].

pub mod abilities;
pub mod basic_info;
pub mod combat;
pub mod composite;
pub mod equipment;
pub mod features;
pub mod skills;
pub mod spells;

pub use abilities::AbilityScoresDetector;
pub use basic_info::BasicInfoDetector;
pub use combat::CombatDetector;
pub use composite::CompositeDetector;
pub use equipment::EquipmentDetector;
pub use features::FeaturesDetector;
pub use skills::SkillsDetector;
pub use spells::SpellsDetector;

use crate::errors::{DetectError, Result};
use crate::model::{ChangeCategory, ChangeKind, ChangePriority, DetectionContext, FieldChange};
use crate::util::{compare, extract, path};
use serde_json::{Map, Value};

/// A unit that diffs one subtree of two character snapshots.
pub trait ChangeDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Report the differences between `old` and `new`.
    ///
    /// # Errors
    ///
    /// Returns `DetectError::MalformedSubtree` when the scanned subtree has
    /// an unexpected JSON type on either side.
    fn detect(&self, old: &Value, new: &Value, ctx: &DetectionContext) -> Result<Vec<FieldChange>>;

    /// Entries of `state` this detector ignores, one note each.
    fn skipped_entries(&self, _state: &Value) -> Vec<String> {
        Vec::new()
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn malformed(path: &str, expected: &str, found: &Value) -> DetectError {
    DetectError::MalformedSubtree {
        path: path.to_string(),
        expected: expected.to_string(),
        found: json_type(found).to_string(),
    }
}

/// Object at `path`; `None` when absent or null.
pub(crate) fn object_at<'a>(root: &'a Value, path: &str) -> Result<Option<&'a Map<String, Value>>> {
    match extract::get_path(root, path) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(malformed(path, "object", other)),
    }
}

/// Array at `path`; `None` when absent or null.
pub(crate) fn array_at<'a>(root: &'a Value, path: &str) -> Result<Option<&'a Vec<Value>>> {
    match extract::get_path(root, path) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(malformed(path, "array", other)),
    }
}

/// Name of a list entry: the string itself or an object's `name` field.
pub(crate) fn entry_name(entry: &Value) -> Option<&str> {
    let name = match entry {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("name")?.as_str()?,
        _ => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Notes for the entries of the list at `list_path` that carry no usable name.
pub(crate) fn unnamed_entries(state: &Value, list_path: &str) -> Vec<String> {
    match extract::get_path(state, list_path) {
        Some(Value::Array(entries)) => unnamed_in(list_path, entries),
        _ => Vec::new(),
    }
}

/// Same as [`unnamed_entries`] for a list already in hand.
pub(crate) fn unnamed_in(list_path: &str, entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry_name(entry).map_or(true, |name| path::segment_key(name).is_empty()))
        .map(|(index, _)| format!("{}.{}: entry has no name", list_path, index))
        .collect()
}

pub(crate) fn bool_field(record: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| record.get(*k).and_then(Value::as_bool))
}

pub(crate) fn number_field(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| record.get(*k).and_then(Value::as_f64))
}

/// JSON number from an f64, integral values kept as integers.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Human rendering of a value for descriptions.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(compare::format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// `max_hit_points` -> `Max Hit Points`
pub(crate) fn humanize(key: &str) -> String {
    key.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Describe a scalar change, e.g. `Armor Class increased from 15 to 18 (+3)`.
pub(crate) fn describe(label: &str, kind: ChangeKind, old: Option<&Value>, new: Option<&Value>) -> String {
    let old_text = old.map(display_value).unwrap_or_default();
    let new_text = new.map(display_value).unwrap_or_default();
    match kind {
        ChangeKind::Added => format!("{} set to {}", label, new_text),
        ChangeKind::Removed => format!("{} removed (was {})", label, old_text),
        ChangeKind::Incremented | ChangeKind::Decremented => {
            let delta = match (old.and_then(Value::as_f64), new.and_then(Value::as_f64)) {
                (Some(o), Some(n)) => format!(" ({})", compare::format_delta(n - o)),
                _ => String::new(),
            };
            let verb = if kind == ChangeKind::Incremented {
                "increased"
            } else {
                "decreased"
            };
            format!("{} {} from {} to {}{}", label, verb, old_text, new_text, delta)
        }
        _ => format!("{} changed from {} to {}", label, old_text, new_text),
    }
}

/// Compare two scalar slots and build the change, if any.
pub(crate) fn scalar_change(
    field_path: &str,
    label: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    category: ChangeCategory,
    priority: ChangePriority,
) -> Option<FieldChange> {
    let kind = compare::detect_change(old, new)?;
    Some(
        FieldChange::new(field_path, old.cloned(), new.cloned(), kind, category)
            .with_priority(priority)
            .with_description(describe(label, kind, old, new)),
    )
}

/// Added/Removed change for a keyed entry that exists on one side only.
pub(crate) fn presence_change(
    field_path: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    category: ChangeCategory,
    priority: ChangePriority,
    description: String,
) -> FieldChange {
    let kind = if new.is_some() {
        ChangeKind::Added
    } else {
        ChangeKind::Removed
    };
    FieldChange::new(field_path, old.cloned(), new.cloned(), kind, category)
        .with_priority(priority)
        .with_description(description)
}
