//! Grouping, deduplication and merging of detected changes.
//!
//! All functions are pure and return groups in a deterministic order.

use crate::detectors::{describe, humanize};
use crate::model::{ChangeGroup, FieldChange};
use crate::util::path;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Default segment distance under which two changes are related
pub const DEFAULT_RELATED_DISTANCE: usize = 2;

/// Metadata key carrying how many changes a merged change stands for
pub const META_MERGED_COUNT: &str = "merged_count";

/// Group name for changes whose path has no parent
const ROOT_GROUP: &str = "(root)";

fn partition<K: Ord>(
    changes: &[FieldChange],
    key: impl Fn(&FieldChange) -> K,
    name: impl Fn(&K) -> String,
) -> Vec<ChangeGroup> {
    let mut buckets: BTreeMap<K, Vec<FieldChange>> = BTreeMap::new();
    for change in changes {
        buckets.entry(key(change)).or_default().push(change.clone());
    }
    buckets
        .into_iter()
        .map(|(k, members)| ChangeGroup::from_changes(name(&k), members))
        .collect()
}

/// One group per parent path, ordered by path.
pub fn group_by_parent(changes: &[FieldChange]) -> Vec<ChangeGroup> {
    partition(
        changes,
        |c| path::parent(&c.field_path).unwrap_or_else(|| ROOT_GROUP.to_string()),
        |parent: &String| parent.clone(),
    )
}

/// One group per category, in category order.
pub fn group_by_category(changes: &[FieldChange]) -> Vec<ChangeGroup> {
    partition(changes, |c| c.category, |k| k.as_str().to_string())
}

/// One group per change kind, in kind order.
pub fn group_by_kind(changes: &[FieldChange]) -> Vec<ChangeGroup> {
    partition(changes, |c| c.change_kind, |k| k.as_str().to_string())
}

/// Cluster changes whose paths are close.
///
/// Changes are sorted by path and walked pairwise; neighbours whose
/// [`path::segment_distance`] is at most `max_distance` join the same
/// group. Every change lands in exactly one group, singletons included.
/// A group is named after the common prefix of its members.
pub fn find_related(changes: &[FieldChange], max_distance: usize) -> Vec<ChangeGroup> {
    let mut sorted: Vec<&FieldChange> = changes.iter().collect();
    sorted.sort_by(|a, b| a.field_path.cmp(&b.field_path));

    let mut runs: Vec<Vec<FieldChange>> = Vec::new();
    let mut previous: Option<&str> = None;
    for change in sorted {
        let joins = previous
            .map(|p| path::segment_distance(p, &change.field_path) <= max_distance)
            .unwrap_or(false);
        match runs.last_mut() {
            Some(run) if joins => run.push(change.clone()),
            _ => runs.push(vec![change.clone()]),
        }
        previous = Some(change.field_path.as_str());
    }

    runs.into_iter()
        .map(|members| {
            let paths: Vec<&str> = members.iter().map(|c| c.field_path.as_str()).collect();
            let prefix = path::common_prefix(&paths);
            let name = if prefix.is_empty() {
                paths[0].to_string()
            } else {
                prefix
            };
            let description = match members.len() {
                1 => format!("1 change at {}", name),
                n => format!("{} related changes under {}", n, name),
            };
            ChangeGroup::from_changes(name, members).with_description(description)
        })
        .collect()
}

/// Keep one change per field path.
///
/// The survivor is the change with the highest `(priority, detected_at)`;
/// on a full tie the first one seen wins. Output keeps the order in which
/// each path first appeared.
pub fn deduplicate(changes: Vec<FieldChange>) -> Vec<FieldChange> {
    let mut kept: Vec<FieldChange> = Vec::with_capacity(changes.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for change in changes {
        match index.get(&change.field_path) {
            Some(&i) => {
                let current = &kept[i];
                if (change.priority, change.detected_at) > (current.priority, current.detected_at) {
                    kept[i] = change;
                }
            }
            None => {
                index.insert(change.field_path.clone(), kept.len());
                kept.push(change);
            }
        }
    }
    kept
}

/// Collapse runs of numeric changes to the same field.
///
/// After a stable sort by `detected_at`, adjacent changes with the same
/// path and the same Incremented/Decremented kind become one change from
/// the first old value to the last new value. The merged priority is the
/// highest in the run and `merged_count` records the run length.
pub fn merge_consecutive(mut changes: Vec<FieldChange>) -> Vec<FieldChange> {
    changes.sort_by_key(|c| c.detected_at);

    let mut merged: Vec<FieldChange> = Vec::with_capacity(changes.len());
    for change in changes {
        if let Some(last) = merged.last_mut() {
            if last.field_path == change.field_path
                && last.change_kind == change.change_kind
                && change.change_kind.is_numeric_delta()
            {
                absorb(last, change);
                continue;
            }
        }
        merged.push(change);
    }
    merged
}

fn absorb(into: &mut FieldChange, next: FieldChange) {
    let count = into
        .metadata
        .get(META_MERGED_COUNT)
        .and_then(Value::as_u64)
        .unwrap_or(1);
    into.new_value = next.new_value;
    into.priority = into.priority.max(next.priority);
    into.confidence = into.confidence.min(next.confidence);
    into.detected_at = next.detected_at;
    into.metadata.set(META_MERGED_COUNT, count + 1);

    let label = path::leaf(&into.field_path)
        .map(|leaf| humanize(&leaf))
        .unwrap_or_default();
    into.description = Some(describe(
        &label,
        into.change_kind,
        into.old_value.as_ref(),
        into.new_value.as_ref(),
    ));
}
