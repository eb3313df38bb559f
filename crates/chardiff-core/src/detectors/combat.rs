use super::{
    array_at, malformed, number_field, number_value, object_at, presence_change, scalar_change,
    ChangeDetector,
};
use crate::errors::Result;
use crate::model::{ChangeCategory, ChangePriority, DetectionContext, FieldChange};
use crate::util::{extract, path};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const ATTACKS: &str = "combat.attacks";
const RESOURCES: &str = "combat.resources";
const ARMOR_CLASS: &str = "combat.armor_class";
const MAX_HIT_POINTS: &str = "combat.max_hit_points";

/// Weapon attacks, class resource pools, armor class and maximum hit points.
///
/// Attacks, resources and the AC / max HP pair are diffed in three separate
/// passes. A malformed list in any pass fails the whole detector.
#[derive(Debug, Default, Clone)]
pub struct CombatDetector;

impl CombatDetector {
    pub fn new() -> Self {
        Self
    }
}

/// Records of a list keyed by `key_of`; entries without a key are skipped.
fn keyed_records<'a>(
    items: Option<&'a Vec<Value>>,
    key_of: impl Fn(&Map<String, Value>) -> Option<String>,
) -> BTreeMap<String, &'a Map<String, Value>> {
    items
        .into_iter()
        .flatten()
        .filter_map(|item| item.as_object())
        .filter_map(|record| key_of(record).map(|key| (key, record)))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Notes for list entries `keyed_records` would drop.
fn unkeyed(state: &Value, list: &str, key_of: fn(&Map<String, Value>) -> Option<String>) -> Vec<String> {
    let Some(Value::Array(items)) = extract::get_path(state, list) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            item.as_object()
                .and_then(key_of)
                .map_or(true, |key| key.is_empty())
        })
        .map(|(index, _)| format!("{}.{}: entry has no name", list, index))
        .collect()
}

fn attack_key(record: &Map<String, Value>) -> Option<String> {
    record
        .get("name")
        .and_then(Value::as_str)
        .map(path::segment_key)
}

/// `<class>.<resource>`, or just `<resource>` when no class is recorded.
fn resource_key(record: &Map<String, Value>) -> Option<String> {
    let name = path::segment_key(record.get("name")?.as_str()?);
    match record.get("class").and_then(Value::as_str).map(path::segment_key) {
        Some(class) if !class.is_empty() => Some(format!("{}.{}", class, name)),
        _ => Some(name),
    }
}

fn record_name<'a>(record: &'a Map<String, Value>, fallback: &'a str) -> &'a str {
    record
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
}

fn detect_attacks(old: &Value, new: &Value, changes: &mut Vec<FieldChange>) -> Result<()> {
    let old_attacks = keyed_records(array_at(old, ATTACKS)?, attack_key);
    let new_attacks = keyed_records(array_at(new, ATTACKS)?, attack_key);
    let keys: BTreeSet<&String> = old_attacks.keys().chain(new_attacks.keys()).collect();

    for key in keys {
        let field_path = format!("{}.{}", ATTACKS, key);
        match (old_attacks.get(key), new_attacks.get(key)) {
            (Some(o), Some(n)) => {
                let name = record_name(n, key);
                changes.extend(scalar_change(
                    &format!("{}.attack_bonus", field_path),
                    &format!("{} attack bonus", name),
                    o.get("attack_bonus"),
                    n.get("attack_bonus"),
                    ChangeCategory::Combat,
                    ChangePriority::Medium,
                ));
                changes.extend(scalar_change(
                    &format!("{}.damage", field_path),
                    &format!("{} damage", name),
                    o.get("damage"),
                    n.get("damage"),
                    ChangeCategory::Combat,
                    ChangePriority::Low,
                ));
            }
            (o, n) => {
                let record = n.or(o).copied();
                let name = record.map(|r| record_name(r, key)).unwrap_or(key);
                let verb = if n.is_some() { "Gained" } else { "Lost" };
                changes.push(presence_change(
                    &field_path,
                    o.map(|r| Value::Object((*r).clone())).as_ref(),
                    n.map(|r| Value::Object((*r).clone())).as_ref(),
                    ChangeCategory::Combat,
                    ChangePriority::Medium,
                    format!("{} attack: {}", verb, name),
                ));
            }
        }
    }
    Ok(())
}

fn detect_resources(old: &Value, new: &Value, changes: &mut Vec<FieldChange>) -> Result<()> {
    let old_pools = keyed_records(array_at(old, RESOURCES)?, resource_key);
    let new_pools = keyed_records(array_at(new, RESOURCES)?, resource_key);
    let keys: BTreeSet<&String> = old_pools.keys().chain(new_pools.keys()).collect();

    for key in keys {
        let field_path = format!("{}.{}", RESOURCES, key);
        match (old_pools.get(key), new_pools.get(key)) {
            (Some(o), Some(n)) => {
                let name = record_name(n, key);
                let maximum = |r: &Map<String, Value>| {
                    number_field(r, &["maximum", "max"]).map(number_value)
                };
                changes.extend(scalar_change(
                    &format!("{}.maximum", field_path),
                    &format!("{} maximum", name),
                    maximum(*o).as_ref(),
                    maximum(*n).as_ref(),
                    ChangeCategory::Combat,
                    ChangePriority::Medium,
                ));
                changes.extend(scalar_change(
                    &format!("{}.used", field_path),
                    &format!("{} used", name),
                    o.get("used"),
                    n.get("used"),
                    ChangeCategory::Combat,
                    ChangePriority::Low,
                ));
            }
            (o, n) => {
                let record = n.or(o).copied();
                let name = record.map(|r| record_name(r, key)).unwrap_or(key);
                let verb = if n.is_some() { "Gained" } else { "Lost" };
                changes.push(presence_change(
                    &field_path,
                    o.map(|r| Value::Object((*r).clone())).as_ref(),
                    n.map(|r| Value::Object((*r).clone())).as_ref(),
                    ChangeCategory::Combat,
                    ChangePriority::High,
                    format!("{} resource: {}", verb, name),
                ));
            }
        }
    }
    Ok(())
}

/// Armor class as a scalar or as an object carrying `total`.
fn armor_class(state: &Value) -> Result<Option<Value>> {
    match extract::get_path(state, ARMOR_CLASS) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(record)) => Ok(record.get("total").filter(|v| !v.is_null()).cloned()),
        Some(v @ Value::Number(_)) => Ok(Some(v.clone())),
        Some(other) => Err(malformed(ARMOR_CLASS, "number or object", other)),
    }
}

/// `combat.max_hit_points`, else `combat.hit_points.{max,maximum}`.
fn max_hit_points(state: &Value) -> Result<Option<Value>> {
    if let Some(v) = extract::get_path(state, MAX_HIT_POINTS).filter(|v| !v.is_null()) {
        return Ok(Some(v.clone()));
    }
    let Some(hit_points) = object_at(state, "combat.hit_points").ok().flatten() else {
        return Ok(None);
    };
    Ok(["max", "maximum"]
        .iter()
        .find_map(|k| hit_points.get(*k).filter(|v| !v.is_null()).cloned()))
}

impl ChangeDetector for CombatDetector {
    fn name(&self) -> &str {
        "combat"
    }

    fn detect(&self, old: &Value, new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        object_at(old, "combat")?;
        object_at(new, "combat")?;

        let mut changes = Vec::new();
        detect_attacks(old, new, &mut changes)?;
        detect_resources(old, new, &mut changes)?;

        let (old_ac, new_ac) = (armor_class(old)?, armor_class(new)?);
        changes.extend(scalar_change(
            ARMOR_CLASS,
            "Armor Class",
            old_ac.as_ref(),
            new_ac.as_ref(),
            ChangeCategory::Combat,
            ChangePriority::High,
        ));

        let (old_hp, new_hp) = (max_hit_points(old)?, max_hit_points(new)?);
        changes.extend(scalar_change(
            MAX_HIT_POINTS,
            "Max Hit Points",
            old_hp.as_ref(),
            new_hp.as_ref(),
            ChangeCategory::Combat,
            ChangePriority::High,
        ));
        Ok(changes)
    }

    fn skipped_entries(&self, state: &Value) -> Vec<String> {
        let mut notes = unkeyed(state, ATTACKS, attack_key);
        notes.extend(unkeyed(state, RESOURCES, resource_key));
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DetectError;
    use crate::model::ChangeKind;
    use serde_json::json;

    fn detect(old: Value, new: Value) -> Vec<FieldChange> {
        CombatDetector::new()
            .detect(&old, &new, &DetectionContext::default())
            .unwrap()
    }

    #[test]
    fn test_unnamed_attacks_and_resources_are_noted() {
        let state = json!({"combat": {
            "attacks": [{"name": "Dagger"}, {"attack_bonus": 4}, "Club"],
            "resources": [{"name": "Rage", "class": "Barbarian"}, {"maximum": 2}]
        }});
        assert_eq!(
            CombatDetector::new().skipped_entries(&state),
            vec![
                "combat.attacks.1: entry has no name",
                "combat.attacks.2: entry has no name",
                "combat.resources.1: entry has no name",
            ]
        );
    }

    #[test]
    fn test_armor_class_scalar() {
        let changes = detect(
            json!({"combat": {"armor_class": 15}}),
            json!({"combat": {"armor_class": 18}}),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_path, "combat.armor_class");
        assert_eq!(changes[0].change_kind, ChangeKind::Incremented);
        assert_eq!(changes[0].priority, ChangePriority::High);
        assert!(changes[0].description.as_deref().unwrap().contains("+3"));
    }

    #[test]
    fn test_armor_class_object_and_scalar_mix() {
        let changes = detect(
            json!({"combat": {"armor_class": {"total": 16, "base": 10}}}),
            json!({"combat": {"armor_class": 16}}),
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_max_hit_points_nested() {
        let changes = detect(
            json!({"combat": {"hit_points": {"current": 20, "maximum": 31}}}),
            json!({"combat": {"max_hit_points": 38}}),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_path, "combat.max_hit_points");
        assert_eq!(changes[0].change_kind, ChangeKind::Incremented);
    }

    #[test]
    fn test_attacks() {
        let changes = detect(
            json!({"combat": {"attacks": [
                {"name": "Longsword", "attack_bonus": 5, "damage": "1d8+3"},
                {"name": "Dagger", "attack_bonus": 5, "damage": "1d4+3"}
            ]}}),
            json!({"combat": {"attacks": [
                {"name": "Longsword", "attack_bonus": 6, "damage": "1d8+4"},
                {"name": "Light Crossbow", "attack_bonus": 4, "damage": "1d8"}
            ]}}),
        );
        let summary: Vec<(&str, ChangeKind, ChangePriority)> = changes
            .iter()
            .map(|c| (c.field_path.as_str(), c.change_kind, c.priority))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("combat.attacks.dagger", ChangeKind::Removed, ChangePriority::Medium),
                ("combat.attacks.light_crossbow", ChangeKind::Added, ChangePriority::Medium),
                ("combat.attacks.longsword.attack_bonus", ChangeKind::Incremented, ChangePriority::Medium),
                ("combat.attacks.longsword.damage", ChangeKind::Modified, ChangePriority::Low),
            ]
        );
    }

    #[test]
    fn test_resources_keyed_by_class_and_name() {
        let changes = detect(
            json!({"combat": {"resources": [
                {"class": "Fighter", "name": "Second Wind", "maximum": 1, "used": 0}
            ]}}),
            json!({"combat": {"resources": [
                {"class": "Fighter", "name": "Second Wind", "maximum": 1, "used": 1},
                {"class": "Fighter", "name": "Action Surge", "max": 1, "used": 0}
            ]}}),
        );
        let summary: Vec<(&str, ChangeKind, ChangePriority)> = changes
            .iter()
            .map(|c| (c.field_path.as_str(), c.change_kind, c.priority))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("combat.resources.fighter.action_surge", ChangeKind::Added, ChangePriority::High),
                ("combat.resources.fighter.second_wind.used", ChangeKind::Incremented, ChangePriority::Low),
            ]
        );
    }

    #[test]
    fn test_malformed_attacks() {
        let result = CombatDetector::new().detect(
            &json!({"combat": {"attacks": {"name": "Longsword"}}}),
            &json!({}),
            &DetectionContext::default(),
        );
        assert!(matches!(result, Err(DetectError::MalformedSubtree { .. })));
    }
}
