use super::{
    bool_field, entry_name, malformed, number_field, number_value, presence_change, scalar_change,
    unnamed_in, ChangeDetector,
};
use crate::errors::Result;
use crate::model::{ChangeCategory, ChangeKind, ChangePriority, DetectionContext, FieldChange};
use crate::util::{extract, path};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

const SUBTREE: &str = "equipment";

/// One inventory line after shape normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub name: String,
    pub quantity: f64,
    pub equipped: bool,
}

impl ItemRecord {
    fn from_entry(entry: &Value) -> Option<Self> {
        let name = entry_name(entry)?.to_string();
        let (quantity, equipped) = match entry {
            Value::Object(record) => (
                number_field(record, &["quantity", "qty"]).unwrap_or(1.0),
                bool_field(record, &["equipped"]).unwrap_or(false),
            ),
            _ => (1.0, false),
        };
        Some(Self {
            name,
            quantity,
            equipped,
        })
    }

    fn merge(&mut self, other: ItemRecord) {
        self.quantity += other.quantity;
        self.equipped |= other.equipped;
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "quantity": number_value(self.quantity),
            "equipped": self.equipped,
        })
    }
}

/// Normalize either equipment shape into one item map keyed by slug.
///
/// A flat list and an object of lists (`basic_equipment`,
/// `enhanced_equipment`, ...) yield the same map for the same items. Lines
/// naming the same item are merged: quantities add up and the item counts
/// as equipped when any line is. Non-list members of the object form (coin
/// purses and the like) are not inventory lines and are skipped.
pub fn normalize_equipment(state: &Value) -> Result<BTreeMap<String, ItemRecord>> {
    let mut items: BTreeMap<String, ItemRecord> = BTreeMap::new();
    let mut add = |entries: &[Value]| {
        for item in entries.iter().filter_map(ItemRecord::from_entry) {
            let key = path::segment_key(&item.name);
            if key.is_empty() {
                continue;
            }
            match items.get_mut(&key) {
                Some(existing) => existing.merge(item),
                None => {
                    items.insert(key, item);
                }
            }
        }
    };

    match extract::get_path(state, SUBTREE) {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => add(entries),
        Some(Value::Object(lists)) => {
            for entries in lists.values() {
                if let Value::Array(entries) = entries {
                    add(entries);
                }
            }
        }
        Some(other) => return Err(malformed(SUBTREE, "array or object", other)),
    }
    Ok(items)
}

/// Inventory additions, removals, quantity and equipped-state changes.
#[derive(Debug, Default, Clone)]
pub struct EquipmentDetector;

impl EquipmentDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ChangeDetector for EquipmentDetector {
    fn name(&self) -> &str {
        "equipment"
    }

    fn detect(&self, old: &Value, new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        let old_items = normalize_equipment(old)?;
        let new_items = normalize_equipment(new)?;
        let keys: BTreeSet<&String> = old_items.keys().chain(new_items.keys()).collect();

        let mut changes = Vec::new();
        for key in keys {
            let field_path = format!("{}.{}", SUBTREE, key);
            match (old_items.get(key), new_items.get(key)) {
                (Some(o), Some(n)) => {
                    changes.extend(scalar_change(
                        &format!("{}.quantity", field_path),
                        &format!("{} quantity", n.name),
                        Some(&number_value(o.quantity)),
                        Some(&number_value(n.quantity)),
                        ChangeCategory::Inventory,
                        ChangePriority::Low,
                    ));
                    if o.equipped != n.equipped {
                        let verb = if n.equipped { "Equipped" } else { "Unequipped" };
                        changes.push(
                            FieldChange::new(
                                format!("{}.equipped", field_path),
                                Some(Value::Bool(o.equipped)),
                                Some(Value::Bool(n.equipped)),
                                ChangeKind::Modified,
                                ChangeCategory::Equipment,
                            )
                            .with_priority(ChangePriority::Medium)
                            .with_description(format!("{} {}", verb, n.name)),
                        );
                    }
                }
                (o, n) => {
                    let Some(item) = n.or(o) else {
                        continue;
                    };
                    let verb = if n.is_some() { "Added" } else { "Removed" };
                    changes.push(presence_change(
                        &field_path,
                        o.map(ItemRecord::to_value).as_ref(),
                        n.map(ItemRecord::to_value).as_ref(),
                        ChangeCategory::Equipment,
                        ChangePriority::Medium,
                        format!("{} {}", verb, item.name),
                    ));
                }
            }
        }
        Ok(changes)
    }

    fn skipped_entries(&self, state: &Value) -> Vec<String> {
        match extract::get_path(state, SUBTREE) {
            Some(Value::Array(entries)) => unnamed_in(SUBTREE, entries),
            Some(Value::Object(lists)) => lists
                .iter()
                .flat_map(|(member, value)| {
                    let member_path = format!("{}.{}", SUBTREE, member);
                    match value {
                        Value::Array(entries) => unnamed_in(&member_path, entries),
                        Value::Null => Vec::new(),
                        _ => vec![format!("{}: not an item list", member_path)],
                    }
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
