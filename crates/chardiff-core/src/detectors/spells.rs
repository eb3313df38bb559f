use super::{
    entry_name, malformed, number_field, number_value, presence_change, scalar_change, unnamed_in,
    ChangeDetector,
};
use crate::errors::Result;
use crate::model::{ChangeCategory, ChangePriority, DetectionContext, FieldChange};
use crate::util::{extract, path};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

const SLOTS: &str = "spellcasting.spell_slots";
const SPELLS: &str = "spellcasting.spells";
const KNOWN: &str = "spellcasting.known_spells";
const COUNT: &str = "spellcasting.spell_count";

/// Slot levels that are tracked; level 0 is cantrips, which use no slots
pub const SLOT_LEVELS: std::ops::RangeInclusive<u8> = 1..=9;

/// Slot levels up to this one are High priority
const HIGH_SLOT_LEVEL: u8 = 2;

/// Source label for spells stored as a single flat list
const DEFAULT_SOURCE: &str = "known";

/// Spell slots by level and known spells across casting sources.
#[derive(Debug, Default, Clone)]
pub struct SpellsDetector;

impl SpellsDetector {
    pub fn new() -> Self {
        Self
    }
}

fn parse_level(key: &str) -> Option<u8> {
    let key = key.trim();
    key.strip_prefix("level_").unwrap_or(key).parse().ok()
}

fn slot_count(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(record) => number_field(record, &["total", "max", "maximum"]),
        _ => None,
    }
}

/// Slot counts by level 1-9. Missing levels read as zero.
pub fn slot_table(state: &Value) -> Result<BTreeMap<u8, f64>> {
    let mut table: BTreeMap<u8, f64> = SLOT_LEVELS.map(|level| (level, 0.0)).collect();
    let mut record = |level: Option<u8>, value: &Value| {
        if let Some(level) = level.filter(|l| SLOT_LEVELS.contains(l)) {
            table.insert(level, slot_count(value).unwrap_or(0.0));
        }
    };
    match extract::get_path(state, SLOTS) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (index, value) in items.iter().enumerate() {
                record(u8::try_from(index).ok(), value);
            }
        }
        Some(Value::Object(map)) => {
            for (key, value) in map {
                record(parse_level(key), value);
            }
        }
        Some(other) => return Err(malformed(SLOTS, "array or object", other)),
    }
    Ok(table)
}

/// A known spell and every source it appears under.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownSpell {
    pub name: String,
    pub sources: Vec<String>,
}

/// Known spells keyed by slug, plus the raw entry count across sources.
pub fn known_spells(state: &Value) -> Result<(BTreeMap<String, KnownSpell>, usize)> {
    let mut spells: BTreeMap<String, KnownSpell> = BTreeMap::new();
    let mut total = 0;
    let mut add = |source: &str, entries: &[Value]| {
        for name in entries.iter().filter_map(entry_name) {
            let key = path::segment_key(name);
            if key.is_empty() {
                continue;
            }
            total += 1;
            let spell = spells.entry(key).or_insert_with(|| KnownSpell {
                name: name.to_string(),
                sources: Vec::new(),
            });
            if !spell.sources.iter().any(|s| s == source) {
                spell.sources.push(source.to_string());
            }
        }
    };

    match extract::get_path(state, SPELLS) {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => add(DEFAULT_SOURCE, entries),
        Some(Value::Object(by_source)) => {
            for (source, entries) in by_source {
                match entries {
                    Value::Null => {}
                    Value::Array(entries) => add(source, entries),
                    other => {
                        return Err(malformed(&format!("{}.{}", SPELLS, source), "array", other))
                    }
                }
            }
        }
        Some(other) => return Err(malformed(SPELLS, "array or object", other)),
    }
    Ok((spells, total))
}

fn detect_slots(old: &Value, new: &Value, changes: &mut Vec<FieldChange>) -> Result<()> {
    let old_slots = slot_table(old)?;
    let new_slots = slot_table(new)?;
    for level in SLOT_LEVELS {
        let o = old_slots.get(&level).copied().map(number_value);
        let n = new_slots.get(&level).copied().map(number_value);
        let priority = if level <= HIGH_SLOT_LEVEL {
            ChangePriority::High
        } else {
            ChangePriority::Medium
        };
        if let Some(change) = scalar_change(
            &format!("{}.{}", SLOTS, level),
            &format!("Level {} spell slots", level),
            o.as_ref(),
            n.as_ref(),
            ChangeCategory::Spells,
            priority,
        ) {
            changes.push(change.with_metadata("spell_level", level));
        }
    }
    Ok(())
}

fn detect_known(old: &Value, new: &Value, changes: &mut Vec<FieldChange>) -> Result<()> {
    let (old_spells, old_total) = known_spells(old)?;
    let (new_spells, new_total) = known_spells(new)?;
    let keys: BTreeSet<&String> = old_spells.keys().chain(new_spells.keys()).collect();

    let mut explained = false;
    for key in keys {
        let (o, n) = (old_spells.get(key), new_spells.get(key));
        let Some(spell) = (match (o, n) {
            (Some(_), Some(_)) => None,
            (o, n) => n.or(o),
        }) else {
            continue;
        };
        explained = true;
        let source = spell.sources.first().map(String::as_str).unwrap_or(DEFAULT_SOURCE);
        let description = if n.is_some() {
            format!("Learned spell: {} ({})", spell.name, source)
        } else {
            format!("Forgot spell: {} ({})", spell.name, source)
        };
        let value = Value::String(spell.name.clone());
        let change = presence_change(
            &format!("{}.{}", KNOWN, key),
            o.map(|_| &value),
            n.map(|_| &value),
            ChangeCategory::Spells,
            ChangePriority::High,
            description,
        )
        .with_metadata("source", source)
        .with_metadata("sources", json!(spell.sources));
        changes.push(change);
    }

    if !explained {
        changes.extend(scalar_change(
            COUNT,
            "Spell count",
            Some(&json!(old_total)),
            Some(&json!(new_total)),
            ChangeCategory::Spells,
            ChangePriority::Low,
        ));
    }
    Ok(())
}

impl ChangeDetector for SpellsDetector {
    fn name(&self) -> &str {
        "spells"
    }

    fn detect(&self, old: &Value, new: &Value, _ctx: &DetectionContext) -> Result<Vec<FieldChange>> {
        let mut changes = Vec::new();
        detect_slots(old, new, &mut changes)?;
        detect_known(old, new, &mut changes)?;
        Ok(changes)
    }

    fn skipped_entries(&self, state: &Value) -> Vec<String> {
        match extract::get_path(state, SPELLS) {
            Some(Value::Array(entries)) => unnamed_in(SPELLS, entries),
            Some(Value::Object(by_source)) => by_source
                .iter()
                .filter_map(|(source, entries)| entries.as_array().map(|e| (source, e)))
                .flat_map(|(source, entries)| unnamed_in(&format!("{}.{}", SPELLS, source), entries))
                .collect(),
            _ => Vec::new(),
        }
    }
}
