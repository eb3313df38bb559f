#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chardiff_core::detectors::{ChangeDetector, CompositeDetector};
use chardiff_core::grouping::{
    deduplicate, find_related, group_by_category, group_by_kind, group_by_parent,
    merge_consecutive, DEFAULT_RELATED_DISTANCE, META_MERGED_COUNT,
};
use chardiff_core::{
    ChangeCategory, ChangeGroup, ChangeKind, ChangePriority, DetectionContext, FieldChange,
};
use chrono::{Duration, TimeZone, Utc};
use common::{base_character, CharacterBuilder};
use serde_json::json;
use std::collections::HashSet;

fn detected() -> Vec<FieldChange> {
    let new = CharacterBuilder::new()
        .set("combat.armor_class", json!(15))
        .set("combat.max_hit_points", json!(30))
        .set("spellcasting.spell_slots.1", json!(5))
        .set("spellcasting.spell_slots.2", json!(4))
        .set("features.feats", json!(["Alert"]))
        .build();
    CompositeDetector::with_default_detectors()
        .detect(&base_character(), &new, &DetectionContext::default())
        .unwrap()
}

#[test]
fn test_related_groups_partition_detected_changes() {
    let changes = detected();
    let groups = find_related(&changes, DEFAULT_RELATED_DISTANCE);

    let layout: Vec<(&str, usize)> = groups.iter().map(|g| (g.name.as_str(), g.len())).collect();
    assert_eq!(
        layout,
        vec![
            ("combat", 2),
            ("features.feats.alert", 1),
            ("spellcasting.spell_slots", 2),
        ]
    );
    assert_eq!(groups[0].description.as_deref(), Some("2 related changes under combat"));
    assert_eq!(groups[1].description.as_deref(), Some("1 change at features.feats.alert"));
    assert_eq!(groups.iter().map(ChangeGroup::len).sum::<usize>(), changes.len());
}

#[test]
fn test_zero_distance_only_joins_identical_paths() {
    let changes = detected();
    let groups = find_related(&changes, 0);
    assert_eq!(groups.len(), changes.len());
}

#[test]
fn test_category_and_parent_views() {
    let changes = detected();

    let categories: Vec<String> = group_by_category(&changes).into_iter().map(|g| g.name).collect();
    assert_eq!(categories, vec!["combat", "spells", "features"]);

    let parents: Vec<String> = group_by_parent(&changes).into_iter().map(|g| g.name).collect();
    assert_eq!(
        parents,
        vec!["combat", "features.feats", "spellcasting.spell_slots"]
    );

    let kinds = group_by_kind(&changes);
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0].name, "added");
    assert_eq!(kinds[0].priority, ChangePriority::High);
}

#[test]
fn test_deduplicate_leaves_unique_paths() {
    let mut changes = detected();
    let copies = changes.clone();
    changes.extend(copies);
    let total = changes.len();

    let kept = deduplicate(changes);
    assert_eq!(kept.len(), total / 2);
    let unique: HashSet<&str> = kept.iter().map(|c| c.field_path.as_str()).collect();
    assert_eq!(unique.len(), kept.len());
}

#[test]
fn test_merge_consecutive_collapses_a_hit_point_run() {
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let step = |old: i64, new: i64, minute: i64| {
        FieldChange::new(
            "character_info.hit_points",
            Some(json!(old)),
            Some(json!(new)),
            ChangeKind::Decremented,
            ChangeCategory::BasicInfo,
        )
        .with_priority(ChangePriority::Medium)
        .with_detected_at(t0 + Duration::minutes(minute))
    };
    let heal = FieldChange::new(
        "character_info.hit_points",
        Some(json!(10)),
        Some(json!(22)),
        ChangeKind::Incremented,
        ChangeCategory::BasicInfo,
    )
    .with_detected_at(t0 + Duration::minutes(30));

    let merged = merge_consecutive(vec![step(22, 18, 1), step(18, 10, 2), heal]);

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].old_value, Some(json!(22)));
    assert_eq!(merged[0].new_value, Some(json!(10)));
    assert_eq!(merged[0].metadata.get_f64(META_MERGED_COUNT), Some(2.0));
    assert_eq!(merged[1].change_kind, ChangeKind::Incremented);
}
