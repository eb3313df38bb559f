#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chardiff_core::analysis::priority::META_BATCH_ADJUSTMENT;
use chardiff_core::detectors::{ChangeDetector, CompositeDetector};
use chardiff_core::{
    ChangeCategory, ChangeKind, ChangePriority, DetectionContext, FieldChange, PriorityAnalyzer,
    SignificanceAnalyzer, SignificanceLevel,
};
use common::{base_character, CharacterBuilder};
use serde_json::{json, Value};

fn detect_and_prioritize(old: &Value, new: &Value, ctx: &DetectionContext) -> Vec<FieldChange> {
    let mut changes = CompositeDetector::with_default_detectors()
        .detect(old, new, ctx)
        .unwrap();
    PriorityAnalyzer::default().prioritize(&mut changes, ctx);
    changes
}

fn priority_of(changes: &[FieldChange], field_path: &str) -> ChangePriority {
    changes
        .iter()
        .find(|c| c.field_path == field_path)
        .map(|c| c.priority)
        .unwrap_or_else(|| panic!("no change at {}", field_path))
}

#[test]
fn test_scored_priorities_across_domains() {
    let old = base_character();
    let new = CharacterBuilder::new()
        .set("character_info.level", json!(5))
        .set("combat.armor_class", json!(15))
        .set("abilities.strength", json!(9))
        .set("abilities.dexterity", json!(17))
        .set("spellcasting.spell_slots.1", json!(5))
        .set("spellcasting.spell_slots.3", json!(2))
        .set("features.feats", json!(["War Caster"]))
        .set("equipment.2.quantity", json!(4))
        .build();
    let changes = detect_and_prioritize(&old, &new, &DetectionContext::default());

    assert_eq!(priority_of(&changes, "character_info.level"), ChangePriority::Critical);
    assert_eq!(priority_of(&changes, "combat.armor_class"), ChangePriority::High);
    assert_eq!(priority_of(&changes, "abilities.strength"), ChangePriority::Medium);
    assert_eq!(priority_of(&changes, "abilities.dexterity"), ChangePriority::High);
    assert_eq!(priority_of(&changes, "spellcasting.spell_slots.1"), ChangePriority::High);
    assert_eq!(priority_of(&changes, "spellcasting.spell_slots.3"), ChangePriority::Medium);
    assert_eq!(priority_of(&changes, "features.feats.war_caster"), ChangePriority::High);
    assert_eq!(priority_of(&changes, "equipment.torch.quantity"), ChangePriority::Low);
}

#[test]
fn test_batch_of_25_steps_down_one_level() {
    let analyzer = PriorityAnalyzer::default();
    let before = [ChangePriority::Medium, ChangePriority::High, ChangePriority::Low];
    let mut changes: Vec<FieldChange> = (0..25)
        .map(|i| {
            FieldChange::new(
                format!("equipment.item_{}", i),
                None,
                Some(json!(1)),
                ChangeKind::Added,
                ChangeCategory::Equipment,
            )
            .with_priority(before[i % before.len()])
        })
        .collect();
    let original: Vec<ChangePriority> = changes.iter().map(|c| c.priority).collect();

    analyzer.adjust_batch(&mut changes);

    for (change, was) in changes.iter().zip(original) {
        if was == ChangePriority::Low {
            assert_eq!(change.priority, ChangePriority::Low);
            assert!(!change.metadata.contains_key(META_BATCH_ADJUSTMENT));
        } else {
            assert_eq!(change.priority, was.step_down());
        }
    }
}

#[test]
fn test_level_up_flag_lifts_the_context_signal() {
    let analyzer = PriorityAnalyzer::default();
    let change = FieldChange::new(
        "skills.stealth.proficiency",
        None,
        Some(json!(true)),
        ChangeKind::Added,
        ChangeCategory::Skills,
    )
    .with_priority(ChangePriority::Medium);

    let calm = analyzer.explain(&change, &DetectionContext::default());
    let levelling = analyzer.explain(&change, &DetectionContext::default().with_flag("level_up", true));
    assert_eq!(calm.context, ChangePriority::Medium);
    assert_eq!(levelling.context, ChangePriority::High);
    assert!(levelling.score > calm.score);

    let resting = analyzer.explain(&change, &DetectionContext::default().with_flag("long_rest", true).with_flag("bulk_update", true));
    assert_eq!(resting.context, ChangePriority::Low);
}

#[test]
fn test_significance_of_detected_changes() {
    let old = base_character();
    let new = CharacterBuilder::new()
        .set("combat.armor_class", json!(15))
        .set("features.feats", json!(["War Caster"]))
        .build();
    let ctx = DetectionContext::default();
    let mut changes = detect_and_prioritize(&old, &new, &ctx);
    let analyzer = SignificanceAnalyzer::default();
    analyzer.annotate(&mut changes, &ctx);

    assert!(changes
        .iter()
        .all(|c| c.significance == Some(SignificanceLevel::Major)));
    let summary = analyzer.summarize(&changes, &ctx);
    assert_eq!(summary.overall, SignificanceLevel::Major);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.significant, 2);
}

#[test]
fn test_level_up_is_critically_significant() {
    let old = base_character();
    let new = CharacterBuilder::new()
        .set("character_info.level", json!(5))
        .build();
    let ctx = DetectionContext::default();
    let changes = detect_and_prioritize(&old, &new, &ctx);
    let analyzer = SignificanceAnalyzer::default();

    assert_eq!(analyzer.analyze(&changes[0], &ctx), SignificanceLevel::Critical);
    assert_eq!(analyzer.overall(&changes, &ctx), SignificanceLevel::Critical);
}

#[test]
fn test_filter_significant_keeps_order() {
    let ctx = DetectionContext::default();
    let analyzer = SignificanceAnalyzer::default();
    let changes = vec![
        FieldChange::new(
            "combat.armor_class",
            Some(json!(12)),
            Some(json!(15)),
            ChangeKind::Incremented,
            ChangeCategory::Combat,
        )
        .with_priority(ChangePriority::High),
        FieldChange::new(
            "character_info.level",
            Some(json!(4)),
            Some(json!(5)),
            ChangeKind::Incremented,
            ChangeCategory::Progression,
        )
        .with_priority(ChangePriority::Critical),
    ];

    let kept = analyzer.filter_significant(changes.clone(), SignificanceLevel::Critical, &ctx);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].field_path, "character_info.level");

    let all = analyzer.filter_significant(changes, SignificanceLevel::Trivial, &ctx);
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].field_path, "combat.armor_class");
}
