//! One-line text summary of a change set.

use crate::model::{ChangePriority, CharacterChangeSet, FieldChange};

/// Number of descriptions quoted in a summary
pub const MAX_HIGHLIGHTS: usize = 3;

const PRIORITY_ORDER: [ChangePriority; 4] = [
    ChangePriority::Critical,
    ChangePriority::High,
    ChangePriority::Medium,
    ChangePriority::Low,
];

/// Render the summary stored on [`CharacterChangeSet::summary`].
///
/// Shape: `"7 changes (1 critical, 2 high, 4 low): desc; desc; desc"`.
/// Highlights are the highest-priority changes, ties kept in set order.
pub fn render_summary(set: &CharacterChangeSet) -> String {
    if set.changes.is_empty() {
        return "No changes detected.".to_string();
    }

    let counts = set.count_by_priority();
    let breakdown: Vec<String> = PRIORITY_ORDER
        .iter()
        .filter_map(|p| counts.get(p).map(|n| format!("{} {}", n, p.as_str())))
        .collect();

    let mut ranked: Vec<&FieldChange> = set.changes.iter().collect();
    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));
    let highlights: Vec<&str> = ranked
        .into_iter()
        .take(MAX_HIGHLIGHTS)
        .map(|c| c.description.as_deref().unwrap_or(c.field_path.as_str()))
        .collect();

    let noun = if set.changes.len() == 1 { "change" } else { "changes" };
    format!(
        "{} {} ({}): {}",
        set.changes.len(),
        noun,
        breakdown.join(", "),
        highlights.join("; ")
    )
}
