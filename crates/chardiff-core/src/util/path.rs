//! Dotted-path helpers.
//!
//! Every function is total: malformed input yields empty results rather
//! than errors.

/// Segment separator for field paths
pub const SEPARATOR: char = '.';

/// Trim and drop empty segments, so `" .combat..armor_class. "` becomes
/// `combat.armor_class`.
pub fn normalize(path: &str) -> String {
    path.split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

pub fn split(path: &str) -> Vec<String> {
    path.split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<String> = segments
        .iter()
        .map(|s| normalize(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect();
    parts.join(".")
}

/// Parent path, `None` for a single-segment (or empty) path.
pub fn parent(path: &str) -> Option<String> {
    let segments = split(path);
    if segments.len() < 2 {
        return None;
    }
    Some(segments[..segments.len() - 1].join("."))
}

/// Last segment, `None` for an empty path.
pub fn leaf(path: &str) -> Option<String> {
    split(path).pop()
}

pub fn depth(path: &str) -> usize {
    split(path).len()
}

/// Glob-style match of `path` against `pattern`.
///
/// `*` matches any run of characters (separators included) and `?` matches
/// exactly one character. Both sides are normalized first.
pub fn matches_pattern(path: &str, pattern: &str) -> bool {
    let text: Vec<char> = normalize(path).chars().collect();
    let pat: Vec<char> = normalize(pattern).chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_t = 0usize;

    while t < text.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(s) = star {
            // backtrack: let the last star absorb one more character
            p = s + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

/// True when `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    let path_segments = split(path);
    let ancestor_segments = split(ancestor);
    !ancestor_segments.is_empty()
        && path_segments.len() > ancestor_segments.len()
        && path_segments[..ancestor_segments.len()] == ancestor_segments[..]
}

/// Longest common segment prefix of all paths; empty when there is none.
pub fn common_prefix<S: AsRef<str>>(paths: &[S]) -> String {
    let mut iter = paths.iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let mut prefix = split(first.as_ref());
    for p in iter {
        let segments = split(p.as_ref());
        let shared = prefix
            .iter()
            .zip(segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(shared);
        if prefix.is_empty() {
            break;
        }
    }
    prefix.join(".")
}

/// Number of leading segments two paths share.
pub fn shared_prefix_len(a: &str, b: &str) -> usize {
    split(a)
        .iter()
        .zip(split(b).iter())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Segments that differ between two paths, counted from both sides after
/// their common prefix. `a.b.c` vs `a.b.d` is 2; `a.b` vs `a.b.c` is 1.
pub fn segment_distance(a: &str, b: &str) -> usize {
    let shared = shared_prefix_len(a, b);
    (depth(a) - shared) + (depth(b) - shared)
}

/// Slug a display name into a single path segment.
///
/// `"Sleight of Hand"` becomes `sleight_of_hand`; separators and other
/// punctuation collapse into single underscores.
pub fn segment_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_underscore = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_underscore && !key.is_empty() {
                key.push('_');
            }
            pending_underscore = false;
            key.extend(ch.to_lowercase());
        } else {
            pending_underscore = true;
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize(" .combat..armor_class. "), "combat.armor_class");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("..."), "");
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(split("a..b.c"), vec!["a", "b", "c"]);
        assert_eq!(join(&["a", "", "b.c"]), "a.b.c");
        assert!(split("").is_empty());
    }

    #[test]
    fn test_parent_and_leaf() {
        assert_eq!(parent("combat.attacks.dagger"), Some("combat.attacks".to_string()));
        assert_eq!(parent("combat"), None);
        assert_eq!(leaf("combat.attacks.dagger"), Some("dagger".to_string()));
        assert_eq!(leaf(""), None);
    }

    #[test]
    fn test_glob_matching() {
        assert!(matches_pattern("combat.armor_class", "combat.*"));
        assert!(matches_pattern("combat.attacks.dagger.damage", "combat.*"));
        assert!(matches_pattern("spellcasting.spell_slots.1", "spellcasting.spell_slots.?"));
        assert!(!matches_pattern("spellcasting.spell_slots.10", "spellcasting.spell_slots.?"));
        assert!(matches_pattern("skills.arcana.expertise", "skills.*.expertise"));
        assert!(!matches_pattern("skills.arcana.bonus", "skills.*.expertise"));
        assert!(matches_pattern("anything", "*"));
        assert!(!matches_pattern("combat", "combat.*"));
    }

    #[test]
    fn test_descendant() {
        assert!(is_descendant("combat.attacks.dagger", "combat"));
        assert!(!is_descendant("combat", "combat"));
        assert!(!is_descendant("combatant.x", "combat"));
        assert!(!is_descendant("combat.x", ""));
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(
            common_prefix(&["combat.attacks.dagger", "combat.attacks.bow", "combat.attacks"]),
            "combat.attacks"
        );
        assert_eq!(common_prefix(&["combat.x", "skills.y"]), "");
        assert_eq!(common_prefix::<&str>(&[]), "");
    }

    #[test]
    fn test_segment_distance() {
        assert_eq!(segment_distance("a.b.c", "a.b.d"), 2);
        assert_eq!(segment_distance("a.b", "a.b.c"), 1);
        assert_eq!(segment_distance("a.b", "a.b"), 0);
        assert_eq!(segment_distance("x.y", "z"), 3);
    }

    #[test]
    fn test_segment_key() {
        assert_eq!(segment_key("Sleight of Hand"), "sleight_of_hand");
        assert_eq!(segment_key("  Potion of Healing (Greater) "), "potion_of_healing_greater");
        assert_eq!(segment_key("+1 Longsword"), "1_longsword");
        assert_eq!(segment_key("..."), "");
    }
}
