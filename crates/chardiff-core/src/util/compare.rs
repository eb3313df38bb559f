//! Type-aware value comparison.
//!
//! `None` and JSON `null` both mean "absent" throughout this module.

use crate::model::ChangeKind;
use serde_json::Value;

/// Tolerance for numeric equality
pub const EPSILON: f64 = 1e-9;

pub fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Structural equality with numeric tolerance.
///
/// Numbers compare within [`EPSILON`], strings compare after trimming,
/// arrays element-wise and objects key-wise (recursively). Values of
/// different JSON types are never equal.
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (present(a), present(b)) {
        (None, None) => true,
        (Some(a), Some(b)) => json_equal(a, b),
        _ => false,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= EPSILON,
            _ => x == y,
        },
        (Value::String(x), Value::String(y)) => x.trim() == y.trim(),
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| json_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => x
            .keys()
            .chain(y.keys())
            .all(|k| values_equal(x.get(k), y.get(k))),
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

/// Infer the kind of a change between two values.
///
/// Added when only `new` is present, Removed when only `old` is, and
/// Incremented/Decremented for numbers that moved. Everything else
/// (including equal inputs) is Modified; callers check equality first.
pub fn infer_change_kind(old: Option<&Value>, new: Option<&Value>) -> ChangeKind {
    match (present(old), present(new)) {
        (None, Some(_)) => ChangeKind::Added,
        (Some(_), None) => ChangeKind::Removed,
        (Some(o), Some(n)) => match (o.as_f64(), n.as_f64()) {
            (Some(o), Some(n)) if n - o > EPSILON => ChangeKind::Incremented,
            (Some(o), Some(n)) if o - n > EPSILON => ChangeKind::Decremented,
            _ => ChangeKind::Modified,
        },
        (None, None) => ChangeKind::Modified,
    }
}

/// `Some(kind)` when the values differ, `None` when they are equal.
pub fn detect_change(old: Option<&Value>, new: Option<&Value>) -> Option<ChangeKind> {
    if values_equal(old, new) {
        None
    } else {
        Some(infer_change_kind(old, new))
    }
}

/// Size of a change.
///
/// Absolute delta for numbers, absolute length delta (in characters) for
/// strings, absolute size delta for arrays and objects. `None` when either
/// side is absent or the types are incompatible; downstream consumers treat
/// that as "no magnitude available", never as zero.
pub fn magnitude(old: Option<&Value>, new: Option<&Value>) -> Option<f64> {
    let (old, new) = (present(old)?, present(new)?);
    match (old, new) {
        (Value::Number(_), Value::Number(_)) => Some((new.as_f64()? - old.as_f64()?).abs()),
        (Value::String(o), Value::String(n)) => {
            Some((n.chars().count() as f64 - o.chars().count() as f64).abs())
        }
        (Value::Array(o), Value::Array(n)) => Some((n.len() as f64 - o.len() as f64).abs()),
        (Value::Object(o), Value::Object(n)) => Some((n.len() as f64 - o.len() as f64).abs()),
        _ => None,
    }
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.fract().abs() < EPSILON && value.abs() < 1e15 {
        format!("{}", value.round() as i64)
    } else {
        format!("{}", value)
    }
}

/// Signed delta with an explicit `+` for increases, e.g. `+3` or `-2`.
pub fn format_delta(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{}", format_number(delta))
    } else {
        format_number(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_equality_with_tolerance() {
        assert!(values_equal(Some(&json!(1.0)), Some(&json!(1))));
        assert!(values_equal(Some(&json!(0.1 + 0.2)), Some(&json!(0.3))));
        assert!(!values_equal(Some(&json!(1)), Some(&json!(2))));
    }

    #[test]
    fn test_string_equality_trims() {
        assert!(values_equal(Some(&json!(" Wizard ")), Some(&json!("Wizard"))));
        assert!(!values_equal(Some(&json!("Wizard")), Some(&json!("wizard"))));
    }

    #[test]
    fn test_absent_and_null_are_equal() {
        assert!(values_equal(None, Some(&Value::Null)));
        assert!(values_equal(Some(&json!({"a": null})), Some(&json!({}))));
        assert!(!values_equal(None, Some(&json!(0))));
    }

    #[test]
    fn test_nested_equality() {
        let a = json!({"attacks": [{"name": "Dagger", "bonus": 5}], "ac": 15});
        let b = json!({"ac": 15.0, "attacks": [{"bonus": 5, "name": "Dagger "}]});
        assert!(values_equal(Some(&a), Some(&b)));
        let c = json!({"ac": 15, "attacks": [{"name": "Dagger", "bonus": 6}]});
        assert!(!values_equal(Some(&a), Some(&c)));
    }

    #[test]
    fn test_type_mismatch_is_unequal() {
        assert!(!values_equal(Some(&json!(1)), Some(&json!("1"))));
        assert!(!values_equal(Some(&json!([1])), Some(&json!(1))));
    }

    #[test]
    fn test_infer_change_kind() {
        assert_eq!(infer_change_kind(None, Some(&json!(1))), ChangeKind::Added);
        assert_eq!(infer_change_kind(Some(&json!(1)), None), ChangeKind::Removed);
        assert_eq!(infer_change_kind(Some(&json!(1)), Some(&json!(3))), ChangeKind::Incremented);
        assert_eq!(infer_change_kind(Some(&json!(3)), Some(&json!(1))), ChangeKind::Decremented);
        assert_eq!(infer_change_kind(Some(&json!("a")), Some(&json!("b"))), ChangeKind::Modified);
        assert_eq!(infer_change_kind(Some(&Value::Null), Some(&json!("b"))), ChangeKind::Added);
    }

    #[test]
    fn test_magnitude() {
        assert_eq!(magnitude(Some(&json!(15)), Some(&json!(18))), Some(3.0));
        assert_eq!(magnitude(Some(&json!("abc")), Some(&json!("a"))), Some(2.0));
        assert_eq!(magnitude(Some(&json!([1, 2])), Some(&json!([1, 2, 3, 4]))), Some(2.0));
        assert_eq!(magnitude(Some(&json!({"a": 1})), Some(&json!({}))), Some(1.0));
        assert_eq!(magnitude(Some(&json!(1)), Some(&json!([1]))), None);
        assert_eq!(magnitude(None, Some(&json!(5))), None);
        assert_eq!(magnitude(Some(&json!(true)), Some(&json!(false))), None);
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(3.0), "+3");
        assert_eq!(format_delta(-2.0), "-2");
        assert_eq!(format_delta(1.5), "+1.5");
        assert_eq!(format_number(18.0), "18");
    }
}
