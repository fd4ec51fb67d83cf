//! Boundary coercion helpers shared by the resource handlers.
//!
//! Request bodies arrive as loosely typed JSON: numeric fields may be sent
//! as numbers or numeric strings, and "absent", "null" and "empty string"
//! all have distinct meanings for patch bodies. Handlers deserialize each
//! body into a DTO of `Option<Value>` fields (absent = `None`, explicit
//! null = `Some(Value::Null)`) and use these helpers to build typed values.

use serde::Deserialize;
use serde_json::Value;

/// Deserializer for optional JSON body fields that must distinguish an absent
/// key from an explicit `null`. Used with
/// `#[serde(default, deserialize_with = "present_option")]`: an absent field
/// falls back to `None`, while a field that is present — even as `null` —
/// becomes `Some(..)`, preserving `Some(Value::Null)`. This realizes the
/// "absent = `None`, explicit null = `Some(Value::Null)`" contract described
/// in the module docs, which plain `Option<Value>` does not (serde collapses
/// an explicit `null` to `None`).
pub fn present_option<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  Value::deserialize(deserializer).map(Some)
}

/// JavaScript-style truthiness over a JSON value. Null, false, 0, NaN and
/// the empty string are falsy; everything else (arrays and objects
/// included) is truthy.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

/// Trimmed non-empty string, or None for absent/null/non-string/blank
/// input.
pub fn non_empty_string(value: Option<&Value>) -> Option<String> {
  let s = value?.as_str()?.trim();
  if s.is_empty() {
    return None;
  }
  Some(s.to_string())
}

/// Trimmed string for a field that stores NULL when blank: a non-empty
/// trimmed string survives, everything else collapses to None.
pub fn nullable_trimmed(value: &Value) -> Option<String> {
  non_empty_string(Some(value))
}

/// Numeric coercion: JSON numbers pass through, strings are parsed.
pub fn coerce_f64(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
    _ => None,
  }
}

/// Integer coercion: JSON integers pass through, strings are parsed.
pub fn coerce_i64(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.trim().parse::<i64>().ok(),
    _ => None,
  }
}

/// Strictly-typed JSON number (no string coercion).
pub fn strict_f64(value: &Value) -> Option<f64> {
  value.as_f64()
}

/// Strictly-typed JSON integer (no string coercion). Rejects fractional
/// numbers.
pub fn strict_i64(value: &Value) -> Option<i64> {
  value.as_i64()
}

/// Pagination limit: parsed from the raw query string, falling back to
/// `default` and capped at 100.
pub fn parse_limit(raw: Option<&str>, default: i64) -> i64 {
  raw
    .and_then(|s| s.parse::<i64>().ok())
    .unwrap_or(default)
    .min(100)
}

/// Pagination offset: parsed from the raw query string, defaulting to 0.
pub fn parse_offset(raw: Option<&str>) -> i64 {
  raw.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0).max(0)
}

/// Numeric id query parameter.
pub fn parse_id_param(raw: &str) -> Option<i64> {
  raw.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn truthiness_follows_js_rules() {
    assert!(!is_truthy(&Value::Null));
    assert!(!is_truthy(&json!(false)));
    assert!(!is_truthy(&json!(0)));
    assert!(!is_truthy(&json!("")));
    assert!(is_truthy(&json!("0")));
    assert!(is_truthy(&json!(1)));
    assert!(is_truthy(&json!([])));
    assert!(is_truthy(&json!({})));
  }

  #[test]
  fn non_empty_string_trims_and_rejects_blank() {
    assert_eq!(non_empty_string(Some(&json!("  Blocks  "))), Some("Blocks".to_string()));
    assert_eq!(non_empty_string(Some(&json!("   "))), None);
    assert_eq!(non_empty_string(Some(&json!(42))), None);
    assert_eq!(non_empty_string(Some(&Value::Null)), None);
    assert_eq!(non_empty_string(None), None);
  }

  #[test]
  fn coerce_f64_accepts_numbers_and_numeric_strings() {
    assert_eq!(coerce_f64(&json!(299)), Some(299.0));
    assert_eq!(coerce_f64(&json!("299.5")), Some(299.5));
    assert_eq!(coerce_f64(&json!(" 10 ")), Some(10.0));
    assert_eq!(coerce_f64(&json!("abc")), None);
    assert_eq!(coerce_f64(&json!(true)), None);
  }

  #[test]
  fn coerce_i64_accepts_integers_and_integer_strings() {
    assert_eq!(coerce_i64(&json!(7)), Some(7));
    assert_eq!(coerce_i64(&json!("7")), Some(7));
    assert_eq!(coerce_i64(&json!(2.5)), None);
    assert_eq!(coerce_i64(&json!("2.5")), None);
  }

  #[test]
  fn strict_numbers_reject_strings() {
    assert_eq!(strict_f64(&json!("100")), None);
    assert_eq!(strict_f64(&json!(100)), Some(100.0));
    assert_eq!(strict_i64(&json!(2.5)), None);
    assert_eq!(strict_i64(&json!(3)), Some(3));
  }

  #[test]
  fn limit_defaults_and_caps() {
    assert_eq!(parse_limit(None, 50), 50);
    assert_eq!(parse_limit(Some("20"), 50), 20);
    assert_eq!(parse_limit(Some("500"), 50), 100);
    assert_eq!(parse_limit(Some("nope"), 20), 20);
  }

  #[test]
  fn offset_defaults_to_zero() {
    assert_eq!(parse_offset(None), 0);
    assert_eq!(parse_offset(Some("30")), 30);
    assert_eq!(parse_offset(Some("-5")), 0);
    assert_eq!(parse_offset(Some("x")), 0);
  }

  #[test]
  fn id_param_requires_an_integer() {
    assert_eq!(parse_id_param("5"), Some(5));
    assert_eq!(parse_id_param(" 5 "), Some(5));
    assert_eq!(parse_id_param("abc"), None);
    assert_eq!(parse_id_param(""), None);
  }
}
