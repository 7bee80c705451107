//! Interpretation of single result values as booleans and numbers.
//!
//! Decoded rows carry integers as JSON numbers, DECIMAL columns as strings and
//! text as strings, so each reader accepts all of those shapes.

use crate::error::{DbError, DbResult};
use serde_json::Value as JsonValue;

/// `true/yes/y/1` and `false/no/n/0`, case-insensitive. Anything else is `None`.
pub fn interpret_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integer value, truncating fractional parts. NULL and `""` are `None`.
pub fn interpret_integer(value: &JsonValue) -> DbResult<Option<i64>> {
    let Some(number) = numeric(value)? else {
        return Ok(None);
    };
    match number {
        Numeric::Int(v) => Ok(Some(v)),
        Numeric::Float(v) if v.is_finite() && v.abs() < i64::MAX as f64 => Ok(Some(v.trunc() as i64)),
        Numeric::Float(v) => Err(DbError::invalid_input(format!(
            "Value {} does not fit in an integer",
            v
        ))),
    }
}

/// Decimal value rounded half away from zero to `places` digits.
pub fn interpret_decimal(value: &JsonValue, places: u32) -> DbResult<Option<f64>> {
    let Some(number) = numeric(value)? else {
        return Ok(None);
    };
    let v = match number {
        Numeric::Int(v) => v as f64,
        Numeric::Float(v) => v,
    };
    Ok(Some(round_to(v, places)))
}

/// Round half away from zero.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places.min(15) as i32);
    (value * factor).round() / factor
}

enum Numeric {
    Int(i64),
    Float(f64),
}

fn numeric(value: &JsonValue) -> DbResult<Option<Numeric>> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Bool(b) => Ok(Some(Numeric::Int(i64::from(*b)))),
        JsonValue::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(Some(Numeric::Int(v)))
            } else {
                Ok(n.as_f64().map(Numeric::Float))
            }
        }
        JsonValue::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            if let Ok(v) = s.parse::<i64>() {
                return Ok(Some(Numeric::Int(v)));
            }
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| Some(Numeric::Float(v)))
                .ok_or_else(|| DbError::invalid_input(format!("Value {:?} is not numeric", s)))
        }
        other => Err(DbError::invalid_input(format!(
            "Value {} is not numeric",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interpret_bool() {
        for v in [json!("true"), json!("YES"), json!("y"), json!("1"), json!(1), json!(true)] {
            assert_eq!(interpret_bool(&v), Some(true), "{v}");
        }
        for v in [json!("false"), json!("No"), json!("N"), json!("0"), json!(0)] {
            assert_eq!(interpret_bool(&v), Some(false), "{v}");
        }
        for v in [json!("maybe"), json!(2), json!(null), json!("")] {
            assert_eq!(interpret_bool(&v), None, "{v}");
        }
    }

    #[test]
    fn test_interpret_integer() {
        assert_eq!(interpret_integer(&json!(10)).unwrap(), Some(10));
        assert_eq!(interpret_integer(&json!("42")).unwrap(), Some(42));
        assert_eq!(interpret_integer(&json!("12.7")).unwrap(), Some(12));
        assert_eq!(interpret_integer(&json!(null)).unwrap(), None);
        assert_eq!(interpret_integer(&json!("")).unwrap(), None);
        assert!(matches!(
            interpret_integer(&json!("abc")),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_interpret_decimal() {
        assert_eq!(interpret_decimal(&json!("99.9000"), 3).unwrap(), Some(99.9));
        assert_eq!(interpret_decimal(&json!(2.675), 0).unwrap(), Some(3.0));
        assert_eq!(interpret_decimal(&json!("-1.25"), 1).unwrap(), Some(-1.3));
        assert_eq!(interpret_decimal(&json!(7), 2).unwrap(), Some(7.0));
        assert_eq!(interpret_decimal(&json!(null), 2).unwrap(), None);
        assert!(interpret_decimal(&json!("1,5"), 2).is_err());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.5, 0), 1.0);
        assert_eq!(round_to(-0.5, 0), -1.0);
        assert_eq!(round_to(1.23456, 2), 1.23);
    }
}
