//! MySQL quoting and placeholder substitution.
//!
//! These follow the text-protocol rules of the `mysql` client family so the
//! SQL reported back in [`QueryResult::sql`](crate::models::QueryResult) is
//! byte-for-byte what the server received:
//!
//! - values: `NULL`, `true`/`false`, numbers verbatim, strings single-quoted
//!   with backslash escapes, bytes as `X'..'`, dates quoted
//! - identifiers: backtick-quoted, inner backticks doubled, `.` splitting
//!   qualified names
//! - templates: `??` takes an identifier, `?` a value, runs of three or more
//!   `?` are left alone

use crate::models::SqlValue;

/// Quote a value for inclusion in SQL text.
pub fn escape_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(v) => v.to_string(),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::UInt(v) => v.to_string(),
        SqlValue::Float(v) if v.is_finite() => v.to_string(),
        SqlValue::Float(_) => "NULL".to_string(),
        SqlValue::String(s) => escape_string(s),
        SqlValue::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                out.push_str(&format!("{:02x}", b));
            }
            out.push('\'');
            out
        }
        SqlValue::DateTime(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%.3f")),
        SqlValue::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        SqlValue::List(items) => items
            .iter()
            .map(|item| match item {
                SqlValue::List(_) => format!("({})", escape_value(item)),
                _ => escape_value(item),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Quote a string literal.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Quote a (possibly qualified) identifier: `db.table` becomes `` `db`.`table` ``.
pub fn escape_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        match c {
            '`' => out.push_str("``"),
            '.' => out.push_str("`.`"),
            _ => out.push(c),
        }
    }
    out.push('`');
    out
}

/// Quote an identifier taken from a placeholder value. Lists expand to a
/// comma-separated identifier list.
fn escape_identifier_value(value: &SqlValue) -> String {
    match value {
        SqlValue::List(items) => items
            .iter()
            .map(escape_identifier_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => escape_identifier(&other.to_plain_string()),
    }
}

/// Placeholder runs in `template` as `(start, len)`, where `len` is 1 for a
/// value and 2 for an identifier. Runs of three or more `?` are skipped.
fn placeholders(template: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    let bytes = template.as_bytes();
    let mut i = 0;
    std::iter::from_fn(move || {
        while i < bytes.len() {
            if bytes[i] != b'?' {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && bytes[i] == b'?' {
                i += 1;
            }
            if i - start <= 2 {
                return Some((start, i - start));
            }
        }
        None
    })
}

/// Whether [`format`] would fill a `??` placeholder of `template` when given
/// `count` values.
///
/// Like [`format`], this does not look inside quoted literals.
pub fn has_identifier_placeholder(template: &str, count: usize) -> bool {
    placeholders(template).take(count).any(|(_, len)| len == 2)
}

/// Substitute `??` (identifier) and `?` (value) placeholders left to right.
///
/// Placeholders beyond the supplied values stay in the output untouched.
pub fn format(template: &str, values: &[SqlValue]) -> String {
    if values.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len() + values.len() * 8);
    let mut chunk_start = 0;

    for ((start, len), value) in placeholders(template).zip(values) {
        out.push_str(&template[chunk_start..start]);
        if len == 2 {
            out.push_str(&escape_identifier_value(value));
        } else {
            out.push_str(&escape_value(value));
        }
        chunk_start = start + len;
    }

    out.push_str(&template[chunk_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_escape_value_string() {
        assert_eq!(escape_value(&"value".into()), "'value'");
        assert_eq!(
            escape_value(&"it's a \"test\"\n\\".into()),
            r#"'it\'s a \"test\"\n\\'"#
        );
        assert_eq!(escape_value(&"\0\u{1a}\t\r\u{8}".into()), r"'\0\Z\t\r\b'");
    }

    #[test]
    fn test_escape_value_scalars() {
        assert_eq!(escape_value(&SqlValue::Null), "NULL");
        assert_eq!(escape_value(&true.into()), "true");
        assert_eq!(escape_value(&10.into()), "10");
        assert_eq!(escape_value(&55.5.into()), "55.5");
        assert_eq!(escape_value(&f64::NAN.into()), "NULL");
        assert_eq!(escape_value(&vec![0xde_u8, 0xad].into()), "X'dead'");
    }

    #[test]
    fn test_escape_value_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let dt = date.and_hms_milli_opt(13, 5, 9, 42).unwrap();
        assert_eq!(escape_value(&dt.into()), "'2024-02-29 13:05:09.042'");
        assert_eq!(escape_value(&date.into()), "'2024-02-29'");
    }

    #[test]
    fn test_escape_value_lists() {
        let list = SqlValue::List(vec![1.into(), "a".into()]);
        assert_eq!(escape_value(&list), "1, 'a'");

        let nested = SqlValue::List(vec![
            SqlValue::List(vec![1.into(), 2.into()]),
            SqlValue::List(vec![3.into(), 4.into()]),
        ]);
        assert_eq!(escape_value(&nested), "(1, 2), (3, 4)");
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("value"), "`value`");
        assert_eq!(escape_identifier("db.table"), "`db`.`table`");
        assert_eq!(escape_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_format_identifiers_and_values() {
        let sql = format(
            "SELECT * FROM ?? WHERE ?? = ?",
            &["users".into(), "id".into(), 10.into()],
        );
        assert_eq!(sql, "SELECT * FROM `users` WHERE `id` = 10");
    }

    #[test]
    fn test_format_escapes_strings() {
        let sql = format("SELECT * FROM t WHERE name = ?", &["O'Brien".into()]);
        assert_eq!(sql, r"SELECT * FROM t WHERE name = 'O\'Brien'");
    }

    #[test]
    fn test_format_leaves_surplus_placeholders() {
        assert_eq!(format("a = ? AND b = ?", &[1.into()]), "a = 1 AND b = ?");
        assert_eq!(format("a = ?", &[]), "a = ?");
    }

    #[test]
    fn test_format_skips_long_runs() {
        assert_eq!(format("x ??? y ?", &[1.into()]), "x ??? y 1");
    }

    #[test]
    fn test_has_identifier_placeholder() {
        assert!(has_identifier_placeholder("SELECT * FROM ?? WHERE id = ?", 2));
        assert!(!has_identifier_placeholder("SELECT * FROM t WHERE id = ?", 1));
        assert!(!has_identifier_placeholder("SELECT '???' , ?", 1));
        assert!(!has_identifier_placeholder("a = ? AND b = ??", 1));
    }

    #[test]
    fn test_format_identifier_list() {
        let sql = format(
            "SELECT ?? FROM t",
            &[SqlValue::List(vec!["a".into(), "b".into()])],
        );
        assert_eq!(sql, "SELECT `a`, `b` FROM t");
    }

    #[test]
    fn test_format_handles_multibyte_text() {
        let sql = format("SELECT 'üñí' , ?", &["ç".into()]);
        assert_eq!(sql, "SELECT 'üñí' , 'ç'");
    }
}
