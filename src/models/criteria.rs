//! Criteria and field lists used to build WHERE, SET and VALUES clauses.

use crate::models::query::SqlValue;
use serde_json::Value as JsonValue;

/// Right-hand side of a `column = ...` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Escaped through the MySQL quoting rules.
    Value(SqlValue),
    /// Caller-trusted SQL fragment inserted verbatim, e.g. `ENCRYPT('secret')`.
    Literal(String),
}

impl Operand {
    pub fn literal(sql: impl Into<String>) -> Self {
        Self::Literal(sql.into())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

macro_rules! impl_operand_from {
    ($($t:ty),+ $(,)?) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(v.into())
                }
            }
        )+
    };
}

impl_operand_from!(
    SqlValue,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    &str,
    String,
    &String,
    Vec<u8>,
    Vec<SqlValue>,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
    JsonValue,
    &JsonValue,
);

impl<T: Into<SqlValue>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(v.into())
    }
}

/// Ordered `column -> operand` pairs.
///
/// Order is preserved: it is the order of predicates in a WHERE clause and of
/// columns in INSERT/UPDATE statements. Setting a column twice replaces the
/// earlier operand in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Operand)>,
}

/// WHERE-clause criteria share the field list representation.
pub type Criteria = Fields;

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.insert(column, value);
        self
    }

    /// Alias of [`Fields::with`] that reads naturally for criteria.
    pub fn eq(self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.with(column, value)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Operand>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Operand> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Operand)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Operand>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Fields
where
    K: Into<String>,
    V: Into<Operand>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// A JSON object (for example a row read back from the database).
impl From<serde_json::Map<String, JsonValue>> for Fields {
    fn from(map: serde_json::Map<String, JsonValue>) -> Self {
        map.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_preserves_order() {
        let fields = Fields::new().with("b", 1).with("a", 2).with("c", 3);
        let columns: Vec<&str> = fields.columns().collect();
        assert_eq!(columns, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let fields = Fields::new().with("a", 1).with("b", 2).with("a", 9);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("a"), Some(&Operand::Value(SqlValue::Int(9))));
        assert_eq!(fields.columns().next(), Some("a"));
    }

    #[test]
    fn test_literal_operand() {
        let criteria = Criteria::new()
            .eq("user", "bob")
            .eq("password", Operand::literal("ENCRYPT('secret')"));
        assert!(!criteria.get("user").unwrap().is_literal());
        assert!(criteria.get("password").unwrap().is_literal());
    }

    #[test]
    fn test_from_array_and_json() {
        let fields = Fields::from([("id", 1), ("position", 2)]);
        assert_eq!(fields.len(), 2);

        let json = json!({"field_char": "x", "field_int": 33});
        let fields = Fields::from(json.as_object().unwrap().clone());
        assert_eq!(
            fields.get("field_int"),
            Some(&Operand::Value(SqlValue::Int(33)))
        );
    }
}
