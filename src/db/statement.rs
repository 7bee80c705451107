//! SQL text builders for the CRUD helpers.
//!
//! Every builder is a pure function from table/criteria/values to SQL so the
//! generated statements can be checked without a server. Builders that would
//! otherwise emit an empty WHERE clause reject empty criteria up front.

use crate::db::escape::{escape_identifier, escape_value};
use crate::error::{DbError, DbResult};
use crate::models::{Criteria, Fields, Operand, SqlValue};

/// Render the right-hand side of a `column = ...` pair.
pub fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Value(v) => escape_value(v),
        Operand::Literal(sql) => sql.clone(),
    }
}

/// AND-joined equality predicates, one per criteria entry.
pub fn predicates(criteria: &Criteria) -> String {
    criteria
        .iter()
        .map(|(column, operand)| format!("{} = {}", escape_identifier(column), render_operand(operand)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn require_criteria(criteria: &Criteria, operation: &str) -> DbResult<()> {
    if criteria.is_empty() {
        return Err(DbError::invalid_input(format!(
            "{} requires at least one criteria column",
            operation
        )));
    }
    Ok(())
}

/// `SELECT * FROM t [WHERE ..] [ORDER BY ..] [LIMIT n]`.
///
/// `order_by` is inserted verbatim. A zero limit means no limit.
pub fn select(table: &str, criteria: &Criteria, limit: Option<u64>, order_by: Option<&str>) -> String {
    let mut sql = format!("SELECT * FROM {}", escape_identifier(table));

    if !criteria.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates(criteria));
    }

    if let Some(order_by) = order_by.map(str::trim).filter(|o| !o.is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }

    if let Some(limit) = limit.filter(|l| *l > 0) {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    sql
}

/// `SELECT COUNT(id) FROM t`.
pub fn count_all(table: &str) -> String {
    format!("SELECT COUNT(id) FROM {}", escape_identifier(table))
}

/// One INSERT per row, joined into a single `; `-separated batch.
pub fn insert(table: &str, rows: &[Fields]) -> DbResult<String> {
    if rows.is_empty() {
        return Err(DbError::invalid_input("Nothing to insert"));
    }

    let table = escape_identifier(table);
    let statements: Vec<String> = rows
        .iter()
        .map(|row| {
            let columns: Vec<String> = row.columns().map(escape_identifier).collect();
            let values: Vec<String> = row.iter().map(|(_, v)| render_operand(v)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                values.join(", ")
            )
        })
        .collect();

    Ok(statements.join("; "))
}

/// `UPDATE t SET a = .., b = .. WHERE ..`.
pub fn update(table: &str, criteria: &Criteria, values: &Fields) -> DbResult<String> {
    require_criteria(criteria, "UPDATE")?;
    if values.is_empty() {
        return Err(DbError::invalid_input("UPDATE requires at least one value"));
    }

    let set: Vec<String> = values
        .iter()
        .map(|(column, operand)| format!("{} = {}", escape_identifier(column), render_operand(operand)))
        .collect();

    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        escape_identifier(table),
        set.join(", "),
        predicates(criteria)
    ))
}

/// `DELETE FROM t WHERE ..`.
pub fn delete(table: &str, criteria: &Criteria) -> DbResult<String> {
    require_criteria(criteria, "DELETE")?;
    Ok(format!(
        "DELETE FROM {} WHERE {}",
        escape_identifier(table),
        predicates(criteria)
    ))
}

/// `SELECT COUNT(id) FROM t WHERE .. [AND id != x]`.
pub fn exists(table: &str, criteria: &Criteria, exclude_id: Option<&SqlValue>) -> DbResult<String> {
    require_criteria(criteria, "EXISTS")?;
    let mut sql = format!(
        "SELECT COUNT(id) FROM {} WHERE {}",
        escape_identifier(table),
        predicates(criteria)
    );
    if let Some(id) = exclude_id.filter(|id| !id.is_null()) {
        sql.push_str(&format!(" AND id != {}", escape_value(id)));
    }
    Ok(sql)
}

/// Copy structure and data of `from` into a new table `to`.
pub fn duplicate_table(from: &str, to: &str) -> String {
    let from = escape_identifier(from);
    let to = escape_identifier(to);
    format!(
        "CREATE TABLE {to} LIKE {from}; INSERT {to} SELECT * FROM {from}",
        to = to,
        from = from
    )
}

pub fn truncate(table: &str) -> String {
    format!("TRUNCATE TABLE {}", escape_identifier(table))
}

pub fn drop(table: &str) -> String {
    format!("DROP TABLE {}", escape_identifier(table))
}

/// User variable names are spliced unquoted after `@`, so restrict them.
fn validate_variable_name(name: &str) -> DbResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !valid {
        return Err(DbError::invalid_input(format!(
            "Invalid session variable name: {:?}",
            name
        )));
    }
    Ok(())
}

/// `SET @name = value`.
pub fn set_env_var(name: &str, value: &SqlValue) -> DbResult<String> {
    validate_variable_name(name)?;
    Ok(format!("SET @{} = {}", name, escape_value(value)))
}

/// `SELECT @name`.
pub fn get_env_var(name: &str) -> DbResult<String> {
    validate_variable_name(name)?;
    Ok(format!("SELECT @{}", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_without_criteria() {
        assert_eq!(
            select("test_table_1", &Criteria::new(), None, None),
            "SELECT * FROM `test_table_1`"
        );
    }

    #[test]
    fn test_select_full() {
        let criteria = Criteria::new().eq("id", 1).eq("field_char", "x");
        assert_eq!(
            select("t", &criteria, Some(1), Some("id DESC")),
            "SELECT * FROM `t` WHERE `id` = 1 AND `field_char` = 'x' ORDER BY id DESC LIMIT 1"
        );
    }

    #[test]
    fn test_select_zero_limit_is_unbounded() {
        assert_eq!(
            select("t", &Criteria::new(), Some(0), Some("  ")),
            "SELECT * FROM `t`"
        );
    }

    #[test]
    fn test_literal_operands_are_verbatim() {
        let criteria = Criteria::new()
            .eq("user", "bob")
            .eq("password", Operand::literal("ENCRYPT('secret', 'salt')"));
        assert_eq!(
            predicates(&criteria),
            "`user` = 'bob' AND `password` = ENCRYPT('secret', 'salt')"
        );
    }

    #[test]
    fn test_literal_lookalike_string_is_escaped() {
        let criteria = Criteria::new().eq("password", "ENCRYPT('x')");
        assert_eq!(predicates(&criteria), r"`password` = 'ENCRYPT(\'x\')'");
    }

    #[test]
    fn test_insert_single_and_batch() {
        let row = Fields::new().with("field_char", "a").with("field_int", 33);
        assert_eq!(
            insert("t", std::slice::from_ref(&row)).unwrap(),
            "INSERT INTO `t` (`field_char`, `field_int`) VALUES ('a', 33)"
        );

        let rows = vec![row.clone(), Fields::new().with("field_int", 77)];
        assert_eq!(
            insert("t", &rows).unwrap(),
            "INSERT INTO `t` (`field_char`, `field_int`) VALUES ('a', 33); INSERT INTO `t` (`field_int`) VALUES (77)"
        );
    }

    #[test]
    fn test_insert_nothing() {
        let err = insert("t", &[]).unwrap_err();
        assert!(err.to_string().contains("Nothing to insert"));
    }

    #[test]
    fn test_insert_literal_value() {
        let row = Fields::new()
            .with("user", "bob")
            .with("password", Operand::literal("ENCRYPT('pw')"));
        assert_eq!(
            insert("users", &[row]).unwrap(),
            "INSERT INTO `users` (`user`, `password`) VALUES ('bob', ENCRYPT('pw'))"
        );
    }

    #[test]
    fn test_update() {
        let sql = update(
            "t",
            &Criteria::new().eq("id", 1),
            &Fields::new().with("field_bool", 0).with("field_text", "b"),
        )
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE `t` SET `field_bool` = 0, `field_text` = 'b' WHERE `id` = 1"
        );
    }

    #[test]
    fn test_empty_criteria_rejected() {
        let values = Fields::new().with("a", 1);
        assert!(matches!(
            update("t", &Criteria::new(), &values),
            Err(DbError::InvalidInput { .. })
        ));
        assert!(matches!(
            delete("t", &Criteria::new()),
            Err(DbError::InvalidInput { .. })
        ));
        assert!(matches!(
            exists("t", &Criteria::new(), None),
            Err(DbError::InvalidInput { .. })
        ));
        assert!(matches!(
            update("t", &Criteria::new().eq("id", 1), &Fields::new()),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            delete("t", &Criteria::new().eq("id", 1)).unwrap(),
            "DELETE FROM `t` WHERE `id` = 1"
        );
    }

    #[test]
    fn test_exists_with_exclusion() {
        let criteria = Criteria::new().eq("id", 1);
        assert_eq!(
            exists("t", &criteria, Some(&SqlValue::Int(4))).unwrap(),
            "SELECT COUNT(id) FROM `t` WHERE `id` = 1 AND id != 4"
        );
        assert_eq!(
            exists("t", &criteria, Some(&SqlValue::Null)).unwrap(),
            "SELECT COUNT(id) FROM `t` WHERE `id` = 1"
        );
    }

    #[test]
    fn test_ddl() {
        assert_eq!(
            duplicate_table("a", "b"),
            "CREATE TABLE `b` LIKE `a`; INSERT `b` SELECT * FROM `a`"
        );
        assert_eq!(truncate("a"), "TRUNCATE TABLE `a`");
        assert_eq!(drop("a"), "DROP TABLE `a`");
        assert_eq!(count_all("a"), "SELECT COUNT(id) FROM `a`");
    }

    #[test]
    fn test_env_vars() {
        assert_eq!(
            set_env_var("testEnvVar", &SqlValue::Int(1)).unwrap(),
            "SET @testEnvVar = 1"
        );
        assert_eq!(get_env_var("testEnvVar").unwrap(), "SELECT @testEnvVar");
        assert!(set_env_var("x = 1; DROP TABLE t; --", &SqlValue::Null).is_err());
        assert!(get_env_var("").is_err());
    }
}
