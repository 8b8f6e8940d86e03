//! Translation of specification trees into SQLite filters.
//!
//! # Invariants
//! - Every emitted predicate is two-valued (0/1), so `NOT` never meets SQL
//!   `NULL` and in-memory evaluation agrees with the database.
//! - Field paths are validated before they reach SQL; values are always
//!   bound parameters.

use super::error::{RepoError, RepoResult};
use crate::specification::{CompareOp, Condition, FieldPath, Specification};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});

/// SQL boolean expression plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<SqlValue>,
}

/// Translates a specification into a SQL filter over `aggregates.body`.
///
/// Returns `Ok(None)` when the tree holds opaque predicates and must be
/// evaluated in memory instead.
pub fn translate<T>(specification: &Specification<T>) -> RepoResult<Option<SqlFilter>> {
    if !specification.is_translatable() {
        return Ok(None);
    }

    let mut filter = SqlFilter {
        clause: String::new(),
        params: Vec::new(),
    };
    write_node(specification, &mut filter)?;
    Ok(Some(filter))
}

/// Converts a dotted field path into a `json_extract` path (`$.a.b`).
pub fn json_path(field: &FieldPath) -> RepoResult<String> {
    if !FIELD_PATH_RE.is_match(field.as_str()) {
        return Err(RepoError::InvalidOperation(format!(
            "invalid field path `{field}`"
        )));
    }
    Ok(format!("$.{field}"))
}

/// Binds a JSON value the way `json_extract` would return it.
pub fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        // Same key-sorted minified text that `flush` stores for nested values.
        other => SqlValue::Text(other.to_string()),
    }
}

fn write_node<T>(specification: &Specification<T>, filter: &mut SqlFilter) -> RepoResult<()> {
    match specification {
        Specification::Any => filter.clause.push_str("1 = 1"),
        Specification::Condition(condition) => write_condition(condition, filter)?,
        Specification::Predicate(predicate) => {
            return Err(RepoError::InvalidOperation(format!(
                "predicate `{}` cannot be translated to SQL",
                predicate.name()
            )));
        }
        Specification::And(left, right) => write_binary(left, "AND", right, filter)?,
        Specification::Or(left, right) => write_binary(left, "OR", right, filter)?,
        Specification::AndNot(left, right) => write_binary(left, "AND NOT", right, filter)?,
        Specification::Not(inner) => {
            filter.clause.push_str("(NOT ");
            write_node(inner, filter)?;
            filter.clause.push(')');
        }
    }
    Ok(())
}

fn write_binary<T>(
    left: &Specification<T>,
    operator: &str,
    right: &Specification<T>,
    filter: &mut SqlFilter,
) -> RepoResult<()> {
    filter.clause.push('(');
    write_node(left, filter)?;
    filter.clause.push(' ');
    filter.clause.push_str(operator);
    filter.clause.push(' ');
    write_node(right, filter)?;
    filter.clause.push(')');
    Ok(())
}

fn write_condition(condition: &Condition, filter: &mut SqlFilter) -> RepoResult<()> {
    let path = json_path(condition.field())?;

    if condition.value().is_null() {
        let clause = match condition.op() {
            CompareOp::Eq => "(json_extract(body, ?) IS NULL)",
            CompareOp::Ne => "(json_extract(body, ?) IS NOT NULL)",
            _ => "(json_extract(body, ?) AND 0)",
        };
        filter.clause.push_str(clause);
        filter.params.push(SqlValue::Text(path));
        return Ok(());
    }

    filter.clause.push_str(&format!(
        "COALESCE(json_extract(body, ?) {} ?, 0)",
        condition.op().sql_operator()
    ));
    filter.params.push(SqlValue::Text(path));
    filter.params.push(sql_value(condition.value()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{json_path, sql_value, translate};
    use crate::repo::error::RepoError;
    use crate::specification::{FieldPath, Specification};
    use rusqlite::types::Value as SqlValue;
    use serde_json::json;

    #[test]
    fn composite_trees_translate_with_bound_parameters() {
        let spec: Specification<()> = Specification::field("status")
            .eq("paid")
            .and_not(Specification::field("total").lt(10));

        let filter = translate(&spec).unwrap().unwrap();
        assert_eq!(
            filter.clause,
            "(COALESCE(json_extract(body, ?) = ?, 0) AND NOT COALESCE(json_extract(body, ?) < ?, 0))"
        );
        assert_eq!(
            filter.params,
            vec![
                SqlValue::Text("$.status".to_string()),
                SqlValue::Text("paid".to_string()),
                SqlValue::Text("$.total".to_string()),
                SqlValue::Integer(10),
            ]
        );
    }

    #[test]
    fn opaque_predicates_are_not_translated() {
        let spec: Specification<()> = Specification::any().and(Specification::predicate("p", |_| true));
        assert!(translate(&spec).unwrap().is_none());
    }

    #[test]
    fn field_paths_are_validated() {
        assert_eq!(json_path(&FieldPath::new("customer.name")).unwrap(), "$.customer.name");
        let err = json_path(&FieldPath::new("name') OR 1=1 --")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidOperation(_)));
    }

    #[test]
    fn booleans_bind_as_integers() {
        assert_eq!(sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(sql_value(&json!(2.5)), SqlValue::Real(2.5));
    }

    #[test]
    fn nested_values_bind_as_stored_text() {
        let stored = serde_json::to_value(json!({ "z": [1, 2], "a": null }))
            .unwrap()
            .to_string();
        assert_eq!(
            sql_value(&json!({ "z": [1, 2], "a": null })),
            SqlValue::Text(stored.clone())
        );
        assert_eq!(stored, r#"{"a":null,"z":[1,2]}"#);
    }
}
