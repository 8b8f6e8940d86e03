//! Structural leaf conditions over serialized aggregate documents.
//!
//! # Invariants
//! - Value ordering mirrors SQLite: null < numbers (booleans as 0/1) < text.
//!   Objects and arrays order as their JSON text.
//! - A comparison against a missing or null field is false, except for the
//!   explicit null checks.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Dotted path to a field of the serialized document, e.g. `customer.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Resolves this path inside a JSON document.
    pub fn resolve<'doc>(&self, document: &'doc Value) -> Option<&'doc Value> {
        self.segments()
            .try_fold(document, |current, segment| current.get(segment))
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn sql_operator(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Leaf predicate `field <op> value`, or a null check when `value` is null.
///
/// With a null `value`, `Eq` means "is null or missing" and `Ne` means
/// "is present and not null"; ordering operators never match.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: FieldPath,
    op: CompareOp,
    value: Value,
}

impl Condition {
    pub fn new(field: impl Into<FieldPath>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Evaluates this condition against a serialized document.
    pub fn matches(&self, document: &Value) -> bool {
        let actual = self.field.resolve(document).unwrap_or(&Value::Null);

        if self.value.is_null() {
            return match self.op {
                CompareOp::Eq => actual.is_null(),
                CompareOp::Ne => !actual.is_null(),
                _ => false,
            };
        }
        if actual.is_null() {
            return false;
        }

        self.op.accepts(compare_values(actual, &self.value))
    }
}

/// Total order over JSON values matching SQLite's cross-type comparison.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let left_rank = type_rank(left);
    let right_rank = type_rank(right);
    if left_rank != right_rank {
        return left_rank.cmp(&right_rank);
    }

    match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => text(left).cmp(&text(right)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) | Value::Number(_) => 1,
        Value::String(_) | Value::Array(_) | Value::Object(_) => 2,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

/// Objects and arrays compare as their minified JSON text. SQLite compares
/// the stored text, which agrees only because bodies are written by
/// `serde_json` with sorted keys (no `preserve_order` feature).
fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
