//! Composable, inspectable predicates over aggregate types.
//!
//! # Responsibility
//! - Build predicate trees from leaves (`Any`, opaque predicates, structural
//!   conditions) and boolean combinators.
//! - Evaluate trees in memory and expose their structure so storage adapters
//!   can translate them into native filters.
//!
//! # Invariants
//! - Trees are immutable; combinators return new trees sharing children.
//! - `AndNot(l, r)` evaluates exactly as `l && !r`.
//! - A document snapshot is serialized at most once per evaluation.

pub mod condition;

pub use condition::{compare_values, CompareOp, Condition, FieldPath};

use log::warn;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

type PredicateFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// Opaque, named in-memory predicate.
///
/// Adapters cannot translate these; they evaluate them after loading.
pub struct Predicate<T> {
    name: String,
    func: Arc<PredicateFn<T>>,
}

impl<T> Predicate<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn test(&self, entity: &T) -> bool {
        (self.func)(entity)
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<T> Debug for Predicate<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// Boolean predicate tree over `T`.
pub enum Specification<T> {
    /// Matches every entity. Default filter of every query.
    Any,
    Predicate(Predicate<T>),
    Condition(Condition),
    And(Arc<Specification<T>>, Arc<Specification<T>>),
    Or(Arc<Specification<T>>, Arc<Specification<T>>),
    Not(Arc<Specification<T>>),
    AndNot(Arc<Specification<T>>, Arc<Specification<T>>),
}

impl<T> Specification<T> {
    pub fn any() -> Self {
        Self::Any
    }

    /// Wraps an arbitrary closure as a leaf.
    pub fn predicate<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate {
            name: name.into(),
            func: Arc::new(func),
        })
    }

    /// Starts a structural condition on a document field.
    pub fn field(path: impl Into<FieldPath>) -> FieldSpec<T> {
        FieldSpec {
            path: path.into(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn and(self, other: Self) -> Self {
        Self::And(Arc::new(self), Arc::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Arc::new(self), Arc::new(other))
    }

    pub fn and_not(self, other: Self) -> Self {
        Self::AndNot(Arc::new(self), Arc::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Arc::new(self))
    }

    /// Left child of a composite node (the operand of `Not`).
    pub fn left(&self) -> Option<&Specification<T>> {
        match self {
            Self::And(left, _) | Self::Or(left, _) | Self::AndNot(left, _) | Self::Not(left) => {
                Some(left)
            }
            _ => None,
        }
    }

    /// Right child of a binary composite node. `None` for `Not` and leaves.
    pub fn right(&self) -> Option<&Specification<T>> {
        match self {
            Self::And(_, right) | Self::Or(_, right) | Self::AndNot(_, right) => Some(right),
            _ => None,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns whether the tree contains no opaque predicates, so an adapter
    /// can translate it completely.
    pub fn is_translatable(&self) -> bool {
        match self {
            Self::Any | Self::Condition(_) => true,
            Self::Predicate(_) => false,
            Self::Not(inner) => inner.is_translatable(),
            Self::And(left, right) | Self::Or(left, right) | Self::AndNot(left, right) => {
                left.is_translatable() && right.is_translatable()
            }
        }
    }

    fn needs_document(&self) -> bool {
        match self {
            Self::Any | Self::Predicate(_) => false,
            Self::Condition(_) => true,
            Self::Not(inner) => inner.needs_document(),
            Self::And(left, right) | Self::Or(left, right) | Self::AndNot(left, right) => {
                left.needs_document() || right.needs_document()
            }
        }
    }
}

impl<T: Serialize> Specification<T> {
    /// Evaluates the tree against one entity.
    ///
    /// If the entity cannot be serialized, structural conditions evaluate to
    /// false.
    pub fn is_satisfied_by(&self, entity: &T) -> bool {
        if !self.needs_document() {
            return self.evaluate(entity, None);
        }

        match serde_json::to_value(entity) {
            Ok(document) => self.evaluate(entity, Some(&document)),
            Err(err) => {
                warn!(
                    "event=spec_evaluate module=specification status=error error_code=serialize_failed error={}",
                    err
                );
                self.evaluate(entity, None)
            }
        }
    }

    /// Evaluates the tree when the serialized document is already at hand.
    pub fn is_satisfied_by_document(&self, entity: &T, document: &Value) -> bool {
        self.evaluate(entity, Some(document))
    }

    fn evaluate(&self, entity: &T, document: Option<&Value>) -> bool {
        match self {
            Self::Any => true,
            Self::Predicate(predicate) => predicate.test(entity),
            Self::Condition(condition) => document.is_some_and(|doc| condition.matches(doc)),
            Self::And(left, right) => {
                left.evaluate(entity, document) && right.evaluate(entity, document)
            }
            Self::Or(left, right) => {
                left.evaluate(entity, document) || right.evaluate(entity, document)
            }
            Self::Not(inner) => !inner.evaluate(entity, document),
            Self::AndNot(left, right) => {
                left.evaluate(entity, document) && !right.evaluate(entity, document)
            }
        }
    }
}

impl<T> Default for Specification<T> {
    fn default() -> Self {
        Self::Any
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Any => Self::Any,
            Self::Predicate(predicate) => Self::Predicate(predicate.clone()),
            Self::Condition(condition) => Self::Condition(condition.clone()),
            Self::And(left, right) => Self::And(Arc::clone(left), Arc::clone(right)),
            Self::Or(left, right) => Self::Or(Arc::clone(left), Arc::clone(right)),
            Self::Not(inner) => Self::Not(Arc::clone(inner)),
            Self::AndNot(left, right) => Self::AndNot(Arc::clone(left), Arc::clone(right)),
        }
    }
}

impl<T> Debug for Specification<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Predicate(predicate) => write!(f, "Predicate({})", predicate.name()),
            Self::Condition(condition) => write!(
                f,
                "Condition({} {} {})",
                condition.field(),
                condition.op().sql_operator(),
                condition.value()
            ),
            Self::And(left, right) => f.debug_tuple("And").field(left).field(right).finish(),
            Self::Or(left, right) => f.debug_tuple("Or").field(left).field(right).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Self::AndNot(left, right) => f.debug_tuple("AndNot").field(left).field(right).finish(),
        }
    }
}

impl<T> BitAnd for Specification<T> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl<T> BitOr for Specification<T> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

impl<T> Not for Specification<T> {
    type Output = Self;

    fn not(self) -> Self {
        self.negate()
    }
}

/// Builder returned by [`Specification::field`].
pub struct FieldSpec<T> {
    path: FieldPath,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T> FieldSpec<T> {
    fn with(self, op: CompareOp, value: impl Into<Value>) -> Specification<T> {
        Specification::Condition(Condition::new(self.path, op, value))
    }

    pub fn eq(self, value: impl Into<Value>) -> Specification<T> {
        self.with(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Specification<T> {
        self.with(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Specification<T> {
        self.with(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Specification<T> {
        self.with(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Specification<T> {
        self.with(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Specification<T> {
        self.with(CompareOp::Ge, value)
    }

    pub fn is_null(self) -> Specification<T> {
        self.with(CompareOp::Eq, Value::Null)
    }

    pub fn is_not_null(self) -> Specification<T> {
        self.with(CompareOp::Ne, Value::Null)
    }
}
