//! # Type Error Definitions
//!
//! This module defines the single error value produced by the type checker.
//! Every failure carries:
//!
//! - a [`TypeErrorKind`] saying what went wrong,
//! - the source position of the offending sub-expression, pattern or annotation,
//! - an optional remediation hint (e.g. "add a type annotation"),
//! - optional related positions (e.g. the other branch of an or-pattern).
//!
//! ## Error Reporting
//!
//! The `Display` implementation produces human-readable error messages with
//! source location context when the span carries its source. The structured
//! fields stay available to an external diagnostics formatter.
//!
//! ## Propagation
//!
//! The first error inside a declaration aborts that declaration; the
//! declaration driver decides whether checking continues with the next one.
//!
//! ## Related Modules
//!
//! - [`crate::types::infer`] - Type inference that produces these errors
//! - [`crate::types::unify`] - Unification errors converted to `TypeError`
//! - [`crate::types::check`] - The driver collecting errors per declaration

use std::fmt;

use lachs::Span;
use thiserror::Error;

use super::exhaustive::MissingCase;
use super::ty::{Type, TypeVar};
use super::unify::UnifyError;

/// What went wrong.
///
/// # Example Error Messages
///
/// ```text
/// Type error: type mismatch: expected Int, found String
///
/// Type error: cannot construct infinite type: 't0 = ('t0) -> Int
///
/// Type error: non-exhaustive match: `None` not covered
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeErrorKind {
    /// Two types that must be equal are not.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: Type, actual: Type },

    /// A type variable would have to contain itself.
    #[error("cannot construct infinite type: {var} = {ty}")]
    InfiniteType { var: TypeVar, ty: Type },

    /// Element counts differ: function parameters, call arguments, tuple elements,
    /// constructor arguments or type arguments.
    #[error("arity mismatch in {what}: expected {expected}, found {actual}")]
    ArityMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("unknown constructor: {name}")]
    UnknownConstructor { name: String },

    #[error("unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("unknown type: {name}")]
    UnknownType { name: String },

    /// Field access on a record type known not to have the field.
    #[error("type {ty} has no field `{field}`")]
    FieldNotFound { field: String, ty: Type },

    /// A record was required to provide a field it does not have.
    #[error("missing field `{field}`: expected {expected}, found {actual}")]
    MissingField {
        field: String,
        expected: Type,
        actual: Type,
    },

    #[error("non-exhaustive match: `{missing}` not covered")]
    NonExhaustiveMatch { missing: MissingCase },

    #[error("or-pattern alternatives bind different variables: {left:?} vs {right:?}")]
    InconsistentOrPatternBindings {
        left: Vec<String>,
        right: Vec<String>,
    },

    /// `==`/`!=` on a type containing functions.
    #[error("type {ty} does not support equality")]
    NotEquatable { ty: Type },

    #[error("match guard must be Bool, found {actual}")]
    NonBooleanGuard { actual: Type },

    #[error("variable `{name}` is bound more than once in the same pattern")]
    DuplicatePatternBinding { name: String },

    /// Reference to a name whose own declaration failed to type-check.
    #[error("`{name}` has no type because its declaration failed to type-check")]
    DependsOnFailedDeclaration { name: String },

    /// A top-level declaration whose type is still not fully known.
    #[error("the type of `{name}` cannot be fully determined: {ty}")]
    UnresolvedType { name: String, ty: Type },

    /// An AST shape the checker does not expect in this position.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Type error encountered during type checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub position: Span,
    pub hint: Option<String>,
    pub related: Vec<Span>,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, position: Span) -> Self {
        TypeError {
            kind,
            position,
            hint: None,
            related: Vec::new(),
        }
    }

    /// Attach a remediation hint (chainable).
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related source position (chainable).
    pub fn with_related(mut self, span: Span) -> Self {
        self.related.push(span);
        self
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn type_mismatch(expected: Type, actual: Type, position: Span) -> Self {
        TypeError::new(TypeErrorKind::TypeMismatch { expected, actual }, position)
    }

    pub fn arity_mismatch(
        what: impl Into<String>,
        expected: usize,
        actual: usize,
        position: Span,
    ) -> Self {
        TypeError::new(
            TypeErrorKind::ArityMismatch {
                what: what.into(),
                expected,
                actual,
            },
            position,
        )
    }

    pub fn unknown_variable(name: &str, position: Span) -> Self {
        TypeError::new(
            TypeErrorKind::UnknownVariable {
                name: name.to_string(),
            },
            position,
        )
    }

    pub fn internal(message: impl Into<String>, position: Span) -> Self {
        TypeError::new(TypeErrorKind::InternalError(message.into()), position)
    }

    /// Convert a unification error to a type error.
    ///
    /// Unification errors from the `unify` module are converted to
    /// `TypeError` with the provided source span. A mismatch involving a
    /// record gets a hint naming the field that is missing.
    pub fn from_unify(err: UnifyError, position: Span) -> Self {
        match err {
            UnifyError::Mismatch { expected, actual } => {
                TypeError::type_mismatch(expected, actual, position)
            }
            UnifyError::InfiniteType { var, ty } => {
                TypeError::new(TypeErrorKind::InfiniteType { var, ty }, position)
            }
            UnifyError::ArityMismatch {
                expected,
                actual,
                expected_arity,
                actual_arity,
            } => TypeError::arity_mismatch(
                format!("{} and {}", expected, actual),
                expected_arity,
                actual_arity,
                position,
            ),
            UnifyError::MissingField {
                field,
                expected,
                actual,
            } => {
                let hint = format!("add a field `{}` to the record", field);
                TypeError::new(
                    TypeErrorKind::MissingField {
                        field,
                        expected,
                        actual,
                    },
                    position,
                )
                .with_hint(hint)
            }
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match &self.hint {
            Some(hint) => format!("{}\n  Hint: {}", self.message(), hint),
            None => self.message(),
        };
        // Check if span has source attached
        if self.position.source.is_empty() {
            write!(f, "Type error: {}", msg)
        } else {
            write!(f, "{}", self.position.to_string(&msg))
        }
    }
}

impl std::error::Error for TypeError {}
