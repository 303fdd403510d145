//! # Type Checker
//!
//! Hindley-Milner inference over the Core AST, extended with let-polymorphism
//! under the value restriction, structural records with width subtyping,
//! algebraic data types, reference cells and exhaustiveness checking for `match`.
//!
//! ## Flow
//!
//! ```text
//! core::Module
//!     ↓
//! [builtins]   initial environment (Int, List, Option, print, ...)
//!     ↓
//! [check]      declarations in source order, threading (env, subst)
//!     ↓
//! [infer]      expressions → [unify], [pattern] → [exhaustive], [generalize]
//!     ↓
//! TypedModule  name → principal type
//! ```
//!
//! ## Levels
//!
//! Every type variable carries the `let` nesting depth it was created at. A
//! `let` value is inferred one level deeper than its binding; on generalization
//! only variables deeper than the binding's level are quantified. Binding a
//! variable lowers every variable of the bound type to the variable's own level,
//! so a type that escapes into an outer scope can no longer be generalized.
//!
//! ## Records
//!
//! Record types are compared structurally. Wherever a record flows into a
//! position expecting a record, it must have at least the expected fields;
//! extra fields are ignored. Named record types and aliases are unfolded one
//! level at a time when their structure is needed.

pub mod annotation;
pub mod builtins;
pub mod check;
pub mod env;
pub mod error;
pub mod exhaustive;
pub mod generalize;
pub mod infer;
pub mod pattern;
pub mod subst;
pub mod ty;
pub mod unify;


pub use check::{CheckOptions, Checker, TypedModule, check_module};
pub use env::TypeEnv;
pub use error::{TypeError, TypeErrorKind};
pub use exhaustive::MissingCase;
pub use subst::Substitution;
pub use ty::{Type, TypeScheme, TypeVar};
