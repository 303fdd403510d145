//! # typecore - Static Type Checker for a Small Functional Language
//!
//! `typecore` is the type checking stage of a compiler for a statically-typed
//! functional language that targets a dynamically-typed runtime. It consumes a
//! fully desugared Core AST and produces, for every top-level declaration, a
//! principal type or a precise type error.
//!
//! ## Pipeline Position
//!
//! ```text
//! Source Code
//!     ↓
//! [Parser / Desugaring]  (not part of this crate)
//!     ↓
//! Core AST (core::Module)
//!     ↓
//! [Type Checker] → TypedModule { declaration_types, env }
//!     ↓
//! [Code Generator]  (not part of this crate)
//! ```
//!
//! ## Type System
//!
//! - Hindley-Milner inference with let-polymorphism
//! - Value restriction: only syntactic values are generalized
//! - Structural records with width subtyping, spreads and updates
//! - User-defined variants, records and aliases, possibly recursive
//! - Mutable reference cells (`ref`, `!`, `:=`)
//! - Exhaustiveness checking of `match` with example missing cases
//!
//! ## Module Structure
//!
//! - [`core`] - Core AST definitions and builders
//! - [`types`] - Type representation, inference and the declaration driver
//!
//! ## Getting Started
//!
//! ```
//! use typecore::core::{Declaration, Expr, Module};
//!
//! let module = Module::new(
//!     "main",
//!     vec![Declaration::value("id", Expr::lambda(&["x"], Expr::var("x")))],
//! );
//! let typed = typecore::check_module(module).unwrap();
//! assert_eq!(typed.scheme_of("id").unwrap().pretty(), "forall 'a. ('a) -> 'a");
//! ```

pub mod core;
pub mod types;

pub use types::{CheckOptions, Checker, TypeError, TypedModule, check_module};
