//! # Core AST - Input of the Type Checker
//!
//! This module defines the **Core Abstract Syntax Tree** the checker consumes. It is
//! produced by the desugaring pass, which has already removed every piece of surface
//! sugar, so the checker only ever sees a small, uniform set of node kinds.
//!
//! ## Pipeline Position
//!
//! ```text
//! Parser → Surface AST → Desugaring → [CORE AST] → Type Checker → Code Generator
//! ```
//!
//! ## What Desugaring Already Did
//!
//! | Surface construct | Core form |
//! |-------------------|-----------|
//! | `if c then e` (no else) | `if c then e else ()` |
//! | `while c { body }` | recursive `let` of a unit-returning lambda |
//! | `[x, ...xs]` in expressions | `x :: xs` |
//! | `let rec f = ... and g = ...` | [`LetRecGroup`] / [`RecGroupDecl`] |
//! | `{ name }` in patterns | `{ name: name }` |
//!
//! The checker trusts this shape and never re-validates grammar. A node that the
//! checker does not expect in a given position is reported as an internal error.
//!
//! ## Structure
//!
//! A [`Module`] is an ordered list of [`Declaration`]s. Declarations are checked in
//! source order; a declaration can only see names bound by earlier declarations,
//! except for the members of a [`RecGroupDecl`], which see each other.
//!
//! ```text
//! Module
//!  ├─ Declaration::Types     type Option<'a> = Some('a) | None
//!  ├─ Declaration::External  external log: (String) -> Unit = "console.log"
//!  ├─ Declaration::Import    import Math { sqrt: (Float) -> Float }
//!  ├─ Declaration::Let       let id = (x) => x
//!  └─ Declaration::RecGroup  let rec isEven = ... and isOdd = ...
//! ```
//!
//! ## Position Information
//!
//! Every node carries a `position: Span` pointing back to the original source, so
//! that type errors can point at the offending sub-expression or pattern even after
//! desugaring rewrote the tree around it.
//!
//! ## Related Modules
//!
//! - [`crate::core::build`] - span-less constructors for building trees by hand
//! - [`crate::types`] - the type checker working on this tree

use lachs::Span;

pub mod build;

/// A named occurrence (binder or reference) with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub value: String,
    pub position: Span,
}

/// A complete compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub declarations: Vec<Declaration>,
}

/// Top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Let(LetDecl),
    RecGroup(RecGroupDecl),
    Types(TypeDefs),
    External(ExternalDecl),
    Import(ImportDecl),
}

impl Declaration {
    pub fn position(&self) -> Span {
        match self {
            Declaration::Let(decl) => decl.position.clone(),
            Declaration::RecGroup(group) => group.position.clone(),
            Declaration::Types(defs) => defs.position.clone(),
            Declaration::External(ext) => ext.position.clone(),
            Declaration::Import(import) => import.position.clone(),
        }
    }

    /// Value names this declaration binds, in source order.
    pub fn bound_values(&self) -> Vec<&str> {
        match self {
            Declaration::Let(decl) => vec![decl.name.value.as_str()],
            Declaration::RecGroup(group) => group
                .bindings
                .iter()
                .map(|b| b.name.value.as_str())
                .collect(),
            Declaration::Types(defs) => defs
                .decls
                .iter()
                .flat_map(|decl| decl.constructor_names())
                .collect(),
            Declaration::External(ext) => vec![ext.name.value.as_str()],
            Declaration::Import(import) => import
                .items
                .iter()
                .flat_map(|item| match item {
                    ImportItem::Value { name, alias, .. } => {
                        vec![alias.as_ref().unwrap_or(name).value.as_str()]
                    }
                    ImportItem::Type(decl) => decl.constructor_names(),
                })
                .collect(),
        }
    }
}

/// `let name = value` or `let rec name = value` at module level.
#[derive(Debug, Clone, PartialEq)]
pub struct LetDecl {
    pub name: Ident,
    pub annotation: Option<TypeExpr>,
    pub value: Expr,
    pub recursive: bool,
    pub position: Span,
}

/// Mutually recursive bindings; every member is visible to every other member.
#[derive(Debug, Clone, PartialEq)]
pub struct RecGroupDecl {
    pub bindings: Vec<RecBinding>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecBinding {
    pub name: Ident,
    pub annotation: Option<TypeExpr>,
    pub value: Expr,
    pub position: Span,
}

/// A group of type declarations that may refer to each other.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefs {
    pub decls: Vec<TypeDecl>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: Ident,
    pub params: Vec<String>,
    pub body: TypeDeclBody,
    pub position: Span,
}

impl TypeDecl {
    pub fn constructor_names(&self) -> Vec<&str> {
        match &self.body {
            TypeDeclBody::Variant(ctors) => ctors.iter().map(|c| c.name.value.as_str()).collect(),
            TypeDeclBody::Alias(_) | TypeDeclBody::Record(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclBody {
    Alias(TypeExpr),
    Record(Vec<FieldDecl>),
    Variant(Vec<ConstructorDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub name: Ident,
    pub args: Vec<TypeExpr>,
}

/// A value implemented by the runtime, e.g. `external log: (String) -> Unit = "console.log"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDecl {
    pub name: Ident,
    pub signature: TypeExpr,
    pub foreign_name: String,
    pub position: Span,
}

/// Names brought in from another module. Their signatures are trusted as written.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub module: String,
    pub items: Vec<ImportItem>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportItem {
    Value {
        name: Ident,
        alias: Option<Ident>,
        signature: TypeExpr,
    },
    Type(TypeDecl),
}

/// Syntactic type, as written in annotations and type declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named {
        name: String,
        args: Vec<TypeExpr>,
        position: Span,
    },
    /// `'a`
    Var { name: String, position: Span },
    Function {
        params: Vec<TypeExpr>,
        result: Box<TypeExpr>,
        position: Span,
    },
    Record {
        fields: Vec<FieldDecl>,
        position: Span,
    },
    Tuple {
        elements: Vec<TypeExpr>,
        position: Span,
    },
}

impl TypeExpr {
    pub fn position(&self) -> Span {
        match self {
            TypeExpr::Named { position, .. }
            | TypeExpr::Var { position, .. }
            | TypeExpr::Function { position, .. }
            | TypeExpr::Record { position, .. }
            | TypeExpr::Tuple { position, .. } => position.clone(),
        }
    }
}

/// Core expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Var(Ident),
    Lambda(Lambda),
    Apply(Apply),
    Let(Let),
    LetRecGroup(LetRecGroup),
    If(If),
    Block(Block),
    Match(Match),
    Record(RecordLit),
    RecordUpdate(RecordUpdate),
    FieldAccess(FieldAccess),
    Tuple(TupleLit),
    List(ListLit),
    MakeRef(MakeRef),
    Deref(Deref),
    Assign(Assign),
    BinaryOp(BinaryOp),
    UnaryOp(UnaryOp),
    Annotated(Annotated),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Unit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub annotation: Option<TypeExpr>,
}

/// Lambda with any number of parameters, `(a, b) => body`
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: Box<Expr>,
    pub position: Span,
}

/// Call with its arguments in evaluation order
#[derive(Debug, Clone, PartialEq)]
pub struct Apply {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub position: Span,
}

/// `let name = value in body`; `recursive` makes `name` visible inside `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Let {
    pub name: Ident,
    pub annotation: Option<TypeExpr>,
    pub value: Box<Expr>,
    pub body: Box<Expr>,
    pub recursive: bool,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetRecGroup {
    pub bindings: Vec<RecBinding>,
    pub body: Box<Expr>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Box<Expr>,
    pub then_expr: Box<Expr>,
    pub else_expr: Box<Expr>,
    pub position: Span,
}

/// Expressions evaluated in order; the value of the block is the value of the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub exprs: Vec<Expr>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub scrutinee: Box<Expr>,
    pub cases: Vec<MatchCase>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordEntry {
    Field(FieldInit),
    /// `...expr`
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordLit {
    pub entries: Vec<RecordEntry>,
    pub position: Span,
}

/// `{ base with field: value }`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub base: Box<Expr>,
    pub fields: Vec<FieldInit>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccess {
    pub record: Box<Expr>,
    pub field: String,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleLit {
    pub elements: Vec<Expr>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListLit {
    pub elements: Vec<Expr>,
    pub position: Span,
}

/// `ref value`
#[derive(Debug, Clone, PartialEq)]
pub struct MakeRef {
    pub value: Box<Expr>,
    pub position: Span,
}

/// `!reference`
#[derive(Debug, Clone, PartialEq)]
pub struct Deref {
    pub reference: Box<Expr>,
    pub position: Span,
}

/// `target := value`
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: Box<Expr>,
    pub value: Box<Expr>,
    pub position: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Concat,
    Cons,
}

impl BinOpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::Mod => "%",
            BinOpKind::Eq => "==",
            BinOpKind::NotEq => "!=",
            BinOpKind::Lt => "<",
            BinOpKind::LtEq => "<=",
            BinOpKind::Gt => ">",
            BinOpKind::GtEq => ">=",
            BinOpKind::And => "&&",
            BinOpKind::Or => "||",
            BinOpKind::Concat => "++",
            BinOpKind::Cons => "::",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOp {
    pub op: BinOpKind,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub position: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOp {
    pub op: UnaryOpKind,
    pub operand: Box<Expr>,
    pub position: Span,
}

/// `(expr : Type)`
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated {
    pub expr: Box<Expr>,
    pub annotation: TypeExpr,
    pub position: Span,
}

impl Expr {
    pub fn position(&self) -> Span {
        match self {
            Expr::Literal(l) => l.position.clone(),
            Expr::Var(v) => v.position.clone(),
            Expr::Lambda(l) => l.position.clone(),
            Expr::Apply(a) => a.position.clone(),
            Expr::Let(l) => l.position.clone(),
            Expr::LetRecGroup(g) => g.position.clone(),
            Expr::If(i) => i.position.clone(),
            Expr::Block(b) => b.position.clone(),
            Expr::Match(m) => m.position.clone(),
            Expr::Record(r) => r.position.clone(),
            Expr::RecordUpdate(u) => u.position.clone(),
            Expr::FieldAccess(f) => f.position.clone(),
            Expr::Tuple(t) => t.position.clone(),
            Expr::List(l) => l.position.clone(),
            Expr::MakeRef(r) => r.position.clone(),
            Expr::Deref(d) => d.position.clone(),
            Expr::Assign(a) => a.position.clone(),
            Expr::BinaryOp(b) => b.position.clone(),
            Expr::UnaryOp(u) => u.position.clone(),
            Expr::Annotated(a) => a.position.clone(),
        }
    }
}

/// Pattern in a `match` case.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard(Span),
    Var(Ident),
    Literal(Literal),
    Constructor {
        name: Ident,
        args: Vec<Pattern>,
        position: Span,
    },
    /// Matches records having at least the named fields.
    Record {
        fields: Vec<FieldPattern>,
        position: Span,
    },
    Tuple {
        elements: Vec<Pattern>,
        position: Span,
    },
    /// `[p1, p2, ...rest]`; without `rest` the list length must match exactly.
    List {
        elements: Vec<Pattern>,
        rest: Option<Box<Pattern>>,
        position: Span,
    },
    Or {
        alternatives: Vec<Pattern>,
        position: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldPattern {
    pub name: String,
    pub pattern: Pattern,
    pub position: Span,
}

impl Pattern {
    pub fn position(&self) -> Span {
        match self {
            Pattern::Wildcard(span) => span.clone(),
            Pattern::Var(ident) => ident.position.clone(),
            Pattern::Literal(lit) => lit.position.clone(),
            Pattern::Constructor { position, .. }
            | Pattern::Record { position, .. }
            | Pattern::Tuple { position, .. }
            | Pattern::List { position, .. }
            | Pattern::Or { position, .. } => position.clone(),
        }
    }
}
