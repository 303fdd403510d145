//! Exhaustiveness checking for `match` expressions.
//!
//! After the arms have been type-checked, the scrutinee type is known well enough
//! to decide whether every value of it is matched by some unguarded arm. The
//! check works on a pattern matrix (one row per arm, one column per value still
//! to be inspected) and searches for a value no row matches:
//!
//! - a column whose patterns mention every constructor of the column's type is
//!   split per constructor (specialization),
//! - otherwise only the rows starting with a catch-all stay (default matrix), and
//!   any constructor they miss is reported.
//!
//! Guarded arms are ignored: the guard may fail at runtime, so they never count
//! as coverage. Integer, float and string literals never cover their type; only
//! a catch-all does.

use std::collections::BTreeMap;
use std::fmt;

use super::env::TypeEnv;
use super::ty::{BOOL, LIST, Type, TypeVar, UNIT};
use crate::core::{LiteralValue, Pattern};

/// A match arm as seen by the checker.
#[derive(Debug, Clone, Copy)]
pub struct Arm<'a> {
    pub pattern: &'a Pattern,
    pub guarded: bool,
}

/// An example value not covered by any arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingCase {
    Wildcard,
    Literal(String),
    Constructor { name: String, args: Vec<MissingCase> },
    Tuple(Vec<MissingCase>),
    Record(Vec<(String, MissingCase)>),
    EmptyList,
    NonEmptyList { head: Box<MissingCase>, tail: Box<MissingCase> },
}

impl fmt::Display for MissingCase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MissingCase::Wildcard => write!(f, "_"),
            MissingCase::Literal(lit) => write!(f, "{}", lit),
            MissingCase::Constructor { name, args } if args.is_empty() => write!(f, "{}", name),
            MissingCase::Constructor { name, args } => write!(f, "{}({})", name, join(args)),
            MissingCase::Tuple(elems) => write!(f, "({})", join(elems)),
            MissingCase::Record(fields) if fields.is_empty() => write!(f, "{{}}"),
            MissingCase::Record(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, case)| format!("{}: {}", name, case))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{ {} }}", fields)
            }
            MissingCase::EmptyList => write!(f, "[]"),
            MissingCase::NonEmptyList { head, tail } => {
                let mut elems = vec![head.to_string()];
                let mut tail = tail.as_ref();
                while let MissingCase::NonEmptyList { head, tail: next } = tail {
                    elems.push(head.to_string());
                    tail = next;
                }
                match tail {
                    MissingCase::EmptyList => write!(f, "[{}]", elems.join(", ")),
                    rest => write!(f, "[{}, ...{}]", elems.join(", "), rest),
                }
            }
        }
    }
}

fn join(cases: &[MissingCase]) -> String {
    cases
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks that the unguarded arms cover every value of `scrutinee`.
///
/// `scrutinee` must have the final substitution applied. Returns an empty list
/// when the match is exhaustive, otherwise one example of an uncovered value.
pub fn check_exhaustive(env: &TypeEnv, scrutinee: &Type, arms: &[Arm]) -> Vec<MissingCase> {
    let rows: Vec<Vec<Pat>> = arms
        .iter()
        .filter(|arm| !arm.guarded)
        .map(|arm| vec![Pat::lower(arm.pattern)])
        .collect();
    let checker = Exhaustiveness { env };
    match checker.missing(rows, &[scrutinee.clone()]) {
        Some(mut witness) => witness.drain(..1).collect(),
        None => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Con {
    Variant(String),
    Bool(bool),
    Unit,
    Int(i64),
    /// Bit pattern, so that constructors can be compared for equality.
    Float(u64),
    Str(String),
    Tuple(usize),
    /// All field names any record pattern of the column mentions.
    Record(Vec<String>),
    Nil,
    Cons,
}

#[derive(Debug, Clone)]
enum Pat {
    Wild,
    Con(Con, Vec<Pat>),
    Record(BTreeMap<String, Pat>),
    Or(Vec<Pat>),
}

impl Pat {
    fn lower(pattern: &Pattern) -> Pat {
        match pattern {
            Pattern::Wildcard(_) | Pattern::Var(_) => Pat::Wild,
            Pattern::Literal(lit) => {
                let con = match &lit.value {
                    LiteralValue::Int(i) => Con::Int(*i),
                    LiteralValue::Float(x) => Con::Float(x.to_bits()),
                    LiteralValue::String(s) => Con::Str(s.clone()),
                    LiteralValue::Bool(b) => Con::Bool(*b),
                    LiteralValue::Unit => Con::Unit,
                };
                Pat::Con(con, Vec::new())
            }
            Pattern::Constructor { name, args, .. } => {
                Pat::Con(Con::Variant(name.value.clone()), args.iter().map(Pat::lower).collect())
            }
            Pattern::Record { fields, .. } => Pat::Record(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), Pat::lower(&f.pattern)))
                    .collect(),
            ),
            Pattern::Tuple { elements, .. } => {
                Pat::Con(Con::Tuple(elements.len()), elements.iter().map(Pat::lower).collect())
            }
            Pattern::List { elements, rest, .. } => {
                let tail = match rest {
                    Some(rest) => Pat::lower(rest),
                    None => Pat::Con(Con::Nil, Vec::new()),
                };
                elements
                    .iter()
                    .rev()
                    .fold(tail, |tail, head| Pat::Con(Con::Cons, vec![Pat::lower(head), tail]))
            }
            Pattern::Or { alternatives, .. } => {
                Pat::Or(alternatives.iter().map(Pat::lower).collect())
            }
        }
    }
}

/// Placeholder type for a column whose type is not known; it is treated as an
/// infinite domain.
fn unknown() -> Type {
    Type::Var(TypeVar::new(0, 0))
}

struct Exhaustiveness<'a> {
    env: &'a TypeEnv,
}

impl Exhaustiveness<'_> {
    /// A value vector (one entry per column of `tys`) matched by no row, if any.
    fn missing(&self, rows: Vec<Vec<Pat>>, tys: &[Type]) -> Option<Vec<MissingCase>> {
        let Some((ty, rest_tys)) = tys.split_first() else {
            return if rows.is_empty() { Some(Vec::new()) } else { None };
        };
        let ty = &self.env.unfold(ty);
        let rows = expand_or_heads(rows);

        let mut heads: Vec<Con> = Vec::new();
        for row in &rows {
            if let Some(Pat::Con(con, _)) = row.first() {
                if !heads.contains(con) {
                    heads.push(con.clone());
                }
            }
        }
        let record_fields = column_record_fields(&rows);
        let signature = self.signature(ty, &heads, record_fields);

        match signature {
            Some(all) if !rows_all_wild(&rows) && all.iter().all(|c| covers(&heads, c)) => {
                for con in &all {
                    let arg_tys = self.arg_types(ty, con);
                    let arity = arg_tys.len();
                    let specialized: Vec<Vec<Pat>> =
                        rows.iter().filter_map(|row| specialize(row, con, arity)).collect();
                    let tys: Vec<Type> =
                        arg_tys.into_iter().chain(rest_tys.iter().cloned()).collect();
                    if let Some(mut witness) = self.missing(specialized, &tys) {
                        let rest = witness.split_off(arity);
                        let mut result = vec![witness_for(con, witness)];
                        result.extend(rest);
                        return Some(result);
                    }
                }
                None
            }
            signature => {
                let default: Vec<Vec<Pat>> = rows
                    .iter()
                    .filter(|row| matches!(row.first(), Some(Pat::Wild)))
                    .map(|row| row[1..].to_vec())
                    .collect();
                let rest = self.missing(default, rest_tys)?;
                let head = match signature {
                    Some(all) if !heads.is_empty() => all
                        .iter()
                        .find(|c| !covers(&heads, c))
                        .map(|con| {
                            let arity = self.arg_types(ty, con).len();
                            witness_for(con, vec![MissingCase::Wildcard; arity])
                        })
                        .unwrap_or(MissingCase::Wildcard),
                    _ => MissingCase::Wildcard,
                };
                let mut result = vec![head];
                result.extend(rest);
                Some(result)
            }
        }
    }

    /// Every constructor of `ty`, or `None` for infinite or unknown domains.
    fn signature(
        &self,
        ty: &Type,
        heads: &[Con],
        record_fields: Option<Vec<String>>,
    ) -> Option<Vec<Con>> {
        if let Some(fields) = record_fields {
            return Some(vec![Con::Record(fields)]);
        }
        if let Some(Con::Tuple(n)) = heads.iter().find(|c| matches!(c, Con::Tuple(_))) {
            return Some(vec![Con::Tuple(*n)]);
        }
        match ty {
            Type::Tuple(elems) => return Some(vec![Con::Tuple(elems.len())]),
            _ if ty.is_named(BOOL) => return Some(vec![Con::Bool(true), Con::Bool(false)]),
            _ if ty.is_named(UNIT) => return Some(vec![Con::Unit]),
            _ if ty.is_named(LIST) => return Some(vec![Con::Nil, Con::Cons]),
            _ => {}
        }
        self.env
            .variant_constructors(ty)
            .map(|ctors| ctors.into_iter().map(|c| Con::Variant(c.name)).collect())
    }

    fn arg_types(&self, ty: &Type, con: &Con) -> Vec<Type> {
        match con {
            Con::Variant(name) => self
                .env
                .variant_constructors(ty)
                .and_then(|ctors| ctors.into_iter().find(|c| &c.name == name))
                .map(|c| c.args)
                .unwrap_or_default(),
            Con::Tuple(n) => match ty {
                Type::Tuple(elems) if elems.len() == *n => elems.clone(),
                _ => vec![unknown(); *n],
            },
            Con::Record(fields) => {
                let declared = self.env.record_fields(ty).unwrap_or_default();
                fields
                    .iter()
                    .map(|f| declared.get(f).cloned().unwrap_or_else(unknown))
                    .collect()
            }
            Con::Cons => {
                let elem = ty.list_elem().cloned().unwrap_or_else(unknown);
                vec![elem.clone(), Type::list(elem)]
            }
            Con::Bool(_) | Con::Unit | Con::Int(_) | Con::Float(_) | Con::Str(_) | Con::Nil => {
                Vec::new()
            }
        }
    }
}

fn covers(heads: &[Con], con: &Con) -> bool {
    match con {
        Con::Record(_) => true,
        _ => heads.contains(con),
    }
}

fn rows_all_wild(rows: &[Vec<Pat>]) -> bool {
    rows.iter().all(|row| matches!(row.first(), Some(Pat::Wild) | None))
}

fn column_record_fields(rows: &[Vec<Pat>]) -> Option<Vec<String>> {
    let mut fields: Vec<String> = Vec::new();
    let mut any = false;
    for row in rows {
        if let Some(Pat::Record(pats)) = row.first() {
            any = true;
            for name in pats.keys() {
                if !fields.contains(name) {
                    fields.push(name.clone());
                }
            }
        }
    }
    fields.sort();
    any.then_some(fields)
}

fn expand_or_heads(rows: Vec<Vec<Pat>>) -> Vec<Vec<Pat>> {
    let mut expanded = Vec::with_capacity(rows.len());
    for row in rows {
        match row.first() {
            Some(Pat::Or(alternatives)) => {
                let alternatives = alternatives.clone();
                let alternative_rows = alternatives
                    .into_iter()
                    .map(|alt| {
                        let mut new_row = vec![alt];
                        new_row.extend(row[1..].iter().cloned());
                        new_row
                    })
                    .collect();
                expanded.extend(expand_or_heads(alternative_rows));
            }
            _ => expanded.push(row),
        }
    }
    expanded
}

/// The row's remaining columns if its head can match `con`, with the head
/// replaced by its `arity` sub-patterns.
fn specialize(row: &[Pat], con: &Con, arity: usize) -> Option<Vec<Pat>> {
    let (head, rest) = row.split_first()?;
    let mut args = match head {
        Pat::Wild => vec![Pat::Wild; arity],
        Pat::Con(head_con, args) if head_con == con => args.clone(),
        Pat::Record(fields) => match con {
            Con::Record(names) => names
                .iter()
                .map(|name| fields.get(name).cloned().unwrap_or(Pat::Wild))
                .collect(),
            _ => return None,
        },
        Pat::Con(..) | Pat::Or(_) => return None,
    };
    args.resize(arity, Pat::Wild);
    args.extend(rest.iter().cloned());
    Some(args)
}

fn witness_for(con: &Con, args: Vec<MissingCase>) -> MissingCase {
    match con {
        Con::Variant(name) => MissingCase::Constructor {
            name: name.clone(),
            args,
        },
        Con::Bool(b) => MissingCase::Literal(b.to_string()),
        Con::Unit => MissingCase::Literal("()".to_string()),
        Con::Int(i) => MissingCase::Literal(i.to_string()),
        Con::Float(bits) => MissingCase::Literal(f64::from_bits(*bits).to_string()),
        Con::Str(s) => MissingCase::Literal(format!("{:?}", s)),
        Con::Tuple(_) => MissingCase::Tuple(args),
        Con::Record(names) => MissingCase::Record(names.iter().cloned().zip(args).collect()),
        Con::Nil => MissingCase::EmptyList,
        Con::Cons => {
            let mut args = args.into_iter();
            let head = args.next().unwrap_or(MissingCase::Wildcard);
            let tail = args.next().unwrap_or(MissingCase::Wildcard);
            MissingCase::NonEmptyList {
                head: Box::new(head),
                tail: Box::new(tail),
            }
        }
    }
}
