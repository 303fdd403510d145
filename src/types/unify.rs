use std::collections::BTreeMap;

use thiserror::Error;

use super::subst::Substitution;
use super::ty::{REF, Type, TypeVar};

/// Upper bound on alias expansions performed by a single unification.
const MAX_EXPANSIONS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnifyError {
    #[error("type mismatch: expected {expected}, found {actual}")]
    Mismatch { expected: Type, actual: Type },

    #[error("cannot construct infinite type: {var} = {ty}")]
    InfiniteType { var: TypeVar, ty: Type },

    #[error(
        "arity mismatch: expected {expected} with {expected_arity} element(s), \
         found {actual} with {actual_arity}"
    )]
    ArityMismatch {
        expected: Type,
        actual: Type,
        expected_arity: usize,
        actual_arity: usize,
    },

    #[error("record {actual} has no field `{field}` required by {expected}")]
    MissingField {
        field: String,
        expected: Type,
        actual: Type,
    },
}

/// One-level expansion of named types into their structure.
///
/// Unification only expands a name when it meets a type of a different shape,
/// so recursive definitions are unfolded at most as deep as the structural
/// type they are compared with.
pub trait ExpandNamed {
    fn expand(&self, ty: &Type) -> Option<Type>;
}

/// Treats every named type as opaque.
pub struct Opaque;

impl ExpandNamed for Opaque {
    fn expand(&self, _ty: &Type) -> Option<Type> {
        None
    }
}

/// Check if a type variable occurs within a type (occurs check).
///
/// The occurs check prevents the creation of infinite types by ensuring
/// we never create a substitution like `'t0 = ('t0) -> Int`.
///
/// ```text
/// occurs_in('t0, Int) = false
/// occurs_in('t0, 't0) = true
/// occurs_in('t0, List<'t0>) = true
/// occurs_in('t0, { next: ('t1) -> 't0 }) = true
/// ```
///
/// `ty` must already have the current substitution applied, so that chains
/// through bound variables are visible.
pub fn occurs_in(var: &TypeVar, ty: &Type) -> bool {
    match ty {
        Type::Const(_) => false,
        Type::Var(v) => v == var,
        Type::App(ctor, args) => occurs_in(var, ctor) || args.iter().any(|a| occurs_in(var, a)),
        Type::Function(params, result) => {
            params.iter().any(|p| occurs_in(var, p)) || occurs_in(var, result)
        }
        Type::Record(fields) => fields.values().any(|f| occurs_in(var, f)),
        Type::Tuple(elems) => elems.iter().any(|e| occurs_in(var, e)),
    }
}

/// Unify two types, extending `subst` so that it makes them equal.
///
/// This is the core of Hindley-Milner inference. Both sides are first
/// rewritten with `subst`, then compared structurally:
///
/// ```text
/// unify(Int, Int)                     = subst
/// unify('t0, Int)                     = subst + [t0 := Int]
/// unify(('t0) -> 't1, (Int) -> Bool)  = subst + [t0 := Int, t1 := Bool]
/// unify('t0, List<'t0>)               = InfiniteType
/// unify((Int) -> Int, (Int, Int) -> Int) = ArityMismatch
/// ```
///
/// # Records
///
/// Record unification is directional. `expected` describes what a context
/// needs and `actual` what an expression provides: `actual` must have every
/// field of `expected` (with unifiable types) and may have more.
///
/// ```text
/// unify({ name: 't0 }, { name: String, age: Int }) = [t0 := String]
/// unify({ name: String, age: Int }, { name: 't0 }) = MissingField(age)
/// ```
///
/// Function parameters flip the direction: a function accepting wider
/// records can stand in for one accepting narrower ones. The content of a
/// `Ref` is invariant: a cell may be written through any alias, so records
/// inside it must have exactly the same fields on both sides.
///
/// A variable with recorded fields (see [`Substitution::record_shape`]) can
/// only be bound to a type that has at least those fields. Two such variables
/// merge their fields.
///
/// # Levels
///
/// Binding `'t := T` lowers every variable of `T` to the level of `'t`
/// (see [`Substitution::bind`]), so that generalization never quantifies a
/// variable still reachable from an outer scope.
///
/// Unification never backtracks; the first failure is returned.
pub fn unify(
    expected: &Type,
    actual: &Type,
    subst: &Substitution,
) -> Result<Substitution, UnifyError> {
    unify_in(&Opaque, expected, actual, subst)
}

/// Like [`unify`], but expands named aliases and record types through `names`
/// when a name meets a structural type.
pub fn unify_in<E: ExpandNamed + ?Sized>(
    names: &E,
    expected: &Type,
    actual: &Type,
    subst: &Substitution,
) -> Result<Substitution, UnifyError> {
    let mut unifier = Unifier {
        names,
        expansions: 0,
        invariant: 0,
    };
    unifier.unify(expected, actual, subst)
}

struct Unifier<'a, E: ?Sized> {
    names: &'a E,
    expansions: usize,
    /// Number of enclosing `Ref` arguments; records compare exactly when non-zero.
    invariant: usize,
}

impl<E: ExpandNamed + ?Sized> Unifier<'_, E> {
    fn unify(
        &mut self,
        expected: &Type,
        actual: &Type,
        subst: &Substitution,
    ) -> Result<Substitution, UnifyError> {
        let expected = subst.apply(expected);
        let actual = subst.apply(actual);
        self.unify_applied(&expected, &actual, subst)
    }

    fn unify_applied(
        &mut self,
        expected: &Type,
        actual: &Type,
        subst: &Substitution,
    ) -> Result<Substitution, UnifyError> {
        match (expected, actual) {
            (Type::Var(v1), Type::Var(v2)) if v1 == v2 => Ok(subst.clone()),
            (Type::Var(v), t) | (t, Type::Var(v)) => self.bind(*v, t, subst),

            (Type::Const(a), Type::Const(b)) if a == b => Ok(subst.clone()),

            (Type::App(c1, a1), Type::App(c2, a2)) if c1 == c2 => {
                if a1.len() != a2.len() {
                    return Err(arity_mismatch(expected, actual, a1.len(), a2.len()));
                }
                let invariant = c1.is_named(REF);
                if invariant {
                    self.invariant += 1;
                }
                let mut result = Ok(subst.clone());
                for (e, a) in a1.iter().zip(a2) {
                    result = result.and_then(|subst| self.unify(e, a, &subst));
                }
                if invariant {
                    self.invariant -= 1;
                }
                result
            }

            (Type::Function(p1, r1), Type::Function(p2, r2)) => {
                if p1.len() != p2.len() {
                    return Err(arity_mismatch(expected, actual, p1.len(), p2.len()));
                }
                let mut subst = subst.clone();
                for (e, a) in p1.iter().zip(p2) {
                    subst = self.unify(a, e, &subst)?;
                }
                self.unify(r1, r2, &subst)
            }

            (Type::Tuple(e1), Type::Tuple(e2)) => {
                if e1.len() != e2.len() {
                    return Err(arity_mismatch(expected, actual, e1.len(), e2.len()));
                }
                let mut subst = subst.clone();
                for (e, a) in e1.iter().zip(e2) {
                    subst = self.unify(e, a, &subst)?;
                }
                Ok(subst)
            }

            (Type::Record(wanted), Type::Record(provided)) => {
                let mut subst = subst.clone();
                for (name, field_ty) in wanted {
                    match provided.get(name) {
                        Some(provided_ty) => subst = self.unify(field_ty, provided_ty, &subst)?,
                        None => {
                            return Err(UnifyError::MissingField {
                                field: name.clone(),
                                expected: expected.clone(),
                                actual: actual.clone(),
                            });
                        }
                    }
                }
                if self.invariant > 0 {
                    if let Some(extra) = provided.keys().find(|name| !wanted.contains_key(*name)) {
                        return Err(UnifyError::MissingField {
                            field: extra.clone(),
                            expected: actual.clone(),
                            actual: expected.clone(),
                        });
                    }
                }
                Ok(subst)
            }

            _ => self.unify_expanded(expected, actual, subst),
        }
    }

    fn unify_expanded(
        &mut self,
        expected: &Type,
        actual: &Type,
        subst: &Substitution,
    ) -> Result<Substitution, UnifyError> {
        let mismatch = || UnifyError::Mismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        };
        if self.expansions >= MAX_EXPANSIONS {
            return Err(mismatch());
        }
        if let Some(expanded) = self.names.expand(expected) {
            self.expansions += 1;
            return self.unify(&expanded, actual, subst);
        }
        if let Some(expanded) = self.names.expand(actual) {
            self.expansions += 1;
            return self.unify(expected, &expanded, subst);
        }
        Err(mismatch())
    }

    fn bind(
        &mut self,
        var: TypeVar,
        ty: &Type,
        subst: &Substitution,
    ) -> Result<Substitution, UnifyError> {
        if occurs_in(&var, ty) {
            return Err(UnifyError::InfiniteType {
                var,
                ty: ty.clone(),
            });
        }
        let required = subst.record_shape(&var);
        let bound = subst.bind(var, ty.clone());
        let Some(required) = required else {
            return Ok(bound);
        };

        // The recorded fields describe what `var` is known to have, not an exact
        // record, so they are checked with the ordinary width rule.
        let invariant = std::mem::take(&mut self.invariant);
        let result = match ty {
            Type::Var(other) => self.merge_fields(*other, required, bound),
            _ => self.unify(&Type::Record(required), ty, &bound),
        };
        self.invariant = invariant;
        result
    }

    fn merge_fields(
        &mut self,
        var: TypeVar,
        fields: BTreeMap<String, Type>,
        subst: Substitution,
    ) -> Result<Substitution, UnifyError> {
        let mut subst = subst;
        for (name, field_ty) in fields {
            let known = subst.record_shape(&var).and_then(|mut known| known.remove(&name));
            subst = match known {
                Some(known) => self.unify(&known, &field_ty, &subst)?,
                None => subst.require_field(var, &name, field_ty),
            };
        }
        Ok(subst)
    }
}

fn arity_mismatch(
    expected: &Type,
    actual: &Type,
    expected_arity: usize,
    actual_arity: usize,
) -> UnifyError {
    UnifyError::ArityMismatch {
        expected: expected.clone(),
        actual: actual.clone(),
        expected_arity,
        actual_arity,
    }
}
