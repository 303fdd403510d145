//! Let-polymorphism: generalization, instantiation and the value restriction.

use log::trace;

use super::env::TypeEnv;
use super::subst::Substitution;
use super::ty::{Level, Type, TypeScheme, TypeVar};
use super::unify::{UnifyError, occurs_in};
use crate::core::{Expr, RecordEntry};

/// Monotonic source of fresh type variables; ids are unique per supply.
#[derive(Debug, Default)]
pub struct VarSupply {
    next: u32,
}

impl VarSupply {
    pub fn new() -> Self {
        VarSupply::default()
    }

    /// Starts after every id used so far, e.g. by the builtin environment.
    pub fn starting_at(next: u32) -> Self {
        VarSupply { next }
    }

    pub fn fresh_var(&mut self, level: Level) -> TypeVar {
        let id = self.next;
        self.next += 1;
        TypeVar::new(id, level)
    }

    pub fn fresh(&mut self, level: Level) -> Type {
        Type::Var(self.fresh_var(level))
    }
}

/// Quantifies the variables of `ty` that were created deeper than `level`.
///
/// `ty` is read through `subst`. A variable is quantified when its (possibly
/// lowered) level exceeds `level` and it is not free in `env`.
pub fn generalize(env: &TypeEnv, level: Level, ty: &Type, subst: &Substitution) -> TypeScheme {
    let ty = subst.apply(ty);
    let env_free = env.free_type_vars(subst);
    let vars: Vec<TypeVar> = ty
        .free_type_vars()
        .into_iter()
        .filter(|v| v.level > level && !env_free.contains(v))
        .collect();
    let scheme = TypeScheme::polymorphic(vars, ty);
    trace!("generalized at level {}: {}", level, scheme);
    scheme
}

/// Binds every variable of `ty` created deeper than `level` that is only known
/// through the fields used on it to the record of exactly those fields.
///
/// Runs before generalization: a scheme cannot carry "at least these fields",
/// so `(p) => p.name` becomes `forall 'a. ({ name: 'a }) -> 'a`. Callers still
/// accept wider records through width subtyping.
pub fn close_records(
    subst: &Substitution,
    ty: &Type,
    level: Level,
) -> Result<Substitution, UnifyError> {
    let mut subst = subst.clone();
    loop {
        let open = subst
            .apply(ty)
            .free_type_vars()
            .into_iter()
            .filter(|v| v.level > level)
            .find_map(|v| subst.record_shape(&v).map(|fields| (v, fields)));
        let Some((var, fields)) = open else {
            return Ok(subst);
        };
        let record = Type::Record(fields);
        if occurs_in(&var, &record) {
            return Err(UnifyError::InfiniteType { var, ty: record });
        }
        trace!("closed {} as {}", var, record);
        subst = subst.bind(var, record);
    }
}

/// Replaces each quantified variable with a fresh one at `level`.
pub fn instantiate(scheme: &TypeScheme, level: Level, supply: &mut VarSupply) -> Type {
    if scheme.vars.is_empty() {
        return scheme.ty.clone();
    }
    let fresh: Vec<Type> = scheme.vars.iter().map(|_| supply.fresh(level)).collect();
    Substitution::from_pairs(scheme.vars.iter().zip(&fresh)).apply(&scheme.ty)
}

/// Whether `expr` may be generalized: literals, variables, lambdas, and
/// constructors fully applied to values, possibly inside tuples, lists and records.
///
/// Anything that might allocate a reference cell (`ref`, ordinary calls, `let`,
/// blocks, ...) is not a value.
pub fn is_syntactic_value(env: &TypeEnv, expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) | Expr::Var(_) | Expr::Lambda(_) => true,
        Expr::Apply(apply) => match apply.func.as_ref() {
            Expr::Var(name) => match env.lookup_constructor(&name.value) {
                Some(ctor) => {
                    ctor.arity() == apply.args.len()
                        && apply.args.iter().all(|a| is_syntactic_value(env, a))
                }
                None => false,
            },
            _ => false,
        },
        Expr::Tuple(tuple) => tuple.elements.iter().all(|e| is_syntactic_value(env, e)),
        Expr::List(list) => list.elements.iter().all(|e| is_syntactic_value(env, e)),
        Expr::Record(record) => record.entries.iter().all(|entry| match entry {
            RecordEntry::Field(field) => is_syntactic_value(env, &field.value),
            RecordEntry::Spread(base) => is_syntactic_value(env, base),
        }),
        Expr::Annotated(annotated) => is_syntactic_value(env, &annotated.expr),
        Expr::Let(_)
        | Expr::LetRecGroup(_)
        | Expr::If(_)
        | Expr::Block(_)
        | Expr::Match(_)
        | Expr::RecordUpdate(_)
        | Expr::FieldAccess(_)
        | Expr::MakeRef(_)
        | Expr::Deref(_)
        | Expr::Assign(_)
        | Expr::BinaryOp(_)
        | Expr::UnaryOp(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::builtins::builtin_env;

    #[test]
    fn test_generalize_respects_level() {
        let env = TypeEnv::empty();
        let inner = TypeVar::new(0, 2);
        let outer = TypeVar::new(1, 1);
        let ty = Type::func(vec![Type::Var(inner)], Type::Var(outer));
        let scheme = generalize(&env, 1, &ty, &Substitution::empty());
        assert_eq!(scheme.vars, vec![inner]);
    }

    #[test]
    fn test_generalize_skips_env_vars() {
        let shared = TypeVar::new(0, 2);
        let env = TypeEnv::empty().extend_value("x", TypeScheme::monomorphic(Type::Var(shared)));
        let scheme = generalize(&env, 1, &Type::list(Type::Var(shared)), &Substitution::empty());
        assert!(scheme.vars.is_empty());
    }

    #[test]
    fn test_generalize_reads_lowered_levels() {
        let outer = TypeVar::new(0, 1);
        let inner = TypeVar::new(1, 2);
        let subst = Substitution::empty().bind(outer, Type::list(Type::Var(inner)));
        let scheme = generalize(&TypeEnv::empty(), 1, &Type::Var(inner), &subst);
        assert!(!scheme.is_polymorphic());
    }

    #[test]
    fn test_close_records_binds_deep_vars() {
        let deep = TypeVar::new(0, 2);
        let outer = TypeVar::new(1, 1);
        let field = Type::var(2, 2);
        let subst = Substitution::empty()
            .require_field(deep, "name", field.clone())
            .require_field(outer, "age", Type::int());
        let ty = Type::func(vec![Type::Var(deep), Type::Var(outer)], field.clone());
        let closed = close_records(&subst, &ty, 1).unwrap();
        assert_eq!(closed.apply(&Type::Var(deep)), Type::record([("name", field)]));
        assert_eq!(closed.apply(&Type::Var(outer)), Type::Var(outer));
        assert!(closed.record_shape(&outer).is_some());
    }

    #[test]
    fn test_close_records_rejects_cycles() {
        let v = TypeVar::new(0, 2);
        let subst = Substitution::empty().require_field(v, "next", Type::Var(v));
        let result = close_records(&subst, &Type::Var(v), 1);
        assert!(matches!(result, Err(UnifyError::InfiniteType { .. })));
    }

    #[test]
    fn test_instantiate_is_independent() {
        let a = TypeVar::new(0, 1);
        let scheme = TypeScheme::polymorphic(vec![a], Type::func(vec![Type::Var(a)], Type::Var(a)));
        let mut supply = VarSupply::starting_at(10);
        let first = instantiate(&scheme, 1, &mut supply);
        let second = instantiate(&scheme, 1, &mut supply);
        assert_ne!(first, second);
        assert!(!first.free_type_vars().contains(&a));
    }

    #[test]
    fn test_value_restriction() {
        let env = builtin_env();
        assert!(is_syntactic_value(&env, &Expr::int(1)));
        assert!(is_syntactic_value(&env, &Expr::lambda(&["x"], Expr::var("x"))));
        let wrapped_id = Expr::call("Some", vec![Expr::lambda(&["x"], Expr::var("x"))]);
        assert!(is_syntactic_value(&env, &wrapped_id));
        let pair = Expr::tuple(vec![Expr::var("None"), Expr::list(vec![])]);
        assert!(is_syntactic_value(&env, &pair));
        assert!(!is_syntactic_value(&env, &Expr::make_ref(Expr::list(vec![]))));
        assert!(!is_syntactic_value(&env, &Expr::call("length", vec![Expr::list(vec![])])));
        assert!(!is_syntactic_value(&env, &Expr::call("Some", vec![Expr::make_ref(Expr::int(1))])));
    }
}
