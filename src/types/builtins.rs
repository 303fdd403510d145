//! The environment every module is checked in.

use super::env::{Binding, ConstructorDef, TypeDefKind, TypeDefinition, TypeEnv};
use super::generalize::VarSupply;
use super::ty::{BOOL, FLOAT, INT, LIST, OPTION, REF, RESULT, STRING, Type, TypeScheme, UNIT};

/// Builtin types and prelude values, with variables drawn from `supply`.
pub fn install(supply: &mut VarSupply) -> TypeEnv {
    let env = add_builtin_types(TypeEnv::empty(), supply);
    add_builtin_values(env, supply)
}

/// Builtin environment with its own variable supply.
///
/// Checking against this environment must use a supply that starts after the
/// ids it used; prefer [`install`] with a shared supply.
pub fn builtin_env() -> TypeEnv {
    install(&mut VarSupply::new())
}

fn add_builtin_types(env: TypeEnv, supply: &mut VarSupply) -> TypeEnv {
    let mut env = env;
    for name in [INT, FLOAT, STRING, BOOL, UNIT] {
        env = env.define_type(TypeDefinition::opaque(name, vec![]));
    }

    // List<'a>, Ref<'a>
    for name in [LIST, REF] {
        env = env.define_type(TypeDefinition::opaque(name, vec![supply.fresh_var(0)]));
    }

    // Option<'a> = Some('a) | None
    let a = supply.fresh_var(0);
    env = env.define_type(TypeDefinition {
        name: OPTION.to_string(),
        params: vec![a],
        kind: TypeDefKind::Variant(vec![
            ConstructorDef {
                name: "Some".to_string(),
                args: vec![Type::Var(a)],
            },
            ConstructorDef {
                name: "None".to_string(),
                args: vec![],
            },
        ]),
    });

    // Result<'a, 'e> = Ok('a) | Error('e)
    let a = supply.fresh_var(0);
    let e = supply.fresh_var(0);
    env.define_type(TypeDefinition {
        name: RESULT.to_string(),
        params: vec![a, e],
        kind: TypeDefKind::Variant(vec![
            ConstructorDef {
                name: "Ok".to_string(),
                args: vec![Type::Var(a)],
            },
            ConstructorDef {
                name: "Error".to_string(),
                args: vec![Type::Var(e)],
            },
        ]),
    })
}

fn add_builtin_values(env: TypeEnv, supply: &mut VarSupply) -> TypeEnv {
    let mono = |ty: Type| Binding::Value(TypeScheme::monomorphic(ty));

    // toString: ('a) -> String
    let a = supply.fresh_var(0);
    let to_string =
        TypeScheme::polymorphic(vec![a], Type::func(vec![Type::Var(a)], Type::string()));

    // length: (List<'a>) -> Int
    let a = supply.fresh_var(0);
    let length = TypeScheme::polymorphic(
        vec![a],
        Type::func(vec![Type::list(Type::Var(a))], Type::int()),
    );

    env.extend_many([
        ("print", mono(Type::func(vec![Type::string()], Type::unit()))),
        ("toString", Binding::Value(to_string)),
        ("intToFloat", mono(Type::func(vec![Type::int()], Type::float()))),
        ("floatToInt", mono(Type::func(vec![Type::float()], Type::int()))),
        ("length", Binding::Value(length)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types_present() {
        let env = builtin_env();
        for name in [INT, FLOAT, STRING, BOOL, UNIT, LIST, REF, OPTION, RESULT] {
            assert!(env.lookup_type(name).is_some(), "missing builtin type {}", name);
        }
        assert_eq!(env.lookup_type(RESULT).unwrap().params.len(), 2);
    }

    #[test]
    fn test_builtin_constructors() {
        let env = builtin_env();
        assert_eq!(env.lookup_constructor("Some").unwrap().arity(), 1);
        assert_eq!(env.lookup_constructor("None").unwrap().arity(), 0);
        assert_eq!(env.lookup_constructor("Error").unwrap().type_name, RESULT);
    }

    #[test]
    fn test_builtin_values() {
        let env = builtin_env();
        assert_eq!(env.lookup("print").unwrap().scheme().pretty(), "(String) -> Unit");
        assert_eq!(
            env.lookup("length").unwrap().scheme().pretty(),
            "forall 'a. (List<'a>) -> Int"
        );
    }

    #[test]
    fn test_install_advances_supply() {
        let mut supply = VarSupply::new();
        install(&mut supply);
        assert!(supply.fresh_var(0).id >= 7);
    }
}
