//! Resolution of written type expressions into [`Type`]s.

use std::collections::HashMap;

use super::env::TypeEnv;
use super::error::{TypeError, TypeErrorKind};
use super::generalize::VarSupply;
use super::ty::{Level, Type, TypeVar};
use crate::core::TypeExpr;

/// Scope of the `'a` variables an annotation may mention.
enum VarScope {
    /// Type declarations: only the declared parameters.
    Declared,
    /// Value annotations: each new name gets a fresh variable at `level`.
    Fresh(Level),
}

pub struct AnnotationResolver<'a> {
    env: &'a TypeEnv,
    vars: HashMap<String, Type>,
    scope: VarScope,
}

impl<'a> AnnotationResolver<'a> {
    /// Resolver for the body of a type declaration with parameters `params`.
    pub fn for_declaration(env: &'a TypeEnv, params: &[(String, TypeVar)]) -> Self {
        AnnotationResolver {
            env,
            vars: params
                .iter()
                .map(|(name, var)| (name.clone(), Type::Var(*var)))
                .collect(),
            scope: VarScope::Declared,
        }
    }

    /// Resolver for a single value annotation; its variables are created at `level`.
    pub fn for_annotation(env: &'a TypeEnv, level: Level) -> Self {
        AnnotationResolver {
            env,
            vars: HashMap::new(),
            scope: VarScope::Fresh(level),
        }
    }

    pub fn resolve(&mut self, expr: &TypeExpr, supply: &mut VarSupply) -> Result<Type, TypeError> {
        match expr {
            TypeExpr::Named {
                name,
                args,
                position,
            } => {
                let Some(def) = self.env.lookup_type(name) else {
                    return Err(TypeError::new(
                        TypeErrorKind::UnknownType { name: name.clone() },
                        position.clone(),
                    ));
                };
                if def.params.len() != args.len() {
                    return Err(TypeError::arity_mismatch(
                        format!("type arguments of {}", name),
                        def.params.len(),
                        args.len(),
                        position.clone(),
                    ));
                }
                if args.is_empty() {
                    return Ok(Type::con(name));
                }
                let args = args
                    .iter()
                    .map(|a| self.resolve(a, supply))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::app(name, args))
            }
            TypeExpr::Var { name, position } => {
                if let Some(ty) = self.vars.get(name) {
                    return Ok(ty.clone());
                }
                match self.scope {
                    VarScope::Fresh(level) => {
                        let ty = supply.fresh(level);
                        self.vars.insert(name.clone(), ty.clone());
                        Ok(ty)
                    }
                    VarScope::Declared => Err(TypeError::new(
                        TypeErrorKind::UnknownType {
                            name: format!("'{}", name),
                        },
                        position.clone(),
                    )
                    .with_hint(format!("declare '{} as a type parameter", name))),
                }
            }
            TypeExpr::Function { params, result, .. } => {
                let params = params
                    .iter()
                    .map(|p| self.resolve(p, supply))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = self.resolve(result, supply)?;
                Ok(Type::func(params, result))
            }
            TypeExpr::Record { fields, .. } => {
                let mut resolved = Vec::with_capacity(fields.len());
                for field in fields {
                    resolved.push((field.name.clone(), self.resolve(&field.ty, supply)?));
                }
                Ok(Type::record(resolved))
            }
            TypeExpr::Tuple { elements, .. } => {
                let elements = elements
                    .iter()
                    .map(|e| self.resolve(e, supply))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::Tuple(elements))
            }
        }
    }
}

/// Resolves a standalone value annotation.
pub fn resolve_annotation(
    env: &TypeEnv,
    expr: &TypeExpr,
    level: Level,
    supply: &mut VarSupply,
) -> Result<Type, TypeError> {
    AnnotationResolver::for_annotation(env, level).resolve(expr, supply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::builtins::builtin_env;

    #[test]
    fn test_resolve_builtin_names() {
        let env = builtin_env();
        let mut supply = VarSupply::starting_at(100);
        let expr = TypeExpr::function(
            vec![TypeExpr::named("List", vec![TypeExpr::named("Int", vec![])])],
            TypeExpr::named("Option", vec![TypeExpr::named("String", vec![])]),
        );
        let ty = resolve_annotation(&env, &expr, 1, &mut supply).unwrap();
        assert_eq!(ty.pretty(), "(List<Int>) -> Option<String>");
    }

    #[test]
    fn test_same_variable_name_shares_type() {
        let env = builtin_env();
        let mut supply = VarSupply::starting_at(100);
        let expr = TypeExpr::function(vec![TypeExpr::var("a")], TypeExpr::var("a"));
        match resolve_annotation(&env, &expr, 1, &mut supply).unwrap() {
            Type::Function(params, result) => assert_eq!(params[0], *result),
            other => panic!("Expected function type, got {}", other),
        }
    }

    #[test]
    fn test_unknown_type() {
        let env = builtin_env();
        let mut supply = VarSupply::starting_at(100);
        let widget = TypeExpr::named("Widget", vec![]);
        let err = resolve_annotation(&env, &widget, 1, &mut supply).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::UnknownType { .. }));
    }

    #[test]
    fn test_wrong_type_argument_count() {
        let env = builtin_env();
        let mut supply = VarSupply::starting_at(100);
        let err =
            resolve_annotation(&env, &TypeExpr::named("List", vec![]), 1, &mut supply).unwrap_err();
        assert!(matches!(
            err.kind,
            TypeErrorKind::ArityMismatch {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_undeclared_parameter_in_declaration() {
        let env = builtin_env();
        let mut supply = VarSupply::starting_at(100);
        let a = supply.fresh_var(0);
        let mut resolver = AnnotationResolver::for_declaration(&env, &[("a".to_string(), a)]);
        assert_eq!(resolver.resolve(&TypeExpr::var("a"), &mut supply).unwrap(), Type::Var(a));
        let err = resolver.resolve(&TypeExpr::var("b"), &mut supply).unwrap_err();
        assert!(err.hint.is_some());
    }
}
