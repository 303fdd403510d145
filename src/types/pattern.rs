//! Type checking of `match` patterns against a scrutinee type.

use std::collections::BTreeMap;

use lachs::Span;

use super::env::TypeEnv;
use super::error::{TypeError, TypeErrorKind};
use super::generalize::VarSupply;
use super::subst::Substitution;
use super::ty::{Level, Type};
use super::unify::unify_in;
use crate::core::{FieldPattern, Literal, LiteralValue, Pattern};

/// Variables bound by a pattern, with their types.
pub type PatternBindings = BTreeMap<String, Type>;

/// Checks `pattern` against `scrutinee`, returning the variables it binds and the
/// extended substitution.
///
/// Record patterns only require the named fields to be present. When the
/// scrutinee's type is still unknown, the named fields are recorded on its
/// variable, which stays open for further fields; tuple and list patterns
/// synthesize their shape from the pattern itself.
pub fn check_pattern(
    env: &TypeEnv,
    pattern: &Pattern,
    scrutinee: &Type,
    subst: &Substitution,
    level: Level,
    supply: &mut VarSupply,
) -> Result<(PatternBindings, Substitution), TypeError> {
    let mut checker = PatternChecker {
        env,
        level,
        supply,
        bindings: BTreeMap::new(),
    };
    let subst = checker.check(pattern, scrutinee, subst)?;
    let bindings = checker
        .bindings
        .into_iter()
        .map(|(name, (ty, _))| (name, ty))
        .collect();
    Ok((bindings, subst))
}

pub fn literal_type(literal: &Literal) -> Type {
    match literal.value {
        LiteralValue::Int(_) => Type::int(),
        LiteralValue::Float(_) => Type::float(),
        LiteralValue::String(_) => Type::string(),
        LiteralValue::Bool(_) => Type::bool(),
        LiteralValue::Unit => Type::unit(),
    }
}

struct PatternChecker<'a> {
    env: &'a TypeEnv,
    level: Level,
    supply: &'a mut VarSupply,
    bindings: BTreeMap<String, (Type, Span)>,
}

impl PatternChecker<'_> {
    fn check(
        &mut self,
        pattern: &Pattern,
        ty: &Type,
        subst: &Substitution,
    ) -> Result<Substitution, TypeError> {
        match pattern {
            Pattern::Wildcard(_) => Ok(subst.clone()),

            Pattern::Var(ident) => {
                self.bind(&ident.value, ty.clone(), ident.position.clone())?;
                Ok(subst.clone())
            }

            Pattern::Literal(literal) => {
                self.unify(ty, &literal_type(literal), subst, &literal.position)
            }

            Pattern::Constructor {
                name,
                args,
                position,
            } => {
                let Some(ctor) = self.env.lookup_constructor(&name.value) else {
                    return Err(TypeError::new(
                        TypeErrorKind::UnknownConstructor {
                            name: name.value.clone(),
                        },
                        name.position.clone(),
                    ));
                };
                if ctor.arity() != args.len() {
                    return Err(TypeError::arity_mismatch(
                        format!("constructor {}", ctor.name),
                        ctor.arity(),
                        args.len(),
                        position.clone(),
                    ));
                }
                let fresh: Vec<Type> =
                    ctor.params.iter().map(|_| self.supply.fresh(self.level)).collect();
                let inst = Substitution::from_pairs(ctor.params.iter().zip(&fresh));
                let result = inst.apply(&ctor.result);
                let arg_types: Vec<Type> = ctor.args.iter().map(|a| inst.apply(a)).collect();

                let mut subst = self.unify(ty, &result, subst, position)?;
                for (arg, arg_ty) in args.iter().zip(&arg_types) {
                    subst = self.check(arg, arg_ty, &subst)?;
                }
                Ok(subst)
            }

            Pattern::Record { fields, position } => self.check_record(fields, ty, subst, position),

            Pattern::Tuple { elements, position } => {
                if let Type::Tuple(types) = subst.apply(ty) {
                    if types.len() != elements.len() {
                        return Err(TypeError::arity_mismatch(
                            "tuple pattern",
                            types.len(),
                            elements.len(),
                            position.clone(),
                        ));
                    }
                }
                let types: Vec<Type> =
                    elements.iter().map(|_| self.supply.fresh(self.level)).collect();
                let mut subst = self.unify(ty, &Type::Tuple(types.clone()), subst, position)?;
                for (element, element_ty) in elements.iter().zip(&types) {
                    subst = self.check(element, element_ty, &subst)?;
                }
                Ok(subst)
            }

            Pattern::List {
                elements,
                rest,
                position,
            } => {
                let elem = self.supply.fresh(self.level);
                let list = Type::list(elem.clone());
                let mut subst = self.unify(ty, &list, subst, position)?;
                for element in elements {
                    subst = self.check(element, &elem, &subst)?;
                }
                match rest {
                    Some(rest) => self.check(rest, &list, &subst),
                    None => Ok(subst),
                }
            }

            Pattern::Or {
                alternatives,
                position,
            } => self.check_or(alternatives, ty, subst, position),
        }
    }

    fn check_record(
        &mut self,
        fields: &[FieldPattern],
        ty: &Type,
        subst: &Substitution,
        position: &Span,
    ) -> Result<Substitution, TypeError> {
        let applied = subst.apply(ty);
        if let Type::Var(var) = applied {
            let mut subst = subst.clone();
            for field in fields {
                let (next, field_ty) =
                    subst.field_of(var, &field.name, || self.supply.fresh(self.level));
                subst = self.check(&field.pattern, &field_ty, &next)?;
            }
            return Ok(subst);
        }

        let Some(declared) = self.env.record_fields(&applied) else {
            let shape = fields
                .iter()
                .map(|f| (f.name.clone(), self.supply.fresh(self.level)))
                .collect::<Vec<_>>();
            return Err(TypeError::type_mismatch(Type::record(shape), applied, position.clone()));
        };

        let mut subst = subst.clone();
        for field in fields {
            let Some(field_ty) = declared.get(&field.name) else {
                return Err(TypeError::new(
                    TypeErrorKind::MissingField {
                        field: field.name.clone(),
                        expected: Type::record([(
                            field.name.clone(),
                            self.supply.fresh(self.level),
                        )]),
                        actual: applied.clone(),
                    },
                    field.position.clone(),
                ));
            };
            subst = self.check(&field.pattern, field_ty, &subst)?;
        }
        Ok(subst)
    }

    fn check_or(
        &mut self,
        alternatives: &[Pattern],
        ty: &Type,
        subst: &Substitution,
        position: &Span,
    ) -> Result<Substitution, TypeError> {
        let Some((first, rest)) = alternatives.split_first() else {
            return Err(TypeError::internal("empty or-pattern", position.clone()));
        };
        let (first_bindings, mut subst) = self.check_alternative(first, ty, subst)?;
        for alternative in rest {
            let (bindings, next) = self.check_alternative(alternative, ty, &subst)?;
            subst = next;
            if !bindings.keys().eq(first_bindings.keys()) {
                return Err(TypeError::new(
                    TypeErrorKind::InconsistentOrPatternBindings {
                        left: first_bindings.keys().cloned().collect(),
                        right: bindings.keys().cloned().collect(),
                    },
                    alternative.position(),
                )
                .with_related(first.position()));
            }
            for (name, (alt_ty, alt_span)) in &bindings {
                if let Some((first_ty, _)) = first_bindings.get(name) {
                    subst = self.unify(first_ty, alt_ty, &subst, alt_span)?;
                }
            }
        }
        for (name, (ty, span)) in first_bindings {
            self.bind(&name, ty, span)?;
        }
        Ok(subst)
    }

    fn check_alternative(
        &mut self,
        pattern: &Pattern,
        ty: &Type,
        subst: &Substitution,
    ) -> Result<(BTreeMap<String, (Type, Span)>, Substitution), TypeError> {
        let outer = std::mem::take(&mut self.bindings);
        let result = self.check(pattern, ty, subst);
        let inner = std::mem::replace(&mut self.bindings, outer);
        result.map(|subst| (inner, subst))
    }

    fn bind(&mut self, name: &str, ty: Type, span: Span) -> Result<(), TypeError> {
        if let Some((_, previous)) = self.bindings.get(name) {
            return Err(TypeError::new(
                TypeErrorKind::DuplicatePatternBinding {
                    name: name.to_string(),
                },
                span,
            )
            .with_related(previous.clone()));
        }
        self.bindings.insert(name.to_string(), (ty, span));
        Ok(())
    }

    fn unify(
        &self,
        expected: &Type,
        actual: &Type,
        subst: &Substitution,
        position: &Span,
    ) -> Result<Substitution, TypeError> {
        unify_in(self.env, expected, actual, subst)
            .map_err(|e| TypeError::from_unify(e, position.clone()))
    }
}
