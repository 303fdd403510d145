use std::collections::{BTreeMap, BTreeSet};

use lachs::Span;
use log::trace;

use super::annotation::{AnnotationResolver, resolve_annotation};
use super::env::{Binding, TypeEnv};
use super::error::{TypeError, TypeErrorKind};
use super::exhaustive::{Arm, check_exhaustive};
use super::generalize::{VarSupply, close_records, generalize, instantiate, is_syntactic_value};
use super::pattern::{check_pattern, literal_type};
use super::subst::Substitution;
use super::ty::{FLOAT, INT, Level, STRING, Type, TypeScheme};
use super::unify::unify_in;
use crate::core::*;

/// The value threaded through every inference step.
#[derive(Debug, Clone)]
pub struct InferenceContext {
    pub env: TypeEnv,
    pub subst: Substitution,
    pub level: Level,
}

impl InferenceContext {
    pub fn new(env: TypeEnv, subst: Substitution, level: Level) -> Self {
        InferenceContext { env, subst, level }
    }

    fn with_subst(&self, subst: Substitution) -> Self {
        InferenceContext {
            env: self.env.clone(),
            subst,
            level: self.level,
        }
    }

    fn with_env(&self, env: TypeEnv, subst: Substitution) -> Self {
        InferenceContext {
            env,
            subst,
            level: self.level,
        }
    }

    fn deeper(&self) -> Self {
        InferenceContext {
            env: self.env.clone(),
            subst: self.subst.clone(),
            level: self.level + 1,
        }
    }
}

/// Result of inferring a group of mutually recursive bindings.
#[derive(Debug, Clone)]
pub struct RecGroup {
    /// One scheme per binding, in declaration order.
    pub bindings: Vec<(String, TypeScheme)>,
    pub subst: Substitution,
}

pub struct Infer {
    supply: VarSupply,
    failed: BTreeSet<String>,
}

impl Infer {
    pub fn new(supply: VarSupply) -> Self {
        Infer {
            supply,
            failed: BTreeSet::new(),
        }
    }

    pub fn supply(&mut self) -> &mut VarSupply {
        &mut self.supply
    }

    /// Records a top-level name whose declaration failed, so later references to
    /// it are reported as such instead of as unknown.
    pub fn mark_failed(&mut self, name: &str) {
        self.failed.insert(name.to_string());
    }

    pub fn fresh(&mut self, level: Level) -> Type {
        self.supply.fresh(level)
    }

    pub fn instantiate(&mut self, scheme: &TypeScheme, level: Level) -> Type {
        let ty = instantiate(scheme, level, &mut self.supply);
        trace!("instantiated {} as {}", scheme, ty);
        ty
    }

    pub fn infer_expr(
        &mut self,
        ctx: &InferenceContext,
        expr: &Expr,
    ) -> Result<(Substitution, Type), TypeError> {
        match expr {
            Expr::Literal(literal) => Ok((ctx.subst.clone(), literal_type(literal))),

            Expr::Var(ident) => match ctx.env.lookup(&ident.value) {
                Some(binding) => {
                    let ty = self.instantiate(&binding.scheme(), ctx.level);
                    Ok((ctx.subst.clone(), ty))
                }
                None if self.failed.contains(&ident.value) => Err(TypeError::new(
                    TypeErrorKind::DependsOnFailedDeclaration {
                        name: ident.value.clone(),
                    },
                    ident.position.clone(),
                )),
                None => Err(TypeError::unknown_variable(&ident.value, ident.position.clone())),
            },

            Expr::Lambda(lambda) => self.infer_lambda(ctx, lambda),

            Expr::Apply(apply) => self.infer_apply(ctx, apply),

            Expr::Let(let_expr) => {
                let (scheme, subst) = self.infer_let_binding(
                    ctx,
                    &let_expr.name,
                    let_expr.annotation.as_ref(),
                    &let_expr.value,
                    let_expr.recursive,
                )?;
                let env = ctx.env.extend_value(let_expr.name.value.clone(), scheme);
                self.infer_expr(&ctx.with_env(env, subst), &let_expr.body)
            }

            Expr::LetRecGroup(group) => {
                let RecGroup { bindings, subst } = self.infer_rec_group(ctx, &group.bindings)?;
                let env = ctx
                    .env
                    .extend_many(
                        bindings
                            .into_iter()
                            .map(|(name, scheme)| (name, Binding::Value(scheme))),
                    );
                self.infer_expr(&ctx.with_env(env, subst), &group.body)
            }

            Expr::If(if_expr) => {
                let (subst, cond_ty) = self.infer_expr(ctx, &if_expr.condition)?;
                let condition_pos = if_expr.condition.position();
                let subst = self.unify(ctx, &Type::bool(), &cond_ty, &subst, &condition_pos)?;
                let (subst, then_ty) = self.infer_expr(&ctx.with_subst(subst), &if_expr.then_expr)?;
                let (subst, else_ty) = self.infer_expr(&ctx.with_subst(subst), &if_expr.else_expr)?;
                let subst =
                    self.unify(ctx, &then_ty, &else_ty, &subst, &if_expr.else_expr.position())?;
                Ok((subst, then_ty))
            }

            Expr::Block(block) => {
                let mut subst = ctx.subst.clone();
                let mut last = Type::unit();
                for expr in &block.exprs {
                    let (next, ty) = self.infer_expr(&ctx.with_subst(subst), expr)?;
                    subst = next;
                    last = ty;
                }
                Ok((subst, last))
            }

            Expr::Match(match_expr) => self.infer_match(ctx, match_expr),

            Expr::Record(record) => self.infer_record(ctx, record),

            Expr::RecordUpdate(update) => self.infer_record_update(ctx, update),

            Expr::FieldAccess(access) => self.infer_field_access(ctx, access),

            Expr::Tuple(tuple) => {
                let mut subst = ctx.subst.clone();
                let mut types = Vec::with_capacity(tuple.elements.len());
                for element in &tuple.elements {
                    let (next, ty) = self.infer_expr(&ctx.with_subst(subst), element)?;
                    subst = next;
                    types.push(ty);
                }
                Ok((subst, Type::Tuple(types)))
            }

            Expr::List(list) => {
                let elem = self.fresh(ctx.level);
                let mut subst = ctx.subst.clone();
                for element in &list.elements {
                    let (next, ty) = self.infer_expr(&ctx.with_subst(subst), element)?;
                    subst = self.unify(ctx, &elem, &ty, &next, &element.position())?;
                }
                Ok((subst, Type::list(elem)))
            }

            Expr::MakeRef(make_ref) => {
                let (subst, ty) = self.infer_expr(ctx, &make_ref.value)?;
                Ok((subst, Type::reference(ty)))
            }

            Expr::Deref(deref) => {
                let (subst, ty) = self.infer_expr(ctx, &deref.reference)?;
                let elem = self.fresh(ctx.level);
                let subst =
                    self.unify(ctx, &Type::reference(elem.clone()), &ty, &subst, &deref.position)?;
                Ok((subst, elem))
            }

            Expr::Assign(assign) => {
                let (subst, target_ty) = self.infer_expr(ctx, &assign.target)?;
                let elem = self.fresh(ctx.level);
                let subst = self.unify(
                    ctx,
                    &Type::reference(elem.clone()),
                    &target_ty,
                    &subst,
                    &assign.target.position(),
                )?;
                let (subst, value_ty) = self.infer_expr(&ctx.with_subst(subst), &assign.value)?;
                let subst = self.unify(ctx, &elem, &value_ty, &subst, &assign.value.position())?;
                Ok((subst, Type::unit()))
            }

            Expr::BinaryOp(binop) => self.infer_binop(ctx, binop),

            Expr::UnaryOp(unop) => {
                let (subst, ty) = self.infer_expr(ctx, &unop.operand)?;
                match unop.op {
                    UnaryOpKind::Neg => {
                        let (subst, ty) =
                            self.numeric(ctx, &ty, &subst, &[INT, FLOAT], &unop.position)?;
                        Ok((subst, ty))
                    }
                    UnaryOpKind::Not => {
                        let subst =
                            self.unify(ctx, &Type::bool(), &ty, &subst, &unop.operand.position())?;
                        Ok((subst, Type::bool()))
                    }
                }
            }

            Expr::Annotated(annotated) => {
                let (subst, ty) = self.infer_expr(ctx, &annotated.expr)?;
                let expected = resolve_annotation(
                    &ctx.env,
                    &annotated.annotation,
                    ctx.level,
                    &mut self.supply,
                )?;
                let subst = self.unify(ctx, &expected, &ty, &subst, &annotated.position)?;
                Ok((subst, expected))
            }
        }
    }

    fn infer_lambda(
        &mut self,
        ctx: &InferenceContext,
        lambda: &Lambda,
    ) -> Result<(Substitution, Type), TypeError> {
        let inner = ctx.deeper();
        let mut resolver = AnnotationResolver::for_annotation(&ctx.env, inner.level);
        let mut env = ctx.env.clone();
        let mut param_types = Vec::with_capacity(lambda.params.len());
        for param in &lambda.params {
            let ty = match &param.annotation {
                Some(annotation) => resolver.resolve(annotation, &mut self.supply)?,
                None => self.supply.fresh(inner.level),
            };
            env = env.extend_value(param.name.value.clone(), TypeScheme::monomorphic(ty.clone()));
            param_types.push(ty);
        }
        let (subst, body_ty) =
            self.infer_expr(&inner.with_env(env, ctx.subst.clone()), &lambda.body)?;
        Ok((subst, Type::func(param_types, body_ty)))
    }

    fn infer_apply(
        &mut self,
        ctx: &InferenceContext,
        apply: &Apply,
    ) -> Result<(Substitution, Type), TypeError> {
        let (subst, func_ty) = self.infer_expr(ctx, &apply.func)?;
        let func_ty = expand_to_function(&ctx.env, subst.apply(&func_ty));

        match func_ty {
            Type::Function(params, result) => {
                let too_many = apply.args.len() > params.len();
                if too_many || (apply.args.is_empty() && !params.is_empty()) {
                    return Err(TypeError::arity_mismatch(
                        "function call",
                        params.len(),
                        apply.args.len(),
                        apply.position.clone(),
                    )
                    .with_hint(format!(
                        "the function has type {}",
                        Type::Function(params, result)
                    )));
                }
                let mut subst = subst;
                for (arg, param) in apply.args.iter().zip(&params) {
                    let (next, arg_ty) = self.infer_expr(&ctx.with_subst(subst), arg)?;
                    subst = self.unify(ctx, param, &arg_ty, &next, &arg.position())?;
                }
                let remaining = &params[apply.args.len()..];
                let ty = if remaining.is_empty() {
                    *result
                } else {
                    Type::func(remaining.to_vec(), *result)
                };
                Ok((subst, ty))
            }
            Type::Var(_) => {
                let mut subst = subst;
                let mut arg_types = Vec::with_capacity(apply.args.len());
                for arg in &apply.args {
                    let (next, arg_ty) = self.infer_expr(&ctx.with_subst(subst), arg)?;
                    subst = next;
                    arg_types.push(arg_ty);
                }
                let result = self.fresh(ctx.level);
                let expected = Type::func(arg_types, result.clone());
                let subst = self.unify(ctx, &func_ty, &expected, &subst, &apply.func.position())?;
                Ok((subst, result))
            }
            other => {
                let params = apply.args.iter().map(|_| self.fresh(ctx.level)).collect();
                let result = self.fresh(ctx.level);
                let expected = Type::func(params, result);
                Err(TypeError::type_mismatch(expected, other, apply.func.position())
                    .with_hint("only functions can be called"))
            }
        }
    }

    /// Infers a `let` binding's value and returns the scheme it is bound with.
    ///
    /// The value is inferred one level deeper than `ctx`; it is generalized at
    /// `ctx.level` only when it is a syntactic value.
    pub fn infer_let_binding(
        &mut self,
        ctx: &InferenceContext,
        name: &Ident,
        annotation: Option<&TypeExpr>,
        value: &Expr,
        recursive: bool,
    ) -> Result<(TypeScheme, Substitution), TypeError> {
        let inner = ctx.deeper();
        let declared = match annotation {
            Some(annotation) => Some(resolve_annotation(
                &ctx.env,
                annotation,
                inner.level,
                &mut self.supply,
            )?),
            None => None,
        };

        let (subst, bound_ty) = if recursive {
            let placeholder = declared.clone().unwrap_or_else(|| self.fresh(inner.level));
            let env = ctx
                .env
                .extend_value(name.value.clone(), TypeScheme::monomorphic(placeholder.clone()));
            let (subst, value_ty) =
                self.infer_expr(&inner.with_env(env, ctx.subst.clone()), value)?;
            let subst = self.unify(ctx, &placeholder, &value_ty, &subst, &value.position())?;
            (subst, placeholder)
        } else {
            let (subst, value_ty) = self.infer_expr(&inner, value)?;
            match declared {
                Some(declared) => {
                    let subst = self.unify(ctx, &declared, &value_ty, &subst, &value.position())?;
                    (subst, declared)
                }
                None => (subst, value_ty),
            }
        };

        let generalizable = is_syntactic_value(&ctx.env, value);
        let subst = if generalizable {
            self.close_records(ctx, &bound_ty, &subst, &value.position())?
        } else {
            subst
        };
        let scheme = self.bind_scheme(ctx, &bound_ty, &subst, generalizable);
        let subst = if scheme.is_polymorphic() {
            subst
        } else {
            subst.lower_levels(&bound_ty, ctx.level)
        };
        trace!("let {} : {}", name.value, scheme);
        Ok((scheme, subst))
    }

    /// Infers a group of mutually recursive bindings.
    ///
    /// Every member sees every other member through a monomorphic placeholder.
    /// The members are generalized together once the whole group is inferred,
    /// and only when every value is a syntactic value. The resulting schemes are
    /// returned for the caller to bind.
    pub fn infer_rec_group(
        &mut self,
        ctx: &InferenceContext,
        bindings: &[RecBinding],
    ) -> Result<RecGroup, TypeError> {
        let inner = ctx.deeper();
        let mut placeholders = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let placeholder = match &binding.annotation {
                Some(annotation) => {
                    resolve_annotation(&ctx.env, annotation, inner.level, &mut self.supply)?
                }
                None => self.fresh(inner.level),
            };
            placeholders.push(placeholder);
        }

        let env = ctx.env.extend_many(bindings.iter().zip(&placeholders).map(|(b, p)| {
            (
                b.name.value.clone(),
                Binding::Value(TypeScheme::monomorphic(p.clone())),
            )
        }));

        let mut subst = ctx.subst.clone();
        for (binding, placeholder) in bindings.iter().zip(&placeholders) {
            let (next, value_ty) =
                self.infer_expr(&inner.with_env(env.clone(), subst), &binding.value)?;
            subst = self.unify(ctx, placeholder, &value_ty, &next, &binding.value.position())?;
        }

        let all_values = bindings.iter().all(|b| is_syntactic_value(&ctx.env, &b.value));
        if all_values {
            for (binding, placeholder) in bindings.iter().zip(&placeholders) {
                subst = self.close_records(ctx, placeholder, &subst, &binding.value.position())?;
            }
        }
        let mut schemes = Vec::with_capacity(bindings.len());
        for (binding, placeholder) in bindings.iter().zip(&placeholders) {
            let scheme = self.bind_scheme(ctx, placeholder, &subst, all_values);
            trace!("let rec {} : {}", binding.name.value, scheme);
            schemes.push((binding.name.value.clone(), scheme));
        }
        if !all_values {
            for placeholder in &placeholders {
                subst = subst.lower_levels(placeholder, ctx.level);
            }
        }
        Ok(RecGroup {
            bindings: schemes,
            subst,
        })
    }

    fn bind_scheme(
        &self,
        ctx: &InferenceContext,
        ty: &Type,
        subst: &Substitution,
        generalizable: bool,
    ) -> TypeScheme {
        if generalizable {
            generalize(&ctx.env, ctx.level, ty, subst)
        } else {
            TypeScheme::monomorphic(subst.apply(ty))
        }
    }

    /// Closes the open records of `ty` that are about to be generalized.
    fn close_records(
        &self,
        ctx: &InferenceContext,
        ty: &Type,
        subst: &Substitution,
        position: &Span,
    ) -> Result<Substitution, TypeError> {
        close_records(subst, ty, ctx.level).map_err(|e| TypeError::from_unify(e, position.clone()))
    }

    fn infer_match(
        &mut self,
        ctx: &InferenceContext,
        match_expr: &Match,
    ) -> Result<(Substitution, Type), TypeError> {
        let (mut subst, scrutinee_ty) = self.infer_expr(ctx, &match_expr.scrutinee)?;
        let result = self.fresh(ctx.level);

        for case in &match_expr.cases {
            let (bindings, next) = check_pattern(
                &ctx.env,
                &case.pattern,
                &scrutinee_ty,
                &subst,
                ctx.level,
                &mut self.supply,
            )?;
            let env = ctx.env.extend_many(
                bindings
                    .into_iter()
                    .map(|(name, ty)| (name, Binding::Value(TypeScheme::monomorphic(ty)))),
            );
            let case_ctx = ctx.with_env(env, next);

            let case_ctx = match &case.guard {
                Some(guard) => {
                    let (next, guard_ty) = self.infer_expr(&case_ctx, guard)?;
                    let next = unify_in(&ctx.env, &Type::bool(), &guard_ty, &next).map_err(|_| {
                        TypeError::new(
                            TypeErrorKind::NonBooleanGuard {
                                actual: next.apply(&guard_ty),
                            },
                            guard.position(),
                        )
                    })?;
                    InferenceContext::new(case_ctx.env, next, case_ctx.level)
                }
                None => case_ctx,
            };

            let (next, body_ty) = self.infer_expr(&case_ctx, &case.body)?;
            subst = self.unify(ctx, &result, &body_ty, &next, &case.body.position())?;
        }

        let arms: Vec<Arm> = match_expr
            .cases
            .iter()
            .map(|case| Arm {
                pattern: &case.pattern,
                guarded: case.guard.is_some(),
            })
            .collect();
        let missing = check_exhaustive(&ctx.env, &subst.apply_shapes(&scrutinee_ty), &arms);
        if let Some(missing) = missing.into_iter().next() {
            let hint = format!("add a case for `{}`", missing);
            let kind = TypeErrorKind::NonExhaustiveMatch { missing };
            return Err(TypeError::new(kind, match_expr.position.clone()).with_hint(hint));
        }

        Ok((subst, result))
    }

    fn infer_record(
        &mut self,
        ctx: &InferenceContext,
        record: &RecordLit,
    ) -> Result<(Substitution, Type), TypeError> {
        let mut subst = ctx.subst.clone();
        let mut fields = BTreeMap::new();
        for entry in &record.entries {
            match entry {
                RecordEntry::Field(field) => {
                    let (next, ty) = self.infer_expr(&ctx.with_subst(subst), &field.value)?;
                    subst = next;
                    fields.insert(field.name.clone(), ty);
                }
                RecordEntry::Spread(base) => {
                    let (next, ty) = self.infer_expr(&ctx.with_subst(subst), base)?;
                    subst = next;
                    let applied = subst.apply(&ty);
                    match ctx.env.record_fields(&applied) {
                        Some(spread) => fields.extend(spread),
                        None => {
                            let err = TypeError::type_mismatch(
                                empty_record(),
                                applied.clone(),
                                base.position(),
                            );
                            return Err(match applied {
                                Type::Var(_) => err.with_hint("add a type annotation"),
                                _ => err,
                            });
                        }
                    }
                }
            }
        }
        Ok((subst, Type::Record(fields)))
    }

    fn infer_record_update(
        &mut self,
        ctx: &InferenceContext,
        update: &RecordUpdate,
    ) -> Result<(Substitution, Type), TypeError> {
        let (mut subst, base_ty) = self.infer_expr(ctx, &update.base)?;
        let applied = subst.apply(&base_ty);
        let declared = match &applied {
            Type::Var(var) => {
                let mut shape = BTreeMap::new();
                for field in &update.fields {
                    let (next, field_ty) =
                        subst.field_of(*var, &field.name, || self.supply.fresh(ctx.level));
                    subst = next;
                    shape.insert(field.name.clone(), field_ty);
                }
                shape
            }
            _ => self.record_fields(ctx, &applied, &update.base.position())?,
        };

        for field in &update.fields {
            let Some(field_ty) = declared.get(&field.name) else {
                return Err(TypeError::new(
                    TypeErrorKind::FieldNotFound {
                        field: field.name.clone(),
                        ty: applied.clone(),
                    },
                    field.position.clone(),
                ));
            };
            let (next, value_ty) = self.infer_expr(&ctx.with_subst(subst), &field.value)?;
            subst = self.unify(ctx, field_ty, &value_ty, &next, &field.value.position())?;
        }
        Ok((subst, base_ty))
    }

    fn infer_field_access(
        &mut self,
        ctx: &InferenceContext,
        access: &FieldAccess,
    ) -> Result<(Substitution, Type), TypeError> {
        let (subst, record_ty) = self.infer_expr(ctx, &access.record)?;
        let applied = subst.apply(&record_ty);
        if let Type::Var(var) = applied {
            return Ok(subst.field_of(var, &access.field, || self.supply.fresh(ctx.level)));
        }
        let fields = self.record_fields(ctx, &applied, &access.record.position())?;
        match fields.get(&access.field) {
            Some(field_ty) => Ok((subst, field_ty.clone())),
            None => Err(TypeError::new(
                TypeErrorKind::FieldNotFound {
                    field: access.field.clone(),
                    ty: applied,
                },
                access.position.clone(),
            )),
        }
    }

    fn record_fields(
        &mut self,
        ctx: &InferenceContext,
        ty: &Type,
        position: &Span,
    ) -> Result<BTreeMap<String, Type>, TypeError> {
        ctx.env
            .record_fields(ty)
            .ok_or_else(|| TypeError::type_mismatch(empty_record(), ty.clone(), position.clone()))
    }

    fn infer_binop(
        &mut self,
        ctx: &InferenceContext,
        binop: &BinaryOp,
    ) -> Result<(Substitution, Type), TypeError> {
        let (subst, left) = self.infer_expr(ctx, &binop.left)?;
        let (subst, right) = self.infer_expr(&ctx.with_subst(subst), &binop.right)?;
        let right_pos = binop.right.position();

        match binop.op {
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::Div | BinOpKind::Mod => {
                let subst = self.unify(ctx, &left, &right, &subst, &right_pos)?;
                self.numeric(ctx, &left, &subst, &[INT, FLOAT], &binop.position)
            }
            BinOpKind::Lt | BinOpKind::LtEq | BinOpKind::Gt | BinOpKind::GtEq => {
                let subst = self.unify(ctx, &left, &right, &subst, &right_pos)?;
                let (subst, _) =
                    self.numeric(ctx, &left, &subst, &[INT, FLOAT, STRING], &binop.position)?;
                Ok((subst, Type::bool()))
            }
            BinOpKind::Eq | BinOpKind::NotEq => {
                let subst = self.unify(ctx, &left, &right, &subst, &right_pos)?;
                let operand = subst.apply(&left);
                if operand.contains_function() {
                    let kind = TypeErrorKind::NotEquatable { ty: operand };
                    let hint =
                        format!("functions cannot be compared with `{}`", binop.op.symbol());
                    return Err(TypeError::new(kind, binop.position.clone()).with_hint(hint));
                }
                Ok((subst, Type::bool()))
            }
            BinOpKind::And | BinOpKind::Or => {
                let subst = self.unify(ctx, &Type::bool(), &left, &subst, &binop.left.position())?;
                let subst = self.unify(ctx, &Type::bool(), &right, &subst, &right_pos)?;
                Ok((subst, Type::bool()))
            }
            BinOpKind::Concat => {
                let subst =
                    self.unify(ctx, &Type::string(), &left, &subst, &binop.left.position())?;
                let subst = self.unify(ctx, &Type::string(), &right, &subst, &right_pos)?;
                Ok((subst, Type::string()))
            }
            BinOpKind::Cons => {
                let list = Type::list(left);
                let subst = self.unify(ctx, &list, &right, &subst, &right_pos)?;
                Ok((subst, list))
            }
        }
    }

    /// Requires `ty` to be one of the named primitive types; an unresolved
    /// operand defaults to `Int`.
    fn numeric(
        &mut self,
        ctx: &InferenceContext,
        ty: &Type,
        subst: &Substitution,
        allowed: &[&str],
        position: &Span,
    ) -> Result<(Substitution, Type), TypeError> {
        match subst.apply(ty) {
            Type::Var(_) => {
                let subst = self.unify(ctx, ty, &Type::int(), subst, position)?;
                Ok((subst, Type::int()))
            }
            applied if allowed.iter().any(|name| applied == Type::con(name)) => {
                Ok((subst.clone(), applied))
            }
            applied => Err(TypeError::type_mismatch(Type::int(), applied, position.clone())
                .with_hint(format!("this operator works on {}", allowed.join(", ")))),
        }
    }

    fn unify(
        &self,
        ctx: &InferenceContext,
        expected: &Type,
        actual: &Type,
        subst: &Substitution,
        position: &Span,
    ) -> Result<Substitution, TypeError> {
        unify_in(&ctx.env, expected, actual, subst)
            .map_err(|e| TypeError::from_unify(e, position.clone()))
    }
}

impl Default for Infer {
    fn default() -> Self {
        Self::new(VarSupply::new())
    }
}

fn empty_record() -> Type {
    Type::Record(BTreeMap::new())
}

/// Looks through aliases until a function type (or anything that is not an alias).
fn expand_to_function(env: &TypeEnv, ty: Type) -> Type {
    let mut current = ty;
    for _ in 0..64 {
        match current {
            Type::Function(..) | Type::Var(_) => return current,
            _ => match env.expand(&current) {
                Some(expanded) => current = expanded,
                None => return current,
            },
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::build::ident;
    use crate::types::builtins::install;
    use pretty_assertions::assert_eq;

    struct Fixture {
        infer: Infer,
        env: TypeEnv,
    }

    impl Fixture {
        fn new() -> Self {
            let mut supply = VarSupply::new();
            let env = install(&mut supply);
            Fixture {
                infer: Infer::new(supply),
                env,
            }
        }

        /// Infers `expr` at level 1 and generalizes at level 0.
        fn infer(&mut self, expr: &Expr) -> Result<TypeScheme, TypeError> {
            let ctx = InferenceContext::new(self.env.clone(), Substitution::empty(), 1);
            let (subst, ty) = self.infer.infer_expr(&ctx, expr)?;
            let subst = close_records(&subst, &ty, 0)
                .map_err(|e| TypeError::from_unify(e, Span::default()))?;
            Ok(generalize(&self.env, 0, &ty, &subst))
        }

        fn infer_pretty(&mut self, expr: &Expr) -> String {
            match self.infer(expr) {
                Ok(scheme) => scheme.pretty(),
                Err(err) => panic!("inference failed: {}", err),
            }
        }
    }

    #[test]
    fn test_infer_literals() {
        let mut fx = Fixture::new();
        assert_eq!(fx.infer_pretty(&Expr::int(42)), "Int");
        assert_eq!(fx.infer_pretty(&Expr::string("hi")), "String");
        assert_eq!(fx.infer_pretty(&Expr::float(1.5)), "Float");
        assert_eq!(fx.infer_pretty(&Expr::unit()), "Unit");
    }

    #[test]
    fn test_infer_unknown_variable() {
        let mut fx = Fixture::new();
        let err = fx.infer(&Expr::var("nope")).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::UnknownVariable { .. }));
    }

    #[test]
    fn test_infer_identity() {
        let mut fx = Fixture::new();
        assert_eq!(fx.infer_pretty(&Expr::lambda(&["x"], Expr::var("x"))), "forall 'a. ('a) -> 'a");
    }

    #[test]
    fn test_infer_multi_param_lambda() {
        let mut fx = Fixture::new();
        let expr = Expr::lambda(&["a", "b"], Expr::var("a"));
        assert_eq!(fx.infer_pretty(&expr), "forall 'a 'b. ('a, 'b) -> 'a");
    }

    #[test]
    fn test_let_polymorphism() {
        let mut fx = Fixture::new();
        let expr = Expr::let_in(
            "id",
            Expr::lambda(&["x"], Expr::var("x")),
            Expr::tuple(vec![
                Expr::call("id", vec![Expr::int(42)]),
                Expr::call("id", vec![Expr::string("s")]),
            ]),
        );
        assert_eq!(fx.infer_pretty(&expr), "(Int, String)");
    }

    #[test]
    fn test_value_restriction_on_ref() {
        let mut fx = Fixture::new();
        // let r = ref [] in (r := [1]; r := ["s"]) must fail: r is not generalized
        let expr = Expr::let_in(
            "r",
            Expr::make_ref(Expr::list(vec![])),
            Expr::block(vec![
                Expr::assign(Expr::var("r"), Expr::list(vec![Expr::int(1)])),
                Expr::assign(Expr::var("r"), Expr::list(vec![Expr::string("s")])),
            ]),
        );
        let err = fx.infer(&expr).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_partial_application() {
        let mut fx = Fixture::new();
        let add =
            Expr::lambda(&["a", "b"], Expr::binary(BinOpKind::Add, Expr::var("a"), Expr::var("b")));
        let expr = Expr::let_in("add", add, Expr::call("add", vec![Expr::int(1)]));
        assert_eq!(fx.infer_pretty(&expr), "(Int) -> Int");
    }

    #[test]
    fn test_too_many_arguments() {
        let mut fx = Fixture::new();
        let add =
            Expr::lambda(&["a", "b"], Expr::binary(BinOpKind::Add, Expr::var("a"), Expr::var("b")));
        let expr = Expr::let_in(
            "add",
            add,
            Expr::call("add", vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
        );
        let err = fx.infer(&expr).unwrap_err();
        assert!(matches!(
            err.kind,
            TypeErrorKind::ArityMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_apply_unknown_function() {
        let mut fx = Fixture::new();
        let expr = Expr::lambda(&["f"], Expr::call("f", vec![Expr::int(1)]));
        assert_eq!(fx.infer_pretty(&expr), "forall 'a. ((Int) -> 'a) -> 'a");
    }

    #[test]
    fn test_call_non_function() {
        let mut fx = Fixture::new();
        let err = fx.infer(&Expr::apply(Expr::int(1), vec![Expr::int(2)])).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::TypeMismatch { .. }));
        assert_eq!(err.hint.as_deref(), Some("only functions can be called"));
    }

    #[test]
    fn test_occurs_check() {
        let mut fx = Fixture::new();
        let expr = Expr::lambda(&["x"], Expr::call("x", vec![Expr::var("x")]));
        let err = fx.infer(&expr).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::InfiniteType { .. }));
    }

    #[test]
    fn test_if_requires_bool() {
        let mut fx = Fixture::new();
        let expr = Expr::if_then_else(Expr::int(1), Expr::int(2), Expr::int(3));
        assert!(fx.infer(&expr).is_err());
        let expr = Expr::if_then_else(Expr::bool(true), Expr::int(2), Expr::string("s"));
        assert!(fx.infer(&expr).is_err());
    }

    #[test]
    fn test_recursive_let() {
        let mut fx = Fixture::new();
        // let rec fact = n => if n == 0 then 1 else n * fact(n - 1)
        let body = Expr::if_then_else(
            Expr::binary(BinOpKind::Eq, Expr::var("n"), Expr::int(0)),
            Expr::int(1),
            Expr::binary(
                BinOpKind::Mul,
                Expr::var("n"),
                Expr::call(
                    "fact",
                    vec![Expr::binary(BinOpKind::Sub, Expr::var("n"), Expr::int(1))],
                ),
            ),
        );
        let expr = Expr::let_rec_in("fact", Expr::lambda(&["n"], body), Expr::var("fact"));
        assert_eq!(fx.infer_pretty(&expr), "(Int) -> Int");
    }

    #[test]
    fn test_rec_group_returns_bindings() {
        let mut fx = Fixture::new();
        let ctx = InferenceContext::new(fx.env.clone(), Substitution::empty(), 0);
        let bindings = vec![
            RecBinding {
                name: ident("ping"),
                annotation: None,
                value: Expr::lambda(&["n"], Expr::call("pong", vec![Expr::var("n")])),
                position: Span::default(),
            },
            RecBinding {
                name: ident("pong"),
                annotation: None,
                value: Expr::lambda(&["n"], Expr::call("ping", vec![Expr::var("n")])),
                position: Span::default(),
            },
        ];
        let group = fx.infer.infer_rec_group(&ctx, &bindings).unwrap();
        let names: Vec<&str> = group.bindings.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ping", "pong"]);
        assert!(group.bindings.iter().all(|(_, s)| s.is_polymorphic()));
    }

    #[test]
    fn test_match_with_guard() {
        let mut fx = Fixture::new();
        let expr = Expr::lambda(
            &["x"],
            Expr::match_on(
                Expr::var("x"),
                vec![
                    MatchCase::guarded(
                        Pattern::ctor("Some", vec![Pattern::var("n")]),
                        Expr::binary(BinOpKind::Gt, Expr::var("n"), Expr::int(0)),
                        Expr::string("pos"),
                    ),
                    MatchCase::new(
                        Pattern::ctor("Some", vec![Pattern::var("n")]),
                        Expr::string("other"),
                    ),
                    MatchCase::new(Pattern::ctor("None", vec![]), Expr::string("none")),
                ],
            ),
        );
        assert_eq!(fx.infer_pretty(&expr), "(Option<Int>) -> String");
    }

    #[test]
    fn test_non_boolean_guard() {
        let mut fx = Fixture::new();
        let expr = Expr::match_on(
            Expr::int(1),
            vec![
                MatchCase::guarded(Pattern::var("n"), Expr::var("n"), Expr::unit()),
                MatchCase::new(Pattern::wildcard(), Expr::unit()),
            ],
        );
        let err = fx.infer(&expr).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::NonBooleanGuard { .. }));
    }

    #[test]
    fn test_non_exhaustive_match() {
        let mut fx = Fixture::new();
        let expr = Expr::lambda(
            &["x"],
            Expr::match_on(
                Expr::var("x"),
                vec![MatchCase::new(
                    Pattern::ctor("Some", vec![Pattern::var("n")]),
                    Expr::var("n"),
                )],
            ),
        );
        let err = fx.infer(&expr).unwrap_err();
        match err.kind {
            TypeErrorKind::NonExhaustiveMatch { missing } => {
                assert_eq!(missing.to_string(), "None")
            }
            other => panic!("Expected NonExhaustiveMatch, got {:?}", other),
        }
    }

    #[test]
    fn test_record_pattern_on_parameter() {
        let mut fx = Fixture::new();
        let expr = Expr::lambda(
            &["person"],
            Expr::match_on(
                Expr::var("person"),
                vec![MatchCase::new(
                    Pattern::record(vec![("name", Pattern::var("name"))]),
                    Expr::var("name"),
                )],
            ),
        );
        assert_eq!(fx.infer_pretty(&expr), "forall 'a. ({ name: 'a }) -> 'a");
    }

    #[test]
    fn test_record_width_subtyping_at_call() {
        let mut fx = Fixture::new();
        let get_name = Expr::lambda(&["p"], Expr::field(Expr::var("p"), "name"));
        let expr = Expr::let_in(
            "getName",
            get_name,
            Expr::call(
                "getName",
                vec![Expr::record(vec![("name", Expr::string("Ada")), ("age", Expr::int(36))])],
            ),
        );
        assert_eq!(fx.infer_pretty(&expr), "String");
    }

    #[test]
    fn test_field_not_found() {
        let mut fx = Fixture::new();
        let expr = Expr::field(Expr::record(vec![("name", Expr::string("Ada"))]), "age");
        let err = fx.infer(&expr).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::FieldNotFound { .. }));
    }

    #[test]
    fn test_record_spread_and_update() {
        let mut fx = Fixture::new();
        let base = Expr::record(vec![("x", Expr::int(1)), ("y", Expr::int(2))]);
        let spread = Expr::record_entries(vec![
            RecordEntry::spread(base.clone()),
            RecordEntry::field("y", Expr::string("two")),
        ]);
        assert_eq!(fx.infer_pretty(&spread), "{ x: Int, y: String }");

        let update = Expr::update(base.clone(), vec![("x", Expr::int(5))]);
        assert_eq!(fx.infer_pretty(&update), "{ x: Int, y: Int }");

        let bad = Expr::update(base, vec![("z", Expr::int(5))]);
        let err = fx.infer(&bad).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::FieldNotFound { .. }));
    }

    #[test]
    fn test_references() {
        let mut fx = Fixture::new();
        let expr = Expr::let_in(
            "r",
            Expr::make_ref(Expr::int(0)),
            Expr::block(vec![
                Expr::assign(Expr::var("r"), Expr::int(1)),
                Expr::deref(Expr::var("r")),
            ]),
        );
        assert_eq!(fx.infer_pretty(&expr), "Int");
        let bad = Expr::assign(Expr::make_ref(Expr::int(0)), Expr::string("s"));
        assert!(fx.infer(&bad).is_err());
    }

    #[test]
    fn test_operators() {
        let mut fx = Fixture::new();
        let float_add = Expr::binary(BinOpKind::Add, Expr::float(1.0), Expr::float(2.0));
        assert_eq!(fx.infer_pretty(&float_add), "Float");
        let mixed = Expr::binary(BinOpKind::Add, Expr::int(1), Expr::float(2.0));
        assert!(fx.infer(&mixed).is_err());
        let concat = Expr::binary(BinOpKind::Concat, Expr::string("a"), Expr::string("b"));
        assert_eq!(fx.infer_pretty(&concat), "String");
        let cons = Expr::binary(BinOpKind::Cons, Expr::int(1), Expr::list(vec![]));
        assert_eq!(fx.infer_pretty(&cons), "List<Int>");
        let cmp = Expr::binary(BinOpKind::Lt, Expr::string("a"), Expr::string("b"));
        assert_eq!(fx.infer_pretty(&cmp), "Bool");
        let not = Expr::unary(UnaryOpKind::Not, Expr::bool(true));
        assert_eq!(fx.infer_pretty(&not), "Bool");
    }

    #[test]
    fn test_numeric_default_is_int() {
        let mut fx = Fixture::new();
        let expr =
            Expr::lambda(&["a", "b"], Expr::binary(BinOpKind::Add, Expr::var("a"), Expr::var("b")));
        assert_eq!(fx.infer_pretty(&expr), "(Int, Int) -> Int");
    }

    #[test]
    fn test_functions_not_equatable() {
        let mut fx = Fixture::new();
        let f = Expr::lambda(&["x"], Expr::var("x"));
        let expr = Expr::binary(BinOpKind::Eq, f.clone(), f);
        let err = fx.infer(&expr).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::NotEquatable { .. }));
    }

    #[test]
    fn test_annotation_constrains() {
        let mut fx = Fixture::new();
        let expr = Expr::annotated_lambda(
            vec![("x", TypeExpr::named("Int", vec![]))],
            Expr::var("x"),
        );
        assert_eq!(fx.infer_pretty(&expr), "(Int) -> Int");
        let bad = Expr::annotated(Expr::int(1), TypeExpr::named("String", vec![]));
        assert!(fx.infer(&bad).is_err());
    }

    #[test]
    fn test_failed_name_reported() {
        let mut fx = Fixture::new();
        fx.infer.mark_failed("broken");
        let err = fx.infer(&Expr::var("broken")).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::DependsOnFailedDeclaration { .. }));
    }
}
