use std::collections::BTreeMap;

use lachs::Span;
use log::{debug, warn};

use super::annotation::{AnnotationResolver, resolve_annotation};
use super::builtins::install;
use super::env::{Binding, ConstructorDef, TypeDefKind, TypeDefinition, TypeEnv};
use super::error::{TypeError, TypeErrorKind};
use super::generalize::{VarSupply, generalize};
use super::infer::{Infer, InferenceContext, RecGroup};
use super::subst::Substitution;
use super::ty::{Type, TypeScheme};
use crate::core::{
    Declaration, ExternalDecl, ImportDecl, ImportItem, LetDecl, Module, RecGroupDecl, TypeDecl,
    TypeDeclBody, TypeExpr,
};

/// Driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Stop at the first failing declaration instead of checking the rest.
    pub stop_on_first_error: bool,
    /// Reject declarations whose type still mentions a variable that was never
    /// generalized once the whole module has been checked.
    pub require_ground_types: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            stop_on_first_error: false,
            require_ground_types: true,
        }
    }
}

/// A module that type-checked, with the type of every top-level value.
#[derive(Debug, Clone)]
pub struct TypedModule {
    pub module: Module,
    pub env: TypeEnv,
    /// Fully substituted type per declared value; its only variables are the
    /// quantified variables of the value's scheme. Those variables keep their
    /// internal ids and stand as representatives of "any type", so compare
    /// polymorphic types through [`TypedModule::scheme_of`], whose pretty
    /// form renames them `'a`, `'b`, ... in order.
    pub declaration_types: BTreeMap<String, Type>,
}

impl TypedModule {
    pub fn scheme_of(&self, name: &str) -> Option<TypeScheme> {
        self.env.lookup(name).map(Binding::scheme)
    }
}

/// A value a declaration bound, remembered for the final ground-type check.
struct Declared {
    name: String,
    scheme: TypeScheme,
    position: Span,
}

pub struct Checker {
    options: CheckOptions,
    infer: Infer,
    env: TypeEnv,
    subst: Substitution,
    declared: Vec<Declared>,
}

impl Checker {
    pub fn new(options: CheckOptions) -> Self {
        let mut supply = VarSupply::new();
        let env = install(&mut supply);
        Checker {
            options,
            infer: Infer::new(supply),
            env,
            subst: Substitution::empty(),
            declared: Vec::new(),
        }
    }

    /// Checks every declaration of `module` in source order.
    ///
    /// A declaration that fails is reported and its names are removed from the
    /// environment; later references to them fail with
    /// [`TypeErrorKind::DependsOnFailedDeclaration`] instead of seeing a made-up type.
    pub fn check_module(mut self, module: Module) -> Result<TypedModule, Vec<TypeError>> {
        let mut errors = Vec::new();

        // Step 1: check declarations, threading env and substitution
        for decl in &module.declarations {
            if let Err(err) = self.check_declaration(decl) {
                let names = decl.bound_values();
                warn!("declaration of {:?} in `{}` failed: {}", names, module.name, err.message());
                for name in &names {
                    self.infer.mark_failed(name);
                }
                self.env = self.env.without(names.iter().copied());
                self.declared.retain(|d| !names.contains(&d.name.as_str()));
                errors.push(err);
                if self.options.stop_on_first_error {
                    return Err(errors);
                }
            }
        }

        // Step 2: collect final types, rejecting anything left unresolved
        let mut declaration_types = BTreeMap::new();
        for declared in &self.declared {
            let scheme = self.subst.apply_scheme(&declared.scheme);
            let unresolved = scheme.free_type_vars();
            if self.options.require_ground_types && !unresolved.is_empty() {
                errors.push(
                    TypeError::new(
                        TypeErrorKind::UnresolvedType {
                            name: declared.name.clone(),
                            ty: scheme.ty.clone(),
                        },
                        declared.position.clone(),
                    )
                    .with_hint("add a type annotation"),
                );
                continue;
            }
            declaration_types.insert(declared.name.clone(), scheme.ty);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let env = self.env.apply_subst(&self.subst);
        Ok(TypedModule {
            module,
            env,
            declaration_types,
        })
    }

    fn check_declaration(&mut self, decl: &Declaration) -> Result<(), TypeError> {
        match decl {
            Declaration::Let(let_decl) => self.check_let(let_decl),
            Declaration::RecGroup(group) => self.check_rec_group(group),
            Declaration::Types(defs) => {
                let base = self.env.clone();
                self.env = self.define_types(&base, &defs.decls)?;
                let names: Vec<_> = defs.decls.iter().map(|d| &d.name.value).collect();
                debug!("defined types {:?}", names);
                Ok(())
            }
            Declaration::External(external) => self.check_external(external),
            Declaration::Import(import) => self.check_import(import),
        }
    }

    fn context(&self) -> InferenceContext {
        InferenceContext::new(self.env.clone(), self.subst.clone(), 0)
    }

    fn check_let(&mut self, decl: &LetDecl) -> Result<(), TypeError> {
        let ctx = self.context();
        let (scheme, subst) = self.infer.infer_let_binding(
            &ctx,
            &decl.name,
            decl.annotation.as_ref(),
            &decl.value,
            decl.recursive,
        )?;
        debug!("let {} : {}", decl.name.value, scheme);
        self.subst = subst;
        self.bind(&decl.name.value, Binding::Value(scheme), &decl.position);
        Ok(())
    }

    fn check_rec_group(&mut self, group: &RecGroupDecl) -> Result<(), TypeError> {
        let ctx = self.context();
        let RecGroup { bindings, subst } = self.infer.infer_rec_group(&ctx, &group.bindings)?;
        self.subst = subst;
        for ((name, scheme), binding) in bindings.into_iter().zip(&group.bindings) {
            debug!("let rec {} : {}", name, scheme);
            self.bind(&name, Binding::Value(scheme), &binding.position);
        }
        Ok(())
    }

    fn check_external(&mut self, external: &ExternalDecl) -> Result<(), TypeError> {
        let scheme = self.signature_scheme(&external.signature)?;
        debug!(
            "external {} : {} = {:?}",
            external.name.value, scheme, external.foreign_name
        );
        self.bind(
            &external.name.value,
            Binding::External {
                scheme,
                foreign_name: external.foreign_name.clone(),
            },
            &external.position,
        );
        Ok(())
    }

    fn check_import(&mut self, import: &ImportDecl) -> Result<(), TypeError> {
        // Resolve everything first so a bad item leaves nothing half-imported
        let mut env = self.env.clone();
        let mut values = Vec::new();
        for item in &import.items {
            match item {
                ImportItem::Type(decl) => {
                    env = self.define_types(&env, std::slice::from_ref(decl))?;
                }
                ImportItem::Value { name, alias, signature } => {
                    let scheme = generalize(
                        &env,
                        0,
                        &resolve_annotation(&env, signature, 1, self.infer.supply())?,
                        &Substitution::empty(),
                    );
                    let local = alias.as_ref().unwrap_or(name);
                    debug!(
                        "import {}.{} as {} : {}",
                        import.module, name.value, local.value, scheme
                    );
                    values.push((local.value.clone(), scheme));
                }
            }
        }

        self.env = env;
        for (name, scheme) in values {
            self.bind(&name, Binding::Value(scheme), &import.position);
        }
        Ok(())
    }

    /// A trusted signature, generalized over every variable it mentions.
    fn signature_scheme(&mut self, signature: &TypeExpr) -> Result<TypeScheme, TypeError> {
        let ty = resolve_annotation(&self.env, signature, 1, self.infer.supply())?;
        Ok(generalize(&self.env, 0, &ty, &Substitution::empty()))
    }

    fn bind(&mut self, name: &str, binding: Binding, position: &Span) {
        let scheme = binding.scheme();
        self.env = self.env.extend(name, binding);
        self.declared.retain(|d| d.name != name);
        self.declared.push(Declared {
            name: name.to_string(),
            scheme,
            position: position.clone(),
        });
    }

    /// Registers a group of type declarations that may refer to each other.
    ///
    /// Every name is first registered opaquely with its parameters, so bodies can
    /// mention any member of the group; the bodies are resolved afterwards.
    fn define_types(&mut self, base: &TypeEnv, decls: &[TypeDecl]) -> Result<TypeEnv, TypeError> {
        let mut scoped = base.clone();
        let mut params = Vec::with_capacity(decls.len());
        for decl in decls {
            let mut declared = Vec::with_capacity(decl.params.len());
            for param in &decl.params {
                if declared.iter().any(|(name, _)| name == param) {
                    return Err(TypeError::new(
                        TypeErrorKind::InternalError(format!(
                            "type parameter '{} declared twice in {}",
                            param, decl.name.value
                        )),
                        decl.position.clone(),
                    ));
                }
                declared.push((param.clone(), self.infer.supply().fresh_var(0)));
            }
            let vars = declared.iter().map(|(_, var)| *var).collect();
            scoped = scoped.define_type(TypeDefinition::opaque(&decl.name.value, vars));
            params.push(declared);
        }

        let mut env = scoped.clone();
        for (decl, declared) in decls.iter().zip(&params) {
            let mut resolver = AnnotationResolver::for_declaration(&scoped, declared);
            let kind = match &decl.body {
                TypeDeclBody::Alias(target) => {
                    TypeDefKind::Alias(resolver.resolve(target, self.infer.supply())?)
                }
                TypeDeclBody::Record(fields) => {
                    let mut resolved = BTreeMap::new();
                    for field in fields {
                        let ty = resolver.resolve(&field.ty, self.infer.supply())?;
                        resolved.insert(field.name.clone(), ty);
                    }
                    TypeDefKind::Record(resolved)
                }
                TypeDeclBody::Variant(ctors) => {
                    let mut resolved = Vec::with_capacity(ctors.len());
                    for ctor in ctors {
                        let args = ctor
                            .args
                            .iter()
                            .map(|arg| resolver.resolve(arg, self.infer.supply()))
                            .collect::<Result<Vec<_>, _>>()?;
                        resolved.push(ConstructorDef {
                            name: ctor.name.value.clone(),
                            args,
                        });
                    }
                    TypeDefKind::Variant(resolved)
                }
            };
            env = env.define_type(TypeDefinition {
                name: decl.name.value.clone(),
                params: declared.iter().map(|(_, var)| *var).collect(),
                kind,
            });
        }
        Ok(env)
    }
}

impl Default for Checker {
    fn default() -> Self {
        Checker::new(CheckOptions::default())
    }
}

/// Type checks `module` with the default options.
///
/// This performs:
/// 1. Type definitions, externals and imports are registered as they appear
/// 2. Every value declaration is inferred and generalized in source order
/// 3. Declarations whose types are still not fully known are rejected
pub fn check_module(module: Module) -> Result<TypedModule, Vec<TypeError>> {
    Checker::default().check_module(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::*;

    fn types_of(module: Module) -> BTreeMap<String, String> {
        match check_module(module) {
            Ok(typed) => typed
                .declaration_types
                .keys()
                .map(|name| {
                    let scheme = typed.scheme_of(name).map(|s| s.pretty()).unwrap_or_default();
                    (name.clone(), scheme)
                })
                .collect(),
            Err(errors) => panic!("module failed to check: {:?}", errors),
        }
    }

    #[test]
    fn test_check_simple_declarations() {
        let module = Module::new(
            "main",
            vec![
                Declaration::value("answer", Expr::int(42)),
                Declaration::value("id", Expr::lambda(&["x"], Expr::var("x"))),
                Declaration::value("greeting", Expr::call("id", vec![Expr::string("hi")])),
            ],
        );
        let types = types_of(module);
        assert_eq!(types["answer"], "Int");
        assert_eq!(types["id"], "forall 'a. ('a) -> 'a");
        assert_eq!(types["greeting"], "String");
    }

    #[test]
    fn test_failed_declaration_poisons_dependents() {
        let module = Module::new(
            "main",
            vec![
                Declaration::value(
                    "bad",
                    Expr::binary(BinOpKind::Add, Expr::int(1), Expr::string("x")),
                ),
                Declaration::value("user", Expr::var("bad")),
                Declaration::value("fine", Expr::int(1)),
            ],
        );
        let errors = check_module(module).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0].kind, TypeErrorKind::TypeMismatch { .. }));
        assert!(matches!(
            errors[1].kind,
            TypeErrorKind::DependsOnFailedDeclaration { ref name } if name == "bad"
        ));
    }

    #[test]
    fn test_stop_on_first_error() {
        let module = Module::new(
            "main",
            vec![
                Declaration::value("a", Expr::var("missing")),
                Declaration::value("b", Expr::var("alsoMissing")),
            ],
        );
        let options = CheckOptions {
            stop_on_first_error: true,
            ..CheckOptions::default()
        };
        let errors = Checker::new(options).check_module(module).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unresolved_value_restricted_binding() {
        let module = Module::new(
            "main",
            vec![Declaration::value("cell", Expr::make_ref(Expr::list(vec![])))],
        );
        let errors = check_module(module).unwrap_err();
        assert!(matches!(errors[0].kind, TypeErrorKind::UnresolvedType { .. }));
        assert_eq!(errors[0].hint.as_deref(), Some("add a type annotation"));
    }

    #[test]
    fn test_later_declaration_pins_value_restricted_binding() {
        let module = Module::new(
            "main",
            vec![
                Declaration::value("cell", Expr::make_ref(Expr::list(vec![]))),
                Declaration::value(
                    "init",
                    Expr::assign(Expr::var("cell"), Expr::list(vec![Expr::int(1)])),
                ),
            ],
        );
        let typed = check_module(module).unwrap();
        assert_eq!(typed.declaration_types["cell"].pretty(), "Ref<List<Int>>");
    }

    #[test]
    fn test_ground_types_can_be_disabled() {
        let module = Module::new(
            "main",
            vec![Declaration::value("cell", Expr::make_ref(Expr::list(vec![])))],
        );
        let options = CheckOptions {
            require_ground_types: false,
            ..CheckOptions::default()
        };
        assert!(Checker::new(options).check_module(module).is_ok());
    }

    #[test]
    fn test_user_variant_type() {
        let module = Module::new(
            "main",
            vec![
                Declaration::types(vec![TypeDecl::variant(
                    "Tree",
                    &["a"],
                    vec![
                        ("Leaf", vec![]),
                        (
                            "Node",
                            vec![
                                TypeExpr::named("Tree", vec![TypeExpr::var("a")]),
                                TypeExpr::var("a"),
                                TypeExpr::named("Tree", vec![TypeExpr::var("a")]),
                            ],
                        ),
                    ],
                )]),
                Declaration::value(
                    "single",
                    Expr::lambda(
                        &["x"],
                        Expr::call(
                            "Node",
                            vec![Expr::var("Leaf"), Expr::var("x"), Expr::var("Leaf")],
                        ),
                    ),
                ),
            ],
        );
        let types = types_of(module);
        assert_eq!(types["single"], "forall 'a. ('a) -> Tree<'a>");
    }

    #[test]
    fn test_undeclared_type_parameter() {
        let module = Module::new(
            "main",
            vec![Declaration::types(vec![TypeDecl::alias(
                "Pair",
                &["a"],
                TypeExpr::tuple(vec![TypeExpr::var("a"), TypeExpr::var("b")]),
            )])],
        );
        let errors = check_module(module).unwrap_err();
        assert!(matches!(errors[0].kind, TypeErrorKind::UnknownType { .. }));
    }

    #[test]
    fn test_external_and_import() {
        let module = Module::new(
            "main",
            vec![
                Declaration::external(
                    "log",
                    TypeExpr::function(
                        vec![TypeExpr::named("String", vec![])],
                        TypeExpr::named("Unit", vec![]),
                    ),
                    "console.log",
                ),
                Declaration::import(
                    "Math",
                    vec![ImportItem::value(
                        "sqrt",
                        TypeExpr::function(
                            vec![TypeExpr::named("Float", vec![])],
                            TypeExpr::named("Float", vec![]),
                        ),
                    )],
                ),
                Declaration::value("root", Expr::call("sqrt", vec![Expr::float(2.0)])),
            ],
        );
        let typed = check_module(module).unwrap();
        assert!(matches!(typed.env.lookup("log"), Some(Binding::External { .. })));
        assert_eq!(typed.declaration_types["root"], Type::float());
        assert_eq!(typed.declaration_types["sqrt"].pretty(), "(Float) -> Float");
    }

    #[test]
    fn test_declaration_types_keep_quantified_representatives() {
        let module = Module::new(
            "main",
            vec![Declaration::value(
                "pick",
                Expr::lambda(&["a", "b"], Expr::var("a")),
            )],
        );
        let typed = check_module(module).unwrap();
        let scheme = typed.scheme_of("pick").unwrap();
        let ty = &typed.declaration_types["pick"];
        let quantified: std::collections::BTreeSet<_> = scheme.vars.iter().copied().collect();
        assert_eq!(ty.free_type_vars(), quantified);
        assert_eq!(*ty, scheme.ty);
        assert_eq!(scheme.pretty(), "forall 'a 'b. ('a, 'b) -> 'a");
    }
}
