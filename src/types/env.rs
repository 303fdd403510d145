use std::collections::{BTreeMap, BTreeSet};

use super::subst::Substitution;
use super::ty::{Type, TypeScheme, TypeVar};
use super::unify::ExpandNamed;

/// How many named layers `record_fields` and `variant_constructors` look through.
const MAX_ALIAS_DEPTH: usize = 64;

/// A variant constructor as registered in the value namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorInfo {
    pub name: String,
    pub type_name: String,
    /// Parameters of the owning type; the constructor is polymorphic over exactly these.
    pub params: Vec<TypeVar>,
    pub args: Vec<Type>,
    pub result: Type,
}

impl ConstructorInfo {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// `forall params. (args) -> result`, or just `result` for nullary constructors.
    pub fn scheme(&self) -> TypeScheme {
        let ty = if self.args.is_empty() {
            self.result.clone()
        } else {
            Type::func(self.args.clone(), self.result.clone())
        };
        TypeScheme::polymorphic(self.params.clone(), ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Value(TypeScheme),
    Constructor(ConstructorInfo),
    External {
        scheme: TypeScheme,
        foreign_name: String,
    },
}

impl Binding {
    pub fn scheme(&self) -> TypeScheme {
        match self {
            Binding::Value(scheme) | Binding::External { scheme, .. } => scheme.clone(),
            Binding::Constructor(info) => info.scheme(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDef {
    pub name: String,
    pub args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefKind {
    /// Builtin types without visible structure (`Int`, `List`, ...).
    Opaque,
    Alias(Type),
    Record(BTreeMap<String, Type>),
    Variant(Vec<ConstructorDef>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub params: Vec<TypeVar>,
    pub kind: TypeDefKind,
}

impl TypeDefinition {
    pub fn opaque(name: &str, params: Vec<TypeVar>) -> Self {
        TypeDefinition {
            name: name.to_string(),
            params,
            kind: TypeDefKind::Opaque,
        }
    }

    /// The type this definition names, applied to its own parameters.
    pub fn self_type(&self) -> Type {
        if self.params.is_empty() {
            Type::con(&self.name)
        } else {
            Type::app(&self.name, self.params.iter().map(|v| Type::Var(*v)).collect())
        }
    }

    fn instantiate_with(&self, args: &[Type], ty: &Type) -> Type {
        Substitution::from_pairs(self.params.iter().zip(args)).apply(ty)
    }
}

/// Persistent typing environment: a value namespace and a type namespace.
///
/// Every extension returns a new environment and leaves `self` untouched, so
/// scopes can be entered by extending and left by dropping the extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeEnv {
    values: im::HashMap<String, Binding>,
    types: im::HashMap<String, TypeDefinition>,
}

impl TypeEnv {
    pub fn empty() -> Self {
        TypeEnv::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.values.get(name)
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn lookup_constructor(&self, name: &str) -> Option<&ConstructorInfo> {
        match self.values.get(name) {
            Some(Binding::Constructor(info)) => Some(info),
            _ => None,
        }
    }

    pub fn extend(&self, name: impl Into<String>, binding: Binding) -> TypeEnv {
        TypeEnv {
            values: self.values.update(name.into(), binding),
            types: self.types.clone(),
        }
    }

    pub fn extend_value(&self, name: impl Into<String>, scheme: TypeScheme) -> TypeEnv {
        self.extend(name, Binding::Value(scheme))
    }

    pub fn extend_many<S: Into<String>>(
        &self,
        bindings: impl IntoIterator<Item = (S, Binding)>,
    ) -> TypeEnv {
        let mut values = self.values.clone();
        for (name, binding) in bindings {
            values.insert(name.into(), binding);
        }
        TypeEnv {
            values,
            types: self.types.clone(),
        }
    }

    /// Registers a type definition, together with its constructors if it is a variant.
    pub fn define_type(&self, def: TypeDefinition) -> TypeEnv {
        let mut values = self.values.clone();
        if let TypeDefKind::Variant(ctors) = &def.kind {
            let result = def.self_type();
            for ctor in ctors {
                let info = ConstructorInfo {
                    name: ctor.name.clone(),
                    type_name: def.name.clone(),
                    params: def.params.clone(),
                    args: ctor.args.clone(),
                    result: result.clone(),
                };
                values.insert(ctor.name.clone(), Binding::Constructor(info));
            }
        }
        TypeEnv {
            values,
            types: self.types.update(def.name.clone(), def),
        }
    }

    /// Removes value bindings.
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> TypeEnv {
        let mut values = self.values.clone();
        for name in names {
            values.remove(name);
        }
        TypeEnv {
            values,
            types: self.types.clone(),
        }
    }

    /// Unquantified variables of every value binding, after applying `subst`.
    pub fn free_type_vars(&self, subst: &Substitution) -> BTreeSet<TypeVar> {
        let mut free = BTreeSet::new();
        for binding in self.values.values() {
            match binding {
                Binding::Value(scheme) | Binding::External { scheme, .. } => {
                    free.extend(subst.apply_scheme(scheme).free_type_vars());
                }
                Binding::Constructor(_) => {}
            }
        }
        free
    }

    /// Applies `subst` to the unquantified part of every value binding.
    pub fn apply_subst(&self, subst: &Substitution) -> TypeEnv {
        let values = self
            .values
            .iter()
            .map(|(name, binding)| {
                let binding = match binding {
                    Binding::Value(scheme) => Binding::Value(subst.apply_scheme(scheme)),
                    Binding::External { scheme, foreign_name } => Binding::External {
                        scheme: subst.apply_scheme(scheme),
                        foreign_name: foreign_name.clone(),
                    },
                    Binding::Constructor(info) => Binding::Constructor(info.clone()),
                };
                (name.clone(), binding)
            })
            .collect();
        TypeEnv {
            values,
            types: self.types.clone(),
        }
    }

    /// Unfolds a named alias or record type by one level.
    ///
    /// Variant and opaque types are nominal and never expand. Returns `None` as
    /// well when the number of type arguments does not fit the definition.
    pub fn expand(&self, ty: &Type) -> Option<Type> {
        let def = self.types.get(ty.head_name()?)?;
        let args = ty.type_args();
        if args.len() != def.params.len() {
            return None;
        }
        match &def.kind {
            TypeDefKind::Alias(target) => Some(def.instantiate_with(args, target)),
            TypeDefKind::Record(fields) => {
                Some(def.instantiate_with(args, &Type::Record(fields.clone())))
            }
            TypeDefKind::Opaque | TypeDefKind::Variant(_) => None,
        }
    }

    /// Expands aliases and named record types until the outermost type is
    /// structural, a variant or opaque.
    pub fn unfold(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.expand(&current) {
                Some(expanded) => current = expanded,
                None => break,
            }
        }
        current
    }

    /// The fields of a record type, looking through named aliases.
    pub fn record_fields(&self, ty: &Type) -> Option<BTreeMap<String, Type>> {
        let mut current = ty.clone();
        for _ in 0..MAX_ALIAS_DEPTH {
            match current {
                Type::Record(fields) => return Some(fields),
                _ => current = self.expand(&current)?,
            }
        }
        None
    }

    /// The constructors of a variant type, with argument types instantiated to the
    /// type's arguments. Looks through aliases; `None` for anything but a variant.
    pub fn variant_constructors(&self, ty: &Type) -> Option<Vec<ConstructorDef>> {
        let mut current = ty.clone();
        for _ in 0..MAX_ALIAS_DEPTH {
            let def = self.types.get(current.head_name()?)?;
            let args = current.type_args();
            if args.len() != def.params.len() {
                return None;
            }
            match &def.kind {
                TypeDefKind::Variant(ctors) => {
                    return Some(
                        ctors
                            .iter()
                            .map(|c| ConstructorDef {
                                name: c.name.clone(),
                                args: c
                                    .args
                                    .iter()
                                    .map(|a| def.instantiate_with(args, a))
                                    .collect(),
                            })
                            .collect(),
                    );
                }
                TypeDefKind::Alias(target) => current = def.instantiate_with(args, target),
                TypeDefKind::Opaque | TypeDefKind::Record(_) => return None,
            }
        }
        None
    }
}

impl ExpandNamed for TypeEnv {
    fn expand(&self, ty: &Type) -> Option<Type> {
        TypeEnv::expand(self, ty)
    }
}
