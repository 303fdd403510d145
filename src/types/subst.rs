use std::collections::{BTreeMap, BTreeSet};

use super::ty::{Level, Type, TypeScheme, TypeVar};

/// Immutable mapping from variable id to type.
///
/// Besides the bindings, a substitution records level adjustments: when a
/// variable is bound to a type, every variable reachable from that type is
/// lowered to the bound variable's level. Applying the substitution rewrites
/// the levels of unbound variables accordingly.
///
/// It also records the fields an unbound variable is known to have, when the
/// variable has been used as a record (field access, record pattern, update)
/// before its type was known. Such a variable stays open: later uses may add
/// more fields, until it is bound or closed at generalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    types: im::HashMap<u32, Type>,
    levels: im::HashMap<u32, Level>,
    records: im::HashMap<u32, BTreeMap<String, Type>>,
}

impl Substitution {
    pub fn empty() -> Self {
        Substitution::default()
    }

    pub fn singleton(var: TypeVar, ty: Type) -> Self {
        let mut types = im::HashMap::new();
        types.insert(var.id, ty);
        Substitution {
            types,
            ..Substitution::default()
        }
    }

    /// Maps each variable to the type at the same position; used to fill in type parameters.
    ///
    /// A variable paired with itself is left out.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a TypeVar, &'a Type)>) -> Self {
        Substitution {
            types: pairs
                .into_iter()
                .filter(|(v, t)| !matches!(t, Type::Var(w) if w.id == v.id))
                .map(|(v, t)| (v.id, t.clone()))
                .collect(),
            ..Substitution::default()
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn lookup(&self, var: &TypeVar) -> Option<&Type> {
        self.types.get(&var.id)
    }

    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Const(_) => ty.clone(),
            Type::Var(v) => match self.types.get(&v.id) {
                Some(bound) => self.apply(bound),
                None => match self.levels.get(&v.id) {
                    Some(level) if *level < v.level => Type::var(v.id, *level),
                    _ => ty.clone(),
                },
            },
            Type::App(ctor, args) => Type::App(
                Box::new(self.apply(ctor)),
                args.iter().map(|a| self.apply(a)).collect(),
            ),
            Type::Function(params, result) => Type::Function(
                params.iter().map(|p| self.apply(p)).collect(),
                Box::new(self.apply(result)),
            ),
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.apply(ty)))
                    .collect(),
            ),
            Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| self.apply(e)).collect()),
        }
    }

    /// Applies to the body of a scheme, leaving its quantified variables alone.
    pub fn apply_scheme(&self, scheme: &TypeScheme) -> TypeScheme {
        if scheme.vars.iter().all(|v| self.types.get(&v.id).is_none()) {
            return TypeScheme {
                vars: scheme.vars.clone(),
                ty: self.apply(&scheme.ty),
            };
        }
        let mut restricted = self.clone();
        for v in &scheme.vars {
            restricted.types.remove(&v.id);
        }
        TypeScheme {
            vars: scheme.vars.clone(),
            ty: restricted.apply(&scheme.ty),
        }
    }

    /// `self ∘ older`: applies `self` to every type bound by `older`, then merges,
    /// with `self` winning on conflicting ids.
    pub fn compose(&self, older: &Substitution) -> Substitution {
        let mut types: im::HashMap<u32, Type> = older
            .types
            .iter()
            .map(|(id, ty)| (*id, self.apply(ty)))
            .collect();
        for (id, ty) in self.types.iter() {
            types.insert(*id, ty.clone());
        }

        let mut levels = older.levels.clone();
        for (id, level) in self.levels.iter() {
            let lowest = levels.get(id).map_or(*level, |l| (*l).min(*level));
            levels.insert(*id, lowest);
        }

        let mut records: im::HashMap<u32, BTreeMap<String, Type>> = older
            .records
            .iter()
            .filter(|(id, _)| !types.contains_key(*id))
            .map(|(id, fields)| {
                let fields = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.apply(ty)))
                    .collect();
                (*id, fields)
            })
            .collect();
        for (id, fields) in self.records.iter() {
            let mut merged = records.get(id).cloned().unwrap_or_default();
            merged.extend(fields.iter().map(|(name, ty)| (name.clone(), ty.clone())));
            records.insert(*id, merged);
        }

        Substitution {
            types,
            levels,
            records,
        }
    }

    /// Adds `var := ty` to this substitution.
    ///
    /// `ty` must already have `self` applied and must not contain `var`. Every
    /// variable reachable from `ty` created deeper than `var` is lowered to
    /// `var`'s level. Fields recorded for `var` are dropped; callers that need
    /// them read them first with [`record_shape`](Self::record_shape).
    pub fn bind(&self, var: TypeVar, ty: Type) -> Substitution {
        let mut adjust = Substitution::singleton(var, ty.clone());
        for free in self.reachable_vars(&ty) {
            if free.level > var.level {
                adjust.levels.insert(free.id, var.level);
            }
        }
        let mut bound = adjust.compose(self);
        bound.records.remove(&var.id);
        bound
    }

    /// Lowers every unbound variable reachable from `ty` created deeper than `level` to `level`.
    pub fn lower_levels(&self, ty: &Type, level: Level) -> Substitution {
        let mut adjust = Substitution::empty();
        for free in self.reachable_vars(ty) {
            if free.level > level {
                adjust.levels.insert(free.id, level);
            }
        }
        if adjust.levels.is_empty() {
            return self.clone();
        }
        adjust.compose(self)
    }

    /// The fields recorded for the unbound `var`, with `self` applied.
    pub fn record_shape(&self, var: &TypeVar) -> Option<BTreeMap<String, Type>> {
        if self.types.contains_key(&var.id) {
            return None;
        }
        self.records.get(&var.id).map(|fields| {
            fields
                .iter()
                .map(|(name, ty)| (name.clone(), self.apply(ty)))
                .collect()
        })
    }

    /// Records that the unbound `var` has a field `field` of type `ty`.
    ///
    /// The variables of `ty` are lowered to `var`'s level, since they are
    /// reachable from wherever `var` is.
    pub fn require_field(&self, var: TypeVar, field: &str, ty: Type) -> Substitution {
        let level = match self.apply(&Type::Var(var)) {
            Type::Var(current) => current.level,
            _ => var.level,
        };
        let mut next = self.lower_levels(&ty, level);
        let mut fields = next.records.get(&var.id).cloned().unwrap_or_default();
        fields.insert(field.to_string(), ty);
        next.records.insert(var.id, fields);
        next
    }

    /// The type of `field` on the unbound `var`. A field not recorded yet is
    /// added with the type produced by `fresh`.
    pub fn field_of(
        &self,
        var: TypeVar,
        field: &str,
        fresh: impl FnOnce() -> Type,
    ) -> (Substitution, Type) {
        let known = self
            .records
            .get(&var.id)
            .and_then(|fields| fields.get(field))
            .map(|ty| self.apply(ty));
        match known {
            Some(ty) => (self.clone(), ty),
            None => {
                let ty = fresh();
                (self.require_field(var, field, ty.clone()), ty)
            }
        }
    }

    /// Like [`apply`](Self::apply), but shows every unbound variable with
    /// recorded fields as the record of those fields.
    pub fn apply_shapes(&self, ty: &Type) -> Type {
        self.shape(&self.apply(ty), &mut Vec::new())
    }

    fn shape(&self, ty: &Type, open: &mut Vec<u32>) -> Type {
        match ty {
            Type::Var(v) if !open.contains(&v.id) => match self.records.get(&v.id) {
                Some(fields) => {
                    open.push(v.id);
                    let record = Type::Record(
                        fields
                            .iter()
                            .map(|(name, field_ty)| {
                                (name.clone(), self.shape(&self.apply(field_ty), open))
                            })
                            .collect(),
                    );
                    open.pop();
                    record
                }
                None => ty.clone(),
            },
            Type::Var(_) | Type::Const(_) => ty.clone(),
            Type::App(ctor, args) => Type::App(
                Box::new(self.shape(ctor, open)),
                args.iter().map(|a| self.shape(a, open)).collect(),
            ),
            Type::Function(params, result) => Type::Function(
                params.iter().map(|p| self.shape(p, open)).collect(),
                Box::new(self.shape(result, open)),
            ),
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, field_ty)| (name.clone(), self.shape(field_ty, open)))
                    .collect(),
            ),
            Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| self.shape(e, open)).collect()),
        }
    }

    /// Unbound variables of `ty`, plus those reachable through recorded fields.
    fn reachable_vars(&self, ty: &Type) -> BTreeSet<TypeVar> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<TypeVar> = self.apply(ty).free_type_vars().into_iter().collect();
        while let Some(var) = pending.pop() {
            if !seen.insert(var) {
                continue;
            }
            if let Some(fields) = self.records.get(&var.id) {
                for field_ty in fields.values() {
                    pending.extend(self.apply(field_ty).free_type_vars());
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(id: u32) -> TypeVar {
        TypeVar::new(id, 1)
    }

    #[test]
    fn test_empty_substitution() {
        let subst = Substitution::empty();
        assert_eq!(subst.apply(&Type::int()), Type::int());
    }

    #[test]
    fn test_singleton_substitution() {
        let subst = Substitution::singleton(var(0), Type::int());
        assert_eq!(subst.apply(&Type::Var(var(0))), Type::int());
    }

    #[test]
    fn test_apply_to_structures() {
        let subst = Substitution::singleton(var(0), Type::int());
        let ty = Type::func(
            vec![Type::Var(var(0))],
            Type::record([("items", Type::list(Type::Var(var(0))))]),
        );
        assert_eq!(
            subst.apply(&ty),
            Type::func(vec![Type::int()], Type::record([("items", Type::list(Type::int()))]))
        );
    }

    #[test]
    fn test_apply_preserves_unbound_vars() {
        let subst = Substitution::singleton(var(0), Type::int());
        assert_eq!(subst.apply(&Type::Var(var(1))), Type::Var(var(1)));
    }

    #[test]
    fn test_compose_substitutions() {
        let older = Substitution::singleton(var(1), Type::int());
        let newer = Substitution::singleton(var(0), Type::Var(var(1)));
        let composed = newer.compose(&older);
        assert_eq!(composed.apply(&Type::Var(var(0))), Type::int());
    }

    #[test]
    fn test_compose_newer_wins() {
        let older = Substitution::singleton(var(0), Type::string());
        let newer = Substitution::singleton(var(0), Type::int());
        let result = newer.compose(&older);
        assert_eq!(result.apply(&Type::Var(var(0))), Type::int());
    }

    #[test]
    fn test_compose_rewrites_older_bindings() {
        let older = Substitution::singleton(var(0), Type::list(Type::Var(var(1))));
        let newer = Substitution::singleton(var(1), Type::bool());
        let result = newer.compose(&older);
        assert_eq!(result.lookup(&var(0)), Some(&Type::list(Type::bool())));
    }

    #[test]
    fn test_substitution_idempotent() {
        let subst = Substitution::singleton(var(0), Type::int());
        let ty = Type::Var(var(0));
        let once = subst.apply(&ty);
        let twice = subst.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bind_lowers_levels() {
        let outer = TypeVar::new(0, 1);
        let inner = TypeVar::new(1, 3);
        let subst = Substitution::empty().bind(outer, Type::list(Type::Var(inner)));
        match subst.apply(&Type::Var(inner)) {
            Type::Var(v) => assert_eq!(v.level, 1),
            other => panic!("Expected type variable, got {}", other),
        }
    }

    #[test]
    fn test_lower_levels() {
        let deep = TypeVar::new(0, 4);
        let subst = Substitution::empty().lower_levels(&Type::list(Type::Var(deep)), 2);
        match subst.apply(&Type::Var(deep)) {
            Type::Var(v) => assert_eq!(v.level, 2),
            other => panic!("Expected type variable, got {}", other),
        }
    }

    #[test]
    fn test_apply_scheme_skips_quantified() {
        let a = var(0);
        let scheme = TypeScheme::polymorphic(vec![a], Type::Var(a));
        let subst = Substitution::singleton(a, Type::int());
        assert_eq!(subst.apply_scheme(&scheme).ty, Type::Var(a));
    }

    #[test]
    fn test_field_of_records_and_reuses_fields() {
        let p = var(0);
        let (subst, name) = Substitution::empty().field_of(p, "name", || Type::Var(var(1)));
        assert_eq!(name, Type::Var(var(1)));
        let (subst, again) = subst.field_of(p, "name", || Type::int());
        assert_eq!(again, Type::Var(var(1)));
        let (subst, _) = subst.field_of(p, "age", || Type::int());
        assert_eq!(
            subst.apply_shapes(&Type::list(Type::Var(p))),
            Type::list(Type::record([("age", Type::int()), ("name", Type::Var(var(1)))]))
        );
    }

    #[test]
    fn test_required_fields_share_the_record_level() {
        let outer = TypeVar::new(0, 1);
        let deep = TypeVar::new(1, 3);
        let subst = Substitution::empty().require_field(outer, "value", Type::Var(deep));
        match subst.apply(&Type::Var(deep)) {
            Type::Var(v) => assert_eq!(v.level, 1),
            other => panic!("Expected type variable, got {}", other),
        }
    }

    #[test]
    fn test_bind_drops_recorded_fields() {
        let p = var(0);
        let subst = Substitution::empty().require_field(p, "name", Type::string());
        assert_eq!(
            subst.record_shape(&p),
            Some(BTreeMap::from([("name".to_string(), Type::string())]))
        );
        let bound = subst.bind(p, Type::record([("name", Type::string())]));
        assert_eq!(bound.record_shape(&p), None);
        assert_eq!(bound.apply_shapes(&Type::Var(p)), Type::record([("name", Type::string())]));
    }

    #[test]
    fn test_apply_shapes_stops_at_cycles() {
        let node = var(0);
        let subst = Substitution::empty().require_field(node, "next", Type::Var(node));
        assert_eq!(
            subst.apply_shapes(&Type::Var(node)),
            Type::record([("next", Type::Var(node))])
        );
    }
}
