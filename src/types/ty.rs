use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

pub const INT: &str = "Int";
pub const FLOAT: &str = "Float";
pub const STRING: &str = "String";
pub const BOOL: &str = "Bool";
pub const UNIT: &str = "Unit";
pub const LIST: &str = "List";
pub const REF: &str = "Ref";
pub const OPTION: &str = "Option";
pub const RESULT: &str = "Result";

/// Inference depth at which a type variable was created.
pub type Level = u32;

/// A type variable. Identity is the `id`; `level` is bookkeeping for generalization.
#[derive(Debug, Clone, Copy)]
pub struct TypeVar {
    pub id: u32,
    pub level: Level,
}

impl TypeVar {
    pub fn new(id: u32, level: Level) -> Self {
        Self { id, level }
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'t{}", self.id)
    }
}

impl PartialEq for TypeVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeVar {}

impl Hash for TypeVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeVar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeVar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Var(TypeVar),
    /// Primitives and nominal type names.
    Const(String),
    /// Application of a parametric type, e.g. `List<Int>`.
    App(Box<Type>, Vec<Type>),
    Function(Vec<Type>, Box<Type>),
    Record(BTreeMap<String, Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn var(id: u32, level: Level) -> Self {
        Type::Var(TypeVar::new(id, level))
    }

    pub fn con(name: &str) -> Self {
        Type::Const(name.to_string())
    }

    pub fn int() -> Self {
        Type::con(INT)
    }

    pub fn float() -> Self {
        Type::con(FLOAT)
    }

    pub fn string() -> Self {
        Type::con(STRING)
    }

    pub fn bool() -> Self {
        Type::con(BOOL)
    }

    pub fn unit() -> Self {
        Type::con(UNIT)
    }

    pub fn app(name: &str, args: Vec<Type>) -> Self {
        Type::App(Box::new(Type::con(name)), args)
    }

    pub fn list(elem: Type) -> Self {
        Type::app(LIST, vec![elem])
    }

    pub fn reference(elem: Type) -> Self {
        Type::app(REF, vec![elem])
    }

    pub fn option(elem: Type) -> Self {
        Type::app(OPTION, vec![elem])
    }

    pub fn func(params: Vec<Type>, result: Type) -> Self {
        Type::Function(params, Box::new(result))
    }

    pub fn record<S: Into<String>>(fields: impl IntoIterator<Item = (S, Type)>) -> Self {
        Type::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The name of a nominal type, for `Const(name)` and `App(Const(name), _)`.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Type::Const(name) => Some(name),
            Type::App(ctor, _) => ctor.head_name(),
            _ => None,
        }
    }

    /// Arguments of a nominal type application; empty for a bare `Const`.
    pub fn type_args(&self) -> &[Type] {
        match self {
            Type::App(_, args) => args,
            _ => &[],
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.head_name() == Some(name)
    }

    /// Element type of `List<a>`.
    pub fn list_elem(&self) -> Option<&Type> {
        match self {
            Type::App(ctor, args) if ctor.is_named(LIST) && args.len() == 1 => args.first(),
            _ => None,
        }
    }

    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        let mut set = BTreeSet::new();
        self.collect_vars(&mut set);
        set
    }

    fn collect_vars(&self, set: &mut BTreeSet<TypeVar>) {
        match self {
            Type::Var(v) => {
                set.insert(*v);
            }
            Type::Const(_) => {}
            Type::App(ctor, args) => {
                ctor.collect_vars(set);
                args.iter().for_each(|a| a.collect_vars(set));
            }
            Type::Function(params, result) => {
                params.iter().for_each(|p| p.collect_vars(set));
                result.collect_vars(set);
            }
            Type::Record(fields) => fields.values().for_each(|f| f.collect_vars(set)),
            Type::Tuple(elems) => elems.iter().for_each(|e| e.collect_vars(set)),
        }
    }

    pub fn contains_function(&self) -> bool {
        match self {
            Type::Function(_, _) => true,
            Type::Var(_) | Type::Const(_) => false,
            Type::App(ctor, args) => {
                ctor.contains_function() || args.iter().any(Type::contains_function)
            }
            Type::Record(fields) => fields.values().any(Type::contains_function),
            Type::Tuple(elems) => elems.iter().any(Type::contains_function),
        }
    }

    pub fn pretty(&self) -> String {
        self.pretty_with(&HashMap::new())
    }

    /// Pretty print, showing the variables in `names` by name instead of by id.
    fn pretty_with(&self, names: &HashMap<u32, String>) -> String {
        let join = |tys: &[Type]| {
            tys.iter()
                .map(|t| t.pretty_with(names))
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Type::Var(v) => match names.get(&v.id) {
                Some(name) => format!("'{}", name),
                None => format!("'t{}", v.id),
            },
            Type::Const(name) => name.clone(),
            Type::App(ctor, args) => format!("{}<{}>", ctor.pretty_with(names), join(args)),
            Type::Function(params, result) => {
                format!("({}) -> {}", join(params), result.pretty_with(names))
            }
            Type::Record(fields) if fields.is_empty() => "{}".to_string(),
            Type::Record(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty.pretty_with(names)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {} }}", fields)
            }
            Type::Tuple(elems) => format!("({})", join(elems)),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pretty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeScheme {
    pub vars: Vec<TypeVar>,
    pub ty: Type,
}

impl TypeScheme {
    pub fn monomorphic(ty: Type) -> Self {
        TypeScheme {
            vars: Vec::new(),
            ty,
        }
    }

    pub fn polymorphic(vars: Vec<TypeVar>, ty: Type) -> Self {
        TypeScheme { vars, ty }
    }

    pub fn is_polymorphic(&self) -> bool {
        !self.vars.is_empty()
    }

    /// Free variables of the body that are not quantified.
    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        let mut free = self.ty.free_type_vars();
        for v in &self.vars {
            free.remove(v);
        }
        free
    }

    /// `forall 'a 'b. ('a) -> 'b`, with quantified variables named in order.
    pub fn pretty(&self) -> String {
        if self.vars.is_empty() {
            return self.ty.pretty();
        }
        let names: HashMap<u32, String> = self
            .vars
            .iter()
            .enumerate()
            .map(|(i, v)| (v.id, var_name(i)))
            .collect();
        let quantified = self
            .vars
            .iter()
            .map(|v| format!("'{}", names[&v.id]))
            .collect::<Vec<_>>()
            .join(" ");
        format!("forall {}. {}", quantified, self.ty.pretty_with(&names))
    }
}

impl fmt::Display for TypeScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pretty())
    }
}

fn var_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    match index / 26 {
        0 => letter.to_string(),
        n => format!("{}{}", letter, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_type_vars_concrete() {
        let ty = Type::func(vec![Type::int()], Type::string());
        assert!(ty.free_type_vars().is_empty());
    }

    #[test]
    fn test_free_type_vars_function() {
        let ty = Type::func(vec![Type::var(0, 1)], Type::list(Type::var(1, 1)));
        let free = ty.free_type_vars();
        assert_eq!(free.len(), 2);
        assert!(free.contains(&TypeVar::new(0, 1)));
        assert!(free.contains(&TypeVar::new(1, 1)));
    }

    #[test]
    fn test_var_identity_ignores_level() {
        assert_eq!(TypeVar::new(3, 1), TypeVar::new(3, 7));
        assert_ne!(TypeVar::new(3, 1), TypeVar::new(4, 1));
    }

    #[test]
    fn test_free_type_vars_record() {
        let ty = Type::record([("name", Type::var(2, 1)), ("age", Type::int())]);
        assert_eq!(ty.free_type_vars().len(), 1);
    }

    #[test]
    fn test_pretty_print_simple() {
        assert_eq!(Type::int().pretty(), "Int");
        assert_eq!(Type::unit().pretty(), "Unit");
        assert_eq!(Type::var(4, 0).pretty(), "'t4");
    }

    #[test]
    fn test_pretty_print_function() {
        let ty = Type::func(vec![Type::int(), Type::string()], Type::bool());
        assert_eq!(ty.pretty(), "(Int, String) -> Bool");
    }

    #[test]
    fn test_pretty_print_nested_function() {
        let ty = Type::func(vec![Type::func(vec![Type::int()], Type::int())], Type::string());
        assert_eq!(ty.pretty(), "((Int) -> Int) -> String");
    }

    #[test]
    fn test_pretty_print_structures() {
        let ty = Type::record([("name", Type::string()), ("age", Type::int())]);
        assert_eq!(ty.pretty(), "{ age: Int, name: String }");
        assert_eq!(Type::list(Type::int()).pretty(), "List<Int>");
        assert_eq!(Type::Tuple(vec![Type::int(), Type::bool()]).pretty(), "(Int, Bool)");
    }

    #[test]
    fn test_pretty_print_scheme() {
        let a = TypeVar::new(10, 1);
        let scheme = TypeScheme::polymorphic(vec![a], Type::func(vec![Type::Var(a)], Type::Var(a)));
        assert_eq!(scheme.pretty(), "forall 'a. ('a) -> 'a");
    }

    #[test]
    fn test_list_elem() {
        assert_eq!(Type::list(Type::int()).list_elem(), Some(&Type::int()));
        assert_eq!(Type::reference(Type::int()).list_elem(), None);
    }
}
