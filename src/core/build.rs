//! Span-less constructors for Core trees.
//!
//! Desugaring passes and tests build Core nodes far more often than they need
//! a precise position for each one; these helpers fill every position with
//! `Span::default()`.

use lachs::Span;

use super::*;

pub fn ident(name: &str) -> Ident {
    Ident {
        value: name.to_string(),
        position: Span::default(),
    }
}

fn boxed(expr: Expr) -> Box<Expr> {
    Box::new(expr)
}

fn literal(value: LiteralValue) -> Literal {
    Literal {
        value,
        position: Span::default(),
    }
}

impl Module {
    pub fn new(name: &str, declarations: Vec<Declaration>) -> Self {
        Module {
            name: name.to_string(),
            declarations,
        }
    }
}

impl Declaration {
    /// `let name = value`
    pub fn value(name: &str, value: Expr) -> Self {
        Declaration::Let(LetDecl {
            name: ident(name),
            annotation: None,
            value,
            recursive: false,
            position: Span::default(),
        })
    }

    /// `let name: annotation = value`
    pub fn annotated_value(name: &str, annotation: TypeExpr, value: Expr) -> Self {
        Declaration::Let(LetDecl {
            name: ident(name),
            annotation: Some(annotation),
            value,
            recursive: false,
            position: Span::default(),
        })
    }

    /// `let rec name = value`
    pub fn rec_value(name: &str, value: Expr) -> Self {
        Declaration::Let(LetDecl {
            name: ident(name),
            annotation: None,
            value,
            recursive: true,
            position: Span::default(),
        })
    }

    /// `let rec a = ... and b = ...`
    pub fn rec_group(bindings: Vec<(&str, Expr)>) -> Self {
        Declaration::RecGroup(RecGroupDecl {
            bindings: bindings.into_iter().map(rec_binding).collect(),
            position: Span::default(),
        })
    }

    pub fn types(decls: Vec<TypeDecl>) -> Self {
        Declaration::Types(TypeDefs {
            decls,
            position: Span::default(),
        })
    }

    pub fn external(name: &str, signature: TypeExpr, foreign_name: &str) -> Self {
        Declaration::External(ExternalDecl {
            name: ident(name),
            signature,
            foreign_name: foreign_name.to_string(),
            position: Span::default(),
        })
    }

    pub fn import(module: &str, items: Vec<ImportItem>) -> Self {
        Declaration::Import(ImportDecl {
            module: module.to_string(),
            items,
            position: Span::default(),
        })
    }
}

fn rec_binding((name, value): (&str, Expr)) -> RecBinding {
    RecBinding {
        name: ident(name),
        annotation: None,
        value,
        position: Span::default(),
    }
}

impl ImportItem {
    pub fn value(name: &str, signature: TypeExpr) -> Self {
        ImportItem::Value {
            name: ident(name),
            alias: None,
            signature,
        }
    }
}

impl TypeDecl {
    pub fn variant(name: &str, params: &[&str], ctors: Vec<(&str, Vec<TypeExpr>)>) -> Self {
        TypeDecl {
            name: ident(name),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: TypeDeclBody::Variant(
                ctors
                    .into_iter()
                    .map(|(ctor, args)| ConstructorDecl {
                        name: ident(ctor),
                        args,
                    })
                    .collect(),
            ),
            position: Span::default(),
        }
    }

    pub fn record(name: &str, params: &[&str], fields: Vec<(&str, TypeExpr)>) -> Self {
        TypeDecl {
            name: ident(name),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: TypeDeclBody::Record(field_decls(fields)),
            position: Span::default(),
        }
    }

    pub fn alias(name: &str, params: &[&str], ty: TypeExpr) -> Self {
        TypeDecl {
            name: ident(name),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: TypeDeclBody::Alias(ty),
            position: Span::default(),
        }
    }
}

fn field_decls(fields: Vec<(&str, TypeExpr)>) -> Vec<FieldDecl> {
    fields
        .into_iter()
        .map(|(name, ty)| FieldDecl {
            name: name.to_string(),
            ty,
        })
        .collect()
}

impl TypeExpr {
    pub fn named(name: &str, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Named {
            name: name.to_string(),
            args,
            position: Span::default(),
        }
    }

    /// `'name`, written without the tick.
    pub fn var(name: &str) -> Self {
        TypeExpr::Var {
            name: name.to_string(),
            position: Span::default(),
        }
    }

    pub fn function(params: Vec<TypeExpr>, result: TypeExpr) -> Self {
        TypeExpr::Function {
            params,
            result: Box::new(result),
            position: Span::default(),
        }
    }

    pub fn record(fields: Vec<(&str, TypeExpr)>) -> Self {
        TypeExpr::Record {
            fields: field_decls(fields),
            position: Span::default(),
        }
    }

    pub fn tuple(elements: Vec<TypeExpr>) -> Self {
        TypeExpr::Tuple {
            elements,
            position: Span::default(),
        }
    }
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Literal(literal(LiteralValue::Int(value)))
    }

    pub fn float(value: f64) -> Self {
        Expr::Literal(literal(LiteralValue::Float(value)))
    }

    pub fn string(value: &str) -> Self {
        Expr::Literal(literal(LiteralValue::String(value.to_string())))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Literal(literal(LiteralValue::Bool(value)))
    }

    pub fn unit() -> Self {
        Expr::Literal(literal(LiteralValue::Unit))
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(ident(name))
    }

    pub fn lambda(params: &[&str], body: Expr) -> Self {
        Expr::Lambda(Lambda {
            params: params
                .iter()
                .map(|p| Param {
                    name: ident(p),
                    annotation: None,
                })
                .collect(),
            body: boxed(body),
            position: Span::default(),
        })
    }

    pub fn annotated_lambda(params: Vec<(&str, TypeExpr)>, body: Expr) -> Self {
        Expr::Lambda(Lambda {
            params: params
                .into_iter()
                .map(|(p, ty)| Param {
                    name: ident(p),
                    annotation: Some(ty),
                })
                .collect(),
            body: boxed(body),
            position: Span::default(),
        })
    }

    pub fn apply(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Apply(Apply {
            func: boxed(func),
            args,
            position: Span::default(),
        })
    }

    /// `f(args)` where `f` is a plain name.
    pub fn call(func: &str, args: Vec<Expr>) -> Self {
        Expr::apply(Expr::var(func), args)
    }

    pub fn let_in(name: &str, value: Expr, body: Expr) -> Self {
        Expr::Let(Let {
            name: ident(name),
            annotation: None,
            value: boxed(value),
            body: boxed(body),
            recursive: false,
            position: Span::default(),
        })
    }

    pub fn let_rec_in(name: &str, value: Expr, body: Expr) -> Self {
        Expr::Let(Let {
            name: ident(name),
            annotation: None,
            value: boxed(value),
            body: boxed(body),
            recursive: true,
            position: Span::default(),
        })
    }

    pub fn rec_group_in(bindings: Vec<(&str, Expr)>, body: Expr) -> Self {
        Expr::LetRecGroup(LetRecGroup {
            bindings: bindings.into_iter().map(rec_binding).collect(),
            body: boxed(body),
            position: Span::default(),
        })
    }

    pub fn if_then_else(condition: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Expr::If(If {
            condition: boxed(condition),
            then_expr: boxed(then_expr),
            else_expr: boxed(else_expr),
            position: Span::default(),
        })
    }

    pub fn block(exprs: Vec<Expr>) -> Self {
        Expr::Block(Block {
            exprs,
            position: Span::default(),
        })
    }

    pub fn match_on(scrutinee: Expr, cases: Vec<MatchCase>) -> Self {
        Expr::Match(Match {
            scrutinee: boxed(scrutinee),
            cases,
            position: Span::default(),
        })
    }

    pub fn record(fields: Vec<(&str, Expr)>) -> Self {
        Expr::Record(RecordLit {
            entries: fields
                .into_iter()
                .map(|f| RecordEntry::Field(field_init(f)))
                .collect(),
            position: Span::default(),
        })
    }

    pub fn record_entries(entries: Vec<RecordEntry>) -> Self {
        Expr::Record(RecordLit {
            entries,
            position: Span::default(),
        })
    }

    pub fn update(base: Expr, fields: Vec<(&str, Expr)>) -> Self {
        Expr::RecordUpdate(RecordUpdate {
            base: boxed(base),
            fields: fields.into_iter().map(field_init).collect(),
            position: Span::default(),
        })
    }

    pub fn field(record: Expr, field: &str) -> Self {
        Expr::FieldAccess(FieldAccess {
            record: boxed(record),
            field: field.to_string(),
            position: Span::default(),
        })
    }

    pub fn tuple(elements: Vec<Expr>) -> Self {
        Expr::Tuple(TupleLit {
            elements,
            position: Span::default(),
        })
    }

    pub fn list(elements: Vec<Expr>) -> Self {
        Expr::List(ListLit {
            elements,
            position: Span::default(),
        })
    }

    pub fn make_ref(value: Expr) -> Self {
        Expr::MakeRef(MakeRef {
            value: boxed(value),
            position: Span::default(),
        })
    }

    pub fn deref(reference: Expr) -> Self {
        Expr::Deref(Deref {
            reference: boxed(reference),
            position: Span::default(),
        })
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign(Assign {
            target: boxed(target),
            value: boxed(value),
            position: Span::default(),
        })
    }

    pub fn binary(op: BinOpKind, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp(BinaryOp {
            op,
            left: boxed(left),
            right: boxed(right),
            position: Span::default(),
        })
    }

    pub fn unary(op: UnaryOpKind, operand: Expr) -> Self {
        Expr::UnaryOp(UnaryOp {
            op,
            operand: boxed(operand),
            position: Span::default(),
        })
    }

    pub fn annotated(expr: Expr, annotation: TypeExpr) -> Self {
        Expr::Annotated(Annotated {
            expr: boxed(expr),
            annotation,
            position: Span::default(),
        })
    }
}

fn field_init((name, value): (&str, Expr)) -> FieldInit {
    FieldInit {
        name: name.to_string(),
        value,
        position: Span::default(),
    }
}

impl RecordEntry {
    pub fn field(name: &str, value: Expr) -> Self {
        RecordEntry::Field(field_init((name, value)))
    }

    pub fn spread(expr: Expr) -> Self {
        RecordEntry::Spread(expr)
    }
}

impl MatchCase {
    pub fn new(pattern: Pattern, body: Expr) -> Self {
        MatchCase {
            pattern,
            guard: None,
            body,
            position: Span::default(),
        }
    }

    pub fn guarded(pattern: Pattern, guard: Expr, body: Expr) -> Self {
        MatchCase {
            pattern,
            guard: Some(guard),
            body,
            position: Span::default(),
        }
    }
}

impl Pattern {
    pub fn wildcard() -> Self {
        Pattern::Wildcard(Span::default())
    }

    pub fn var(name: &str) -> Self {
        Pattern::Var(ident(name))
    }

    pub fn int(value: i64) -> Self {
        Pattern::Literal(literal(LiteralValue::Int(value)))
    }

    pub fn string(value: &str) -> Self {
        Pattern::Literal(literal(LiteralValue::String(value.to_string())))
    }

    pub fn bool(value: bool) -> Self {
        Pattern::Literal(literal(LiteralValue::Bool(value)))
    }

    pub fn unit() -> Self {
        Pattern::Literal(literal(LiteralValue::Unit))
    }

    pub fn ctor(name: &str, args: Vec<Pattern>) -> Self {
        Pattern::Constructor {
            name: ident(name),
            args,
            position: Span::default(),
        }
    }

    pub fn record(fields: Vec<(&str, Pattern)>) -> Self {
        Pattern::Record {
            fields: fields
                .into_iter()
                .map(|(name, pattern)| FieldPattern {
                    name: name.to_string(),
                    pattern,
                    position: Span::default(),
                })
                .collect(),
            position: Span::default(),
        }
    }

    pub fn tuple(elements: Vec<Pattern>) -> Self {
        Pattern::Tuple {
            elements,
            position: Span::default(),
        }
    }

    pub fn list(elements: Vec<Pattern>, rest: Option<Pattern>) -> Self {
        Pattern::List {
            elements,
            rest: rest.map(Box::new),
            position: Span::default(),
        }
    }

    pub fn or(alternatives: Vec<Pattern>) -> Self {
        Pattern::Or {
            alternatives,
            position: Span::default(),
        }
    }
}
