#![allow(dead_code)]

use typecore::core::{Declaration, Module};
use typecore::types::{TypeError, TypeErrorKind, TypedModule};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper to check a module made of `decls`
pub fn check(decls: Vec<Declaration>) -> Result<TypedModule, Vec<TypeError>> {
    init_logger();
    typecore::check_module(Module::new("test", decls))
}

pub fn check_ok(decls: Vec<Declaration>) -> TypedModule {
    match check(decls) {
        Ok(typed) => typed,
        Err(errors) => {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            panic!("Expected module to type-check, got:\n{}", messages.join("\n"))
        }
    }
}

/// The first error of a module expected to fail
pub fn check_err(decls: Vec<Declaration>) -> TypeError {
    match check(decls) {
        Ok(typed) => panic!("Expected a type error, got {:?}", typed.declaration_types),
        Err(mut errors) => errors.remove(0),
    }
}

pub fn check_err_kind(decls: Vec<Declaration>) -> TypeErrorKind {
    check_err(decls).kind
}

/// Pretty printed scheme of `name`
pub fn scheme(typed: &TypedModule, name: &str) -> String {
    typed
        .scheme_of(name)
        .unwrap_or_else(|| panic!("`{}` is not bound", name))
        .pretty()
}
