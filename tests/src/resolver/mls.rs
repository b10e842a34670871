use cil_ast::nodes::ContextRef;
use cil_resolver::errors::ResolveError;
use cil_resolver::symtab::SymIndex;

use crate::utils::{resolve, resolve_error, root_lookup};

const MLS: &str = "(sensitivity s0) (sensitivity s1) (sensitivityorder (s0 s1)) \
                   (category c0) (category c1) (categoryorder (c0 c1)) \
                   (sensitivitycategory s0 (c0)) (sensitivitycategory s1 (range c0 c1)) \
                   (user u) (role r) (type t) ";

#[test]
fn named_levels_and_ranges_resolve() {
    let db = resolve(&format!(
        "{MLS} (level low (s0)) (level high (s1 (c0 c1))) (levelrange full (low high)) \
         (userlevel u low) (userrange u full)"
    ));
    let u = root_lookup(&db, SymIndex::Users, "u").unwrap();
    let state = &db.datum(u).unwrap().state;
    assert!(state.user_level.is_some());
    assert!(state.user_range.is_some());
    let s1 = root_lookup(&db, SymIndex::Sens, "s1").unwrap();
    assert_eq!(db.datum(s1).unwrap().state.sens_cats.len(), 1);
}

#[test]
fn sid_gets_its_context() {
    let db = resolve(&format!(
        "{MLS} (level low (s0)) (context kernel_ctx (u r t (low low))) (sidcontext kernel kernel_ctx)"
    ));
    let kernel = root_lookup(&db, SymIndex::Sids, "kernel").unwrap();
    assert!(matches!(
        db.datum(kernel).unwrap().state.context,
        Some(ContextRef::Named(_))
    ));
    assert!(
        !db.diagnostics()
            .iter()
            .any(|d| d.message.starts_with("no context assigned"))
    );
}

#[test]
fn inline_context_resolves_every_part() {
    let db = resolve(&format!("{MLS} (sidcontext kernel (u r t ((s0) (s1 (c1)))))"));
    let kernel = root_lookup(&db, SymIndex::Sids, "kernel").unwrap();
    let Some(ContextRef::Anonymous(spec)) = &db.datum(kernel).unwrap().state.context else {
        panic!("expected an inline context");
    };
    assert!(spec.user.is_resolved() && spec.role.is_resolved() && spec.type_.is_resolved());
}

#[test]
fn category_set_cannot_name_itself() {
    let err = resolve_error(&format!("{MLS} (categoryset cs (c0 cs))"));
    assert!(matches!(err, ResolveError::CycleDetected { .. }), "{err}");
}

#[test]
fn sensitivity_missing_from_order_is_rejected() {
    let err = resolve_error(&format!("{MLS} (sensitivity s2)"));
    assert!(
        matches!(&err, ResolveError::Unordered { name, .. } if name == "s2"),
        "{err}"
    );
}

#[test]
fn filecon_takes_a_named_context() {
    let db = resolve(&format!(
        "{MLS} (level low (s0)) (context file_ctx (u r t (low low))) \
         (filecon \"/etc\" dir file_ctx) (portcon tcp 22 file_ctx)"
    ));
    assert!(root_lookup(&db, SymIndex::Contexts, "file_ctx").is_some());
}
