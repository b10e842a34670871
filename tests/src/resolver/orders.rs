use cil_resolver::diagnostics::Severity;
use cil_resolver::errors::ResolveError;
use cil_resolver::symtab::SymIndex;

use crate::utils::{resolve, resolve_error, root_lookup};

const CLASSES: &str = "(class a (read)) (class b (read)) (class c (read)) (class d (read)) ";

#[test]
fn overlapping_orders_merge() {
    let db = resolve(&format!(
        "{CLASSES} (classorder (file a b c)) (classorder (b c d))"
    ));
    assert_eq!(db.names(&db.orders().classes), ["file", "a", "b", "c", "d"]);
}

#[test]
fn contradicting_orders_conflict() {
    let err = resolve_error(&format!(
        "{CLASSES} (classorder (file a b c d)) (classorder (b a))"
    ));
    assert!(matches!(err, ResolveError::OrderConflict { .. }), "{err}");
}

#[test]
fn unordered_classes_follow_the_ordered_ones() {
    let db = resolve(&format!("{CLASSES} (classorder (file a)) (classorder (unordered b c d))"));
    let order = db.names(&db.orders().classes);
    assert_eq!(&order[..2], ["file", "a"]);
    assert_eq!(order.len(), 5);
}

#[test]
fn ordered_placement_wins_over_unordered() {
    let db = resolve(&format!(
        "{CLASSES} (classorder (file a b c d)) (classorder (unordered b))"
    ));
    assert_eq!(db.names(&db.orders().classes), ["file", "a", "b", "c", "d"]);
    assert!(
        db.diagnostics()
            .with_severity(Severity::Warning)
            .any(|d| d.message.contains("Ignoring 'b'"))
    );
}

#[test]
fn class_missing_from_every_order_is_rejected() {
    let err = resolve_error("(class lonely (read))");
    assert!(matches!(err, ResolveError::Unordered { .. }), "{err}");
    assert!(err.to_string().contains("lonely"), "{err}");
}

#[test]
fn categories_are_numbered_in_order() {
    let db = resolve(
        "(sensitivity s0) (sensitivityorder (s0)) \
         (category c0) (category c1) (category c2) \
         (categoryorder (c0 c1)) (categoryorder (c1 c2))",
    );
    let c2 = root_lookup(&db, SymIndex::Cats, "c2").unwrap();
    assert_eq!(db.datum(c2).unwrap().state.value, Some(2));
    assert_eq!(db.names(&db.orders().categories), ["c0", "c1", "c2"]);
}

#[test]
fn order_items_must_have_the_right_kind() {
    let err = resolve_error("(type t) (classorder (file t))");
    assert!(
        matches!(&err, ResolveError::NotFound { kind: "class", name, .. } if name == "t"),
        "{err}"
    );
}

#[test]
fn sids_without_context_are_noted() {
    let db = resolve("");
    assert!(
        db.diagnostics()
            .with_severity(Severity::Info)
            .any(|d| d.message == "no context assigned to sid 'kernel'")
    );
}

#[test]
fn at_least_one_sid_is_required() {
    let err = try_resolve_without_prelude("(class file (read)) (classorder (file))");
    assert!(
        err.to_string().contains("at least one initial sid must be defined"),
        "{err}"
    );
}

fn try_resolve_without_prelude(source: &str) -> anyhow::Error {
    cil::compile(&[("test.cil", source)], cil::ResolverOptions::default())
        .err()
        .unwrap_or_else(|| panic!("resolution should fail for: {source}"))
}
