use cil_ast::nodes::{Flavor, Statement};
use cil_resolver::errors::ResolveError;

use crate::utils::{expanded, resolve, resolve_error, type_named};

fn permissive_targets(db: &cil_resolver::db::PolicyDb) -> Vec<String> {
    expanded(db, Flavor::TypePermissive)
        .into_iter()
        .filter_map(|n| match db.arena().statement(n) {
            Some(Statement::TypePermissive(t)) => t.datum.map(|d| db.qualified_name(d)),
            _ => None,
        })
        .collect()
}

#[test]
fn argument_shadows_an_outer_declaration() {
    let db = resolve(
        "(type t) (type foo_t) \
         (macro m ((type t)) (typepermissive t)) \
         (call m (foo_t))",
    );
    assert_eq!(permissive_targets(&db), ["foo_t"]);
}

#[test]
fn argument_wins_over_a_body_declaration() {
    let db = resolve(
        "(type foo_t) \
         (macro m ((type a)) (typeattribute a) (allow a self (file (read)))) \
         (call m (foo_t))",
    );
    let allows = expanded(&db, Flavor::Allow);
    assert_eq!(allows.len(), 1);
    let Some(Statement::AvRule(rule)) = db.arena().statement(allows[0]) else {
        panic!("expected an allow rule");
    };
    assert_eq!(rule.source.datum, type_named(&db, "foo_t"));
}

#[test]
fn body_declaration_does_not_hide_the_argument_kind() {
    let db = resolve(
        "(type foo_t) \
         (macro m ((type a)) (typeattribute a) (typepermissive a)) \
         (call m (foo_t))",
    );
    assert_eq!(permissive_targets(&db), ["foo_t"]);
}

#[test]
fn each_call_binds_its_own_arguments() {
    let db = resolve(
        "(type a_t) (type b_t) \
         (macro m ((type t)) (typepermissive t)) \
         (call m (a_t)) (call m (b_t))",
    );
    let mut targets = permissive_targets(&db);
    targets.sort();
    assert_eq!(targets, ["a_t", "b_t"]);
}

#[test]
fn body_sees_names_around_the_macro() {
    let db = resolve(
        "(block lib (type helper_t) (macro use ((type t)) (allow t helper_t (file (read))))) \
         (type app_t) (call lib.use (app_t))",
    );
    let allows = expanded(&db, Flavor::Allow);
    assert_eq!(allows.len(), 1);
    let Some(Statement::AvRule(rule)) = db.arena().statement(allows[0]) else {
        panic!("expected an allow rule");
    };
    assert_eq!(rule.source.datum, type_named(&db, "app_t"));
    assert_eq!(rule.target.datum, type_named(&db, "lib.helper_t"));
}

#[test]
fn nested_calls_pass_arguments_through() {
    let db = resolve(
        "(type foo_t) \
         (macro inner ((type x)) (typepermissive x)) \
         (macro outer ((type y)) (call inner (y))) \
         (call outer (foo_t))",
    );
    assert_eq!(permissive_targets(&db), ["foo_t"]);
}

#[test]
fn missing_argument_is_an_error() {
    let err = resolve_error("(macro m ((type t)) (typepermissive t)) (call m ())");
    assert!(err.to_string().contains("missing arguments"), "{err}");
}

#[test]
fn recursive_call_is_a_cycle() {
    let err = resolve_error("(macro m () (call m)) (call m)");
    assert!(matches!(err, ResolveError::CycleDetected { .. }), "{err}");
}

#[test]
fn tunable_in_macro_is_rejected() {
    let err = resolve_error("(macro m () (tunable t false))");
    assert!(
        matches!(&err, ResolveError::StructuralViolation { statement: Flavor::Tunable, .. }),
        "{err}"
    );
}
