//! Small complete policies, one per headline resolution behavior.

use cil_ast::nodes::{Flavor, Statement};
use cil_resolver::errors::ResolveError;
use cil_resolver::symtab::SymIndex;

use crate::utils::{expanded, resolve, resolve_error, root_lookup, type_named};

#[test]
fn class_orders_merge_into_one() {
    let db = resolve("(class dir (read)) (class socket (read)) (classorder (file dir)) (classorder (dir socket))");
    assert_eq!(db.names(&db.orders().classes), ["file", "dir", "socket"]);
}

#[test]
fn macro_parameter_binds_the_call_argument() {
    let db = resolve(
        "(type foo_t) (type trans_t) \
         (macro m ((type t)) (typetransition t self file trans_t)) \
         (call m (foo_t))",
    );
    let rules = expanded(&db, Flavor::TypeTransition);
    assert_eq!(rules.len(), 1);
    let Some(Statement::TypeRule(rule)) = db.arena().statement(rules[0]) else {
        panic!("expected a type rule");
    };
    assert_eq!(rule.source.datum, type_named(&db, "foo_t"));
    assert_eq!(rule.target.datum, Some(db.self_type()));
    assert_eq!(rule.class.datum, root_lookup(&db, SymIndex::Classes, "file"));
    assert_eq!(rule.result.datum, type_named(&db, "trans_t"));
}

#[test]
fn inherited_declarations_are_distinct_per_inheritor() {
    let db = resolve(
        "(block b (type t) (allow t self (file (read)))) \
         (block c1 (blockinherit b)) \
         (block c2 (blockinherit b))",
    );
    let original = type_named(&db, "b.t").unwrap();
    let first = type_named(&db, "c1.t").unwrap();
    let second = type_named(&db, "c2.t").unwrap();
    assert_ne!(first, second);
    assert_ne!(first, original);
    assert_eq!(db.qualified_name(first), "c1.t");
    assert_eq!(db.qualified_name(second), "c2.t");

    // each copied allow rule refers to the type of its own block
    let allows = db.arena().find_nodes(|s| s.flavor() == Flavor::Allow);
    let sources: Vec<_> = allows
        .iter()
        .filter_map(|n| match db.arena().statement(*n) {
            Some(Statement::AvRule(rule)) => rule.source.datum,
            _ => None,
        })
        .collect();
    assert_eq!(sources.len(), 3);
    assert!(sources.contains(&original) && sources.contains(&first) && sources.contains(&second));
}

#[test]
fn unresolvable_optional_is_dropped() {
    let db = resolve("(optional o (type t) (allow t undeclared_t (file (read))))");
    assert!(type_named(&db, "t").is_none());
    assert!(db.arena().find_nodes(|s| s.flavor() == Flavor::Allow).is_empty());
    assert!(
        db.diagnostics()
            .iter()
            .any(|d| d.message == "disabling optional 'o'")
    );
}

#[test]
fn self_referential_alias_is_a_cycle() {
    let err = resolve_error("(typealias a) (typealiasactual a a)");
    assert!(matches!(err, ResolveError::CycleDetected { kind: "alias", .. }), "{err}");
}
