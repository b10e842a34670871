use cil_ast::nodes::Flavor;
use cil_resolver::errors::ResolveError;

use crate::utils::{resolve, resolve_error, type_named};

#[test]
fn in_statement_adds_to_a_block() {
    let db = resolve("(block b (type t)) (in b (type u) (allow u t (file (read))))");
    assert!(type_named(&db, "b.u").is_some());
    assert!(type_named(&db, "u").is_none());
    for node in db.arena().find_nodes(|s| s.flavor() == Flavor::In) {
        assert!(db.arena().children(node).is_empty());
    }
}

#[test]
fn in_after_lands_in_inherited_copies() {
    let db = resolve(
        "(block tmpl (blockabstract tmpl) (type t)) \
         (block app (blockinherit tmpl)) \
         (in after app (allow t self (file (read))))",
    );
    assert!(type_named(&db, "app.t").is_some());
    assert_eq!(db.arena().find_nodes(|s| s.flavor() == Flavor::Allow).len(), 1);
}

#[test]
fn abstract_block_is_not_resolved() {
    // the reference is only valid once inherited next to `outer_t`
    let db = resolve(
        "(block tmpl (blockabstract tmpl) (allow outer_t self (file (read)))) \
         (block app (type outer_t) (blockinherit tmpl))",
    );
    let tmpl = db.lookup_path("tmpl", cil_resolver::symtab::SymIndex::Blocks).unwrap();
    assert!(db.datum(tmpl).unwrap().state.is_abstract);
    assert!(type_named(&db, "app.outer_t").is_some());
}

#[test]
fn inheritance_loop_is_reported() {
    let err = resolve_error("(block a (blockinherit b)) (block b (blockinherit a))");
    assert!(
        matches!(&err, ResolveError::CycleDetected { kind: "block inheritance", .. }),
        "{err}"
    );
}

#[test]
fn doubling_inheritance_is_degenerate() {
    let mut source = String::from("(block a0 (type t))");
    for level in 1..=12 {
        let prev = level - 1;
        source.push_str(&format!("(block a{level} (blockinherit a{prev}) (blockinherit a{prev}))"));
    }
    let err = resolve_error(&source);
    assert!(matches!(err, ResolveError::DegenerateInheritance { .. }), "{err}");
}

#[test]
fn dotted_names_reach_into_blocks() {
    let db = resolve("(block outer (block inner (type t))) (typepermissive outer.inner.t)");
    let t = type_named(&db, "outer.inner.t").unwrap();
    assert_eq!(db.qualified_name(t), "outer.inner.t");
}

#[test]
fn category_inside_block_is_rejected() {
    let err = resolve_error("(block b (category c9))");
    assert!(err.to_string().ends_with("category is not allowed in blocks"), "{err}");
}
