//! Optional blocks that fail to resolve are removed without affecting the rest of the policy.

use cil_ast::nodes::Flavor;
use cil_resolver::db::PolicyDb;
use cil_resolver::diagnostics::Severity;

use crate::utils::{expanded, resolve, type_named};

fn declared_types(db: &PolicyDb) -> Vec<String> {
    let mut names: Vec<String> = db
        .datums()
        .filter(|(_, d)| d.flavor == Flavor::Type)
        .map(|(id, _)| db.qualified_name(id))
        .collect();
    names.sort();
    names
}

const POLICY: &str = "(type a_t) (block b (type t) (allow t a_t (file (read)))) \
                      (class dir (read)) (classorder (file dir))";

#[test]
fn failed_optional_leaves_no_trace() {
    let plain = resolve(POLICY);
    let with_optional = resolve(&format!(
        "{POLICY} (optional extra (type extra_t) (class sock (read)) (classorder (dir sock)) \
         (allow extra_t missing_t (sock (read))))"
    ));
    assert_eq!(declared_types(&plain), declared_types(&with_optional));
    assert_eq!(
        plain.names(&plain.orders().classes),
        with_optional.names(&with_optional.orders().classes)
    );
}

#[test]
fn only_the_innermost_optional_is_disabled() {
    let db = resolve(
        "(optional outer (type kept_t) \
           (optional inner (type dropped_t) (typepermissive nowhere_t)))",
    );
    assert!(type_named(&db, "kept_t").is_some());
    assert!(type_named(&db, "dropped_t").is_none());
    let infos: Vec<_> = db.diagnostics().with_severity(Severity::Info).map(|d| d.message.as_str()).collect();
    assert!(infos.contains(&"disabling optional 'inner'"), "{infos:?}");
    assert!(!infos.contains(&"disabling optional 'outer'"), "{infos:?}");
}

#[test]
fn dependent_optional_falls_with_its_dependency() {
    // `second` only resolves while `first` still declares `a_t`
    let db = resolve(
        "(optional first (type a_t) (typepermissive gone_t)) \
         (optional second (type b_t) (allow b_t a_t (file (read))))",
    );
    assert!(type_named(&db, "a_t").is_none());
    assert!(type_named(&db, "b_t").is_none());
    assert!(db.arena().find_nodes(|s| s.flavor() == Flavor::Allow).is_empty());
}

#[test]
fn optional_inside_macro_is_disabled_per_call() {
    let db = resolve(
        "(type present_t) \
         (macro m ((type t)) (optional o (allow t maybe_t (file (read))))) \
         (block b1 (type maybe_t) (call m (present_t))) \
         (block b2 (call m (present_t)))",
    );
    assert_eq!(expanded(&db, Flavor::Allow).len(), 1);
    assert!(db.diagnostics().iter().any(|d| d.message == "disabling optional 'o'"));
}
