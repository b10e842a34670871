use cil::{ResolveError, ResolverOptions, compile};
use cil_ast::nodes::{Flavor, NodeId, Statement};
use cil_resolver::db::PolicyDb;
use cil_resolver::symtab::{ScopeKey, SymIndex};

/// Declarations every complete policy needs.
pub(crate) const PRELUDE: &str = "(sid kernel) (sidorder (kernel)) \
                                  (class file (read write getattr)) (classorder (file)) ";

pub(crate) fn try_resolve_with(source: &str, options: ResolverOptions) -> anyhow::Result<PolicyDb> {
    let text = format!("{PRELUDE}{source}");
    compile(&[("test.cil", text.as_str())], options)
}

pub(crate) fn try_resolve(source: &str) -> anyhow::Result<PolicyDb> {
    try_resolve_with(source, ResolverOptions::default())
}

pub(crate) fn resolve(source: &str) -> PolicyDb {
    try_resolve(source).unwrap_or_else(|e| panic!("resolution failed: {e:#}"))
}

pub(crate) fn resolve_error(source: &str) -> ResolveError {
    match try_resolve(source) {
        Ok(_) => panic!("resolution should fail for: {source}"),
        Err(e) => e
            .downcast::<ResolveError>()
            .unwrap_or_else(|e| panic!("expected a resolution error, got: {e:#}")),
    }
}

pub(crate) fn type_named(db: &PolicyDb, path: &str) -> Option<cil_ast::nodes::DatumId> {
    db.lookup_path(path, SymIndex::Types)
}

pub(crate) fn root_lookup(db: &PolicyDb, sym: SymIndex, name: &str) -> Option<cil_ast::nodes::DatumId> {
    db.lookup(ScopeKey::Root, sym, name)
}

/// Nodes of `flavor` that sit inside an expanded call.
pub(crate) fn expanded(db: &PolicyDb, flavor: Flavor) -> Vec<NodeId> {
    let arena = db.arena();
    arena
        .find_nodes(|s| s.flavor() == flavor)
        .into_iter()
        .filter(|n| arena.ancestors(*n).any(|a| matches!(arena.statement(a), Some(Statement::Call(_)))))
        .collect()
}
