#![warn(clippy::pedantic)]
//! Core orchestration crate for the CIL toolchain.
//!
//! Ties the reader and builder of [`cil_ast`] to the resolver of
//! [`cil_resolver`]:
//!
//! ```text
//! .cil sources → parse → Arena → resolve → PolicyDb
//! ```
//!
//! Several source files make up one policy: they are read in order and their
//! statements are appended under a single root.
//!
//! ## Quick Start
//!
//! ```rust
//! use cil::{compile, ResolverOptions};
//!
//! let source = "(sid kernel) (sidorder (kernel))";
//! let db = compile(&[("policy.cil", source)], ResolverOptions::default())?;
//! assert_eq!(db.names(&db.orders().sids), ["kernel"]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Every function returns `anyhow::Result`. Reader and builder problems are
//! collected and reported together; resolution stops at the first fatal
//! [`ResolveError`], which stays reachable through `downcast_ref`.

use cil_ast::{arena::Arena, builder::Builder};
use cil_resolver::ResolverBuilder;
use cil_resolver::db::PolicyDb;

pub use cil_resolver::errors::ResolveError;
pub use cil_resolver::options::ResolverOptions;

/// Reads every `(name, text)` source and builds one statement arena.
///
/// # Errors
///
/// Returns an error listing every syntax and statement-shape problem found in
/// any of the sources.
pub fn parse(sources: &[(&str, &str)], options: ResolverOptions) -> anyhow::Result<Arena> {
    let mut builder = Builder::new().with_qualified_names(options.qualified_names);
    for (name, text) in sources {
        tracing::debug!(source = name, bytes = text.len(), "reading");
        builder.add_source_code(name, text);
    }
    builder.build_ast()
}

/// Resolves every name in `arena`.
///
/// # Errors
///
/// Returns the first fatal [`ResolveError`]: a name that cannot be found
/// outside an `optional`, a conflicting declaration, a cycle, an order that
/// cannot be merged or a statement in a place it is not allowed.
pub fn resolve(arena: Arena, options: ResolverOptions) -> anyhow::Result<PolicyDb> {
    Ok(ResolverBuilder::build_resolved_db(arena, options)?.db())
}

/// Parses and resolves a policy made of `sources`.
///
/// # Errors
///
/// Returns the error of whichever of [`parse`] or [`resolve`] failed.
pub fn compile(sources: &[(&str, &str)], options: ResolverOptions) -> anyhow::Result<PolicyDb> {
    let arena = parse(sources, options)?;
    resolve(arena, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_form_one_policy() {
        let db = compile(
            &[
                ("a.cil", "(sid kernel) (class file (read))"),
                ("b.cil", "(sidorder (kernel)) (classorder (file))"),
            ],
            ResolverOptions::default(),
        )
        .unwrap();
        assert_eq!(db.names(&db.orders().classes), ["file"]);
    }

    #[test]
    fn resolve_error_is_downcastable() {
        let err = compile(&[("a.cil", "(sid kernel) (sidorder (kernel)) (typepermissive nope)")], ResolverOptions::default())
            .unwrap_err();
        let resolve_error = err.downcast_ref::<ResolveError>().unwrap();
        assert_eq!(resolve_error.location().start_line, 1);
    }

    #[test]
    fn syntax_errors_name_the_source() {
        let err = parse(&[("broken.cil", "(type t")], ResolverOptions::default()).unwrap_err();
        assert!(err.to_string().contains("broken.cil"), "{err}");
    }
}
