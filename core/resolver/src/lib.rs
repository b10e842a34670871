#![warn(clippy::pedantic)]
//! Semantic resolution for CIL policies.
//!
//! Takes the statement [`Arena`] built by `cil-ast` and turns every name in
//! it into a handle on the datum it denotes:
//!
//! - declarations are entered into per-scope symbol tables
//! - `tunableif`s are evaluated, `in` statements spliced, blocks inherited and
//!   macro calls expanded
//! - aliases are collapsed onto their actuals
//! - class, SID, category and sensitivity orders are merged into total orders
//! - every remaining statement is bound and checked
//!
//! A name that cannot be found inside an `optional` disables the optional
//! rather than failing resolution.
//!
//! ## Quick Start
//!
//! ```
//! use cil_ast::builder::Builder;
//! use cil_resolver::ResolverBuilder;
//! use cil_resolver::options::ResolverOptions;
//!
//! let mut builder = Builder::new();
//! builder.add_source_code("policy.cil", "(sid kernel) (sidorder (kernel))");
//! let arena = builder.build_ast().unwrap();
//!
//! let db = ResolverBuilder::build_resolved_db(arena, ResolverOptions::default())
//!     .unwrap()
//!     .db();
//! assert_eq!(db.names(&db.orders().sids), ["kernel"]);
//! ```

use cil_ast::arena::Arena;

use crate::db::PolicyDb;
use crate::options::ResolverOptions;

mod alias;
mod copy_ast;
pub mod datum;
pub mod db;
mod declare;
pub mod diagnostics;
mod driver;
pub mod errors;
mod inheritance;
mod name_resolver;
pub mod options;
mod ordered;
mod reset;
mod resolvers;
pub mod symtab;

/// Marker state: nothing resolved yet.
pub struct ResolverInitState;

/// Marker state: resolution finished and the database is ready.
pub struct ResolverCompleteState {
    db: PolicyDb,
}

pub type CompletedResolverBuilder = ResolverBuilder<ResolverCompleteState>;

/// Runs resolution over an arena.
///
/// The typestate guarantees the database is only handed out once resolution
/// succeeded.
pub struct ResolverBuilder<S> {
    state: S,
}

impl Default for ResolverBuilder<ResolverInitState> {
    fn default() -> Self {
        ResolverBuilder::new()
    }
}

impl ResolverBuilder<ResolverInitState> {
    #[must_use]
    pub fn new() -> Self {
        ResolverBuilder {
            state: ResolverInitState,
        }
    }

    /// Resolve every statement in `arena`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`errors::ResolveError`], which can be
    /// recovered with `downcast_ref`.
    #[must_use = "returns builder with the resolved database, extract with .db()"]
    pub fn build_resolved_db(arena: Arena, options: ResolverOptions) -> anyhow::Result<CompletedResolverBuilder> {
        let mut db = PolicyDb::new(arena, options);
        driver::resolve_ast(&mut db)?;
        Ok(ResolverBuilder {
            state: ResolverCompleteState { db },
        })
    }
}

impl ResolverBuilder<ResolverCompleteState> {
    /// Consume the builder and return the resolved database.
    #[must_use = "consumes builder and returns the resolved database"]
    pub fn db(self) -> PolicyDb {
        self.state.db
    }
}
