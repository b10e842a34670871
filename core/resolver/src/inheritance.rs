//! Guard run once every `blockinherit` is linked to its block.
//!
//! Walks the tree as it would look after copying, following each
//! `blockinherit` into the inherited block. A block reached again while it is
//! still being expanded is an inheritance loop; a walk that visits far more
//! `blockinherit` statements than the policy contains is degenerate.

use cil_ast::nodes::{NodeId, Statement};

use crate::datum::Datum;
use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};

const MIN_VISIT_LIMIT: usize = 1024;

struct Guard {
    limit: usize,
    visited: usize,
    stack: Vec<NodeId>,
}

/// Fails on inheritance loops and on exponential inheritance fan-out.
pub(crate) fn check_inheritance(db: &PolicyDb) -> ResolveResult<()> {
    let count = db
        .arena
        .find_nodes(|s| matches!(s, Statement::BlockInherit(_)))
        .len();
    let mut guard = Guard {
        limit: (count * 10).max(MIN_VISIT_LIMIT),
        visited: 0,
        stack: Vec::new(),
    };
    guard.visit(db, db.arena.root())
}

impl Guard {
    fn visit(&mut self, db: &PolicyDb, node: NodeId) -> ResolveResult<()> {
        for &child in db.arena.children(node) {
            if let Some(Statement::BlockInherit(target)) = db.arena.statement(child) {
                self.visited += 1;
                if self.visited > self.limit {
                    return Err(ResolveError::DegenerateInheritance {
                        location: db.arena.location(child),
                    });
                }
                if let Some(block) = target.datum.and_then(|b| db.datum(b)).and_then(Datum::first_node) {
                    if self.stack.contains(&block) {
                        let mut chain: Vec<String> = self.stack.iter().map(|n| block_name(db, *n)).collect();
                        chain.push(block_name(db, block));
                        return Err(ResolveError::CycleDetected {
                            kind: "block inheritance",
                            chain,
                            location: db.arena.location(child),
                        });
                    }
                    self.stack.push(block);
                    self.visit(db, block)?;
                    self.stack.pop();
                }
            }
            self.visit(db, child)?;
        }
        Ok(())
    }
}

fn block_name(db: &PolicyDb, node: NodeId) -> String {
    db.decl_of(node)
        .map_or_else(String::new, |b| db.qualified_name(b))
}
