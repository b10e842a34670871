//! Undo of everything resolved after macro expansion.
//!
//! When disabling an optional removes declarations, bindings made earlier may
//! point at datums that are gone, and derived facts may include their
//! contributions. Resolution then restarts right after macro expansion, so
//! only what those later passes compute is dropped here.

use cil_ast::nodes::{ArgValue, Statement};

use crate::db::{Orders, PolicyDb};

pub(crate) fn reset_ast(db: &mut PolicyDb) {
    let root = db.arena.root();
    let mut anonymous = Vec::new();
    for node in db.arena.descendants(root) {
        let Some(statement) = db.arena.statement_mut(node) else {
            continue;
        };
        match statement {
            // linked by passes that do not run again
            Statement::BlockInherit(_)
            | Statement::BlockAbstract(_)
            | Statement::In(_)
            | Statement::TunableIf(_) => {}
            Statement::Call(call) => {
                for arg in &mut call.bindings {
                    match &mut arg.value {
                        ArgValue::Named(n) => n.datum = None,
                        ArgValue::Anonymous(anon) => anonymous.push(*anon),
                    }
                }
            }
            other => other.clear_bindings(),
        }
    }

    for anon in anonymous {
        if let Some(node) = db.anonymous_node(anon)
            && let Some(statement) = db.arena.statement_mut(node)
        {
            statement.clear_bindings();
        }
    }
    for datum in db.datums.iter_mut().flatten() {
        datum.state.reset();
    }
    db.orders = Orders::default();
    tracing::debug!("resolution state reset");
}
