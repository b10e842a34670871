//! Per-statement resolvers.
//!
//! Each resolver clones the payload of its node, binds the clone and writes it
//! back once every name is bound.

use cil_ast::nodes::{NodeId, Statement};

use crate::db::PolicyDb;
use crate::errors::ResolveResult;

pub(crate) mod blocks;
pub(crate) mod calls;
pub(crate) mod classes;
pub(crate) mod contexts;
pub(crate) mod expr;
pub(crate) mod mls;
pub(crate) mod orders;
pub(crate) mod rules;
pub(crate) mod tunables;

/// Statements resolved by the last pass.
pub(crate) fn resolve_misc(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(statement) = db.arena.statement(node) else {
        return Ok(());
    };
    match statement {
        Statement::ClassPermissionSet(_) => classes::resolve_classpermissionset(db, node),
        Statement::ClassMapping(_) => classes::resolve_classmapping(db, node),
        Statement::PermissionX(_) | Statement::Default(_) | Statement::DefaultRange(_) => {
            classes::resolve_class_statement(db, node)
        }
        Statement::Level(_) | Statement::LevelRange(_) => mls::resolve_level_decl(db, node),
        Statement::Context(_)
        | Statement::SidContext(_)
        | Statement::FileCon(_)
        | Statement::PortCon(_)
        | Statement::NodeCon(_)
        | Statement::GenfsCon(_)
        | Statement::NetifCon(_)
        | Statement::FsUse(_)
        | Statement::DeviceCon(_) => contexts::resolve_context_statement(db, node),
        Statement::AvRule(_)
        | Statement::TypeRule(_)
        | Statement::NameTypeTransition(_)
        | Statement::RangeTransition(_)
        | Statement::TypePermissive(_)
        | Statement::AttributeSet(_)
        | Statement::ExpandTypeAttribute(_)
        | Statement::Bounds(_)
        | Statement::RoleType(_)
        | Statement::RoleAllow(_)
        | Statement::RoleTransition(_)
        | Statement::UserRole(_)
        | Statement::UserLevel(_)
        | Statement::UserRange(_)
        | Statement::UserPrefix(_)
        | Statement::SelinuxUser(_)
        | Statement::Constrain(_)
        | Statement::ValidateTrans(_) => rules::resolve_rule(db, node),
        _ => Ok(()),
    }
}
