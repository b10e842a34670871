//! Declared entities and the state resolution derives for them.

use cil_ast::nodes::{ClassPerms, ContextRef, DatumId, Expr, Flavor, LevelRangeRef, LevelRef, NodeId};

use rustc_hash::FxHashSet;

use crate::symtab::{ScopeKey, SymIndex};

/// How a type attribute is referenced by rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsedFlags {
    pub avrule: bool,
    pub neverallow: bool,
    pub constraint: bool,
    pub expand_true: bool,
    pub expand_false: bool,
}

/// Facts attached to a datum by the resolvers.
///
/// Contributions made by statements carry the id of the contributing node so
/// they can be dropped together with it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatumState {
    /// Aliases: the datum the alias stands for.
    pub actual: Option<DatumId>,
    /// Types, roles and users: the parent of a bounds statement.
    pub bounds: Option<DatumId>,
    /// Kernel classes: the associated common.
    pub common: Option<DatumId>,
    /// Placed in its order statement's merged list.
    pub ordered: bool,
    /// Categories: position in the merged category order.
    pub value: Option<u32>,
    /// Sids: the context given by `sidcontext`.
    pub context: Option<ContextRef>,
    /// Attributes: expressions contributed by attribute set statements.
    pub attr_exprs: Vec<(NodeId, Expr)>,
    pub used: UsedFlags,
    /// Sensitivities: categories associated by `sensitivitycategory`.
    pub sens_cats: Vec<(NodeId, Expr)>,
    pub user_level: Option<LevelRef>,
    pub user_range: Option<LevelRangeRef>,
    /// Blocks: `blockinherit` nodes that inherit this block.
    pub inheritors: Vec<NodeId>,
    pub is_abstract: bool,
    /// Class permission sets and map permissions: what they stand for.
    pub classperms: Vec<(NodeId, ClassPerms)>,
}

impl DatumState {
    /// Drops everything a re-resolve recomputes.
    ///
    /// Inheritance links and abstract marks are set by passes that are not
    /// re-run and therefore survive.
    pub(crate) fn reset(&mut self) {
        *self = DatumState {
            inheritors: std::mem::take(&mut self.inheritors),
            is_abstract: self.is_abstract,
            ..DatumState::default()
        };
    }

    /// Forgets contributions made by any of `nodes`.
    pub(crate) fn forget_nodes(&mut self, nodes: &FxHashSet<NodeId>) {
        self.attr_exprs.retain(|(n, _)| !nodes.contains(n));
        self.sens_cats.retain(|(n, _)| !nodes.contains(n));
        self.classperms.retain(|(n, _)| !nodes.contains(n));
        self.inheritors.retain(|n| !nodes.contains(n));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datum {
    pub name: String,
    pub flavor: Flavor,
    /// Declaring nodes; the first one owns the datum.
    pub nodes: Vec<NodeId>,
    /// Table slot holding this datum, if it is named.
    pub(crate) scope: Option<(ScopeKey, SymIndex)>,
    pub state: DatumState,
}

impl Datum {
    pub(crate) fn new(name: impl Into<String>, flavor: Flavor) -> Self {
        Self {
            name: name.into(),
            flavor,
            nodes: Vec::new(),
            scope: None,
            state: DatumState::default(),
        }
    }

    #[must_use]
    pub fn first_node(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Anonymous values built from call arguments carry no name.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_inheritance_facts() {
        let mut state = DatumState {
            actual: Some(DatumId(3)),
            ordered: true,
            inheritors: vec![7, 9],
            is_abstract: true,
            used: UsedFlags {
                avrule: true,
                ..UsedFlags::default()
            },
            ..DatumState::default()
        };
        state.reset();
        assert_eq!(state.actual, None);
        assert!(!state.ordered);
        assert!(!state.used.avrule);
        assert_eq!(state.inheritors, vec![7, 9]);
        assert!(state.is_abstract);
    }

    #[test]
    fn forget_nodes_drops_only_their_contributions() {
        let expr = Expr::from_names(cil_ast::nodes::ExprFlavor::Type, ["a"]);
        let mut state = DatumState {
            attr_exprs: vec![(4, expr.clone()), (5, expr)],
            inheritors: vec![4, 6, 8],
            ..DatumState::default()
        };
        state.forget_nodes(&[4, 8].into_iter().collect());
        assert_eq!(state.attr_exprs.len(), 1);
        assert_eq!(state.attr_exprs[0].0, 5);
        assert_eq!(state.inheritors, vec![6]);
    }
}
