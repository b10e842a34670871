use rustc_hash::FxHashMap;

use crate::nodes::{Flavor, Location, Node, NodeId, Statement};

/// Id of the root node of every arena.
pub const ROOT_ID: NodeId = 1;

/// Parent link and ordered children of a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRoute {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Owner of every statement node and of the tree shape.
///
/// Nodes are addressed by `u32` ids that are never reused. A node without a
/// parent other than the root is "detached": it is reachable by id but not by
/// walking the tree.
#[derive(Clone, Debug)]
pub struct Arena {
    pub(crate) nodes: FxHashMap<NodeId, Node>,
    pub(crate) node_routes: FxHashMap<NodeId, NodeRoute>,
    next_id: NodeId,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    #[must_use]
    pub fn new() -> Self {
        let mut arena = Self {
            nodes: FxHashMap::default(),
            node_routes: FxHashMap::default(),
            next_id: ROOT_ID,
        };
        let root = arena.allocate(Location::default(), Statement::Root);
        debug_assert_eq!(root, ROOT_ID);
        arena
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        ROOT_ID
    }

    fn allocate(&mut self, location: Location, statement: Statement) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                location,
                statement,
            },
        );
        self.node_routes.insert(id, NodeRoute::default());
        id
    }

    /// Appends a new node as the last child of `parent_id`.
    pub fn add_node(
        &mut self,
        parent_id: NodeId,
        location: Location,
        statement: Statement,
    ) -> NodeId {
        debug_assert!(
            self.nodes.contains_key(&parent_id),
            "Parent node {parent_id} does not exist in the arena"
        );
        let id = self.allocate(location, statement);
        if let Some(route) = self.node_routes.get_mut(&id) {
            route.parent = Some(parent_id);
        }
        self.node_routes
            .entry(parent_id)
            .or_default()
            .children
            .push(id);
        id
    }

    /// Adds a node that belongs to no parent.
    pub fn add_detached(&mut self, location: Location, statement: Statement) -> NodeId {
        self.allocate(location, statement)
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn statement(&self, id: NodeId) -> Option<&Statement> {
        self.nodes.get(&id).map(|n| &n.statement)
    }

    pub fn statement_mut(&mut self, id: NodeId) -> Option<&mut Statement> {
        self.nodes.get_mut(&id).map(|n| &mut n.statement)
    }

    /// Replaces the payload of `id`. Returns `false` if the node is gone.
    pub fn set_statement(&mut self, id: NodeId, statement: Statement) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.statement = statement;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn flavor(&self, id: NodeId) -> Option<Flavor> {
        self.statement(id).map(Statement::flavor)
    }

    #[must_use]
    pub fn location(&self, id: NodeId) -> Location {
        self.nodes
            .get(&id)
            .map(|n| n.location.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_routes.get(&id).and_then(|r| r.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node_routes
            .get(&id)
            .map_or(&[][..], |r| r.children.as_slice())
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// All nodes below `id` in pre-order, `id` excluded.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    /// Collects the ids of all attached nodes matching `comparator`, in pre-order.
    pub fn find_nodes<F>(&self, comparator: F) -> Vec<NodeId>
    where
        F: Fn(&Statement) -> bool,
    {
        std::iter::once(ROOT_ID)
            .chain(self.descendants(ROOT_ID))
            .filter(|id| self.statement(*id).is_some_and(&comparator))
            .collect()
    }

    /// Removes every node below `id`, keeping `id` itself.
    ///
    /// Returns the removed nodes in pre-order.
    pub fn remove_children(&mut self, id: NodeId) -> Vec<Node> {
        let doomed = self.descendants(id);
        if let Some(route) = self.node_routes.get_mut(&id) {
            route.children.clear();
        }
        doomed
            .into_iter()
            .filter_map(|n| {
                self.node_routes.remove(&n);
                self.nodes.remove(&n)
            })
            .collect()
    }

    /// Removes `id` and its subtree, unlinking it from its parent.
    ///
    /// Returns the removed nodes in pre-order, `id` first.
    pub fn remove_node(&mut self, id: NodeId) -> Vec<Node> {
        if let Some(parent) = self.parent(id)
            && let Some(route) = self.node_routes.get_mut(&parent)
        {
            route.children.retain(|c| *c != id);
        }
        let mut removed = Vec::new();
        let subtree = self.remove_children(id);
        self.node_routes.remove(&id);
        if let Some(node) = self.nodes.remove(&id) {
            removed.push(node);
        }
        removed.extend(subtree);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Declaration;

    fn type_decl(name: &str) -> Statement {
        Statement::Declaration(Declaration {
            flavor: Flavor::Type,
            name: name.to_string(),
        })
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut arena = Arena::new();
        let block = arena.add_node(ROOT_ID, Location::default(), Statement::Block("b".into()));
        let a = arena.add_node(block, Location::default(), type_decl("a"));
        let c = arena.add_node(block, Location::default(), type_decl("c"));
        assert_eq!(arena.children(block), &[a, c]);
        assert_eq!(arena.parent(a), Some(block));
        assert_eq!(arena.ancestors(a).collect::<Vec<_>>(), vec![block, ROOT_ID]);
        assert!(arena.is_within(c, block));
    }

    #[test]
    fn remove_children_keeps_the_parent() {
        let mut arena = Arena::new();
        let opt = arena.add_node(ROOT_ID, Location::default(), Statement::Optional("o".into()));
        let t = arena.add_node(opt, Location::default(), type_decl("t"));
        let removed = arena.remove_children(opt);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, t);
        assert!(arena.contains(opt));
        assert!(!arena.contains(t));
        assert!(arena.children(opt).is_empty());
    }

    #[test]
    fn detached_nodes_are_not_walked() {
        let mut arena = Arena::new();
        let detached = arena.add_detached(Location::default(), type_decl("x"));
        assert!(arena.contains(detached));
        assert_eq!(arena.parent(detached), None);
        assert!(!arena.descendants(ROOT_ID).contains(&detached));
        assert!(arena.find_nodes(|s| s.flavor() == Flavor::Type).is_empty());
    }

    #[test]
    fn remove_node_unlinks_from_parent() {
        let mut arena = Arena::new();
        let block = arena.add_node(ROOT_ID, Location::default(), Statement::Block("b".into()));
        let inner = arena.add_node(block, Location::default(), type_decl("t"));
        let removed = arena.remove_node(block);
        assert_eq!(removed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![block, inner]);
        assert!(arena.children(ROOT_ID).is_empty());
    }
}
