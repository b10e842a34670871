//! The policy database: the statement arena plus everything resolution
//! derives from it.

use cil_ast::arena::Arena;
use cil_ast::nodes::{ArgValue, DatumId, Flavor, Location, NodeId, Statement};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::datum::Datum;
use crate::diagnostics::{Diagnostics, Severity};
use crate::errors::{ResolveError, ResolveResult};
use crate::options::ResolverOptions;
use crate::symtab::{ScopeKey, SymIndex, Symtabs, param_decl_flavor};

/// Merged declaration orders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Orders {
    pub classes: Vec<DatumId>,
    pub sids: Vec<DatumId>,
    pub categories: Vec<DatumId>,
    pub sensitivities: Vec<DatumId>,
}

#[derive(Debug)]
pub struct PolicyDb {
    pub(crate) arena: Arena,
    pub(crate) datums: Vec<Option<Datum>>,
    pub(crate) symtabs: Symtabs,
    pub(crate) decls: FxHashMap<NodeId, DatumId>,
    pub(crate) options: ResolverOptions,
    pub(crate) self_type: DatumId,
    pub(crate) orders: Orders,
    pub(crate) diagnostics: Diagnostics,
}

impl PolicyDb {
    pub(crate) fn new(arena: Arena, options: ResolverOptions) -> Self {
        let mut db = Self {
            arena,
            datums: Vec::new(),
            symtabs: Symtabs::default(),
            decls: FxHashMap::default(),
            options,
            self_type: DatumId(0),
            orders: Orders::default(),
            diagnostics: Diagnostics::default(),
        };
        db.self_type = db.alloc(Datum::new("self", Flavor::Type));
        db
    }

    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[must_use]
    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    #[must_use]
    pub fn datum(&self, id: DatumId) -> Option<&Datum> {
        self.datums.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub(crate) fn datum_mut(&mut self, id: DatumId) -> Option<&mut Datum> {
        self.datums.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Every live datum with its handle.
    pub fn datums(&self) -> impl Iterator<Item = (DatumId, &Datum)> {
        self.datums
            .iter()
            .enumerate()
            .filter_map(|(idx, d)| d.as_ref().map(|d| (DatumId(idx as u32), d)))
    }

    /// Datum declared by `node`, if any.
    #[must_use]
    pub fn decl_of(&self, node: NodeId) -> Option<DatumId> {
        self.decls.get(&node).copied()
    }

    #[must_use]
    pub fn flavor_of(&self, id: DatumId) -> Option<Flavor> {
        self.datum(id).map(|d| d.flavor)
    }

    #[must_use]
    pub fn name_of(&self, id: DatumId) -> &str {
        self.datum(id).map_or("", |d| d.name.as_str())
    }

    #[must_use]
    pub fn self_type(&self) -> DatumId {
        self.self_type
    }

    #[must_use]
    pub fn orders(&self) -> &Orders {
        &self.orders
    }

    /// Plain names of a list of datums.
    #[must_use]
    pub fn names(&self, ids: &[DatumId]) -> Vec<String> {
        ids.iter().map(|id| self.name_of(*id).to_string()).collect()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn report(&mut self, severity: Severity, location: Option<&Location>, message: impl Into<String>) {
        self.diagnostics.report(severity, location, message);
    }

    #[must_use]
    pub fn lookup(&self, scope: ScopeKey, sym: SymIndex, name: &str) -> Option<DatumId> {
        self.symtabs.get(scope, sym, name)
    }

    /// Looks up a block path such as `a.b.t` starting at the root.
    #[must_use]
    pub fn lookup_path(&self, path: &str, sym: SymIndex) -> Option<DatumId> {
        let mut segments: Vec<&str> = path.trim_start_matches('.').split('.').collect();
        let last = segments.pop()?;
        let mut scope = ScopeKey::Root;
        for segment in segments {
            scope = ScopeKey::Datum(self.symtabs.get(scope, SymIndex::Blocks, segment)?);
        }
        self.symtabs.get(scope, sym, last)
    }

    /// Name of a datum prefixed by the blocks enclosing its declaration.
    #[must_use]
    pub fn qualified_name(&self, id: DatumId) -> String {
        let Some(datum) = self.datum(id) else {
            return String::new();
        };
        let Some(node) = datum.first_node() else {
            return datum.name.clone();
        };
        let mut parts: Vec<&str> = self
            .arena
            .ancestors(node)
            .filter_map(|a| match self.arena.statement(a) {
                Some(Statement::Block(name)) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        parts.reverse();
        parts.push(&datum.name);
        parts.join(".")
    }

    /// Location of the node owning a datum.
    #[must_use]
    pub fn datum_location(&self, id: DatumId) -> Location {
        self.datum(id)
            .and_then(Datum::first_node)
            .map(|n| self.arena.location(n))
            .unwrap_or_default()
    }

    /// Kind of the node owning a datum; built-ins report their own kind.
    #[must_use]
    pub fn node_flavor_of(&self, id: DatumId) -> Option<Flavor> {
        let datum = self.datum(id)?;
        match datum.first_node() {
            Some(node) => self.arena.flavor(node),
            None => Some(datum.flavor),
        }
    }

    pub(crate) fn alloc(&mut self, datum: Datum) -> DatumId {
        let id = DatumId(self.datums.len() as u32);
        self.datums.push(Some(datum));
        id
    }

    /// Scope that declarations placed under `parent` belong to.
    #[must_use]
    pub(crate) fn scope_for(&self, parent: NodeId) -> ScopeKey {
        let mut current = parent;
        loop {
            match self.arena.statement(current) {
                None | Some(Statement::Root) => return ScopeKey::Root,
                Some(Statement::Block(_) | Statement::Macro(_)) => {
                    return self
                        .decl_of(current)
                        .map_or(ScopeKey::Node(current), ScopeKey::Datum);
                }
                Some(Statement::In(_)) => return ScopeKey::Node(current),
                Some(Statement::CondBlock(_)) => {
                    let Some(owner) = self.arena.parent(current) else {
                        return ScopeKey::Root;
                    };
                    match self.arena.statement(owner) {
                        Some(Statement::TunableIf(_)) => return ScopeKey::Node(current),
                        _ => current = owner,
                    }
                }
                Some(_) => match self.arena.parent(current) {
                    Some(p) => current = p,
                    None => return ScopeKey::Root,
                },
            }
        }
    }

    fn allow_multiple_decls(&self, new: Flavor, old: Flavor) -> bool {
        if new != old {
            return false;
        }
        match new {
            Flavor::Type | Flavor::TypeAttribute => self.options.multiple_decls,
            Flavor::Optional => true,
            _ => false,
        }
    }

    /// Enters the declaration made by `node` into its scope.
    ///
    /// A permitted redeclaration attaches `node` to the existing datum.
    pub(crate) fn add_decl(&mut self, node: NodeId) -> ResolveResult<DatumId> {
        let location = self.arena.location(node);
        let Some(statement) = self.arena.statement(node) else {
            return Err(ResolveError::invalid("declaration node is missing", &location));
        };
        let flavor = statement.flavor();
        let Some(name) = statement.declared_name().map(str::to_string) else {
            return Err(ResolveError::invalid(format!("{flavor} does not declare a name"), &location));
        };
        let Some(sym) = SymIndex::for_flavor(flavor) else {
            return Err(ResolveError::invalid(format!("{flavor} has no symbol table"), &location));
        };
        let Some(parent) = self.arena.parent(node) else {
            return Err(ResolveError::invalid(format!("{flavor} {name} is detached"), &location));
        };
        let scope = if matches!(flavor, Flavor::Perm | Flavor::MapPerm) {
            match self.decl_of(parent) {
                Some(class) => ScopeKey::Datum(class),
                None => ScopeKey::Node(parent),
            }
        } else {
            check_macro_params(self, parent, flavor, &name, &location)?;
            self.scope_for(parent)
        };

        if let Some(existing) = self.symtabs.get(scope, sym, &name) {
            let previous_flavor = self.flavor_of(existing).unwrap_or(flavor);
            if !self.allow_multiple_decls(flavor, previous_flavor) {
                return Err(ResolveError::Conflict {
                    reason: format!("re-declaration of {flavor} `{name}`"),
                    location,
                    previous: self.datum_location(existing),
                });
            }
            self.attach(existing, node);
            return Ok(existing);
        }

        let mut datum = Datum::new(name.clone(), flavor);
        datum.nodes.push(node);
        datum.scope = Some((scope, sym));
        let id = self.alloc(datum);
        self.symtabs.insert(scope, sym, &name, id);
        self.decls.insert(node, id);
        Ok(id)
    }

    /// Records `node` as a further declaration of `datum`.
    pub(crate) fn attach(&mut self, datum: DatumId, node: NodeId) {
        if let Some(d) = self.datum_mut(datum) {
            d.nodes.push(node);
        }
        self.decls.insert(node, datum);
    }

    /// Detaches `node` from its datum. Returns the datum when that left it
    /// without declaring nodes and it was freed.
    pub(crate) fn undeclare(&mut self, node: NodeId) -> Option<DatumId> {
        let id = self.decls.remove(&node)?;
        let datum = self.datum_mut(id)?;
        datum.nodes.retain(|n| *n != node);
        if !datum.nodes.is_empty() {
            return None;
        }
        self.free_datum(id);
        Some(id)
    }

    /// Removes a datum and its table entry. Tables the datum owns are left to
    /// the caller.
    fn free_datum(&mut self, id: DatumId) {
        let Some(datum) = self.datums.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        if let Some((scope, sym)) = datum.scope
            && self.symtabs.get(scope, sym, &datum.name) == Some(id)
        {
            self.symtabs.remove(scope, sym, &datum.name);
        }
    }

    /// Destroys every node below `node`.
    ///
    /// Returns `true` if a declaration was among the destroyed nodes.
    pub(crate) fn destroy_children(&mut self, node: NodeId) -> bool {
        let removed = self.arena.remove_children(node);
        let mut had_decl = false;
        let mut gone = FxHashSet::default();
        let mut dead_scopes = FxHashSet::default();
        for dead in &removed {
            if let Statement::Call(call) = &dead.statement {
                for arg in &call.bindings {
                    if let ArgValue::Anonymous(anon) = arg.value {
                        self.free_anonymous(anon);
                    }
                }
            }
            had_decl |= dead.statement.is_declaration();
            if let Some(freed) = self.undeclare(dead.id) {
                dead_scopes.insert(ScopeKey::Datum(freed));
            }
            dead_scopes.insert(ScopeKey::Node(dead.id));
            gone.insert(dead.id);
        }
        self.symtabs.drop_scopes(&dead_scopes);
        if !gone.is_empty() {
            for datum in self.datums.iter_mut().flatten() {
                datum.state.forget_nodes(&gone);
            }
        }
        had_decl
    }

    /// Materializes an inline call argument as a detached node with its own datum.
    pub(crate) fn alloc_anonymous(&mut self, location: Location, statement: Statement) -> DatumId {
        let flavor = statement.flavor();
        let node = self.arena.add_detached(location, statement);
        let mut datum = Datum::new(String::new(), flavor);
        datum.nodes.push(node);
        let id = self.alloc(datum);
        self.decls.insert(node, id);
        id
    }

    pub(crate) fn free_anonymous(&mut self, id: DatumId) {
        let Some(node) = self.datum(id).and_then(Datum::first_node) else {
            return;
        };
        self.decls.remove(&node);
        self.arena.remove_node(node);
        if let Some(slot) = self.datums.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    /// Node holding the payload of an anonymous datum.
    #[must_use]
    pub(crate) fn anonymous_node(&self, id: DatumId) -> Option<NodeId> {
        self.datum(id)
            .filter(|d| d.is_anonymous())
            .and_then(Datum::first_node)
    }

    /// File-name datum for a typetransition name, created on first use.
    pub(crate) fn insert_name(&mut self, name: &str) -> DatumId {
        if let Some(existing) = self.symtabs.get(ScopeKey::Root, SymIndex::Names, name) {
            return existing;
        }
        let mut datum = Datum::new(name, Flavor::Name);
        datum.scope = Some((ScopeKey::Root, SymIndex::Names));
        let id = self.alloc(datum);
        self.symtabs.insert(ScopeKey::Root, SymIndex::Names, name, id);
        id
    }
}

/// Declarations inside a macro may not reuse the name of a parameter of the
/// same kind.
fn check_macro_params(
    db: &PolicyDb,
    parent: NodeId,
    flavor: Flavor,
    name: &str,
    location: &Location,
) -> ResolveResult<()> {
    let namespace = std::iter::once(parent)
        .chain(db.arena.ancestors(parent))
        .find(|n| {
            matches!(
                db.arena.statement(*n),
                Some(Statement::Macro(_) | Statement::Block(_) | Statement::Root)
            )
        });
    let Some(namespace) = namespace else {
        return Ok(());
    };
    if let Some(Statement::Macro(m)) = db.arena.statement(namespace)
        && m
            .params
            .iter()
            .any(|p| param_decl_flavor(p.flavor) == flavor && p.name == name)
    {
        return Err(ResolveError::Conflict {
            reason: format!("{flavor} `{name}` shadows a macro parameter"),
            location: location.clone(),
            previous: db.arena.location(namespace),
        });
    }
    Ok(())
}
