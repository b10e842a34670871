//! Symbol tables
//!
//! A scope owns one table per [`SymIndex`]. Scopes are keyed by what owns
//! them: the root, a block or macro datum (shared by every node of that
//! datum), or a node for the short-lived tables of `in` statements and
//! `tunableif` branches. Class permissions live in a table keyed by the class
//! datum.

use cil_ast::nodes::{DatumId, Flavor, NodeId, ParamFlavor};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymIndex {
    Blocks,
    Users,
    Roles,
    Types,
    Commons,
    Classes,
    ClassPermSets,
    Bools,
    Tunables,
    Sens,
    Cats,
    Sids,
    Contexts,
    Levels,
    LevelRanges,
    PolicyCaps,
    IpAddrs,
    Names,
    PermXs,
    Perms,
}

impl SymIndex {
    /// Table a declaration of `flavor` goes into.
    #[must_use]
    pub fn for_flavor(flavor: Flavor) -> Option<SymIndex> {
        Some(match flavor {
            Flavor::Block | Flavor::Macro | Flavor::Optional => SymIndex::Blocks,
            Flavor::User | Flavor::UserAttribute => SymIndex::Users,
            Flavor::Role | Flavor::RoleAttribute => SymIndex::Roles,
            Flavor::Type | Flavor::TypeAttribute | Flavor::TypeAlias => SymIndex::Types,
            Flavor::Common => SymIndex::Commons,
            Flavor::Class | Flavor::ClassMap => SymIndex::Classes,
            Flavor::ClassPermission => SymIndex::ClassPermSets,
            Flavor::Boolean => SymIndex::Bools,
            Flavor::Tunable => SymIndex::Tunables,
            Flavor::Sensitivity | Flavor::SensitivityAlias => SymIndex::Sens,
            Flavor::Category | Flavor::CategoryAlias | Flavor::CategorySet => SymIndex::Cats,
            Flavor::Sid => SymIndex::Sids,
            Flavor::Context => SymIndex::Contexts,
            Flavor::Level => SymIndex::Levels,
            Flavor::LevelRange => SymIndex::LevelRanges,
            Flavor::PolicyCap => SymIndex::PolicyCaps,
            Flavor::IpAddr => SymIndex::IpAddrs,
            Flavor::Name => SymIndex::Names,
            Flavor::PermissionX => SymIndex::PermXs,
            Flavor::Perm | Flavor::MapPerm => SymIndex::Perms,
            _ => return None,
        })
    }

    /// Table searched for an argument bound to a parameter of `flavor`.
    #[must_use]
    pub fn for_param(flavor: ParamFlavor) -> SymIndex {
        match flavor {
            ParamFlavor::Type => SymIndex::Types,
            ParamFlavor::Role => SymIndex::Roles,
            ParamFlavor::User => SymIndex::Users,
            ParamFlavor::Sensitivity => SymIndex::Sens,
            ParamFlavor::Category | ParamFlavor::CategorySet => SymIndex::Cats,
            ParamFlavor::Level => SymIndex::Levels,
            ParamFlavor::LevelRange => SymIndex::LevelRanges,
            ParamFlavor::Class | ParamFlavor::ClassMap => SymIndex::Classes,
            ParamFlavor::ClassPermission => SymIndex::ClassPermSets,
            ParamFlavor::IpAddr => SymIndex::IpAddrs,
            ParamFlavor::Boolean => SymIndex::Bools,
            ParamFlavor::Name => SymIndex::Names,
        }
    }

    /// Human readable name used in "failed to resolve" messages.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            SymIndex::Blocks => "block",
            SymIndex::Users => "user",
            SymIndex::Roles => "role",
            SymIndex::Types => "type",
            SymIndex::Commons => "common",
            SymIndex::Classes => "class",
            SymIndex::ClassPermSets => "classpermission",
            SymIndex::Bools => "boolean",
            SymIndex::Tunables => "tunable",
            SymIndex::Sens => "sensitivity",
            SymIndex::Cats => "category",
            SymIndex::Sids => "sid",
            SymIndex::Contexts => "context",
            SymIndex::Levels => "level",
            SymIndex::LevelRanges => "levelrange",
            SymIndex::PolicyCaps => "policycap",
            SymIndex::IpAddrs => "ipaddr",
            SymIndex::Names => "name",
            SymIndex::PermXs => "permissionx",
            SymIndex::Perms => "permission",
        }
    }
}

/// Declaration kind a macro parameter shadows.
#[must_use]
pub fn param_decl_flavor(flavor: ParamFlavor) -> Flavor {
    match flavor {
        ParamFlavor::Type => Flavor::Type,
        ParamFlavor::Role => Flavor::Role,
        ParamFlavor::User => Flavor::User,
        ParamFlavor::Sensitivity => Flavor::Sensitivity,
        ParamFlavor::Category => Flavor::Category,
        ParamFlavor::CategorySet => Flavor::CategorySet,
        ParamFlavor::Level => Flavor::Level,
        ParamFlavor::LevelRange => Flavor::LevelRange,
        ParamFlavor::Class => Flavor::Class,
        ParamFlavor::ClassMap => Flavor::ClassMap,
        ParamFlavor::ClassPermission => Flavor::ClassPermission,
        ParamFlavor::IpAddr => Flavor::IpAddr,
        ParamFlavor::Boolean => Flavor::Boolean,
        ParamFlavor::Name => Flavor::Name,
    }
}

/// Owner of a set of symbol tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Root,
    /// `in` statements and `tunableif` branches, before they are spliced.
    Node(NodeId),
    /// Blocks, macros and, for permissions, classes.
    Datum(DatumId),
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Symtabs {
    tables: FxHashMap<(ScopeKey, SymIndex), FxHashMap<String, DatumId>>,
}

impl Symtabs {
    #[must_use]
    pub(crate) fn get(&self, scope: ScopeKey, sym: SymIndex, name: &str) -> Option<DatumId> {
        self.tables
            .get(&(scope, sym))
            .and_then(|table| table.get(name).copied())
    }

    pub(crate) fn insert(&mut self, scope: ScopeKey, sym: SymIndex, name: &str, datum: DatumId) {
        self.tables
            .entry((scope, sym))
            .or_default()
            .insert(name.to_string(), datum);
    }

    pub(crate) fn remove(&mut self, scope: ScopeKey, sym: SymIndex, name: &str) -> Option<DatumId> {
        self.tables
            .get_mut(&(scope, sym))
            .and_then(|table| table.remove(name))
    }

    /// Drops every table owned by one of `scopes`.
    pub(crate) fn drop_scopes(&mut self, scopes: &FxHashSet<ScopeKey>) {
        if scopes.is_empty() {
            return;
        }
        self.tables.retain(|(owner, _), _| !scopes.contains(owner));
    }
}
