//! AST builder that converts the generic parse tree into typed statement nodes.
//!
//! The `Builder` reads one or more CIL sources and stores every statement in
//! a single [`Arena`] under its root node. It handles:
//!
//! - Mapping statement keywords to typed [`Statement`] payloads
//! - Checking argument counts and shapes
//! - Checking declared names (first character, allowed characters, reserved words)
//! - Recording parent-child relationships in the arena
//!
//! # Example
//!
//! ```
//! use cil_ast::builder::Builder;
//!
//! let mut builder = Builder::new();
//! builder.add_source_code("base.cil", "(block b (type t))");
//! let arena = builder.build_ast().unwrap();
//! assert_eq!(arena.len(), 3);
//! ```
//!
//! # Error Handling
//!
//! The builder keeps going after a malformed statement so that all problems
//! of a source are reported at once. `build_ast()` fails with every collected
//! message joined by `"; "`.
//!
//! # Reusable fragments
//!
//! Macro call arguments are only interpreted once the called macro is known.
//! The `parse_*` functions of this module turn a single argument into the same
//! payload fragment a statement would carry, so the resolver can build inline
//! levels, ranges, category sets and class permissions on demand.

use std::net::IpAddr;

use crate::arena::{Arena, ROOT_ID};
use crate::errors::BuildError;
use crate::nodes::{
    AliasActual, AttributeSet, AvPerms, AvRule, Bounds, Call, CategorySet, ClassCommon,
    ClassMapping, ClassPermissionSet, ClassPerms, Conditional, Constrain, ConstraintOperand,
    ContextDecl, ContextRef, ContextSpec, Declaration, DefaultRangeRule, DefaultRule, DeviceCon,
    ExpandTypeAttribute, Expr, ExprFlavor, ExprItem, ExprOperator, FileCon, Flavor, FsUse,
    GenfsCon, In, IpAddrDecl, IpAddrRef, LevelDecl, LevelRangeDecl, LevelRangeRef,
    LevelRangeSpec, LevelRef, LevelSpec, Location, Macro, MacroParam, NameRef,
    NameTypeTransition, NetifCon, NodeCon, NodeId, Order, ParamFlavor, PermXRef, PermXSpec,
    PermissionXDecl, PortCon, RangeTransition, RoleAllow, RoleTransition, RoleType, SelinuxUser,
    SensitivityCategory, SidContext, Statement, TypeRule, UserLevel, UserPrefix, UserRange,
    UserRole, ValidateTrans, ValueDecl,
};
use crate::parser::{ParseNode, parse_source};

/// What follows the fixed arguments of a statement.
enum Body<'a> {
    None,
    Statements(&'a [ParseNode]),
    Permissions(Flavor, &'a [ParseNode]),
}

pub struct Builder {
    arena: Arena,
    errors: Vec<anyhow::Error>,
    qualified_names: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            errors: Vec::new(),
            qualified_names: false,
        }
    }

    /// Allows `.` inside declared names.
    #[must_use]
    pub fn with_qualified_names(mut self, enabled: bool) -> Self {
        self.qualified_names = enabled;
        self
    }

    /// Reads `text` and appends its statements under the root node.
    pub fn add_source_code(&mut self, source_name: &str, text: &str) {
        match parse_source(source_name, text) {
            Ok(nodes) => {
                for node in &nodes {
                    self.build_node(ROOT_ID, node);
                }
            }
            Err(e) => self.errors.push(e.into()),
        }
    }

    /// Builds the AST from all sources added so far.
    ///
    /// # Errors
    ///
    /// Returns an error listing every problem found while building.
    pub fn build_ast(&mut self) -> anyhow::Result<Arena> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.drain(..).map(|e| e.to_string()).collect();
            anyhow::bail!("AST building failed: {}", messages.join("; "));
        }
        Ok(std::mem::take(&mut self.arena))
    }

    fn build_node(&mut self, parent: NodeId, node: &ParseNode) {
        let ParseNode::List { items, location } = node else {
            self.errors.push(
                BuildError::InvalidSyntax {
                    statement: "top-level".to_string(),
                    reason: format!("expected a statement, found '{}'", node.as_atom().unwrap_or_default()),
                    location: node.location().clone(),
                }
                .into(),
            );
            return;
        };
        let Some(keyword) = items.first().and_then(ParseNode::as_atom) else {
            self.errors.push(
                BuildError::InvalidSyntax {
                    statement: "top-level".to_string(),
                    reason: "statement must start with a keyword".to_string(),
                    location: location.clone(),
                }
                .into(),
            );
            return;
        };
        let args = &items[1..];

        if matches!(keyword, "true" | "false") {
            let parent_flavor = self.arena.flavor(parent);
            if !matches!(parent_flavor, Some(Flavor::TunableIf | Flavor::BooleanIf)) {
                self.errors.push(
                    syntax(keyword, "only allowed inside tunableif or booleanif", location).into(),
                );
                return;
            }
            let id = self.arena.add_node(
                parent,
                location.clone(),
                Statement::CondBlock(keyword == "true"),
            );
            for child in args {
                self.build_node(id, child);
            }
            return;
        }
        if matches!(keyword, "mls" | "handleunknown") {
            return;
        }

        match self.build_statement(keyword, args, location) {
            Ok((statement, body)) => {
                let id = self.arena.add_node(parent, location.clone(), statement);
                match body {
                    Body::None => {}
                    Body::Statements(children) => {
                        for child in children {
                            self.build_node(id, child);
                        }
                    }
                    Body::Permissions(flavor, perms) => {
                        for perm in perms {
                            match self.decl_name(perm, flavor) {
                                Ok(name) => {
                                    self.arena.add_node(
                                        id,
                                        perm.location().clone(),
                                        Statement::Declaration(Declaration { flavor, name }),
                                    );
                                }
                                Err(e) => self.errors.push(e.into()),
                            }
                        }
                    }
                }
            }
            Err(e) => self.errors.push(e.into()),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn build_statement<'a>(
        &self,
        keyword: &str,
        args: &'a [ParseNode],
        location: &Location,
    ) -> Result<(Statement, Body<'a>), BuildError> {
        let simple = |flavor: Flavor| -> Result<(Statement, Body<'a>), BuildError> {
            expect_args(keyword, args, 1, location)?;
            let name = self.decl_name(&args[0], flavor)?;
            Ok((
                Statement::Declaration(Declaration { flavor, name }),
                Body::None,
            ))
        };
        let stmt = |s: Statement| -> Result<(Statement, Body<'a>), BuildError> { Ok((s, Body::None)) };

        match keyword {
            "block" => {
                expect_at_least(keyword, args, 1, location)?;
                let name = self.decl_name(&args[0], Flavor::Block)?;
                Ok((Statement::Block(name), Body::Statements(&args[1..])))
            }
            "blockabstract" => {
                expect_args(keyword, args, 1, location)?;
                stmt(Statement::BlockAbstract(name_ref(keyword, &args[0])?))
            }
            "blockinherit" => {
                expect_args(keyword, args, 1, location)?;
                stmt(Statement::BlockInherit(name_ref(keyword, &args[0])?))
            }
            "in" => {
                expect_at_least(keyword, args, 1, location)?;
                let positional = args.len() >= 2
                    && matches!(args[0].as_atom(), Some("before" | "after"))
                    && args[1].as_atom().is_some();
                let (is_after, target, body) = if positional {
                    (args[0].as_atom() == Some("after"), &args[1], &args[2..])
                } else {
                    (false, &args[0], &args[1..])
                };
                Ok((
                    Statement::In(In {
                        is_after,
                        target: atom(keyword, target)?,
                    }),
                    Body::Statements(body),
                ))
            }
            "macro" => {
                expect_at_least(keyword, args, 2, location)?;
                let name = self.decl_name(&args[0], Flavor::Macro)?;
                let params = self.macro_params(&args[1])?;
                Ok((
                    Statement::Macro(Macro { name, params }),
                    Body::Statements(&args[2..]),
                ))
            }
            "call" => {
                expect_range(keyword, args, 1, 2, location)?;
                let call_args = match args.get(1) {
                    None => Vec::new(),
                    Some(ParseNode::List { items, .. }) => items.clone(),
                    Some(other) => {
                        return Err(syntax(keyword, "arguments must be a list", other.location()));
                    }
                };
                stmt(Statement::Call(Call {
                    macro_ref: name_ref(keyword, &args[0])?,
                    args: call_args,
                    bindings: Vec::new(),
                    copied: false,
                }))
            }
            "optional" => {
                expect_at_least(keyword, args, 1, location)?;
                let name = self.decl_name(&args[0], Flavor::Optional)?;
                Ok((Statement::Optional(name), Body::Statements(&args[1..])))
            }
            "tunableif" | "booleanif" => {
                expect_at_least(keyword, args, 2, location)?;
                let flavor = if keyword == "tunableif" {
                    ExprFlavor::Tunable
                } else {
                    ExprFlavor::Boolean
                };
                let condition = parse_expr(&args[0], flavor)?;
                let conditional = Conditional {
                    condition,
                    preserved_tunable: false,
                };
                let statement = if keyword == "tunableif" {
                    Statement::TunableIf(conditional)
                } else {
                    Statement::BooleanIf(conditional)
                };
                Ok((statement, Body::Statements(&args[1..])))
            }
            "tunable" | "boolean" => {
                expect_args(keyword, args, 2, location)?;
                let flavor = if keyword == "tunable" {
                    Flavor::Tunable
                } else {
                    Flavor::Boolean
                };
                let name = self.decl_name(&args[0], flavor)?;
                let value = parse_bool(keyword, &args[1])?;
                let decl = ValueDecl { name, value };
                stmt(if keyword == "tunable" {
                    Statement::Tunable(decl)
                } else {
                    Statement::Boolean(decl)
                })
            }
            "type" => simple(Flavor::Type),
            "typeattribute" => simple(Flavor::TypeAttribute),
            "typealias" => simple(Flavor::TypeAlias),
            "role" => simple(Flavor::Role),
            "roleattribute" => simple(Flavor::RoleAttribute),
            "user" => simple(Flavor::User),
            "userattribute" => simple(Flavor::UserAttribute),
            "sensitivity" => simple(Flavor::Sensitivity),
            "sensitivityalias" => simple(Flavor::SensitivityAlias),
            "category" => simple(Flavor::Category),
            "categoryalias" => simple(Flavor::CategoryAlias),
            "sid" => simple(Flavor::Sid),
            "policycap" => simple(Flavor::PolicyCap),
            "classpermission" => simple(Flavor::ClassPermission),
            "typealiasactual" | "sensitivityaliasactual" | "categoryaliasactual" => {
                expect_args(keyword, args, 2, location)?;
                let flavor = match keyword {
                    "typealiasactual" => Flavor::TypeAliasActual,
                    "sensitivityaliasactual" => Flavor::SensitivityAliasActual,
                    _ => Flavor::CategoryAliasActual,
                };
                stmt(Statement::AliasActual(AliasActual {
                    flavor,
                    alias: name_ref(keyword, &args[0])?,
                    actual: name_ref(keyword, &args[1])?,
                }))
            }
            "class" | "common" | "classmap" => {
                expect_args(keyword, args, 2, location)?;
                let (flavor, perm_flavor) = match keyword {
                    "class" => (Flavor::Class, Flavor::Perm),
                    "common" => (Flavor::Common, Flavor::Perm),
                    _ => (Flavor::ClassMap, Flavor::MapPerm),
                };
                let name = self.decl_name(&args[0], flavor)?;
                let perms = args[1]
                    .as_list()
                    .ok_or_else(|| syntax(keyword, "permissions must be a list", args[1].location()))?;
                Ok((
                    Statement::Declaration(Declaration { flavor, name }),
                    Body::Permissions(perm_flavor, perms),
                ))
            }
            "classcommon" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::ClassCommon(ClassCommon {
                    class: name_ref(keyword, &args[0])?,
                    common: name_ref(keyword, &args[1])?,
                }))
            }
            "classpermissionset" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::ClassPermissionSet(ClassPermissionSet {
                    set: name_ref(keyword, &args[0])?,
                    classperms: parse_classperms(&args[1])?,
                }))
            }
            "classmapping" => {
                expect_args(keyword, args, 3, location)?;
                stmt(Statement::ClassMapping(ClassMapping {
                    map_class: name_ref(keyword, &args[0])?,
                    map_perm: name_ref(keyword, &args[1])?,
                    classperms: parse_classperms(&args[2])?,
                }))
            }
            "classorder" | "sidorder" | "categoryorder" | "sensitivityorder" => {
                expect_args(keyword, args, 1, location)?;
                let flavor = match keyword {
                    "classorder" => Flavor::ClassOrder,
                    "sidorder" => Flavor::SidOrder,
                    "categoryorder" => Flavor::CategoryOrder,
                    _ => Flavor::SensitivityOrder,
                };
                let list = args[0]
                    .as_list()
                    .ok_or_else(|| syntax(keyword, "expected a list", args[0].location()))?;
                let mut items = Vec::with_capacity(list.len());
                let mut unordered = false;
                for (idx, item) in list.iter().enumerate() {
                    let name = atom(keyword, item)?;
                    if name == "unordered" {
                        if flavor != Flavor::ClassOrder {
                            return Err(syntax(
                                keyword,
                                "'unordered' is only allowed in classorder",
                                item.location(),
                            ));
                        }
                        if idx != 0 {
                            return Err(syntax(
                                keyword,
                                "'unordered' must be the first item",
                                item.location(),
                            ));
                        }
                        unordered = true;
                        continue;
                    }
                    items.push(NameRef::new(name));
                }
                stmt(Statement::Order(Order {
                    flavor,
                    unordered,
                    items,
                }))
            }
            "categoryset" => {
                expect_args(keyword, args, 2, location)?;
                let name = self.decl_name(&args[0], Flavor::CategorySet)?;
                if !args[1].is_list() {
                    return Err(syntax(keyword, "categories must be a list", args[1].location()));
                }
                stmt(Statement::CategorySet(CategorySet {
                    name,
                    categories: parse_categories(&args[1])?,
                }))
            }
            "sensitivitycategory" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::SensitivityCategory(SensitivityCategory {
                    sensitivity: name_ref(keyword, &args[0])?,
                    categories: parse_categories(&args[1])?,
                }))
            }
            "level" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::Level(LevelDecl {
                    name: self.decl_name(&args[0], Flavor::Level)?,
                    level: parse_level(&args[1])?,
                }))
            }
            "levelrange" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::LevelRange(LevelRangeDecl {
                    name: self.decl_name(&args[0], Flavor::LevelRange)?,
                    range: parse_levelrange(&args[1])?,
                }))
            }
            "context" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::Context(ContextDecl {
                    name: self.decl_name(&args[0], Flavor::Context)?,
                    context: parse_context(&args[1])?,
                }))
            }
            "ipaddr" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::IpAddr(IpAddrDecl {
                    name: self.decl_name(&args[0], Flavor::IpAddr)?,
                    addr: parse_ipaddr(&args[1])?,
                }))
            }
            "permissionx" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::PermissionX(PermissionXDecl {
                    name: self.decl_name(&args[0], Flavor::PermissionX)?,
                    permx: parse_permx(&args[1])?,
                }))
            }
            "typeattributeset" | "roleattributeset" | "userattributeset" => {
                expect_args(keyword, args, 2, location)?;
                let (flavor, expr_flavor) = match keyword {
                    "typeattributeset" => (Flavor::TypeAttributeSet, ExprFlavor::Type),
                    "roleattributeset" => (Flavor::RoleAttributeSet, ExprFlavor::Role),
                    _ => (Flavor::UserAttributeSet, ExprFlavor::User),
                };
                stmt(Statement::AttributeSet(AttributeSet {
                    flavor,
                    attribute: name_ref(keyword, &args[0])?,
                    expr: parse_expr(&args[1], expr_flavor)?,
                }))
            }
            "expandtypeattribute" => {
                expect_args(keyword, args, 2, location)?;
                let attributes = match &args[0] {
                    ParseNode::List { items, .. } => items
                        .iter()
                        .map(|i| name_ref(keyword, i))
                        .collect::<Result<Vec<_>, _>>()?,
                    atom_node => vec![name_ref(keyword, atom_node)?],
                };
                stmt(Statement::ExpandTypeAttribute(ExpandTypeAttribute {
                    attributes,
                    expand: parse_bool(keyword, &args[1])?,
                }))
            }
            "typebounds" | "rolebounds" | "userbounds" => {
                expect_args(keyword, args, 2, location)?;
                let flavor = match keyword {
                    "typebounds" => Flavor::TypeBounds,
                    "rolebounds" => Flavor::RoleBounds,
                    _ => Flavor::UserBounds,
                };
                stmt(Statement::Bounds(Bounds {
                    flavor,
                    parent: name_ref(keyword, &args[0])?,
                    child: name_ref(keyword, &args[1])?,
                }))
            }
            "typepermissive" => {
                expect_args(keyword, args, 1, location)?;
                stmt(Statement::TypePermissive(name_ref(keyword, &args[0])?))
            }
            "allow" | "auditallow" | "dontaudit" | "neverallow" => {
                expect_args(keyword, args, 3, location)?;
                let flavor = match keyword {
                    "allow" => Flavor::Allow,
                    "auditallow" => Flavor::AuditAllow,
                    "dontaudit" => Flavor::DontAudit,
                    _ => Flavor::NeverAllow,
                };
                stmt(Statement::AvRule(AvRule {
                    flavor,
                    source: name_ref(keyword, &args[0])?,
                    target: name_ref(keyword, &args[1])?,
                    perms: AvPerms::ClassPerms(parse_classperms(&args[2])?),
                }))
            }
            "allowx" | "auditallowx" | "dontauditx" | "neverallowx" => {
                expect_args(keyword, args, 3, location)?;
                let flavor = match keyword {
                    "allowx" => Flavor::AllowX,
                    "auditallowx" => Flavor::AuditAllowX,
                    "dontauditx" => Flavor::DontAuditX,
                    _ => Flavor::NeverAllowX,
                };
                let permx = match &args[2] {
                    ParseNode::List { .. } => PermXRef::Anonymous(Box::new(parse_permx(&args[2])?)),
                    other => PermXRef::Named(name_ref(keyword, other)?),
                };
                stmt(Statement::AvRule(AvRule {
                    flavor,
                    source: name_ref(keyword, &args[0])?,
                    target: name_ref(keyword, &args[1])?,
                    perms: AvPerms::PermX(permx),
                }))
            }
            "typetransition" if args.len() == 5 => {
                stmt(Statement::NameTypeTransition(NameTypeTransition {
                    source: name_ref(keyword, &args[0])?,
                    target: name_ref(keyword, &args[1])?,
                    class: name_ref(keyword, &args[2])?,
                    name: NameRef::new(atom(keyword, &args[3])?),
                    result: name_ref(keyword, &args[4])?,
                }))
            }
            "typetransition" | "typechange" | "typemember" => {
                expect_args(keyword, args, 4, location)?;
                let flavor = match keyword {
                    "typetransition" => Flavor::TypeTransition,
                    "typechange" => Flavor::TypeChange,
                    _ => Flavor::TypeMember,
                };
                stmt(Statement::TypeRule(TypeRule {
                    flavor,
                    source: name_ref(keyword, &args[0])?,
                    target: name_ref(keyword, &args[1])?,
                    class: name_ref(keyword, &args[2])?,
                    result: name_ref(keyword, &args[3])?,
                }))
            }
            "rangetransition" => {
                expect_args(keyword, args, 4, location)?;
                stmt(Statement::RangeTransition(RangeTransition {
                    source: name_ref(keyword, &args[0])?,
                    exec: name_ref(keyword, &args[1])?,
                    class: name_ref(keyword, &args[2])?,
                    range: parse_levelrange_ref(&args[3])?,
                }))
            }
            "roletype" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::RoleType(RoleType {
                    role: name_ref(keyword, &args[0])?,
                    type_: name_ref(keyword, &args[1])?,
                }))
            }
            "roleallow" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::RoleAllow(RoleAllow {
                    source: name_ref(keyword, &args[0])?,
                    target: name_ref(keyword, &args[1])?,
                }))
            }
            "roletransition" => {
                expect_args(keyword, args, 4, location)?;
                stmt(Statement::RoleTransition(RoleTransition {
                    source: name_ref(keyword, &args[0])?,
                    target: name_ref(keyword, &args[1])?,
                    class: name_ref(keyword, &args[2])?,
                    result: name_ref(keyword, &args[3])?,
                }))
            }
            "userrole" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::UserRole(UserRole {
                    user: name_ref(keyword, &args[0])?,
                    role: name_ref(keyword, &args[1])?,
                }))
            }
            "userlevel" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::UserLevel(UserLevel {
                    user: name_ref(keyword, &args[0])?,
                    level: parse_level_ref(&args[1])?,
                }))
            }
            "userrange" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::UserRange(UserRange {
                    user: name_ref(keyword, &args[0])?,
                    range: parse_levelrange_ref(&args[1])?,
                }))
            }
            "userprefix" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::UserPrefix(UserPrefix {
                    user: name_ref(keyword, &args[0])?,
                    prefix: atom(keyword, &args[1])?,
                }))
            }
            "selinuxuser" => {
                expect_args(keyword, args, 3, location)?;
                stmt(Statement::SelinuxUser(SelinuxUser {
                    login: Some(atom(keyword, &args[0])?),
                    user: name_ref(keyword, &args[1])?,
                    range: parse_levelrange_ref(&args[2])?,
                }))
            }
            "selinuxuserdefault" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::SelinuxUser(SelinuxUser {
                    login: None,
                    user: name_ref(keyword, &args[0])?,
                    range: parse_levelrange_ref(&args[1])?,
                }))
            }
            "constrain" | "mlsconstrain" => {
                expect_args(keyword, args, 2, location)?;
                let flavor = if keyword == "constrain" {
                    Flavor::Constrain
                } else {
                    Flavor::MlsConstrain
                };
                stmt(Statement::Constrain(Constrain {
                    flavor,
                    classperms: parse_classperms(&args[0])?,
                    expr: parse_expr(&args[1], ExprFlavor::Constraint)?,
                }))
            }
            "validatetrans" | "mlsvalidatetrans" => {
                expect_args(keyword, args, 2, location)?;
                let flavor = if keyword == "validatetrans" {
                    Flavor::ValidateTrans
                } else {
                    Flavor::MlsValidateTrans
                };
                stmt(Statement::ValidateTrans(ValidateTrans {
                    flavor,
                    class: name_ref(keyword, &args[0])?,
                    expr: parse_expr(&args[1], ExprFlavor::Constraint)?,
                }))
            }
            "sidcontext" => {
                expect_args(keyword, args, 2, location)?;
                stmt(Statement::SidContext(SidContext {
                    sid: name_ref(keyword, &args[0])?,
                    context: parse_context_ref(&args[1])?,
                }))
            }
            "filecon" => {
                expect_args(keyword, args, 3, location)?;
                let context = match &args[2] {
                    ParseNode::List { items, .. } if items.is_empty() => None,
                    other => Some(parse_context_ref(other)?),
                };
                stmt(Statement::FileCon(FileCon {
                    path: atom(keyword, &args[0])?,
                    file_type: atom(keyword, &args[1])?,
                    context,
                }))
            }
            "portcon" => {
                expect_args(keyword, args, 3, location)?;
                stmt(Statement::PortCon(PortCon {
                    protocol: atom(keyword, &args[0])?,
                    ports: literal_or_range(keyword, &args[1])?,
                    context: parse_context_ref(&args[2])?,
                }))
            }
            "nodecon" => {
                expect_args(keyword, args, 3, location)?;
                stmt(Statement::NodeCon(NodeCon {
                    addr: parse_ipaddr_ref(&args[0])?,
                    mask: parse_ipaddr_ref(&args[1])?,
                    context: parse_context_ref(&args[2])?,
                }))
            }
            "genfscon" => {
                expect_range(keyword, args, 3, 4, location)?;
                let file_type = if args.len() == 4 {
                    Some(atom(keyword, &args[2])?)
                } else {
                    None
                };
                stmt(Statement::GenfsCon(GenfsCon {
                    fs: atom(keyword, &args[0])?,
                    path: atom(keyword, &args[1])?,
                    file_type,
                    context: parse_context_ref(&args[args.len() - 1])?,
                }))
            }
            "netifcon" => {
                expect_args(keyword, args, 3, location)?;
                stmt(Statement::NetifCon(NetifCon {
                    interface: atom(keyword, &args[0])?,
                    if_context: parse_context_ref(&args[1])?,
                    packet_context: parse_context_ref(&args[2])?,
                }))
            }
            "fsuse" => {
                expect_args(keyword, args, 3, location)?;
                stmt(Statement::FsUse(FsUse {
                    kind: atom(keyword, &args[0])?,
                    fs: atom(keyword, &args[1])?,
                    context: parse_context_ref(&args[2])?,
                }))
            }
            "ibpkeycon" | "ibendportcon" | "pirqcon" | "iomemcon" | "ioportcon"
            | "pcidevicecon" | "devicetreecon" => {
                let (flavor, arity) = match keyword {
                    "ibpkeycon" => (Flavor::IbPkeyCon, 3),
                    "ibendportcon" => (Flavor::IbEndPortCon, 3),
                    "pirqcon" => (Flavor::PirqCon, 2),
                    "iomemcon" => (Flavor::IomemCon, 2),
                    "ioportcon" => (Flavor::IoportCon, 2),
                    "pcidevicecon" => (Flavor::PciDeviceCon, 2),
                    _ => (Flavor::DeviceTreeCon, 2),
                };
                expect_args(keyword, args, arity, location)?;
                let literals = args[..arity - 1]
                    .iter()
                    .map(|a| literal_or_range(keyword, a))
                    .collect::<Result<Vec<_>, _>>()?;
                stmt(Statement::DeviceCon(DeviceCon {
                    flavor,
                    args: literals,
                    context: parse_context_ref(&args[arity - 1])?,
                }))
            }
            "defaultuser" | "defaultrole" | "defaulttype" => {
                expect_args(keyword, args, 2, location)?;
                let flavor = match keyword {
                    "defaultuser" => Flavor::DefaultUser,
                    "defaultrole" => Flavor::DefaultRole,
                    _ => Flavor::DefaultType,
                };
                stmt(Statement::Default(DefaultRule {
                    flavor,
                    classes: name_list(keyword, &args[0])?,
                    object: atom(keyword, &args[1])?,
                }))
            }
            "defaultrange" => {
                expect_range(keyword, args, 2, 3, location)?;
                let range = match args.get(2) {
                    Some(r) => Some(atom(keyword, r)?),
                    None => None,
                };
                stmt(Statement::DefaultRange(DefaultRangeRule {
                    classes: name_list(keyword, &args[0])?,
                    object: atom(keyword, &args[1])?,
                    range,
                }))
            }
            _ => Err(BuildError::UnknownStatement {
                keyword: keyword.to_string(),
                location: location.clone(),
            }),
        }
    }

    fn macro_params(&self, node: &ParseNode) -> Result<Vec<MacroParam>, BuildError> {
        let list = node
            .as_list()
            .ok_or_else(|| syntax("macro", "parameters must be a list", node.location()))?;
        let mut params: Vec<MacroParam> = Vec::with_capacity(list.len());
        for param in list {
            let pair = param
                .as_list()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| syntax("macro", "parameter must be (kind name)", param.location()))?;
            let kind = atom("macro", &pair[0])?;
            let flavor = ParamFlavor::from_keyword(&kind).ok_or_else(|| {
                syntax(
                    "macro",
                    &format!("unknown parameter kind '{kind}'"),
                    pair[0].location(),
                )
            })?;
            let name = self.decl_name(&pair[1], Flavor::Macro)?;
            if params.iter().any(|p| p.name == name) {
                return Err(syntax(
                    "macro",
                    &format!("duplicate parameter '{name}'"),
                    pair[1].location(),
                ));
            }
            params.push(MacroParam { flavor, name });
        }
        Ok(params)
    }

    fn decl_name(&self, node: &ParseNode, flavor: Flavor) -> Result<String, BuildError> {
        let name = match node {
            ParseNode::Atom {
                value,
                quoted: false,
                ..
            } => value.clone(),
            _ => {
                return Err(syntax(flavor.keyword(), "expected a name", node.location()));
            }
        };
        verify_name(&name, flavor, self.qualified_names, node.location())?;
        Ok(name)
    }
}

fn verify_name(
    name: &str,
    flavor: Flavor,
    qualified_names: bool,
    location: &Location,
) -> Result<(), BuildError> {
    let invalid = |reason: String| BuildError::InvalidName {
        name: name.to_string(),
        reason,
        location: location.clone(),
    };
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid("first character is not a letter".to_string())),
    }
    if let Some(c) = chars.find(|c| {
        !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || (qualified_names && *c == '.'))
    }) {
        return Err(invalid(format!("invalid character '{c}'")));
    }
    if is_reserved_name(name, flavor) {
        return Err(invalid(format!("the keyword '{name}' is reserved")));
    }
    Ok(())
}

fn is_reserved_name(name: &str, flavor: Flavor) -> bool {
    let reserved: &[&str] = match flavor {
        Flavor::Boolean | Flavor::Tunable => &["eq", "neq"],
        Flavor::Perm
        | Flavor::MapPerm
        | Flavor::User
        | Flavor::UserAttribute
        | Flavor::Role
        | Flavor::RoleAttribute => &["all"],
        Flavor::Type | Flavor::TypeAttribute | Flavor::TypeAlias => &["all", "self"],
        Flavor::Category | Flavor::CategorySet | Flavor::CategoryAlias | Flavor::PermissionX => {
            &["all", "range"]
        }
        _ => return false,
    };
    reserved.contains(&name) || matches!(name, "and" | "or" | "not" | "xor")
}

fn syntax(statement: &str, reason: &str, location: &Location) -> BuildError {
    BuildError::InvalidSyntax {
        statement: statement.to_string(),
        reason: reason.to_string(),
        location: location.clone(),
    }
}

fn expect_args(
    keyword: &str,
    args: &[ParseNode],
    count: usize,
    location: &Location,
) -> Result<(), BuildError> {
    expect_range(keyword, args, count, count, location)
}

fn expect_at_least(
    keyword: &str,
    args: &[ParseNode],
    min: usize,
    location: &Location,
) -> Result<(), BuildError> {
    expect_range(keyword, args, min, usize::MAX, location)
}

fn expect_range(
    keyword: &str,
    args: &[ParseNode],
    min: usize,
    max: usize,
    location: &Location,
) -> Result<(), BuildError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("expected {min} argument(s), found {}", args.len())
        } else if max == usize::MAX {
            format!("expected at least {min} argument(s), found {}", args.len())
        } else {
            format!("expected {min} to {max} arguments, found {}", args.len())
        };
        return Err(syntax(keyword, &expected, location));
    }
    Ok(())
}

fn atom(statement: &str, node: &ParseNode) -> Result<String, BuildError> {
    node.as_atom()
        .map(str::to_string)
        .ok_or_else(|| syntax(statement, "expected a name, found a list", node.location()))
}

fn name_ref(statement: &str, node: &ParseNode) -> Result<NameRef, BuildError> {
    atom(statement, node).map(NameRef::new)
}

fn name_list(statement: &str, node: &ParseNode) -> Result<Vec<NameRef>, BuildError> {
    match node {
        ParseNode::List { items, .. } => items.iter().map(|i| name_ref(statement, i)).collect(),
        other => Ok(vec![name_ref(statement, other)?]),
    }
}

fn parse_bool(statement: &str, node: &ParseNode) -> Result<bool, BuildError> {
    match node.as_atom() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        _ => Err(syntax(statement, "expected true or false", node.location())),
    }
}

/// A literal such as a port, or a `(low high)` pair rendered as `low-high`.
fn literal_or_range(statement: &str, node: &ParseNode) -> Result<String, BuildError> {
    match node {
        ParseNode::Atom { value, .. } => Ok(value.clone()),
        ParseNode::List { items, .. } if items.len() == 2 => Ok(format!(
            "{}-{}",
            atom(statement, &items[0])?,
            atom(statement, &items[1])?
        )),
        other => Err(syntax(statement, "expected a value or a (low high) pair", other.location())),
    }
}

/// Parses a name or a parenthesized prefix expression.
///
/// # Errors
///
/// Returns [`BuildError::InvalidSyntax`] when an operator has the wrong number
/// of operands or a constraint comparison lacks its left operand.
pub fn parse_expr(node: &ParseNode, flavor: ExprFlavor) -> Result<Expr, BuildError> {
    match node {
        ParseNode::Atom { value, .. } if value == "all" => Ok(Expr {
            flavor,
            operator: Some(ExprOperator::All),
            items: Vec::new(),
        }),
        ParseNode::Atom { value, .. } => Ok(Expr {
            flavor,
            operator: None,
            items: vec![ExprItem::Name(NameRef::new(value.clone()))],
        }),
        ParseNode::List { items, location } => parse_expr_list(items, flavor, location),
    }
}

fn parse_expr_list(
    items: &[ParseNode],
    flavor: ExprFlavor,
    location: &Location,
) -> Result<Expr, BuildError> {
    let operator = items
        .first()
        .and_then(ParseNode::as_atom)
        .and_then(ExprOperator::from_keyword);
    let Some(operator) = operator else {
        let mut expr = Expr::new(flavor);
        for item in items {
            expr.items.push(match item {
                ParseNode::Atom { value, .. } => ExprItem::Name(NameRef::new(value.clone())),
                ParseNode::List { items, location } => {
                    ExprItem::List(parse_expr_list(items, flavor, location)?)
                }
            });
        }
        return Ok(expr);
    };

    let operands = &items[1..];
    let expected = match operator {
        ExprOperator::All => 0,
        ExprOperator::Not => 1,
        _ => 2,
    };
    if operands.len() != expected {
        return Err(syntax(
            "expression",
            &format!(
                "'{}' expects {expected} operand(s), found {}",
                operator.keyword(),
                operands.len()
            ),
            location,
        ));
    }

    let comparison = matches!(
        operator,
        ExprOperator::Eq
            | ExprOperator::Neq
            | ExprOperator::Dom
            | ExprOperator::Domby
            | ExprOperator::Incomp
    );
    if flavor == ExprFlavor::Constraint && comparison {
        return parse_constraint_leaf(operator, operands, location);
    }

    let mut expr = Expr {
        flavor,
        operator: Some(operator),
        items: Vec::with_capacity(operands.len()),
    };
    for operand in operands {
        expr.items.push(match operand {
            ParseNode::Atom { value, .. } => ExprItem::Name(NameRef::new(value.clone())),
            ParseNode::List { items, location } => {
                ExprItem::List(parse_expr_list(items, flavor, location)?)
            }
        });
    }
    Ok(expr)
}

fn parse_constraint_leaf(
    operator: ExprOperator,
    operands: &[ParseNode],
    location: &Location,
) -> Result<Expr, BuildError> {
    let left = operands[0]
        .as_atom()
        .and_then(ConstraintOperand::from_keyword)
        .ok_or_else(|| syntax("constraint", "expected a constraint operand", location))?;
    let leaf_flavor = left.compared_flavor().unwrap_or(ExprFlavor::Constraint);
    let right = match &operands[1] {
        ParseNode::Atom { value, .. } => match ConstraintOperand::from_keyword(value) {
            Some(operand) => ExprItem::Operand(operand),
            None if leaf_flavor == ExprFlavor::Constraint => {
                return Err(syntax(
                    "constraint",
                    &format!("'{value}' cannot be compared with a level operand"),
                    location,
                ));
            }
            None => ExprItem::Name(NameRef::new(value.clone())),
        },
        ParseNode::List { items, location } => {
            ExprItem::List(parse_expr_list(items, leaf_flavor, location)?)
        }
    };
    Ok(Expr {
        flavor: leaf_flavor,
        operator: Some(operator),
        items: vec![ExprItem::Operand(left), right],
    })
}

/// Parses a category name or a category set expression.
///
/// # Errors
///
/// Returns an error for a malformed expression.
pub fn parse_categories(node: &ParseNode) -> Result<Expr, BuildError> {
    parse_expr(node, ExprFlavor::Category)
}

/// Parses `(sens)` or `(sens cats)`.
///
/// # Errors
///
/// Returns an error if the list has the wrong shape.
pub fn parse_level(node: &ParseNode) -> Result<LevelSpec, BuildError> {
    let items = node
        .as_list()
        .filter(|i| matches!(i.len(), 1 | 2))
        .ok_or_else(|| syntax("level", "expected (sensitivity [categories])", node.location()))?;
    Ok(LevelSpec {
        sensitivity: name_ref("level", &items[0])?,
        categories: items.get(1).map(parse_categories).transpose()?,
    })
}

/// # Errors
///
/// Returns an error if an inline level is malformed.
pub fn parse_level_ref(node: &ParseNode) -> Result<LevelRef, BuildError> {
    match node {
        ParseNode::Atom { value, .. } => Ok(LevelRef::Named(NameRef::new(value.clone()))),
        ParseNode::List { .. } => Ok(LevelRef::Anonymous(Box::new(parse_level(node)?))),
    }
}

/// Parses `(low high)` where each level is a name or an inline level.
///
/// # Errors
///
/// Returns an error if the list does not hold exactly two levels.
pub fn parse_levelrange(node: &ParseNode) -> Result<LevelRangeSpec, BuildError> {
    let items = node
        .as_list()
        .filter(|i| i.len() == 2)
        .ok_or_else(|| syntax("levelrange", "expected (low high)", node.location()))?;
    Ok(LevelRangeSpec {
        low: parse_level_ref(&items[0])?,
        high: parse_level_ref(&items[1])?,
    })
}

/// # Errors
///
/// Returns an error if an inline range is malformed.
pub fn parse_levelrange_ref(node: &ParseNode) -> Result<LevelRangeRef, BuildError> {
    match node {
        ParseNode::Atom { value, .. } => Ok(LevelRangeRef::Named(NameRef::new(value.clone()))),
        ParseNode::List { .. } => Ok(LevelRangeRef::Anonymous(Box::new(parse_levelrange(node)?))),
    }
}

/// Parses `(user role type range)`.
///
/// # Errors
///
/// Returns an error if the list does not hold four elements.
pub fn parse_context(node: &ParseNode) -> Result<ContextSpec, BuildError> {
    let items = node
        .as_list()
        .filter(|i| i.len() == 4)
        .ok_or_else(|| syntax("context", "expected (user role type range)", node.location()))?;
    Ok(ContextSpec {
        user: name_ref("context", &items[0])?,
        role: name_ref("context", &items[1])?,
        type_: name_ref("context", &items[2])?,
        range: parse_levelrange_ref(&items[3])?,
    })
}

/// # Errors
///
/// Returns an error if an inline context is malformed.
pub fn parse_context_ref(node: &ParseNode) -> Result<ContextRef, BuildError> {
    match node {
        ParseNode::Atom { value, .. } => Ok(ContextRef::Named(NameRef::new(value.clone()))),
        ParseNode::List { .. } => Ok(ContextRef::Anonymous(Box::new(parse_context(node)?))),
    }
}

/// # Errors
///
/// Returns [`BuildError::InvalidIpAddr`] if the text is not an address.
pub fn parse_ipaddr(node: &ParseNode) -> Result<IpAddr, BuildError> {
    let text = atom("ipaddr", node)?;
    text.parse().map_err(|_| BuildError::InvalidIpAddr {
        value: text.clone(),
        location: node.location().clone(),
    })
}

/// Names are anything that does not look like an address.
fn parse_ipaddr_ref(node: &ParseNode) -> Result<IpAddrRef, BuildError> {
    let text = atom("ipaddr", node)?;
    if text.contains('.') || text.contains(':') {
        Ok(IpAddrRef::Literal(parse_ipaddr(node)?))
    } else {
        Ok(IpAddrRef::Named(NameRef::new(text)))
    }
}

/// Parses `(kind class values)` of a `permissionx`.
///
/// # Errors
///
/// Returns an error if the list has the wrong shape.
pub fn parse_permx(node: &ParseNode) -> Result<PermXSpec, BuildError> {
    let items = node
        .as_list()
        .filter(|i| i.len() == 3)
        .ok_or_else(|| syntax("permissionx", "expected (kind class values)", node.location()))?;
    let kind = atom("permissionx", &items[0])?;
    if kind != "ioctl" && kind != "nlmsg" {
        return Err(syntax(
            "permissionx",
            &format!("unknown kind '{kind}'"),
            items[0].location(),
        ));
    }
    Ok(PermXSpec {
        kind,
        class: name_ref("permissionx", &items[1])?,
        values: parse_expr(&items[2], ExprFlavor::Literal)?,
    })
}

/// Parses a class permissions argument: a `classpermission` name or
/// `(class permissions)`.
///
/// # Errors
///
/// Returns an error if the list has the wrong shape.
pub fn parse_classperms(node: &ParseNode) -> Result<Vec<ClassPerms>, BuildError> {
    match node {
        ParseNode::Atom { value, .. } => Ok(vec![ClassPerms::Set(NameRef::new(value.clone()))]),
        ParseNode::List { items, location } => {
            if items.len() != 2 || !items[1].is_list() {
                return Err(syntax(
                    "classpermissions",
                    "expected (class (permissions))",
                    location,
                ));
            }
            Ok(vec![ClassPerms::Perms {
                class: name_ref("classpermissions", &items[0])?,
                perms: parse_expr(&items[1], ExprFlavor::Permission)?,
            }])
        }
    }
}
