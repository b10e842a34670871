//! Typed statement payloads stored in the [`Arena`](crate::arena::Arena).
//!
//! Every payload keeps the names exactly as written in the source. References
//! to other declarations are [`NameRef`]s: the name string plus an optional
//! [`DatumId`] filled in by the resolver. Declarations themselves carry only
//! their name; the resolver keeps the node to datum mapping.

use core::fmt;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

use crate::parser::ParseNode;

pub type NodeId = u32;

/// Handle of a resolved declaration. Allocated by the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatumId(pub u32);

impl Display for DatumId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Location {
    pub offset_start: u32,
    pub offset_end: u32,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    /// Name of the source file, empty for inline sources.
    pub source: String,
}

impl Location {
    #[must_use]
    pub fn new(
        offset_start: u32,
        offset_end: u32,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
        source: String,
    ) -> Self {
        Self {
            offset_start,
            offset_end,
            start_line,
            start_column,
            end_line,
            end_column,
            source,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "{}:{}", self.start_line, self.start_column)
        } else {
            write!(f, "{}:{}:{}", self.source, self.start_line, self.start_column)
        }
    }
}

/// Kind tag of a node or of a datum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flavor {
    Root,
    Block,
    BlockAbstract,
    BlockInherit,
    In,
    Macro,
    Call,
    Optional,
    TunableIf,
    BooleanIf,
    CondBlock,
    Tunable,
    Boolean,
    Type,
    TypeAttribute,
    TypeAlias,
    TypeAliasActual,
    Role,
    RoleAttribute,
    User,
    UserAttribute,
    Sensitivity,
    SensitivityAlias,
    SensitivityAliasActual,
    Category,
    CategoryAlias,
    CategoryAliasActual,
    CategorySet,
    SensitivityCategory,
    Sid,
    SidContext,
    SidOrder,
    ClassOrder,
    CategoryOrder,
    SensitivityOrder,
    Class,
    Common,
    ClassMap,
    Perm,
    MapPerm,
    ClassCommon,
    ClassPermission,
    ClassPermissionSet,
    ClassMapping,
    Level,
    LevelRange,
    Context,
    IpAddr,
    PermissionX,
    PolicyCap,
    Name,
    TypeAttributeSet,
    RoleAttributeSet,
    UserAttributeSet,
    ExpandTypeAttribute,
    TypeBounds,
    RoleBounds,
    UserBounds,
    TypePermissive,
    Allow,
    AuditAllow,
    DontAudit,
    NeverAllow,
    AllowX,
    AuditAllowX,
    DontAuditX,
    NeverAllowX,
    TypeTransition,
    TypeChange,
    TypeMember,
    NameTypeTransition,
    RangeTransition,
    RoleType,
    RoleAllow,
    RoleTransition,
    UserRole,
    UserLevel,
    UserRange,
    UserPrefix,
    SelinuxUser,
    SelinuxUserDefault,
    Constrain,
    MlsConstrain,
    ValidateTrans,
    MlsValidateTrans,
    FileCon,
    PortCon,
    NodeCon,
    GenfsCon,
    NetifCon,
    FsUse,
    IbPkeyCon,
    IbEndPortCon,
    PirqCon,
    IomemCon,
    IoportCon,
    PciDeviceCon,
    DeviceTreeCon,
    DefaultUser,
    DefaultRole,
    DefaultType,
    DefaultRange,
}

impl Flavor {
    /// The CIL keyword introducing statements of this kind.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Flavor::Root => "<root>",
            Flavor::Block => "block",
            Flavor::BlockAbstract => "blockabstract",
            Flavor::BlockInherit => "blockinherit",
            Flavor::In => "in",
            Flavor::Macro => "macro",
            Flavor::Call => "call",
            Flavor::Optional => "optional",
            Flavor::TunableIf => "tunableif",
            Flavor::BooleanIf => "booleanif",
            Flavor::CondBlock => "condblock",
            Flavor::Tunable => "tunable",
            Flavor::Boolean => "boolean",
            Flavor::Type => "type",
            Flavor::TypeAttribute => "typeattribute",
            Flavor::TypeAlias => "typealias",
            Flavor::TypeAliasActual => "typealiasactual",
            Flavor::Role => "role",
            Flavor::RoleAttribute => "roleattribute",
            Flavor::User => "user",
            Flavor::UserAttribute => "userattribute",
            Flavor::Sensitivity => "sensitivity",
            Flavor::SensitivityAlias => "sensitivityalias",
            Flavor::SensitivityAliasActual => "sensitivityaliasactual",
            Flavor::Category => "category",
            Flavor::CategoryAlias => "categoryalias",
            Flavor::CategoryAliasActual => "categoryaliasactual",
            Flavor::CategorySet => "categoryset",
            Flavor::SensitivityCategory => "sensitivitycategory",
            Flavor::Sid => "sid",
            Flavor::SidContext => "sidcontext",
            Flavor::SidOrder => "sidorder",
            Flavor::ClassOrder => "classorder",
            Flavor::CategoryOrder => "categoryorder",
            Flavor::SensitivityOrder => "sensitivityorder",
            Flavor::Class => "class",
            Flavor::Common => "common",
            Flavor::ClassMap => "classmap",
            Flavor::Perm => "perm",
            Flavor::MapPerm => "map_perm",
            Flavor::ClassCommon => "classcommon",
            Flavor::ClassPermission => "classpermission",
            Flavor::ClassPermissionSet => "classpermissionset",
            Flavor::ClassMapping => "classmapping",
            Flavor::Level => "level",
            Flavor::LevelRange => "levelrange",
            Flavor::Context => "context",
            Flavor::IpAddr => "ipaddr",
            Flavor::PermissionX => "permissionx",
            Flavor::PolicyCap => "policycap",
            Flavor::Name => "name",
            Flavor::TypeAttributeSet => "typeattributeset",
            Flavor::RoleAttributeSet => "roleattributeset",
            Flavor::UserAttributeSet => "userattributeset",
            Flavor::ExpandTypeAttribute => "expandtypeattribute",
            Flavor::TypeBounds => "typebounds",
            Flavor::RoleBounds => "rolebounds",
            Flavor::UserBounds => "userbounds",
            Flavor::TypePermissive => "typepermissive",
            Flavor::Allow => "allow",
            Flavor::AuditAllow => "auditallow",
            Flavor::DontAudit => "dontaudit",
            Flavor::NeverAllow => "neverallow",
            Flavor::AllowX => "allowx",
            Flavor::AuditAllowX => "auditallowx",
            Flavor::DontAuditX => "dontauditx",
            Flavor::NeverAllowX => "neverallowx",
            Flavor::TypeTransition | Flavor::NameTypeTransition => "typetransition",
            Flavor::TypeChange => "typechange",
            Flavor::TypeMember => "typemember",
            Flavor::RangeTransition => "rangetransition",
            Flavor::RoleType => "roletype",
            Flavor::RoleAllow => "roleallow",
            Flavor::RoleTransition => "roletransition",
            Flavor::UserRole => "userrole",
            Flavor::UserLevel => "userlevel",
            Flavor::UserRange => "userrange",
            Flavor::UserPrefix => "userprefix",
            Flavor::SelinuxUser => "selinuxuser",
            Flavor::SelinuxUserDefault => "selinuxuserdefault",
            Flavor::Constrain => "constrain",
            Flavor::MlsConstrain => "mlsconstrain",
            Flavor::ValidateTrans => "validatetrans",
            Flavor::MlsValidateTrans => "mlsvalidatetrans",
            Flavor::FileCon => "filecon",
            Flavor::PortCon => "portcon",
            Flavor::NodeCon => "nodecon",
            Flavor::GenfsCon => "genfscon",
            Flavor::NetifCon => "netifcon",
            Flavor::FsUse => "fsuse",
            Flavor::IbPkeyCon => "ibpkeycon",
            Flavor::IbEndPortCon => "ibendportcon",
            Flavor::PirqCon => "pirqcon",
            Flavor::IomemCon => "iomemcon",
            Flavor::IoportCon => "ioportcon",
            Flavor::PciDeviceCon => "pcidevicecon",
            Flavor::DeviceTreeCon => "devicetreecon",
            Flavor::DefaultUser => "defaultuser",
            Flavor::DefaultRole => "defaultrole",
            Flavor::DefaultType => "defaulttype",
            Flavor::DefaultRange => "defaultrange",
        }
    }

    /// Alias kinds together with the concrete kind they stand for.
    #[must_use]
    pub fn alias_target(self) -> Option<Flavor> {
        match self {
            Flavor::TypeAlias => Some(Flavor::Type),
            Flavor::SensitivityAlias => Some(Flavor::Sensitivity),
            Flavor::CategoryAlias => Some(Flavor::Category),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_alias(self) -> bool {
        self.alias_target().is_some()
    }

    #[must_use]
    pub fn is_attribute(self) -> bool {
        matches!(
            self,
            Flavor::TypeAttribute | Flavor::RoleAttribute | Flavor::UserAttribute
        )
    }
}

impl Display for Flavor {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Reference to a declaration by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameRef {
    pub name: String,
    pub datum: Option<DatumId>,
}

impl NameRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datum: None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.datum.is_some()
    }

    /// Same name, binding dropped.
    #[must_use]
    pub fn unresolved(&self) -> Self {
        NameRef::new(self.name.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprOperator {
    And,
    Or,
    Xor,
    Not,
    All,
    Eq,
    Neq,
    Dom,
    Domby,
    Incomp,
    Range,
}

impl ExprOperator {
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "and" => ExprOperator::And,
            "or" => ExprOperator::Or,
            "xor" => ExprOperator::Xor,
            "not" => ExprOperator::Not,
            "all" => ExprOperator::All,
            "eq" => ExprOperator::Eq,
            "neq" => ExprOperator::Neq,
            "dom" => ExprOperator::Dom,
            "domby" => ExprOperator::Domby,
            "incomp" => ExprOperator::Incomp,
            "range" => ExprOperator::Range,
            _ => return None,
        })
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ExprOperator::And => "and",
            ExprOperator::Or => "or",
            ExprOperator::Xor => "xor",
            ExprOperator::Not => "not",
            ExprOperator::All => "all",
            ExprOperator::Eq => "eq",
            ExprOperator::Neq => "neq",
            ExprOperator::Dom => "dom",
            ExprOperator::Domby => "domby",
            ExprOperator::Incomp => "incomp",
            ExprOperator::Range => "range",
        }
    }
}

/// Left-hand operands of constraint comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintOperand {
    U1,
    U2,
    U3,
    R1,
    R2,
    R3,
    T1,
    T2,
    T3,
    L1,
    L2,
    H1,
    H2,
}

impl ConstraintOperand {
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "u1" => ConstraintOperand::U1,
            "u2" => ConstraintOperand::U2,
            "u3" => ConstraintOperand::U3,
            "r1" => ConstraintOperand::R1,
            "r2" => ConstraintOperand::R2,
            "r3" => ConstraintOperand::R3,
            "t1" => ConstraintOperand::T1,
            "t2" => ConstraintOperand::T2,
            "t3" => ConstraintOperand::T3,
            "l1" => ConstraintOperand::L1,
            "l2" => ConstraintOperand::L2,
            "h1" => ConstraintOperand::H1,
            "h2" => ConstraintOperand::H2,
            _ => return None,
        })
    }

    /// The kind of names compared against this operand, if any.
    #[must_use]
    pub fn compared_flavor(self) -> Option<ExprFlavor> {
        match self {
            ConstraintOperand::U1 | ConstraintOperand::U2 | ConstraintOperand::U3 => {
                Some(ExprFlavor::User)
            }
            ConstraintOperand::R1 | ConstraintOperand::R2 | ConstraintOperand::R3 => {
                Some(ExprFlavor::Role)
            }
            ConstraintOperand::T1 | ConstraintOperand::T2 | ConstraintOperand::T3 => {
                Some(ExprFlavor::Type)
            }
            _ => None,
        }
    }
}

/// What the names of an expression refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprFlavor {
    Type,
    Role,
    User,
    Boolean,
    Tunable,
    Category,
    Permission,
    /// Constraint structure; names only appear in typed leaves.
    Constraint,
    /// Raw values that are never looked up (permissionx ranges).
    Literal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprItem {
    Name(NameRef),
    Operand(ConstraintOperand),
    List(Expr),
}

/// Prefix expression as written: optional operator followed by operands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub flavor: ExprFlavor,
    pub operator: Option<ExprOperator>,
    pub items: Vec<ExprItem>,
}

impl Expr {
    #[must_use]
    pub fn new(flavor: ExprFlavor) -> Self {
        Self {
            flavor,
            operator: None,
            items: Vec::new(),
        }
    }

    /// Expression over plain names, without an operator.
    #[must_use]
    pub fn from_names<I, S>(flavor: ExprFlavor, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flavor,
            operator: None,
            items: names
                .into_iter()
                .map(|n| ExprItem::Name(NameRef::new(n)))
                .collect(),
        }
    }

    /// Deep copy with every binding dropped.
    #[must_use]
    pub fn unresolved(&self) -> Self {
        Self {
            flavor: self.flavor,
            operator: self.operator,
            items: self
                .items
                .iter()
                .map(|item| match item {
                    ExprItem::Name(n) => ExprItem::Name(n.unresolved()),
                    ExprItem::Operand(o) => ExprItem::Operand(*o),
                    ExprItem::List(l) => ExprItem::List(l.unresolved()),
                })
                .collect(),
        }
    }

    /// All names of the expression, depth first.
    #[must_use]
    pub fn names(&self) -> Vec<&NameRef> {
        let mut out = Vec::new();
        for item in &self.items {
            match item {
                ExprItem::Name(n) => out.push(n),
                ExprItem::List(l) => out.extend(l.names()),
                ExprItem::Operand(_) => {}
            }
        }
        out
    }
}

/// A sensitivity with an optional category set: `(s0 (c0 c1))`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSpec {
    pub sensitivity: NameRef,
    pub categories: Option<Expr>,
}

impl LevelSpec {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        Self {
            sensitivity: self.sensitivity.unresolved(),
            categories: self.categories.as_ref().map(Expr::unresolved),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelRef {
    Named(NameRef),
    Anonymous(Box<LevelSpec>),
}

impl LevelRef {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        match self {
            LevelRef::Named(n) => LevelRef::Named(n.unresolved()),
            LevelRef::Anonymous(l) => LevelRef::Anonymous(Box::new(l.unresolved())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelRangeSpec {
    pub low: LevelRef,
    pub high: LevelRef,
}

impl LevelRangeSpec {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        Self {
            low: self.low.unresolved(),
            high: self.high.unresolved(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelRangeRef {
    Named(NameRef),
    Anonymous(Box<LevelRangeSpec>),
}

impl LevelRangeRef {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        match self {
            LevelRangeRef::Named(n) => LevelRangeRef::Named(n.unresolved()),
            LevelRangeRef::Anonymous(r) => LevelRangeRef::Anonymous(Box::new(r.unresolved())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextSpec {
    pub user: NameRef,
    pub role: NameRef,
    pub type_: NameRef,
    pub range: LevelRangeRef,
}

impl ContextSpec {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        Self {
            user: self.user.unresolved(),
            role: self.role.unresolved(),
            type_: self.type_.unresolved(),
            range: self.range.unresolved(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextRef {
    Named(NameRef),
    Anonymous(Box<ContextSpec>),
}

impl ContextRef {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        match self {
            ContextRef::Named(n) => ContextRef::Named(n.unresolved()),
            ContextRef::Anonymous(c) => ContextRef::Anonymous(Box::new(c.unresolved())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IpAddrRef {
    Named(NameRef),
    Literal(IpAddr),
}

impl IpAddrRef {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        match self {
            IpAddrRef::Named(n) => IpAddrRef::Named(n.unresolved()),
            IpAddrRef::Literal(a) => IpAddrRef::Literal(*a),
        }
    }
}

/// `(ioctl file (range 0x1000 0x10ff))`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermXSpec {
    pub kind: String,
    pub class: NameRef,
    pub values: Expr,
}

impl PermXSpec {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            class: self.class.unresolved(),
            values: self.values.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermXRef {
    Named(NameRef),
    Anonymous(Box<PermXSpec>),
}

impl PermXRef {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        match self {
            PermXRef::Named(n) => PermXRef::Named(n.unresolved()),
            PermXRef::Anonymous(p) => PermXRef::Anonymous(Box::new(p.unresolved())),
        }
    }
}

/// One element of a class permissions list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassPerms {
    /// `(file (read write))`
    Perms { class: NameRef, perms: Expr },
    /// Reference to a `classpermission`.
    Set(NameRef),
}

impl ClassPerms {
    #[must_use]
    pub fn unresolved(&self) -> Self {
        match self {
            ClassPerms::Perms { class, perms } => ClassPerms::Perms {
                class: class.unresolved(),
                perms: perms.unresolved(),
            },
            ClassPerms::Set(n) => ClassPerms::Set(n.unresolved()),
        }
    }
}

#[must_use]
pub fn unresolved_classperms(list: &[ClassPerms]) -> Vec<ClassPerms> {
    list.iter().map(ClassPerms::unresolved).collect()
}

/// Declared kind of a macro parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamFlavor {
    Type,
    Role,
    User,
    Sensitivity,
    Category,
    CategorySet,
    Level,
    LevelRange,
    Class,
    ClassMap,
    ClassPermission,
    IpAddr,
    Boolean,
    Name,
}

impl ParamFlavor {
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "type" => ParamFlavor::Type,
            "role" => ParamFlavor::Role,
            "user" => ParamFlavor::User,
            "sensitivity" => ParamFlavor::Sensitivity,
            "category" => ParamFlavor::Category,
            "categoryset" => ParamFlavor::CategorySet,
            "level" => ParamFlavor::Level,
            "levelrange" => ParamFlavor::LevelRange,
            "class" => ParamFlavor::Class,
            "classmap" => ParamFlavor::ClassMap,
            "classpermission" => ParamFlavor::ClassPermission,
            "ipaddr" => ParamFlavor::IpAddr,
            "boolean" => ParamFlavor::Boolean,
            "string" | "name" => ParamFlavor::Name,
            _ => return None,
        })
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ParamFlavor::Type => "type",
            ParamFlavor::Role => "role",
            ParamFlavor::User => "user",
            ParamFlavor::Sensitivity => "sensitivity",
            ParamFlavor::Category => "category",
            ParamFlavor::CategorySet => "categoryset",
            ParamFlavor::Level => "level",
            ParamFlavor::LevelRange => "levelrange",
            ParamFlavor::Class => "class",
            ParamFlavor::ClassMap => "classmap",
            ParamFlavor::ClassPermission => "classpermission",
            ParamFlavor::IpAddr => "ipaddr",
            ParamFlavor::Boolean => "boolean",
            ParamFlavor::Name => "string",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroParam {
    pub flavor: ParamFlavor,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<MacroParam>,
}

/// Value bound to a macro parameter by a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgValue {
    Named(NameRef),
    /// Inline value materialized as a detached node owned by the call.
    Anonymous(DatumId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallArg {
    pub param: String,
    pub flavor: ParamFlavor,
    pub value: ArgValue,
}

impl CallArg {
    #[must_use]
    pub fn datum(&self) -> Option<DatumId> {
        match &self.value {
            ArgValue::Named(n) => n.datum,
            ArgValue::Anonymous(d) => Some(*d),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub macro_ref: NameRef,
    /// Arguments as written; interpreted once the macro is known.
    pub args: Vec<ParseNode>,
    pub bindings: Vec<CallArg>,
    pub copied: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct In {
    pub is_after: bool,
    pub target: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conditional {
    pub condition: Expr,
    /// A `tunableif` kept as a `booleanif`.
    pub preserved_tunable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueDecl {
    pub name: String,
    pub value: bool,
}

/// Declaration that carries nothing but its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub flavor: Flavor,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasActual {
    pub flavor: Flavor,
    pub alias: NameRef,
    pub actual: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub flavor: Flavor,
    /// `classorder (unordered ...)`
    pub unordered: bool,
    pub items: Vec<NameRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategorySet {
    pub name: String,
    pub categories: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensitivityCategory {
    pub sensitivity: NameRef,
    pub categories: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassCommon {
    pub class: NameRef,
    pub common: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassPermissionSet {
    pub set: NameRef,
    pub classperms: Vec<ClassPerms>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMapping {
    pub map_class: NameRef,
    pub map_perm: NameRef,
    pub classperms: Vec<ClassPerms>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelDecl {
    pub name: String,
    pub level: LevelSpec,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelRangeDecl {
    pub name: String,
    pub range: LevelRangeSpec,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextDecl {
    pub name: String,
    pub context: ContextSpec,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpAddrDecl {
    pub name: String,
    pub addr: IpAddr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionXDecl {
    pub name: String,
    pub permx: PermXSpec,
}

/// Anonymous class permission list carried by a detached call argument node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassPermissionValue {
    pub classperms: Vec<ClassPerms>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSet {
    pub flavor: Flavor,
    pub attribute: NameRef,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandTypeAttribute {
    pub attributes: Vec<NameRef>,
    pub expand: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub flavor: Flavor,
    pub parent: NameRef,
    pub child: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AvPerms {
    ClassPerms(Vec<ClassPerms>),
    PermX(PermXRef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvRule {
    pub flavor: Flavor,
    pub source: NameRef,
    pub target: NameRef,
    pub perms: AvPerms,
}

impl AvRule {
    #[must_use]
    pub fn is_neverallow(&self) -> bool {
        matches!(self.flavor, Flavor::NeverAllow | Flavor::NeverAllowX)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRule {
    pub flavor: Flavor,
    pub source: NameRef,
    pub target: NameRef,
    pub class: NameRef,
    pub result: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameTypeTransition {
    pub source: NameRef,
    pub target: NameRef,
    pub class: NameRef,
    pub name: NameRef,
    pub result: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeTransition {
    pub source: NameRef,
    pub exec: NameRef,
    pub class: NameRef,
    pub range: LevelRangeRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleType {
    pub role: NameRef,
    pub type_: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleAllow {
    pub source: NameRef,
    pub target: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleTransition {
    pub source: NameRef,
    pub target: NameRef,
    pub class: NameRef,
    pub result: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRole {
    pub user: NameRef,
    pub role: NameRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserLevel {
    pub user: NameRef,
    pub level: LevelRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRange {
    pub user: NameRef,
    pub range: LevelRangeRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserPrefix {
    pub user: NameRef,
    pub prefix: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelinuxUser {
    /// Login name; `None` for `selinuxuserdefault`.
    pub login: Option<String>,
    pub user: NameRef,
    pub range: LevelRangeRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constrain {
    pub flavor: Flavor,
    pub classperms: Vec<ClassPerms>,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidateTrans {
    pub flavor: Flavor,
    pub class: NameRef,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidContext {
    pub sid: NameRef,
    pub context: ContextRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileCon {
    pub path: String,
    pub file_type: String,
    /// `()` in the source means "no context".
    pub context: Option<ContextRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortCon {
    pub protocol: String,
    pub ports: String,
    pub context: ContextRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeCon {
    pub addr: IpAddrRef,
    pub mask: IpAddrRef,
    pub context: ContextRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenfsCon {
    pub fs: String,
    pub path: String,
    pub file_type: Option<String>,
    pub context: ContextRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetifCon {
    pub interface: String,
    pub if_context: ContextRef,
    pub packet_context: ContextRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsUse {
    pub kind: String,
    pub fs: String,
    pub context: ContextRef,
}

/// Labeling statements that only carry literal arguments and a context:
/// `pirqcon`, `iomemcon`, `ioportcon`, `pcidevicecon`, `devicetreecon`,
/// `ibpkeycon`, `ibendportcon`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCon {
    pub flavor: Flavor,
    pub args: Vec<String>,
    pub context: ContextRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultRule {
    pub flavor: Flavor,
    pub classes: Vec<NameRef>,
    pub object: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultRangeRule {
    pub classes: Vec<NameRef>,
    pub object: String,
    pub range: Option<String>,
}

/// Payload of an arena node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Root,
    Block(String),
    BlockAbstract(NameRef),
    BlockInherit(NameRef),
    In(In),
    Macro(Macro),
    Call(Call),
    Optional(String),
    TunableIf(Conditional),
    BooleanIf(Conditional),
    CondBlock(bool),
    Tunable(ValueDecl),
    Boolean(ValueDecl),
    Declaration(Declaration),
    AliasActual(AliasActual),
    Order(Order),
    CategorySet(CategorySet),
    SensitivityCategory(SensitivityCategory),
    ClassCommon(ClassCommon),
    ClassPermissionSet(ClassPermissionSet),
    ClassMapping(ClassMapping),
    ClassPermissionValue(ClassPermissionValue),
    Level(LevelDecl),
    LevelRange(LevelRangeDecl),
    Context(ContextDecl),
    IpAddr(IpAddrDecl),
    PermissionX(PermissionXDecl),
    AttributeSet(AttributeSet),
    ExpandTypeAttribute(ExpandTypeAttribute),
    Bounds(Bounds),
    TypePermissive(NameRef),
    AvRule(AvRule),
    TypeRule(TypeRule),
    NameTypeTransition(NameTypeTransition),
    RangeTransition(RangeTransition),
    RoleType(RoleType),
    RoleAllow(RoleAllow),
    RoleTransition(RoleTransition),
    UserRole(UserRole),
    UserLevel(UserLevel),
    UserRange(UserRange),
    UserPrefix(UserPrefix),
    SelinuxUser(SelinuxUser),
    Constrain(Constrain),
    ValidateTrans(ValidateTrans),
    SidContext(SidContext),
    FileCon(FileCon),
    PortCon(PortCon),
    NodeCon(NodeCon),
    GenfsCon(GenfsCon),
    NetifCon(NetifCon),
    FsUse(FsUse),
    DeviceCon(DeviceCon),
    Default(DefaultRule),
    DefaultRange(DefaultRangeRule),
}

impl Statement {
    #[must_use]
    pub fn flavor(&self) -> Flavor {
        match self {
            Statement::Root => Flavor::Root,
            Statement::Block(_) => Flavor::Block,
            Statement::BlockAbstract(_) => Flavor::BlockAbstract,
            Statement::BlockInherit(_) => Flavor::BlockInherit,
            Statement::In(_) => Flavor::In,
            Statement::Macro(_) => Flavor::Macro,
            Statement::Call(_) => Flavor::Call,
            Statement::Optional(_) => Flavor::Optional,
            Statement::TunableIf(_) => Flavor::TunableIf,
            Statement::BooleanIf(_) => Flavor::BooleanIf,
            Statement::CondBlock(_) => Flavor::CondBlock,
            Statement::Tunable(_) => Flavor::Tunable,
            Statement::Boolean(_) => Flavor::Boolean,
            Statement::Declaration(d) => d.flavor,
            Statement::AliasActual(a) => a.flavor,
            Statement::Order(o) => o.flavor,
            Statement::CategorySet(_) => Flavor::CategorySet,
            Statement::SensitivityCategory(_) => Flavor::SensitivityCategory,
            Statement::ClassCommon(_) => Flavor::ClassCommon,
            Statement::ClassPermissionSet(_) => Flavor::ClassPermissionSet,
            Statement::ClassMapping(_) => Flavor::ClassMapping,
            Statement::ClassPermissionValue(_) => Flavor::ClassPermission,
            Statement::Level(_) => Flavor::Level,
            Statement::LevelRange(_) => Flavor::LevelRange,
            Statement::Context(_) => Flavor::Context,
            Statement::IpAddr(_) => Flavor::IpAddr,
            Statement::PermissionX(_) => Flavor::PermissionX,
            Statement::AttributeSet(a) => a.flavor,
            Statement::ExpandTypeAttribute(_) => Flavor::ExpandTypeAttribute,
            Statement::Bounds(b) => b.flavor,
            Statement::TypePermissive(_) => Flavor::TypePermissive,
            Statement::AvRule(r) => r.flavor,
            Statement::TypeRule(r) => r.flavor,
            Statement::NameTypeTransition(_) => Flavor::NameTypeTransition,
            Statement::RangeTransition(_) => Flavor::RangeTransition,
            Statement::RoleType(_) => Flavor::RoleType,
            Statement::RoleAllow(_) => Flavor::RoleAllow,
            Statement::RoleTransition(_) => Flavor::RoleTransition,
            Statement::UserRole(_) => Flavor::UserRole,
            Statement::UserLevel(_) => Flavor::UserLevel,
            Statement::UserRange(_) => Flavor::UserRange,
            Statement::UserPrefix(_) => Flavor::UserPrefix,
            Statement::SelinuxUser(s) => {
                if s.login.is_some() {
                    Flavor::SelinuxUser
                } else {
                    Flavor::SelinuxUserDefault
                }
            }
            Statement::Constrain(c) => c.flavor,
            Statement::ValidateTrans(v) => v.flavor,
            Statement::SidContext(_) => Flavor::SidContext,
            Statement::FileCon(_) => Flavor::FileCon,
            Statement::PortCon(_) => Flavor::PortCon,
            Statement::NodeCon(_) => Flavor::NodeCon,
            Statement::GenfsCon(_) => Flavor::GenfsCon,
            Statement::NetifCon(_) => Flavor::NetifCon,
            Statement::FsUse(_) => Flavor::FsUse,
            Statement::DeviceCon(d) => d.flavor,
            Statement::Default(d) => d.flavor,
            Statement::DefaultRange(_) => Flavor::DefaultRange,
        }
    }

    /// Name introduced by this statement, if it is a declaration.
    #[must_use]
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Statement::Block(name) | Statement::Optional(name) => Some(name),
            Statement::Macro(m) => Some(&m.name),
            Statement::Tunable(v) | Statement::Boolean(v) => Some(&v.name),
            Statement::Declaration(d) => Some(&d.name),
            Statement::CategorySet(c) => Some(&c.name),
            Statement::Level(l) => Some(&l.name),
            Statement::LevelRange(l) => Some(&l.name),
            Statement::Context(c) => Some(&c.name),
            Statement::IpAddr(i) => Some(&i.name),
            Statement::PermissionX(p) => Some(&p.name),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.declared_name().is_some()
    }
}

/// A statement together with its identity and source position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub location: Location,
    pub statement: Statement,
}

impl Node {
    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.statement.flavor()
    }
}
