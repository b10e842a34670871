//! Pass driver.
//!
//! After declaration the tree is walked once per [`Pass`]. Each walk checks
//! where statements may appear and hands the statements belonging to the
//! pass to their resolver. A name that cannot be found inside an `optional`
//! disables that optional instead of failing: its contents are destroyed at
//! the end of the pass, and if they declared anything, everything resolved
//! after macro expansion is reset and resolution restarts at argument
//! binding.

use std::fmt::{self, Display, Formatter};

use cil_ast::nodes::{Flavor, NodeId, Statement};

use crate::alias::{resolve_alias_to_actual, resolve_aliasactual};
use crate::db::PolicyDb;
use crate::declare::declare_tree;
use crate::diagnostics::Severity;
use crate::errors::{ResolveError, ResolveResult};
use crate::inheritance::check_inheritance;
use crate::reset::reset_ast;
use crate::resolvers::blocks::{apply_ins, copy_blockinherit, link_blockinherit, mark_abstract_subtrees, resolve_blockabstract};
use crate::resolvers::calls::{resolve_call1, resolve_call2};
use crate::resolvers::classes::resolve_classcommon;
use crate::resolvers::mls::{resolve_catset, resolve_senscat};
use crate::resolvers::orders::{PendingOrders, gather_order, merge_orders};
use crate::resolvers::rules::resolve_rule;
use crate::resolvers::tunables::resolve_tunif;
use crate::resolvers::resolve_misc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Pass {
    Tif,
    InBefore,
    BlkinLink,
    BlkinCopy,
    BlkAbs,
    InAfter,
    Call1,
    Call2,
    Alias1,
    Alias2,
    Misc1,
    Mls,
    Misc2,
    Misc3,
}

impl Pass {
    const ALL: [Pass; 14] = [
        Pass::Tif,
        Pass::InBefore,
        Pass::BlkinLink,
        Pass::BlkinCopy,
        Pass::BlkAbs,
        Pass::InAfter,
        Pass::Call1,
        Pass::Call2,
        Pass::Alias1,
        Pass::Alias2,
        Pass::Misc1,
        Pass::Mls,
        Pass::Misc2,
        Pass::Misc3,
    ];

    fn next(self) -> Option<Pass> {
        Self::ALL.get(self as usize + 1).copied()
    }
}

impl Display for Pass {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            Pass::Tif => "tunableif",
            Pass::InBefore => "in-before",
            Pass::BlkinLink => "blockinherit-link",
            Pass::BlkinCopy => "blockinherit-copy",
            Pass::BlkAbs => "blockabstract",
            Pass::InAfter => "in-after",
            Pass::Call1 => "call",
            Pass::Call2 => "call-arguments",
            Pass::Alias1 => "aliasactual",
            Pass::Alias2 => "alias",
            Pass::Misc1 => "orders",
            Pass::Mls => "categoryset",
            Pass::Misc2 => "sensitivitycategory",
            Pass::Misc3 => "statements",
        };
        write!(f, "{name}")
    }
}

/// Innermost containers of the node being visited.
#[derive(Clone, Copy, Debug, Default)]
struct WalkContext {
    block: Option<NodeId>,
    macro_: Option<NodeId>,
    optional: Option<NodeId>,
    boolif: Option<NodeId>,
}

struct Driver<'a> {
    db: &'a mut PolicyDb,
    pass: Pass,
    changed: bool,
    disabled_optional: Option<NodeId>,
    to_destroy: Vec<NodeId>,
    ins: Vec<NodeId>,
    orders: PendingOrders,
}

/// Declares and resolves the whole tree held by `db`.
pub(crate) fn resolve_ast(db: &mut PolicyDb) -> ResolveResult<()> {
    if let Err(err) = declare_tree(db) {
        let location = err.location().clone();
        db.report(Severity::Error, Some(&location), err.to_string());
        return Err(err);
    }
    let mut driver = Driver {
        db,
        pass: Pass::Tif,
        changed: false,
        disabled_optional: None,
        to_destroy: Vec::new(),
        ins: Vec::new(),
        orders: PendingOrders::default(),
    };
    let mut pass = Pass::Tif;
    loop {
        driver.run_pass(pass)?;
        pass = if driver.end_of_pass() {
            Pass::Call2
        } else {
            match pass.next() {
                Some(next) => next,
                None => break,
            }
        };
    }
    driver.finish()
}

impl Driver<'_> {
    fn fail(&mut self, err: ResolveError) -> ResolveError {
        let location = err.location().clone();
        self.db.report(Severity::Error, Some(&location), err.to_string());
        err
    }

    fn run_pass(&mut self, pass: Pass) -> ResolveResult<()> {
        tracing::debug!(%pass, "resolving");
        self.pass = pass;
        let root = self.db.arena.root();
        self.walk(root, WalkContext::default())?;
        let finished = match pass {
            Pass::InBefore | Pass::InAfter => apply_ins(self.db, &mut self.ins),
            Pass::BlkinLink => check_inheritance(self.db),
            Pass::BlkAbs => {
                mark_abstract_subtrees(self.db);
                Ok(())
            }
            Pass::Misc1 => merge_orders(self.db, &self.orders),
            _ => Ok(()),
        };
        finished.map_err(|err| self.fail(err))
    }

    /// Destroys the optionals disabled during the pass. Returns `true` when
    /// resolution has to restart at argument binding.
    fn end_of_pass(&mut self) -> bool {
        if !self.changed {
            return false;
        }
        self.changed = false;
        let mut had_decl = false;
        for optional in std::mem::take(&mut self.to_destroy) {
            had_decl |= self.db.destroy_children(optional);
        }
        if self.pass <= Pass::Call1 || !had_decl {
            return false;
        }
        if self.pass >= Pass::Misc1 {
            self.orders.clear();
        }
        self.db.report(Severity::Info, None, "resetting declarations");
        reset_ast(self.db);
        true
    }

    fn walk(&mut self, parent: NodeId, ctx: WalkContext) -> ResolveResult<()> {
        let mut index = 0;
        while let Some(&child) = self.db.arena.children(parent).get(index) {
            index += 1;
            self.visit(child, ctx)?;
        }
        Ok(())
    }

    fn visit(&mut self, node: NodeId, ctx: WalkContext) -> ResolveResult<()> {
        let Some(flavor) = self.db.arena.flavor(node) else {
            return Ok(());
        };
        if let Err(err) = self.check_placement(node, flavor, ctx) {
            return Err(self.fail(err));
        }

        let mut inner = ctx;
        match flavor {
            Flavor::Macro if self.pass > Pass::InAfter => return Ok(()),
            Flavor::Macro => inner.macro_ = Some(node),
            Flavor::Block if self.pass > Pass::BlkAbs && self.is_abstract(node) => return Ok(()),
            Flavor::Block => inner.block = Some(node),
            Flavor::Optional => inner.optional = Some(node),
            Flavor::BooleanIf => inner.boolif = Some(node),
            _ => {}
        }

        match self.resolve_node(node, flavor, ctx) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() && ctx.optional.is_some() => self.disable(node, flavor, ctx),
            Err(err) => return Err(self.fail(err)),
        }

        self.walk(node, inner)?;

        if flavor == Flavor::Optional && self.disabled_optional == Some(node) {
            self.changed = true;
            self.to_destroy.push(node);
            self.disabled_optional = None;
        }
        Ok(())
    }

    fn is_abstract(&self, block: NodeId) -> bool {
        self.db
            .decl_of(block)
            .and_then(|b| self.db.datum(b))
            .is_some_and(|d| d.state.is_abstract)
    }

    /// Records a lookup failure inside an optional; the innermost optional
    /// of the first failure is the one disabled.
    fn disable(&mut self, node: NodeId, flavor: Flavor, ctx: WalkContext) {
        let Some(optional) = ctx.optional else {
            return;
        };
        let location = self.db.arena.location(node);
        self.db
            .report(Severity::Info, Some(&location), format!("failed to resolve {flavor} statement"));
        let disabled = *self.disabled_optional.get_or_insert(optional);
        let name = match self.db.arena.statement(disabled) {
            Some(Statement::Optional(name)) => name.clone(),
            _ => String::new(),
        };
        let location = self.db.arena.location(disabled);
        self.db
            .report(Severity::Info, Some(&location), format!("disabling optional '{name}'"));
    }

    fn check_placement(&self, node: NodeId, flavor: Flavor, ctx: WalkContext) -> ResolveResult<()> {
        let violation = |container: &str| {
            Err(ResolveError::StructuralViolation {
                statement: flavor,
                container: container.to_string(),
                location: self.db.arena.location(node),
            })
        };
        if ctx.block.is_some() && matches!(flavor, Flavor::Category | Flavor::Sensitivity) {
            return violation("blocks");
        }
        if ctx.macro_.is_some()
            && matches!(
                flavor,
                Flavor::Tunable
                    | Flavor::In
                    | Flavor::Block
                    | Flavor::BlockInherit
                    | Flavor::BlockAbstract
                    | Flavor::Macro
            )
        {
            return violation("macros");
        }
        if ctx.optional.is_some()
            && matches!(
                flavor,
                Flavor::Tunable | Flavor::In | Flavor::Block | Flavor::BlockAbstract | Flavor::Macro
            )
        {
            return violation("optionals");
        }
        let Some(boolif) = ctx.boolif else {
            return Ok(());
        };
        let allowed = match self.db.arena.statement(node) {
            Some(Statement::AvRule(rule)) => !rule.is_neverallow(),
            Some(
                Statement::TunableIf(_)
                | Statement::Call(_)
                | Statement::CondBlock(_)
                | Statement::TypeRule(_)
                | Statement::NameTypeTransition(_),
            ) => true,
            _ => false,
        };
        if allowed {
            return Ok(());
        }
        match self.db.arena.statement(boolif) {
            Some(Statement::BooleanIf(cond)) if cond.preserved_tunable => {
                violation("tunableifs treated as booleanifs")
            }
            _ => violation("booleanifs"),
        }
    }

    fn resolve_node(&mut self, node: NodeId, flavor: Flavor, ctx: WalkContext) -> ResolveResult<()> {
        let db = &mut *self.db;
        match (self.pass, flavor) {
            (Pass::Tif, Flavor::TunableIf) => resolve_tunif(db, node),
            (Pass::InBefore | Pass::InAfter, Flavor::In) => {
                let after = matches!(db.arena.statement(node), Some(Statement::In(i)) if i.is_after);
                if after == (self.pass == Pass::InAfter) {
                    self.ins.insert(0, node);
                }
                Ok(())
            }
            (Pass::BlkinLink, Flavor::BlockInherit) => link_blockinherit(db, node),
            (Pass::BlkinCopy, Flavor::Block) => copy_blockinherit(db, node),
            (Pass::BlkAbs, Flavor::BlockAbstract) => resolve_blockabstract(db, node),
            (Pass::Call1, Flavor::Call) if ctx.macro_.is_none() => resolve_call1(db, node),
            (Pass::Call2, Flavor::Call) if ctx.macro_.is_none() => resolve_call2(db, node),
            (Pass::Alias1, _) if matches!(db.arena.statement(node), Some(Statement::AliasActual(_))) => {
                resolve_aliasactual(db, node)
            }
            (Pass::Alias2, f) if f.is_alias() => resolve_alias_to_actual(db, node),
            (
                Pass::Misc1,
                Flavor::ClassOrder | Flavor::SidOrder | Flavor::CategoryOrder | Flavor::SensitivityOrder,
            ) => gather_order(db, node, &mut self.orders),
            (Pass::Misc1, Flavor::BooleanIf) => resolve_rule(db, node),
            (Pass::Mls, Flavor::CategorySet) => resolve_catset(db, node),
            (Pass::Misc2, Flavor::SensitivityCategory) => resolve_senscat(db, node),
            (Pass::Misc2, Flavor::ClassCommon) => resolve_classcommon(db, node),
            (Pass::Misc3, _) => resolve_misc(db, node),
            _ => Ok(()),
        }
    }

    /// Checks that run once the tree is fully resolved.
    fn finish(mut self) -> ResolveResult<()> {
        if self.db.orders.sids.is_empty() {
            let location = self.db.arena.location(self.db.arena.root());
            let err = ResolveError::invalid("at least one initial sid must be defined", &location);
            return Err(self.fail(err));
        }
        for sid in self.db.orders.sids.clone() {
            if self.db.datum(sid).is_some_and(|d| d.state.context.is_none()) {
                let location = self.db.datum_location(sid);
                let message = format!("no context assigned to sid '{}'", self.db.name_of(sid));
                self.db.report(Severity::Info, Some(&location), message);
            }
        }
        Ok(())
    }
}
