//! Mutable access to every [`NameRef`] a payload carries.
//!
//! The resolver uses this to drop bindings wholesale when a statement is
//! copied or when resolution restarts.

use crate::nodes::{
    ArgValue, AvPerms, ClassPerms, ContextRef, ContextSpec, Expr, ExprItem, IpAddrRef,
    LevelRangeRef, LevelRangeSpec, LevelRef, LevelSpec, NameRef, PermXRef, PermXSpec, Statement,
};

fn expr<'a>(e: &'a mut Expr, out: &mut Vec<&'a mut NameRef>) {
    for item in &mut e.items {
        match item {
            ExprItem::Name(n) => out.push(n),
            ExprItem::List(inner) => expr(inner, out),
            ExprItem::Operand(_) => {}
        }
    }
}

fn level<'a>(l: &'a mut LevelSpec, out: &mut Vec<&'a mut NameRef>) {
    out.push(&mut l.sensitivity);
    if let Some(cats) = &mut l.categories {
        expr(cats, out);
    }
}

fn level_ref<'a>(l: &'a mut LevelRef, out: &mut Vec<&'a mut NameRef>) {
    match l {
        LevelRef::Named(n) => out.push(n),
        LevelRef::Anonymous(spec) => level(spec, out),
    }
}

fn range<'a>(r: &'a mut LevelRangeSpec, out: &mut Vec<&'a mut NameRef>) {
    level_ref(&mut r.low, out);
    level_ref(&mut r.high, out);
}

fn range_ref<'a>(r: &'a mut LevelRangeRef, out: &mut Vec<&'a mut NameRef>) {
    match r {
        LevelRangeRef::Named(n) => out.push(n),
        LevelRangeRef::Anonymous(spec) => range(spec, out),
    }
}

fn context<'a>(c: &'a mut ContextSpec, out: &mut Vec<&'a mut NameRef>) {
    out.push(&mut c.user);
    out.push(&mut c.role);
    out.push(&mut c.type_);
    range_ref(&mut c.range, out);
}

fn context_ref<'a>(c: &'a mut ContextRef, out: &mut Vec<&'a mut NameRef>) {
    match c {
        ContextRef::Named(n) => out.push(n),
        ContextRef::Anonymous(spec) => context(spec, out),
    }
}

fn ipaddr_ref<'a>(a: &'a mut IpAddrRef, out: &mut Vec<&'a mut NameRef>) {
    if let IpAddrRef::Named(n) = a {
        out.push(n);
    }
}

fn permx<'a>(p: &'a mut PermXSpec, out: &mut Vec<&'a mut NameRef>) {
    out.push(&mut p.class);
}

fn permx_ref<'a>(p: &'a mut PermXRef, out: &mut Vec<&'a mut NameRef>) {
    match p {
        PermXRef::Named(n) => out.push(n),
        PermXRef::Anonymous(spec) => permx(spec, out),
    }
}

fn classperms<'a>(list: &'a mut [ClassPerms], out: &mut Vec<&'a mut NameRef>) {
    for cp in list {
        match cp {
            ClassPerms::Perms { class, perms } => {
                out.push(class);
                expr(perms, out);
            }
            ClassPerms::Set(n) => out.push(n),
        }
    }
}

impl Statement {
    /// Every name reference of the payload, in source order.
    ///
    /// For a `call` this is the macro name followed by the named argument
    /// bindings.
    pub fn name_refs_mut(&mut self) -> Vec<&mut NameRef> {
        let mut out = Vec::new();
        match self {
            Statement::Root
            | Statement::Block(_)
            | Statement::In(_)
            | Statement::Macro(_)
            | Statement::Optional(_)
            | Statement::CondBlock(_)
            | Statement::Tunable(_)
            | Statement::Boolean(_)
            | Statement::Declaration(_)
            | Statement::IpAddr(_) => {}
            Statement::BlockAbstract(n) | Statement::BlockInherit(n) | Statement::TypePermissive(n) => {
                out.push(n);
            }
            Statement::Call(call) => {
                out.push(&mut call.macro_ref);
                for arg in &mut call.bindings {
                    if let ArgValue::Named(n) = &mut arg.value {
                        out.push(n);
                    }
                }
            }
            Statement::TunableIf(c) | Statement::BooleanIf(c) => expr(&mut c.condition, &mut out),
            Statement::AliasActual(a) => {
                out.push(&mut a.alias);
                out.push(&mut a.actual);
            }
            Statement::Order(o) => out.extend(o.items.iter_mut()),
            Statement::CategorySet(c) => expr(&mut c.categories, &mut out),
            Statement::SensitivityCategory(s) => {
                out.push(&mut s.sensitivity);
                expr(&mut s.categories, &mut out);
            }
            Statement::ClassCommon(c) => {
                out.push(&mut c.class);
                out.push(&mut c.common);
            }
            Statement::ClassPermissionSet(s) => {
                out.push(&mut s.set);
                classperms(&mut s.classperms, &mut out);
            }
            Statement::ClassMapping(m) => {
                out.push(&mut m.map_class);
                out.push(&mut m.map_perm);
                classperms(&mut m.classperms, &mut out);
            }
            Statement::ClassPermissionValue(v) => classperms(&mut v.classperms, &mut out),
            Statement::Level(l) => level(&mut l.level, &mut out),
            Statement::LevelRange(r) => range(&mut r.range, &mut out),
            Statement::Context(c) => context(&mut c.context, &mut out),
            Statement::PermissionX(p) => permx(&mut p.permx, &mut out),
            Statement::AttributeSet(a) => {
                out.push(&mut a.attribute);
                expr(&mut a.expr, &mut out);
            }
            Statement::ExpandTypeAttribute(e) => out.extend(e.attributes.iter_mut()),
            Statement::Bounds(b) => {
                out.push(&mut b.parent);
                out.push(&mut b.child);
            }
            Statement::AvRule(r) => {
                out.push(&mut r.source);
                out.push(&mut r.target);
                match &mut r.perms {
                    AvPerms::ClassPerms(list) => classperms(list, &mut out),
                    AvPerms::PermX(p) => permx_ref(p, &mut out),
                }
            }
            Statement::TypeRule(r) => {
                out.push(&mut r.source);
                out.push(&mut r.target);
                out.push(&mut r.class);
                out.push(&mut r.result);
            }
            Statement::NameTypeTransition(r) => {
                out.push(&mut r.source);
                out.push(&mut r.target);
                out.push(&mut r.class);
                out.push(&mut r.name);
                out.push(&mut r.result);
            }
            Statement::RangeTransition(r) => {
                out.push(&mut r.source);
                out.push(&mut r.exec);
                out.push(&mut r.class);
                range_ref(&mut r.range, &mut out);
            }
            Statement::RoleType(r) => {
                out.push(&mut r.role);
                out.push(&mut r.type_);
            }
            Statement::RoleAllow(r) => {
                out.push(&mut r.source);
                out.push(&mut r.target);
            }
            Statement::RoleTransition(r) => {
                out.push(&mut r.source);
                out.push(&mut r.target);
                out.push(&mut r.class);
                out.push(&mut r.result);
            }
            Statement::UserRole(u) => {
                out.push(&mut u.user);
                out.push(&mut u.role);
            }
            Statement::UserLevel(u) => {
                out.push(&mut u.user);
                level_ref(&mut u.level, &mut out);
            }
            Statement::UserRange(u) => {
                out.push(&mut u.user);
                range_ref(&mut u.range, &mut out);
            }
            Statement::UserPrefix(u) => out.push(&mut u.user),
            Statement::SelinuxUser(s) => {
                out.push(&mut s.user);
                range_ref(&mut s.range, &mut out);
            }
            Statement::Constrain(c) => {
                classperms(&mut c.classperms, &mut out);
                expr(&mut c.expr, &mut out);
            }
            Statement::ValidateTrans(v) => {
                out.push(&mut v.class);
                expr(&mut v.expr, &mut out);
            }
            Statement::SidContext(s) => {
                out.push(&mut s.sid);
                context_ref(&mut s.context, &mut out);
            }
            Statement::FileCon(f) => {
                if let Some(c) = &mut f.context {
                    context_ref(c, &mut out);
                }
            }
            Statement::PortCon(p) => context_ref(&mut p.context, &mut out),
            Statement::NodeCon(n) => {
                ipaddr_ref(&mut n.addr, &mut out);
                ipaddr_ref(&mut n.mask, &mut out);
                context_ref(&mut n.context, &mut out);
            }
            Statement::GenfsCon(g) => context_ref(&mut g.context, &mut out),
            Statement::NetifCon(n) => {
                context_ref(&mut n.if_context, &mut out);
                context_ref(&mut n.packet_context, &mut out);
            }
            Statement::FsUse(f) => context_ref(&mut f.context, &mut out),
            Statement::DeviceCon(d) => context_ref(&mut d.context, &mut out),
            Statement::Default(d) => out.extend(d.classes.iter_mut()),
            Statement::DefaultRange(d) => out.extend(d.classes.iter_mut()),
        }
        out
    }

    /// Drops every binding of the payload.
    pub fn clear_bindings(&mut self) {
        for reference in self.name_refs_mut() {
            reference.datum = None;
        }
    }
}
