//! Macro calls: expansion and argument binding.
//!
//! Expansion happens first for every call so that calls made by the copied
//! bodies are expanded too. Arguments are bound in a later pass, once every
//! body is in place.

use cil_ast::builder::{parse_categories, parse_classperms, parse_ipaddr, parse_level, parse_levelrange};
use cil_ast::errors::BuildError;
use cil_ast::nodes::{
    ArgValue, CallArg, CategorySet, ClassPermissionValue, DatumId, IpAddrDecl, LevelDecl, LevelRangeDecl, Macro,
    NameRef, NodeId, ParamFlavor, Statement,
};
use cil_ast::parser::ParseNode;

use crate::copy_ast::copy_children;
use crate::datum::Datum;
use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::{bind, resolve_name};
use crate::resolvers::classes::resolve_classperms;
use crate::resolvers::expr::resolve_expr;
use crate::resolvers::mls::{resolve_level_spec, resolve_range_spec};
use crate::symtab::SymIndex;

/// Expands a call: binds its macro, builds the argument bindings and copies
/// the macro body under the call.
pub(crate) fn resolve_call1(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::Call(mut call)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    if call.copied {
        return Ok(());
    }
    let location = db.arena.location(node);
    let macro_datum = bind(db, node, &mut call.macro_ref, SymIndex::Blocks)?;
    let macro_node = db.datum(macro_datum).and_then(Datum::first_node);
    let Some((macro_node, Some(Statement::Macro(definition)))) =
        macro_node.map(|n| (n, db.arena.statement(n).cloned()))
    else {
        return Err(ResolveError::invalid(
            format!("failed to resolve {} to a macro", call.macro_ref.name),
            &location,
        ));
    };

    check_recursion(db, node, macro_datum, macro_node)?;
    call.bindings = build_bindings(db, node, &definition, &call.args)?;
    call.copied = true;
    db.arena.set_statement(node, Statement::Call(call));
    copy_children(db, macro_node, node)
}

/// A call nested, through expansion, in a call of the same macro or in that
/// macro's own body is recursive.
fn check_recursion(db: &PolicyDb, node: NodeId, macro_datum: DatumId, macro_node: NodeId) -> ResolveResult<()> {
    let mut chain = vec![db.name_of(macro_datum).to_string()];
    let mut recursive = false;
    for ancestor in db.arena.ancestors(node) {
        match db.arena.statement(ancestor) {
            Some(Statement::Call(outer)) => {
                chain.push(outer.macro_ref.name.clone());
                if outer.macro_ref.datum == Some(macro_datum) {
                    recursive = true;
                    break;
                }
            }
            Some(Statement::Macro(_)) if ancestor == macro_node => {
                chain.push(db.name_of(macro_datum).to_string());
                recursive = true;
                break;
            }
            Some(Statement::Macro(_)) => return Ok(()),
            _ => {}
        }
    }
    if !recursive {
        return Ok(());
    }
    chain.reverse();
    Err(ResolveError::CycleDetected {
        kind: "macro call",
        chain,
        location: db.arena.location(node),
    })
}

fn build_bindings(db: &mut PolicyDb, node: NodeId, definition: &Macro, args: &[ParseNode]) -> ResolveResult<Vec<CallArg>> {
    let location = db.arena.location(node);
    if args.len() > definition.params.len() {
        return Err(ResolveError::invalid("unexpected arguments", &location));
    }
    if args.len() < definition.params.len() {
        return Err(ResolveError::invalid("missing arguments", &location));
    }
    let mut bindings = Vec::with_capacity(args.len());
    for (param, arg) in definition.params.iter().zip(args) {
        match bind_argument(db, node, param.flavor, arg) {
            Ok(value) => bindings.push(CallArg {
                param: param.name.clone(),
                flavor: param.flavor,
                value,
            }),
            Err(err) => {
                for done in &bindings {
                    if let ArgValue::Anonymous(anon) = done.value {
                        db.free_anonymous(anon);
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(bindings)
}

fn bind_argument(db: &mut PolicyDb, node: NodeId, flavor: ParamFlavor, arg: &ParseNode) -> ResolveResult<ArgValue> {
    let location = arg.location().clone();
    let anonymous = |db: &mut PolicyDb, statement: Result<Statement, BuildError>| {
        statement
            .map(|s| ArgValue::Anonymous(db.alloc_anonymous(location.clone(), s)))
            .map_err(|e| ResolveError::invalid(e.to_string(), &location))
    };
    match (flavor, arg) {
        (ParamFlavor::CategorySet, ParseNode::List { .. }) => anonymous(
            db,
            parse_categories(arg).map(|categories| {
                Statement::CategorySet(CategorySet {
                    name: String::new(),
                    categories,
                })
            }),
        ),
        (ParamFlavor::Level, ParseNode::List { .. }) => anonymous(
            db,
            parse_level(arg).map(|level| {
                Statement::Level(LevelDecl {
                    name: String::new(),
                    level,
                })
            }),
        ),
        (ParamFlavor::LevelRange, ParseNode::List { .. }) => anonymous(
            db,
            parse_levelrange(arg).map(|range| {
                Statement::LevelRange(LevelRangeDecl {
                    name: String::new(),
                    range,
                })
            }),
        ),
        (ParamFlavor::ClassPermission, ParseNode::List { .. }) => anonymous(
            db,
            parse_classperms(arg).map(|classperms| Statement::ClassPermissionValue(ClassPermissionValue { classperms })),
        ),
        (ParamFlavor::IpAddr, ParseNode::Atom { value, .. }) if value.contains(['.', ':']) => anonymous(
            db,
            parse_ipaddr(arg).map(|addr| {
                Statement::IpAddr(IpAddrDecl {
                    name: String::new(),
                    addr,
                })
            }),
        ),
        (ParamFlavor::Name, ParseNode::Atom { value, .. }) => {
            let mut name = NameRef::new(value.clone());
            if !enclosing_name_param(db, node, value) {
                name.datum = Some(db.insert_name(value));
            }
            Ok(ArgValue::Named(name))
        }
        (_, ParseNode::Atom { value, .. }) => Ok(ArgValue::Named(NameRef::new(value.clone()))),
        (_, ParseNode::List { .. }) => Err(ResolveError::invalid("invalid macro parameter", &location)),
    }
}

/// Whether `name` is a name parameter of the macro the call sits in, either
/// directly or through an enclosing expansion.
fn enclosing_name_param(db: &PolicyDb, node: NodeId, name: &str) -> bool {
    let enclosing = db.arena.ancestors(node).find_map(|a| match db.arena.statement(a) {
        Some(Statement::Macro(m)) => Some(m.clone()),
        Some(Statement::Call(c)) => c
            .macro_ref
            .datum
            .and_then(|m| db.datum(m))
            .and_then(Datum::first_node)
            .and_then(|n| match db.arena.statement(n) {
                Some(Statement::Macro(m)) => Some(m.clone()),
                _ => None,
            }),
        _ => None,
    });
    enclosing.is_some_and(|m| {
        m.params
            .iter()
            .any(|p| p.flavor == ParamFlavor::Name && p.name == name)
    })
}

/// Binds the arguments of an expanded call, from the caller's side.
pub(crate) fn resolve_call2(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::Call(mut call)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    for arg in &mut call.bindings {
        match &mut arg.value {
            ArgValue::Named(name) if name.datum.is_none() => {
                let sym = SymIndex::for_param(arg.flavor);
                name.datum = Some(resolve_outside(db, node, &name.name, sym)?);
            }
            ArgValue::Anonymous(anon) => resolve_anonymous(db, node, *anon)?,
            ArgValue::Named(_) => {}
        }
    }
    db.arena.set_statement(node, Statement::Call(call));
    Ok(())
}

/// Resolves an argument name, ignoring declarations made by the call's own
/// expansion.
fn resolve_outside(db: &mut PolicyDb, call: NodeId, name: &str, sym: SymIndex) -> ResolveResult<DatumId> {
    let found = resolve_name(db, call, name, sym)?;
    let Some(datum) = db.datum(found) else {
        return Ok(found);
    };
    let inside = datum.first_node().is_some_and(|n| db.arena.is_within(n, call));
    let Some((scope, table)) = datum.scope.filter(|_| inside) else {
        return Ok(found);
    };
    let key = datum.name.clone();
    db.symtabs.remove(scope, table, &key);
    let outside = resolve_name(db, call, name, sym);
    db.symtabs.insert(scope, table, &key, found);
    outside
}

/// Binds the names inside an inline argument as seen from the call.
fn resolve_anonymous(db: &mut PolicyDb, call: NodeId, anon: DatumId) -> ResolveResult<()> {
    let Some(anon_node) = db.anonymous_node(anon) else {
        return Ok(());
    };
    let Some(mut statement) = db.arena.statement(anon_node).cloned() else {
        return Ok(());
    };
    match &mut statement {
        Statement::CategorySet(set) => resolve_expr(db, call, &mut set.categories)?,
        Statement::Level(decl) => resolve_level_spec(db, call, &mut decl.level)?,
        Statement::LevelRange(decl) => resolve_range_spec(db, call, &mut decl.range)?,
        Statement::ClassPermissionValue(value) => resolve_classperms(db, call, &mut value.classperms)?,
        _ => return Ok(()),
    }
    db.arena.set_statement(anon_node, statement);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_tree;
    use crate::options::ResolverOptions;
    use crate::resolvers::rules::resolve_rule;
    use crate::symtab::ScopeKey;
    use cil_ast::builder::Builder;
    use cil_ast::nodes::Flavor;

    fn declared(source: &str) -> PolicyDb {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", source);
        let mut db = PolicyDb::new(builder.build_ast().unwrap(), ResolverOptions::default());
        declare_tree(&mut db).unwrap();
        db
    }

    fn calls(db: &PolicyDb) -> Vec<NodeId> {
        db.arena().find_nodes(|s| s.flavor() == Flavor::Call)
    }

    /// Expands and binds every call outside of macro bodies.
    fn expand(db: &mut PolicyDb) -> ResolveResult<()> {
        let outside = |db: &PolicyDb, n: NodeId| {
            !db.arena()
                .ancestors(n)
                .any(|a| db.arena().flavor(a) == Some(Flavor::Macro))
        };
        for node in calls(db) {
            if outside(db, node) {
                resolve_call1(db, node)?;
            }
        }
        for node in calls(db) {
            if outside(db, node) {
                resolve_call2(db, node)?;
            }
        }
        Ok(())
    }

    #[test]
    fn expanded_body_binds_the_argument() {
        let mut db = declared(
            "(class file (read)) (type foo_t) (type trans_t) \
             (macro m ((type t)) (typetransition t self file trans_t)) (call m (foo_t))",
        );
        expand(&mut db).unwrap();
        let call = calls(&db)[0];
        let copied = db.arena().children(call)[0];
        resolve_rule(&mut db, copied).unwrap();
        let Some(Statement::TypeRule(rule)) = db.arena().statement(copied) else {
            panic!("expected the copied typetransition");
        };
        assert_eq!(rule.source.datum, db.lookup(ScopeKey::Root, SymIndex::Types, "foo_t"));
        assert_eq!(rule.target.datum, Some(db.self_type()));
    }

    #[test]
    fn argument_count_must_match() {
        let mut db = declared("(macro m ((type t))) (call m)");
        let err = expand(&mut db).unwrap_err();
        assert!(err.to_string().ends_with("missing arguments"), "{err}");

        let mut db = declared("(macro m ()) (call m (a b))");
        let err = expand(&mut db).unwrap_err();
        assert!(err.to_string().ends_with("unexpected arguments"), "{err}");
    }

    #[test]
    fn non_macro_target() {
        let mut db = declared("(block b) (call b)");
        let err = expand(&mut db).unwrap_err();
        assert!(err.to_string().contains("failed to resolve b to a macro"), "{err}");
    }

    #[test]
    fn recursive_calls_are_detected() {
        let mut db = declared("(macro m () (call m)) (call m)");
        let top = calls(&db)
            .into_iter()
            .find(|n| db.arena().parent(*n) == Some(db.arena().root()))
            .unwrap();
        resolve_call1(&mut db, top).unwrap();
        let inner = db.arena().children(top)[0];
        let err = resolve_call1(&mut db, inner).unwrap_err();
        assert!(matches!(err, ResolveError::CycleDetected { kind: "macro call", .. }), "{err}");
    }

    #[test]
    fn anonymous_level_is_bound_at_the_call() {
        let mut db = declared(
            "(sensitivity s0) (user u) (macro m ((level l)) (userlevel u l)) (call m ((s0)))",
        );
        expand(&mut db).unwrap();
        let call = calls(&db)[0];
        let Some(Statement::Call(c)) = db.arena().statement(call) else {
            panic!("expected a call");
        };
        let ArgValue::Anonymous(anon) = c.bindings[0].value else {
            panic!("expected an inline level");
        };
        let anon_node = db.anonymous_node(anon).unwrap();
        assert!(matches!(
            db.arena().statement(anon_node),
            Some(Statement::Level(l)) if l.level.sensitivity.is_resolved()
        ));
    }

    #[test]
    fn arguments_do_not_bind_to_the_expansion() {
        let mut db = declared(
            "(type t) (block b (macro m ((type x)) (type t) (typepermissive x)) (call m (t)))",
        );
        expand(&mut db).unwrap();
        let call = calls(&db)[0];
        let Some(Statement::Call(c)) = db.arena().statement(call) else {
            panic!("expected a call");
        };
        assert_eq!(c.bindings[0].datum(), db.lookup(ScopeKey::Root, SymIndex::Types, "t"));
        assert!(db.lookup_path("b.t", SymIndex::Types).is_some());
    }

    #[test]
    fn name_arguments_are_interned() {
        let mut db = declared("(macro m ((string n))) (call m (passwd))");
        expand(&mut db).unwrap();
        assert!(db.lookup(ScopeKey::Root, SymIndex::Names, "passwd").is_some());
    }

    #[test]
    fn list_for_a_plain_parameter_is_invalid() {
        let mut db = declared("(macro m ((type t))) (call m ((a b)))");
        let err = expand(&mut db).unwrap_err();
        assert!(err.to_string().ends_with("invalid macro parameter"), "{err}");
    }
}
