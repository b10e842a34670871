//! `classorder`, `sidorder`, `categoryorder` and `sensitivityorder`.
//!
//! Order statements are gathered during one pass and merged once it is over.

use cil_ast::nodes::{DatumId, Flavor, NodeId, Statement};

use crate::db::PolicyDb;
use crate::diagnostics::Severity;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::bind_keep_aliases;
use crate::ordered::{MergeError, OrderedList, merge_all};
use crate::symtab::SymIndex;

/// Lists gathered from order statements, waiting to be merged.
#[derive(Debug, Default)]
pub(crate) struct PendingOrders {
    classes: Vec<OrderedList<DatumId>>,
    unordered_classes: Vec<OrderedList<DatumId>>,
    sids: Vec<OrderedList<DatumId>>,
    categories: Vec<OrderedList<DatumId>>,
    sensitivities: Vec<OrderedList<DatumId>>,
}

impl PendingOrders {
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Item flavor and table of an order statement.
fn item_kind(order: Flavor) -> Option<(Flavor, SymIndex)> {
    match order {
        Flavor::ClassOrder => Some((Flavor::Class, SymIndex::Classes)),
        Flavor::SidOrder => Some((Flavor::Sid, SymIndex::Sids)),
        Flavor::CategoryOrder => Some((Flavor::Category, SymIndex::Cats)),
        Flavor::SensitivityOrder => Some((Flavor::Sensitivity, SymIndex::Sens)),
        _ => None,
    }
}

/// Binds the items of an order statement and queues its list.
pub(crate) fn gather_order(db: &mut PolicyDb, node: NodeId, pending: &mut PendingOrders) -> ResolveResult<()> {
    let Some(Statement::Order(mut order)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let Some((kind, sym)) = item_kind(order.flavor) else {
        return Ok(());
    };
    let mut items = Vec::with_capacity(order.items.len());
    for item in &mut order.items {
        let datum = bind_keep_aliases(db, node, item, sym)?;
        if db.node_flavor_of(datum) != Some(kind) {
            return Err(ResolveError::invalid(
                format!("{} is not a {kind}, only {kind} items are allowed in {}", item.name, order.flavor),
                &db.arena.location(node),
            ));
        }
        items.push(datum);
    }
    let list = OrderedList::new(node, items);
    match order.flavor {
        Flavor::ClassOrder if order.unordered => pending.unordered_classes.push(list),
        Flavor::ClassOrder => pending.classes.push(list),
        Flavor::SidOrder => pending.sids.push(list),
        Flavor::CategoryOrder => pending.categories.push(list),
        _ => pending.sensitivities.push(list),
    }
    db.arena.set_statement(node, Statement::Order(order));
    Ok(())
}

fn merge_kind(
    db: &mut PolicyDb,
    order: Flavor,
    ordered: &[OrderedList<DatumId>],
    unordered: &[OrderedList<DatumId>],
) -> ResolveResult<Vec<DatumId>> {
    let mut ignored = Vec::new();
    let merged = merge_all(ordered, unordered, |item, node| ignored.push((item, node))).map_err(|err| match err {
        MergeError::Unmerged(nodes) => {
            let mut locations = nodes.iter().map(|n| db.arena.location(*n));
            ResolveError::OrderConflict {
                reason: format!("unable to merge ordered list in {order}"),
                location: locations.next().unwrap_or_default(),
                others: locations.collect(),
            }
        }
        MergeError::AlreadyPlaced { item, node } => ResolveError::OrderConflict {
            reason: format!("{} has already been merged into the {order}", db.name_of(item)),
            location: db.arena.location(node),
            others: Vec::new(),
        },
    })?;
    for (item, node) in ignored {
        let message = format!("Ignoring '{}' as it has already been declared in {order}", db.name_of(item));
        let location = db.arena.location(node);
        db.report(Severity::Warning, Some(&location), message);
    }
    for item in &merged {
        if let Some(datum) = db.datum_mut(*item) {
            datum.state.ordered = true;
        }
    }
    Ok(merged)
}

/// Merges every gathered list into the database orders, numbers categories
/// and checks that every declaration was ordered.
pub(crate) fn merge_orders(db: &mut PolicyDb, pending: &PendingOrders) -> ResolveResult<()> {
    db.orders.classes = merge_kind(db, Flavor::ClassOrder, &pending.classes, &pending.unordered_classes)?;
    db.orders.sids = merge_kind(db, Flavor::SidOrder, &pending.sids, &[])?;
    db.orders.categories = merge_kind(db, Flavor::CategoryOrder, &pending.categories, &[])?;
    db.orders.sensitivities = merge_kind(db, Flavor::SensitivityOrder, &pending.sensitivities, &[])?;

    for (value, category) in (0u32..).zip(db.orders.categories.clone()) {
        if let Some(datum) = db.datum_mut(category) {
            datum.state.value = Some(value);
        }
    }
    tracing::debug!(
        classes = db.orders.classes.len(),
        sids = db.orders.sids.len(),
        categories = db.orders.categories.len(),
        sensitivities = db.orders.sensitivities.len(),
        "orders merged"
    );
    verify_ordered(db)
}

/// Declarations outside macro bodies and abstract blocks must appear in their
/// order.
fn verify_ordered(db: &PolicyDb) -> ResolveResult<()> {
    for (id, datum) in db.datums() {
        let order = match db.node_flavor_of(id) {
            Some(Flavor::Class) => Flavor::ClassOrder,
            Some(Flavor::Sid) => Flavor::SidOrder,
            Some(Flavor::Category) => Flavor::CategoryOrder,
            Some(Flavor::Sensitivity) => Flavor::SensitivityOrder,
            _ => continue,
        };
        if datum.state.ordered || datum.first_node().is_none_or(|n| !is_live(db, n)) {
            continue;
        }
        return Err(ResolveError::Unordered {
            kind: datum.flavor,
            order,
            name: db.qualified_name(id),
            location: db.datum_location(id),
        });
    }
    Ok(())
}

fn is_live(db: &PolicyDb, node: NodeId) -> bool {
    !db.arena.ancestors(node).any(|a| match db.arena.statement(a) {
        Some(Statement::Macro(_)) => true,
        Some(Statement::Block(_)) => db
            .decl_of(a)
            .and_then(|b| db.datum(b))
            .is_some_and(|d| d.state.is_abstract),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_tree;
    use crate::options::ResolverOptions;
    use crate::symtab::ScopeKey;
    use cil_ast::builder::Builder;

    fn declared(source: &str) -> PolicyDb {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", source);
        let mut db = PolicyDb::new(builder.build_ast().unwrap(), ResolverOptions::default());
        declare_tree(&mut db).unwrap();
        db
    }

    fn merged(source: &str) -> ResolveResult<PolicyDb> {
        let mut db = declared(source);
        let mut pending = PendingOrders::default();
        for node in db.arena().find_nodes(|s| matches!(s, Statement::Order(_))) {
            gather_order(&mut db, node, &mut pending)?;
        }
        merge_orders(&mut db, &pending)?;
        Ok(db)
    }

    fn names(db: &PolicyDb, ids: &[DatumId]) -> Vec<String> {
        db.names(ids)
    }

    #[test]
    fn class_orders_chain() {
        let db = merged(
            "(class file (read)) (class dir (read)) (class socket (read)) \
             (classorder (file dir)) (classorder (dir socket))",
        )
        .unwrap();
        assert_eq!(names(&db, &db.orders().classes), ["file", "dir", "socket"]);
    }

    #[test]
    fn contradictory_orders_conflict() {
        let err = merged("(sid a) (sid b) (sidorder (a b)) (sidorder (b a))").unwrap_err();
        assert!(matches!(err, ResolveError::OrderConflict { .. }), "{err}");
    }

    #[test]
    fn unordered_classes_follow_the_ordered_ones() {
        let db = merged(
            "(class a (read)) (class b (read)) (class c (read)) \
             (classorder (unordered c b)) (classorder (a b))",
        )
        .unwrap();
        assert_eq!(names(&db, &db.orders().classes), ["a", "b", "c"]);
        let warnings: Vec<_> = db.diagnostics().with_severity(Severity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Ignoring 'b'"), "{}", warnings[0]);
    }

    #[test]
    fn categories_are_numbered_in_order() {
        let db = merged("(category c1) (category c0) (categoryorder (c0 c1))").unwrap();
        let c1 = db.lookup(ScopeKey::Root, SymIndex::Cats, "c1").unwrap();
        assert_eq!(db.datum(c1).unwrap().state.value, Some(1));
    }

    #[test]
    fn declaration_missing_from_its_order() {
        let err = merged("(sensitivity s0) (sensitivity s1) (sensitivityorder (s0))").unwrap_err();
        assert_eq!(
            err,
            ResolveError::Unordered {
                kind: Flavor::Sensitivity,
                order: Flavor::SensitivityOrder,
                name: "s1".to_string(),
                location: err.location().clone(),
            }
        );
    }

    #[test]
    fn alias_is_not_an_order_item() {
        let err = merged("(category c0) (categoryalias a) (categoryorder (c0 a))").unwrap_err();
        assert!(err.to_string().contains("a is not a category"), "{err}");
    }

    #[test]
    fn classes_in_macros_need_no_order() {
        merged("(macro m () (class inner (read)))").unwrap();
    }
}
