//! Merging of partial order statements into one total order.
//!
//! Each `classorder`, `sidorder`, `categoryorder` or `sensitivityorder`
//! statement contributes a partial list. Lists are merged into a composite
//! one by one; a list that cannot be placed yet is retried as long as some
//! other list made progress.

use cil_ast::nodes::NodeId;

/// A partial order contributed by one statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OrderedList<T> {
    pub node: NodeId,
    pub items: Vec<T>,
}

impl<T> OrderedList<T> {
    pub(crate) fn new(node: NodeId, items: Vec<T>) -> Self {
        Self { node, items }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum MergeError<T> {
    /// Lists that could not be placed relative to the others.
    Unmerged(Vec<NodeId>),
    /// `item` of the list at `node` was already placed.
    AlreadyPlaced { item: T, node: NodeId },
}

enum Attempt {
    Merged,
    Deferred,
}

/// Inserts `items` before `at`, refusing anything already placed.
fn insert_before<T: Copy + PartialEq>(composite: &mut Vec<T>, at: usize, items: &[T]) -> Result<(), T> {
    for (offset, item) in items.iter().enumerate() {
        if composite.contains(item) {
            return Err(*item);
        }
        composite.insert(at + offset, *item);
    }
    Ok(())
}

fn merge_one<T: Copy + PartialEq>(composite: &mut Vec<T>, list: &[T]) -> Result<Attempt, T> {
    if list.is_empty() {
        return Ok(Attempt::Merged);
    }
    if composite.is_empty() {
        let end = composite.len();
        insert_before(composite, end, list)?;
        return Ok(Attempt::Merged);
    }

    let first_match = list
        .iter()
        .enumerate()
        .find_map(|(n, item)| composite.iter().position(|c| c == item).map(|o| (n, o)));
    let Some((nmatch, omatch)) = first_match else {
        return Ok(Attempt::Deferred);
    };
    if nmatch != 0 && omatch != 0 {
        return Ok(Attempt::Deferred);
    }
    if nmatch != 0 {
        insert_before(composite, 0, &list[..nmatch])?;
    }

    let mut ocurr = omatch + nmatch;
    let mut ncurr = nmatch;
    while ocurr < composite.len() && ncurr < list.len() {
        if composite[ocurr] == list[ncurr] {
            ocurr += 1;
            ncurr += 1;
            continue;
        }
        // gap in the composite: (a c) merged with (a b c)
        if let Some(found) = list[ncurr + 1..].iter().position(|i| *i == composite[ocurr]) {
            let gap = &list[ncurr..=ncurr + found];
            insert_before(composite, ocurr, gap)?;
            ocurr += gap.len();
            ncurr += gap.len();
            continue;
        }
        // gap in the list: (a b c) merged with (a c)
        if let Some(found) = composite[ocurr + 1..].iter().position(|c| *c == list[ncurr]) {
            ocurr += found + 1;
            continue;
        }
        return Ok(Attempt::Deferred);
    }
    if ncurr < list.len() {
        let end = composite.len();
        insert_before(composite, end, &list[ncurr..])?;
    }
    Ok(Attempt::Merged)
}

/// Merges every ordered list, then appends the unordered ones.
///
/// Unordered items that are already placed are skipped and reported through
/// `on_ignored` together with the contributing node.
pub(crate) fn merge_all<T, F>(
    ordered: &[OrderedList<T>],
    unordered: &[OrderedList<T>],
    mut on_ignored: F,
) -> Result<Vec<T>, MergeError<T>>
where
    T: Copy + PartialEq,
    F: FnMut(T, NodeId),
{
    let mut composite: Vec<T> = Vec::new();
    let mut waiting: Vec<&OrderedList<T>> = ordered.iter().collect();

    loop {
        let mut changed = false;
        let mut still_waiting = Vec::new();
        for list in waiting {
            let mut scratch = composite.clone();
            match merge_one(&mut scratch, &list.items) {
                Ok(Attempt::Merged) => {
                    composite = scratch;
                    changed = true;
                }
                Ok(Attempt::Deferred) => still_waiting.push(list),
                Err(item) => {
                    return Err(MergeError::AlreadyPlaced {
                        item,
                        node: list.node,
                    });
                }
            }
        }
        waiting = still_waiting;
        if waiting.is_empty() || !changed {
            break;
        }
    }
    if !waiting.is_empty() {
        return Err(MergeError::Unmerged(waiting.iter().map(|l| l.node).collect()));
    }

    for list in unordered {
        for item in &list.items {
            if composite.contains(item) {
                on_ignored(*item, list.node);
            } else {
                composite.push(*item);
            }
        }
    }
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists(specs: &[&str]) -> Vec<OrderedList<char>> {
        specs
            .iter()
            .enumerate()
            .map(|(idx, spec)| OrderedList::new(idx as NodeId + 10, spec.chars().collect()))
            .collect()
    }

    fn merged(specs: &[&str]) -> Result<String, MergeError<char>> {
        merge_all(&lists(specs), &[], |_, _| {}).map(|v| v.into_iter().collect())
    }

    #[test]
    fn overlapping_lists_chain() {
        assert_eq!(merged(&["abc", "bcd"]).unwrap(), "abcd");
    }

    #[test]
    fn list_can_prepend() {
        assert_eq!(merged(&["bc", "abc"]).unwrap(), "abc");
        assert_eq!(merged(&["cd", "abc"]).unwrap(), "abcd");
    }

    #[test]
    fn gaps_on_either_side_are_filled() {
        assert_eq!(merged(&["ac", "abc"]).unwrap(), "abc");
        assert_eq!(merged(&["abc", "ac"]).unwrap(), "abc");
    }

    #[test]
    fn disjoint_list_waits_for_a_bridge() {
        assert_eq!(merged(&["ab", "cd", "bc"]).unwrap(), "abcd");
    }

    #[test]
    fn contradictory_lists_are_reported() {
        let err = merged(&["ab", "ba"]).unwrap_err();
        assert_eq!(err, MergeError::AlreadyPlaced { item: 'a', node: 11 });
    }

    #[test]
    fn unbridgeable_lists_stay_unmerged() {
        let err = merged(&["ab", "cd"]).unwrap_err();
        assert_eq!(err, MergeError::Unmerged(vec![11]));
    }

    #[test]
    fn repeated_item_in_one_list_is_rejected() {
        let err = merged(&["aba"]).unwrap_err();
        assert!(matches!(err, MergeError::AlreadyPlaced { item: 'a', .. }));
    }

    #[test]
    fn unordered_items_are_appended_once() {
        let mut ignored = Vec::new();
        let result = merge_all(&lists(&["ab"]), &lists(&["cb", "c"]), |item, node| {
            ignored.push((item, node));
        })
        .unwrap();
        assert_eq!(result, vec!['a', 'b', 'c']);
        assert_eq!(ignored, vec![('b', 10), ('c', 11)]);
    }

    #[test]
    fn empty_input_merges_to_nothing() {
        assert_eq!(merged(&[]).unwrap(), "");
        assert_eq!(merged(&["", "ab"]).unwrap(), "ab");
    }
}
