//! Structural comparison of subject subtrees.
//!
//! Only subject trees are compared here. Pattern trees may hold wildcards
//! and are never passed to these functions.
//!
//! The result is a total order usable as a map key: kinds first, then
//! values, then members pairwise. Collections are compared as multisets.

use crate::tree::forest::{Forest, Member, NodeId};
use std::cmp::Ordering;

/// Compare the subtrees rooted at `a` and `b`.
pub fn compare(forest: &Forest, a: NodeId, b: NodeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (x, y) = (forest.get(a), forest.get(b));
    x.kind
        .cmp(&y.kind)
        .then_with(|| x.value.cmp(&y.value))
        .then_with(|| x.members.len().cmp(&y.members.len()))
        .then_with(|| compare_members(forest, &x.members, &y.members))
}

/// Convenience for `compare(..) == Ordering::Equal`.
pub fn equal(forest: &Forest, a: NodeId, b: NodeId) -> bool {
    compare(forest, a, b) == Ordering::Equal
}

fn compare_members(forest: &Forest, xs: &[Member<NodeId>], ys: &[Member<NodeId>]) -> Ordering {
    for (x, y) in xs.iter().zip(ys) {
        let ord = match (x, y) {
            (Member::Single(a), Member::Single(b)) => match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => compare(forest, *a, *b),
            },
            (Member::Sequence(a), Member::Sequence(b)) => compare_runs(forest, true, a, b),
            (Member::Collection(a), Member::Collection(b)) => compare_runs(forest, false, a, b),
            _ => x.category().cmp(&y.category()),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Compare two runs of nodes, element-wise when `ordered`, as multisets
/// otherwise.
pub fn compare_runs(forest: &Forest, ordered: bool, a: &[NodeId], b: &[NodeId]) -> Ordering {
    let by_len = a.len().cmp(&b.len());
    if by_len != Ordering::Equal {
        return by_len;
    }

    if ordered {
        return lexicographic(forest, a, b);
    }

    if greedy_match(forest, a, b) {
        return Ordering::Equal;
    }

    // Unequal multisets: order them by their sorted contents.
    let mut xs = a.to_vec();
    let mut ys = b.to_vec();
    xs.sort_by(|p, q| compare(forest, *p, *q));
    ys.sort_by(|p, q| compare(forest, *p, *q));
    lexicographic(forest, &xs, &ys)
}

fn lexicographic(forest: &Forest, a: &[NodeId], b: &[NodeId]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare(forest, *x, *y))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Pair every element of `a` with the first still-unmatched equal element
/// of `b`. Equality is an equivalence, so the first hit is as good as any.
fn greedy_match(forest: &Forest, a: &[NodeId], b: &[NodeId]) -> bool {
    let mut unmatched = b.to_vec();
    for x in a {
        match unmatched.iter().position(|y| equal(forest, *x, *y)) {
            Some(i) => {
                unmatched.swap_remove(i);
            }
            None => return false,
        }
    }
    unmatched.is_empty()
}
