//! The min-time resource tree (MTRT).
//!
//! Keyed by `remaining` (ties broken by insertion sequence), augmented with
//! `subtree_min`, the minimum `at` over a node's whole subtree. This is what
//! turns "earliest time with at least `k` units free" from an O(n) scan of
//! every breakpoint into an O(log n) tree descent.

use crate::arena::{Arena, Id};
use crate::error::{PlannerError, PlannerResult};
use crate::point::ScheduledPoint;
use crate::tree::{Augment, NodeId, RbTree, NIL};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Payload {
    point: Id,
    at: i64,
}

/// `subtree_min`: the smallest `at` anywhere in the node's subtree.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct SubtreeMin(i64);

impl Augment for SubtreeMin {
    type Payload = Payload;

    fn compute(payload: &Payload, left: Option<&Self>, right: Option<&Self>) -> Self {
        let mut min = payload.at;
        if let Some(l) = left {
            min = min.min(l.0);
        }
        if let Some(r) = right {
            min = min.min(r.0);
        }
        SubtreeMin(min)
    }
}

pub(crate) struct MinTimeResourceTree {
    tree: RbTree<(i64, u64), Payload, SubtreeMin>,
    next_seq: u64,
}

impl MinTimeResourceTree {
    pub(crate) fn new() -> Self {
        MinTimeResourceTree {
            tree: RbTree::new(),
            next_seq: 0,
        }
    }

    /// Link `point` into the tree, keyed by its current `remaining`. The
    /// point must be re-inserted (not merely left alone) whenever
    /// `remaining` changes; see `update_mtrt_membership` in `planner.rs`.
    pub(crate) fn insert(&mut self, points: &mut Arena<ScheduledPoint>, point: Id) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let (remaining, at) = {
            let p = points.get_mut(point);
            p.mtrt_seq = seq;
            (p.remaining, p.at)
        };
        let node = self.tree.insert((remaining, seq), Payload { point, at });
        let p = points.get_mut(point);
        p.mtrt_node = node;
        p.in_mtrt = true;
    }

    pub(crate) fn remove(&mut self, points: &mut Arena<ScheduledPoint>, point: Id) {
        let node = points.get(point).mtrt_node;
        self.tree.remove(node);
        let p = points.get_mut(point);
        p.mtrt_node = NIL;
        p.in_mtrt = false;
    }

    /// `min(n.at, n.right.subtree_min)`: the best candidate reachable from
    /// `n` without ascending, given that everything in `n`'s right subtree
    /// also satisfies the request (the key there is `>= n`'s).
    fn right_branch_mintime(&self, n: NodeId) -> i64 {
        let right = self.tree.right(n);
        let right_min = if right == NIL {
            i64::MAX
        } else {
            self.tree.aug(right).0
        };
        self.tree.payload(n).at.min(right_min)
    }

    fn find_mintime_anchor(&self, request: i64) -> (i64, Option<NodeId>) {
        let mut node = self.tree.root();
        let mut min_time = i64::MAX;
        let mut anchor = None;
        while node != NIL {
            let remaining = self.tree.key(node).0;
            if request <= remaining {
                let candidate = self.right_branch_mintime(node);
                if candidate < min_time {
                    min_time = candidate;
                    anchor = Some(node);
                }
                node = self.tree.left(node);
            } else {
                node = self.tree.right(node);
            }
        }
        (min_time, anchor)
    }

    fn find_mintime_point(&self, anchor: NodeId, min_time: i64) -> PlannerResult<Id> {
        if self.tree.payload(anchor).at == min_time {
            return Ok(self.tree.payload(anchor).point);
        }
        let mut node = self.tree.right(anchor);
        while node != NIL {
            let at = self.tree.payload(node).at;
            if at == min_time {
                return Ok(self.tree.payload(node).point);
            }
            let left = self.tree.left(node);
            if left != NIL && self.tree.aug(left).0 == min_time {
                node = left;
            } else {
                node = self.tree.right(node);
            }
        }
        Err(PlannerError::Internal(
            "mtrt anchor found but no node with the expected subtree_min",
        ))
    }

    /// The point with the smallest `at` among all points with
    /// `remaining >= request`, or `None` if no such point exists.
    pub(crate) fn get_mintime(&self, request: i64) -> PlannerResult<Option<Id>> {
        let (min_time, anchor) = self.find_mintime_anchor(request);
        match anchor {
            None => Ok(None),
            Some(anchor) => self.find_mintime_point(anchor, min_time).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::ScheduledPoint;

    fn push(points: &mut Arena<ScheduledPoint>, mtrt: &mut MinTimeResourceTree, at: i64, remaining: i64) -> Id {
        let id = points.insert(ScheduledPoint::new(at, 0, remaining));
        mtrt.insert(points, id);
        id
    }

    #[test]
    fn get_mintime_finds_earliest_point_meeting_request() {
        let mut points = Arena::new();
        let mut mtrt = MinTimeResourceTree::new();
        push(&mut points, &mut mtrt, 100, 2);
        push(&mut points, &mut mtrt, 10, 4);
        push(&mut points, &mut mtrt, 50, 4);
        push(&mut points, &mut mtrt, 5, 1);

        let found = mtrt.get_mintime(4).unwrap().unwrap();
        assert_eq!(points.get(found).at, 10);

        let found = mtrt.get_mintime(2).unwrap().unwrap();
        assert_eq!(points.get(found).at, 10);

        let found = mtrt.get_mintime(1).unwrap().unwrap();
        assert_eq!(points.get(found).at, 5);
    }

    #[test]
    fn get_mintime_none_when_nothing_satisfies_request() {
        let mut points = Arena::new();
        let mut mtrt = MinTimeResourceTree::new();
        push(&mut points, &mut mtrt, 0, 3);
        assert_eq!(mtrt.get_mintime(4).unwrap(), None);
    }

    #[test]
    fn reinsert_after_remaining_change_repositions_node() {
        let mut points = Arena::new();
        let mut mtrt = MinTimeResourceTree::new();
        let p = push(&mut points, &mut mtrt, 0, 4);
        assert_eq!(mtrt.get_mintime(4).unwrap(), Some(p));

        mtrt.remove(&mut points, p);
        points.get_mut(p).remaining = 1;
        mtrt.insert(&mut points, p);

        assert_eq!(mtrt.get_mintime(4).unwrap(), None);
        assert_eq!(mtrt.get_mintime(1).unwrap(), Some(p));
    }
}
