//! Scheduled points and the scheduled-point tree (SPT).
//!
//! A [`ScheduledPoint`] is a breakpoint in the step function `scheduled(t)`:
//! an instant at which the pool's committed/remaining counts change. Points
//! are owned by [`crate::arena::Arena`]; the SPT is an ordered index over
//! them keyed by `at`, used to answer "what is the resource state at time
//! `t`" and to walk forward through breakpoints.

use crate::arena::{Arena, Id};
use crate::tree::{NoAugment, RbTree, NIL};

/// A breakpoint in the pool's resource-state step function.
pub(crate) struct ScheduledPoint {
    pub(crate) at: i64,
    /// Units committed at this instant. Invariant: `scheduled + remaining == total`.
    pub(crate) scheduled: i64,
    pub(crate) remaining: i64,
    /// Number of spans whose `start` or `last` equals `at`, plus one for `p0`.
    pub(crate) ref_count: u32,
    /// True iff this point currently has a live node in the MTRT.
    pub(crate) in_mtrt: bool,
    pub(crate) spt_node: crate::tree::NodeId,
    pub(crate) mtrt_node: crate::tree::NodeId,
    /// Tie-breaks the MTRT ordering among points with equal `remaining`.
    pub(crate) mtrt_seq: u64,
}

impl ScheduledPoint {
    pub(crate) fn new(at: i64, scheduled: i64, remaining: i64) -> Self {
        ScheduledPoint {
            at,
            scheduled,
            remaining,
            ref_count: 0,
            in_mtrt: false,
            spt_node: NIL,
            mtrt_node: NIL,
            mtrt_seq: 0,
        }
    }
}

/// Ordered index of [`ScheduledPoint`]s by `at`. No augmentation: callers
/// needing "earliest time with enough resources" go through the MTRT
/// instead (see [`crate::mtrt`]).
pub(crate) struct ScheduledPointTree {
    tree: RbTree<i64, Id, NoAugment<Id>>,
}

impl ScheduledPointTree {
    pub(crate) fn new() -> Self {
        ScheduledPointTree { tree: RbTree::new() }
    }

    /// Exact match at `at`, or `None`.
    pub(crate) fn search(&self, at: i64) -> Option<Id> {
        self.tree.find(at).map(|n| *self.tree.payload(n))
    }

    /// The point with the largest `at <= t`. Callers always pass `t >=
    /// plan_start`, so in practice this never returns `None` (`p0` is the
    /// floor).
    pub(crate) fn state(&self, at: i64) -> Option<Id> {
        self.tree.floor(at).map(|n| *self.tree.payload(n))
    }

    /// In-order successor of `point`.
    pub(crate) fn next(&self, points: &Arena<ScheduledPoint>, point: Id) -> Option<Id> {
        let node = points.get(point).spt_node;
        self.tree.next(node).map(|n| *self.tree.payload(n))
    }

    /// Link `point` into the tree. Panics if a point with the same `at`
    /// already exists; callers are expected to have checked via
    /// [`Self::search`] (this mirrors the `DUPLICATE` contract in §4.2 of
    /// the design, surfaced here as a precondition rather than a `Result`
    /// because every call site already holds that invariant).
    pub(crate) fn insert(&mut self, points: &mut Arena<ScheduledPoint>, point: Id) {
        let at = points.get(point).at;
        debug_assert!(self.tree.find(at).is_none(), "duplicate scheduled point");
        let node = self.tree.insert(at, point);
        points.get_mut(point).spt_node = node;
    }

    /// Unlink `point`. Does not free `point`'s arena slot; the caller
    /// decides whether the point survives (its `ref_count` may still be
    /// positive).
    pub(crate) fn remove(&mut self, points: &Arena<ScheduledPoint>, point: Id) {
        let node = points.get(point).spt_node;
        self.tree.remove(node);
    }
}
