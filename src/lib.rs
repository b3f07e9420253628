//! `restime-planner` answers two questions about a pool of `R` interchangeable
//! resource units over a bounded time horizon `[base_time, base_time + duration)`:
//! "how many units are free at or around time `t`?" and "when is the earliest
//! time at least `k` units are free for a stretch of duration `d`?" It also
//! tracks the set of committed reservations (spans) that produced the current
//! availability picture, through [`Planner`]'s `span_*` accessors.
//!
//! Internally, availability is represented as a step function over time,
//! broken at a set of *scheduled points* ([`point::ScheduledPoint`]). Two
//! augmented red-black trees ([`tree::RbTree`]) index those points: the
//! [`point::ScheduledPointTree`] orders them by time for floor/successor
//! queries, and the [`mtrt::MinTimeResourceTree`] orders them by remaining
//! capacity (augmented with a subtree-minimum time) to answer "earliest time
//! with enough capacity" in `O(log n)`. Both trees hold non-owning references
//! into a single [`arena::Arena`] that owns the points.
//!
//! Every fallible operation returns a [`PlannerResult`]; see [`PlannerError`]
//! for the ways an operation can fail.
//!
//! ```
//! use restime_planner::Planner;
//!
//! let mut planner = Planner::new(0, 100, 4, "node").unwrap();
//! let span = planner.add_span(10, 20, 2).unwrap();
//! assert_eq!(planner.avail_resources_at(15).unwrap(), 2);
//! planner.rem_span(span).unwrap();
//! assert_eq!(planner.avail_resources_at(15).unwrap(), 4);
//! ```

#[macro_use]
extern crate log;

pub(crate) mod arena;
mod error;
mod logger;
pub(crate) mod mtrt;
mod planner;
pub(crate) mod point;
pub(crate) mod span;
pub(crate) mod tree;

pub use crate::error::{PlannerError, PlannerResult};
pub use crate::planner::Planner;

/// Initialize the crate's built-in logger. Optional: [`Planner::new`] does
/// not call this itself, since an embedder may already run its own `log`
/// frontend. Calling it more than once, or after another logger has already
/// registered, is harmless.
pub fn init_logger() {
    logger::try_init();
}
