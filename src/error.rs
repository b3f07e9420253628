//! Error kinds returned by the planner's public API.
//!
//! The original C implementation this crate's design is modeled on reports
//! failures through `errno`-style codes (`EINVAL`, `ERANGE`, `ENOENT`,
//! `ENOTSUP`); a `Result`-carrying enum is the idiomatic Rust substitute, so
//! every fallible operation returns [`PlannerResult<T>`] instead.

use thiserror::Error;

/// Why a planner operation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    /// Ill-formed arguments: an out-of-window `start`, `duration < 1`, an
    /// unknown span id, or calling [`crate::Planner::avail_time_next`] with
    /// no live iterator.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// A numeric argument or an internal quantity fell outside its valid
    /// range, e.g. `request > total`.
    #[error("value out of range: {0}")]
    Range(&'static str),

    /// No scheduled point satisfies an availability query. This is an
    /// expected outcome, not a bug.
    #[error("no schedulable point satisfies the request")]
    NotFound,

    /// A consistency check inside the min-time resource tree failed: an
    /// anchor was found but no node with the expected `at` was reachable
    /// from it. This indicates a broken augmentation invariant and is
    /// always a programming defect, not a caller error.
    #[error("internal consistency error: {0}")]
    Internal(&'static str),

    /// Allocation failed. The planner remains usable and every invariant
    /// that held before the call still holds.
    #[error("allocation failure")]
    OutOfMemory,
}

/// The result type returned by every fallible planner operation.
pub type PlannerResult<T> = Result<T, PlannerError>;
