//! Spans: reservations of a fixed quantity of units over `[start, last)`.

use crate::arena::Id;
use crate::error::{PlannerError, PlannerResult};
use std::collections::HashMap;

/// A committed reservation. `start_p`/`last_p` are non-owning references to
/// the two [`crate::point::ScheduledPoint`]s at the span's endpoints; they
/// stay alive for the span's lifetime because the span holds a reference
/// count on each (see `add_span`/`rem_span` in `planner.rs`).
pub(crate) struct Span {
    pub(crate) span_id: i64,
    pub(crate) start: i64,
    pub(crate) last: i64,
    pub(crate) planned: i64,
    pub(crate) start_p: Id,
    pub(crate) last_p: Id,
    pub(crate) in_system: bool,
}

/// Handle-indexed table of live spans plus a forward-only iteration cursor.
/// Iteration order is unspecified (backed by a `HashMap`).
#[derive(Default)]
pub(crate) struct SpanTable {
    spans: HashMap<i64, Span>,
    cursor: Vec<i64>,
    cursor_pos: usize,
}

impl SpanTable {
    pub(crate) fn new() -> Self {
        SpanTable::default()
    }

    pub(crate) fn insert(&mut self, span: Span) {
        self.spans.insert(span.span_id, span);
    }

    pub(crate) fn get(&self, span_id: i64) -> PlannerResult<&Span> {
        self.spans
            .get(&span_id)
            .ok_or(PlannerError::Invalid("unknown span id"))
    }

    pub(crate) fn remove(&mut self, span_id: i64) -> PlannerResult<Span> {
        self.spans
            .remove(&span_id)
            .ok_or(PlannerError::Invalid("unknown span id"))
    }

    pub(crate) fn size(&self) -> usize {
        self.spans.len()
    }

    /// Snapshot the current key set and return the first span id. Mirrors
    /// `planner_span_first`: fails if no spans are live.
    pub(crate) fn first(&mut self) -> PlannerResult<i64> {
        self.cursor = self.spans.keys().copied().collect();
        self.cursor_pos = 0;
        self.cursor
            .first()
            .copied()
            .ok_or(PlannerError::Invalid("no spans in planner"))
    }

    /// Advance the cursor established by [`Self::first`]. Fails once the
    /// snapshot is exhausted.
    pub(crate) fn next(&mut self) -> PlannerResult<i64> {
        self.cursor_pos += 1;
        self.cursor
            .get(self.cursor_pos)
            .copied()
            .ok_or(PlannerError::Invalid("no more spans"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::point::ScheduledPoint;

    fn dummy_point_id() -> Id {
        let mut arena: Arena<ScheduledPoint> = Arena::new();
        arena.insert(ScheduledPoint::new(0, 0, 0))
    }

    #[test]
    fn first_next_walk_all_spans_once() {
        let mut table = SpanTable::new();
        for id in 1..=3 {
            table.insert(Span {
                span_id: id,
                start: 0,
                last: 1,
                planned: 1,
                start_p: dummy_point_id(),
                last_p: dummy_point_id(),
                in_system: true,
            });
        }
        let mut seen = vec![table.first().unwrap()];
        while let Ok(id) = table.next() {
            seen.push(id);
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(table.size(), 3);
    }

    #[test]
    fn first_fails_when_empty() {
        let mut table = SpanTable::new();
        assert_eq!(table.first(), Err(PlannerError::Invalid("no spans in planner")));
    }
}
