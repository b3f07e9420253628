//! The planner facade: owns the scheduled-point tree, the min-time resource
//! tree and the span table, and exposes the public queries and mutations
//! described in the crate's top-level documentation.

use crate::arena::{Arena, Id};
use crate::error::{PlannerError, PlannerResult};
use crate::mtrt::MinTimeResourceTree;
use crate::point::{ScheduledPoint, ScheduledPointTree};
use crate::span::{Span, SpanTable};

struct AvailRequest {
    on_or_after: i64,
    duration: i64,
    count: i64,
}

fn checked_i64(v: u64, what: &'static str) -> PlannerResult<i64> {
    i64::try_from(v).map_err(|_| PlannerError::Range(what))
}

/// A single-resource-type, time-bounded planner.
///
/// Answers "when/whether `k` units are free for a duration `d`" against a
/// pool of `R` interchangeable units, and tracks the [`Span`]s that commit
/// those units over time. See the crate documentation for the invariants
/// this type maintains across calls.
pub struct Planner {
    total_resources: i64,
    resource_type: String,
    plan_start: i64,
    plan_end: i64,
    points: Arena<ScheduledPoint>,
    spt: ScheduledPointTree,
    mtrt: MinTimeResourceTree,
    p0: Id,
    spans: SpanTable,
    /// Points temporarily unlinked from the MTRT while an availability scan
    /// walks past them; restored on the next mutation, query, or by
    /// `avail_time_first` itself.
    avail_iter: Vec<Id>,
    current_request: Option<AvailRequest>,
    span_counter: i64,
}

impl Planner {
    /// Construct a planner spanning `[base_time, base_time + duration)` with
    /// `total` interchangeable units of `resource_type`.
    pub fn new(base_time: i64, duration: u64, total: u64, resource_type: impl Into<String>) -> PlannerResult<Self> {
        if duration < 1 {
            return Err(PlannerError::Invalid("duration must be at least 1"));
        }
        let duration = checked_i64(duration, "duration exceeds i64::MAX")?;
        let total = checked_i64(total, "resource total exceeds i64::MAX")?;

        let mut points = Arena::new();
        let mut spt = ScheduledPointTree::new();
        let mut mtrt = MinTimeResourceTree::new();
        let p0 = points.insert(ScheduledPoint::new(base_time, 0, total));
        points.get_mut(p0).ref_count = 1;
        spt.insert(&mut points, p0);
        mtrt.insert(&mut points, p0);

        Ok(Planner {
            total_resources: total,
            resource_type: resource_type.into(),
            plan_start: base_time,
            plan_end: base_time + duration,
            points,
            spt,
            mtrt,
            p0,
            spans: SpanTable::new(),
            avail_iter: Vec::new(),
            current_request: None,
            span_counter: 0,
        })
    }

    /// Discard every span and scheduled point and reinitialise the planner
    /// over a new time window, keeping `resource_total`/`resource_type`.
    pub fn reset(&mut self, base_time: i64, duration: u64) -> PlannerResult<()> {
        if duration < 1 {
            return Err(PlannerError::Invalid("duration must be at least 1"));
        }
        let duration = checked_i64(duration, "duration exceeds i64::MAX")?;
        self.points = Arena::new();
        self.spt = ScheduledPointTree::new();
        self.mtrt = MinTimeResourceTree::new();
        self.spans = SpanTable::new();
        self.avail_iter.clear();
        self.current_request = None;
        self.span_counter = 0;

        self.plan_start = base_time;
        self.plan_end = base_time + duration;
        let p0 = self.points.insert(ScheduledPoint::new(base_time, 0, self.total_resources));
        self.points.get_mut(p0).ref_count = 1;
        self.spt.insert(&mut self.points, p0);
        self.mtrt.insert(&mut self.points, p0);
        self.p0 = p0;
        Ok(())
    }

    // ---- accessors -----------------------------------------------------

    pub fn base_time(&self) -> i64 {
        self.plan_start
    }

    pub fn duration(&self) -> i64 {
        self.plan_end - self.plan_start
    }

    pub fn resource_total(&self) -> i64 {
        self.total_resources
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    // ---- availability queries -------------------------------------------

    /// Resources free at the single instant `t`.
    pub fn avail_resources_at(&self, t: i64) -> PlannerResult<i64> {
        if t < self.plan_start || t > self.plan_end {
            return Err(PlannerError::Invalid("t outside the planner's window"));
        }
        let state = self
            .spt
            .state(t)
            .expect("p0 at plan_start guarantees a floor point for any t >= plan_start");
        Ok(self.points.get(state).remaining)
    }

    /// The minimum number of resources free at any instant in `[t, t+d)`.
    pub fn avail_resources_during(&self, t: i64, d: u64) -> PlannerResult<i64> {
        if d < 1 {
            return Err(PlannerError::Invalid("duration must be at least 1"));
        }
        let d = checked_i64(d, "duration exceeds i64::MAX")?;
        if t + d > self.plan_end {
            return Err(PlannerError::Invalid("window extends past plan_end"));
        }
        let mut cur = self.spt.state(t);
        let mut min = i64::MAX;
        while let Some(id) = cur {
            let p = self.points.get(id);
            if p.at >= t + d {
                break;
            }
            min = min.min(p.remaining);
            cur = self.spt.next(&self.points, id);
        }
        Ok(min)
    }

    /// Whether `k` units are free throughout `[t, t+d)`.
    pub fn avail_during(&self, t: i64, d: u64, k: u64) -> PlannerResult<bool> {
        if d < 1 {
            return Err(PlannerError::Invalid("duration must be at least 1"));
        }
        let k = checked_i64(k, "request exceeds i64::MAX")?;
        if k > self.total_resources {
            return Err(PlannerError::Range("request exceeds resource_total"));
        }
        let d = checked_i64(d, "duration exceeds i64::MAX")?;
        if t + d > self.plan_end {
            return Err(PlannerError::Range("window extends past plan_end"));
        }
        Ok(self.avail_during_bool(t, d, k))
    }

    fn avail_during_bool(&self, t: i64, d: i64, k: i64) -> bool {
        let mut cur = self.spt.state(t);
        while let Some(id) = cur {
            let p = self.points.get(id);
            if p.at >= t + d {
                return true;
            }
            if k > p.remaining {
                return false;
            }
            cur = self.spt.next(&self.points, id);
        }
        true
    }

    /// Earliest time `>= on_or_after` at which `k` units are free for `d`.
    /// Establishes the iterator consumed by [`Self::avail_time_next`].
    pub fn avail_time_first(&mut self, on_or_after: i64, d: u64, k: u64) -> PlannerResult<i64> {
        debug!("avail_time_first: on_or_after={on_or_after} duration={d} request={k}");
        if on_or_after < self.plan_start || on_or_after >= self.plan_end || d < 1 {
            return Err(PlannerError::Invalid("on_or_after/duration out of range"));
        }
        let k = checked_i64(k, "request exceeds i64::MAX")?;
        if k > self.total_resources {
            return Err(PlannerError::Range("request exceeds resource_total"));
        }

        self.restore_avail_iter();
        let d = checked_i64(d, "duration exceeds i64::MAX")?;
        self.current_request = Some(AvailRequest {
            on_or_after,
            duration: d,
            count: k,
        });
        let result = self.avail_at(on_or_after, d, k)?.ok_or(PlannerError::NotFound);
        trace!("avail_time_first: result={result:?}");
        result
    }

    /// The next earliest time satisfying the request passed to the most
    /// recent [`Self::avail_time_first`] / [`Self::avail_time_next`] call.
    pub fn avail_time_next(&mut self) -> PlannerResult<i64> {
        let req = self
            .current_request
            .as_ref()
            .ok_or(PlannerError::Invalid("no live availability iterator"))?;
        let (on_or_after, duration, count) = (req.on_or_after, req.duration, req.count);
        if count > self.total_resources {
            return Err(PlannerError::Range("request exceeds resource_total"));
        }
        self.avail_at(on_or_after, duration, count)?.ok_or(PlannerError::NotFound)
    }

    fn restore_avail_iter(&mut self) {
        if self.avail_iter.is_empty() {
            return;
        }
        trace!("restore_avail_iter: restoring {} parked point(s) into the mtrt", self.avail_iter.len());
        for id in self.avail_iter.drain(..) {
            self.mtrt.insert(&mut self.points, id);
        }
    }

    fn span_ok(&self, start: Id, duration: i64, request: i64) -> bool {
        let start_at = self.points.get(start).at;
        let mut cur = Some(start);
        while let Some(id) = cur {
            let p = self.points.get(id);
            if p.at >= start_at + duration {
                return true;
            }
            if request > p.remaining {
                return false;
            }
            cur = self.spt.next(&self.points, id);
        }
        true
    }

    /// Core destructive-iterator loop shared by `avail_time_first`/`_next`.
    /// Pops MTRT candidates in increasing `at`; candidates that are too
    /// early or don't cover the full duration are parked in `avail_iter`
    /// and the search continues. `Ok(None)` means no candidate at all, or
    /// the first qualifying candidate runs past `plan_end`.
    fn avail_at(&mut self, on_or_after: i64, duration: i64, request: i64) -> PlannerResult<Option<i64>> {
        loop {
            let candidate = match self.mtrt.get_mintime(request)? {
                Some(id) => id,
                None => return Ok(None),
            };
            let at = self.points.get(candidate).at;
            let qualifies = at >= on_or_after && self.span_ok(candidate, duration, request);

            self.mtrt.remove(&mut self.points, candidate);
            self.avail_iter.push(candidate);
            trace!("avail_at: parked candidate at={at} qualifies={qualifies}");

            if !qualifies {
                continue;
            }
            if at + duration > self.plan_end {
                return Ok(None);
            }
            return Ok(Some(at));
        }
    }

    // ---- mutations -------------------------------------------------------

    fn validate_span_bounds(&self, start: i64, duration: i64, request: i64) -> PlannerResult<()> {
        // `start == plan_end` (a zero-width tail) is rejected outright even
        // though the off-by-one below would otherwise tolerate a one-unit
        // duration there; see DESIGN.md for why.
        if start < self.plan_start || duration < 1 || start >= self.plan_end || (start + duration - 1) > self.plan_end
        {
            return Err(PlannerError::Invalid("start/duration outside the planner's window"));
        }
        if request > self.total_resources || request < 0 {
            return Err(PlannerError::Range("request out of range"));
        }
        Ok(())
    }

    fn get_or_new_point(&mut self, at: i64) -> Id {
        if let Some(id) = self.spt.search(at) {
            return id;
        }
        let state_id = self
            .spt
            .state(at)
            .expect("p0 at plan_start guarantees a floor point");
        let (scheduled, remaining) = {
            let p = self.points.get(state_id);
            (p.scheduled, p.remaining)
        };
        let id = self.points.insert(ScheduledPoint::new(at, scheduled, remaining));
        self.spt.insert(&mut self.points, id);
        self.mtrt.insert(&mut self.points, id);
        id
    }

    fn fetch_overlap(&self, start: i64, duration: i64) -> Vec<Id> {
        let mut list = Vec::new();
        let mut cur = self.spt.state(start);
        while let Some(id) = cur {
            let at = self.points.get(id).at;
            if at >= start + duration {
                break;
            }
            if at >= start {
                list.push(id);
            }
            cur = self.spt.next(&self.points, id);
        }
        list
    }

    fn update_points(&mut self, overlap: &[Id], delta: i64) -> PlannerResult<()> {
        let mut ok = true;
        for &id in overlap {
            let p = self.points.get_mut(id);
            p.scheduled += delta;
            p.remaining -= delta;
            if p.scheduled > self.total_resources || p.scheduled < 0 || p.remaining < 0 || p.remaining > self.total_resources
            {
                ok = false;
            }
        }
        if ok {
            Ok(())
        } else {
            // Should not happen: `add_span`/`rem_span` both verify
            // `avail_during` before reaching here.
            Err(PlannerError::Range("resource state left its valid range"))
        }
    }

    fn update_mtrt_membership(&mut self, overlap: &[Id]) {
        for &id in overlap {
            if self.points.get(id).in_mtrt {
                self.mtrt.remove(&mut self.points, id);
            }
            if self.points.get(id).ref_count > 0 && !self.points.get(id).in_mtrt {
                self.mtrt.insert(&mut self.points, id);
            }
        }
    }

    /// Reserve `request` units over `[start, start+d)`. On success, the
    /// availability iterator (if any) is invalidated.
    pub fn add_span(&mut self, start: i64, d: u64, request: u64) -> PlannerResult<i64> {
        debug!("add_span: start={start} duration={d} request={request}");
        let duration = checked_i64(d, "duration exceeds i64::MAX")?;
        let req = checked_i64(request, "request exceeds i64::MAX")?;
        self.validate_span_bounds(start, duration, req)?;
        if !self.avail_during_bool(start, duration, req) {
            return Err(PlannerError::Invalid("requested span is not available"));
        }

        self.restore_avail_iter();
        self.current_request = None;

        let last = start + duration;
        let start_p = self.get_or_new_point(start);
        self.points.get_mut(start_p).ref_count += 1;
        let last_p = self.get_or_new_point(last);
        self.points.get_mut(last_p).ref_count += 1;

        let overlap = self.fetch_overlap(start, duration);
        self.update_points(&overlap, req)?;
        self.update_mtrt_membership(&overlap);

        self.span_counter += 1;
        let span_id = self.span_counter;
        self.spans.insert(Span {
            span_id,
            start,
            last,
            planned: req,
            start_p,
            last_p,
            in_system: true,
        });
        trace!("add_span: committed span_id={span_id} over {} overlapping point(s)", overlap.len());
        Ok(span_id)
    }

    /// Release a span previously returned by [`Self::add_span`].
    pub fn rem_span(&mut self, span_id: i64) -> PlannerResult<()> {
        debug!("rem_span: span_id={span_id}");
        let (start, duration, planned, start_p, last_p) = {
            let span = self.spans.get(span_id)?;
            (span.start, span.last - span.start, span.planned, span.start_p, span.last_p)
        };

        self.restore_avail_iter();
        self.current_request = None;

        let overlap = self.fetch_overlap(start, duration);
        self.update_points(&overlap, -planned)?;
        self.update_mtrt_membership(&overlap);

        self.points.get_mut(start_p).ref_count -= 1;
        self.points.get_mut(last_p).ref_count -= 1;

        self.free_point_if_unreferenced(start_p);
        self.free_point_if_unreferenced(last_p);

        self.spans.remove(span_id)?;
        trace!("rem_span: span_id={span_id} released, {} point(s) updated", overlap.len());
        Ok(())
    }

    fn free_point_if_unreferenced(&mut self, id: Id) {
        if id == self.p0 {
            return;
        }
        if self.points.get(id).ref_count == 0 {
            self.spt.remove(&self.points, id);
            if self.points.get(id).in_mtrt {
                self.mtrt.remove(&mut self.points, id);
            }
            self.points.remove(id);
        }
    }

    // ---- span accessors ---------------------------------------------------

    pub fn span_first(&mut self) -> PlannerResult<i64> {
        self.spans.first()
    }

    pub fn span_next(&mut self) -> PlannerResult<i64> {
        self.spans.next()
    }

    pub fn span_size(&self) -> usize {
        self.spans.size()
    }

    pub fn is_active(&self, span_id: i64) -> PlannerResult<bool> {
        Ok(self.spans.get(span_id)?.in_system)
    }

    pub fn span_start(&self, span_id: i64) -> PlannerResult<i64> {
        Ok(self.spans.get(span_id)?.start)
    }

    pub fn span_duration(&self, span_id: i64) -> PlannerResult<i64> {
        let span = self.spans.get(span_id)?;
        Ok(span.last - span.start)
    }

    pub fn span_resource_count(&self, span_id: i64) -> PlannerResult<i64> {
        Ok(self.spans.get(span_id)?.planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_planner_is_fully_available() {
        let p = Planner::new(0, 100, 4, "node").unwrap();
        assert_eq!(p.avail_resources_at(0).unwrap(), 4);
        assert_eq!(p.avail_resources_at(100).unwrap(), 4);
        assert_eq!(p.avail_resources_during(0, 100).unwrap(), 4);
        assert!(p.avail_during(0, 100, 4).unwrap());
    }

    #[test]
    fn new_rejects_bad_duration_and_total() {
        assert_eq!(
            Planner::new(0, 0, 4, "node").unwrap_err(),
            PlannerError::Invalid("duration must be at least 1")
        );
        assert!(Planner::new(0, 10, u64::MAX, "node").is_err());
    }

    #[test]
    fn avail_time_first_on_fresh_planner_returns_base_time_then_not_found() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        assert_eq!(p.avail_time_first(0, 10, 2).unwrap(), 0);
        assert_eq!(p.avail_time_next().unwrap_err(), PlannerError::NotFound);
    }

    #[test]
    fn scenario_add_span_then_resources_and_next_window() {
        // base=0, duration=100, total=4 (spec §8 concrete scenarios 1-3).
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        assert_eq!(p.avail_time_first(0, 10, 2).unwrap(), 0);

        let id1 = p.add_span(0, 10, 3).unwrap();
        assert_eq!(p.avail_resources_at(5).unwrap(), 1);
        assert_eq!(p.avail_resources_at(10).unwrap(), 4);
        assert_eq!(p.avail_resources_at(15).unwrap(), 4);

        assert_eq!(p.avail_time_first(0, 10, 2).unwrap(), 10);

        // A second span competing for the remaining unit over [5, 10) fails.
        assert!(p.add_span(5, 20, 2).is_err());
        let id2 = p.add_span(10, 20, 2).unwrap();
        assert_eq!(p.avail_resources_at(15).unwrap(), 2);

        p.rem_span(id1).unwrap();
        assert_eq!(p.avail_resources_at(5).unwrap(), 4);
        assert_eq!(p.avail_resources_at(15).unwrap(), 2);

        // id1's start endpoint (p0) survives; id1's last endpoint at 10 is
        // still referenced by id2's start, so the SPT still holds {0, 10, 30}.
        assert_eq!(p.avail_resources_at(0).unwrap(), 4);
        assert_eq!(p.avail_resources_at(30).unwrap(), 4);

        assert!(p.is_active(id2).unwrap());
        assert_eq!(p.span_start(id2).unwrap(), 10);
        assert_eq!(p.span_duration(id2).unwrap(), 20);
        assert_eq!(p.span_resource_count(id2).unwrap(), 2);
    }

    #[test]
    fn avail_time_first_finds_the_only_window_with_full_capacity() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        p.add_span(0, 10, 3).unwrap();
        p.add_span(10, 20, 2).unwrap();
        // Only [30, 100) has all 4 units free.
        assert_eq!(p.avail_time_first(0, 5, 4).unwrap(), 30);
        assert_eq!(p.avail_time_next().unwrap_err(), PlannerError::NotFound);
    }

    #[test]
    fn add_span_rejects_out_of_window_and_over_capacity_requests() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        assert_eq!(
            p.add_span(95, 10, 1).unwrap_err(),
            PlannerError::Invalid("start/duration outside the planner's window")
        );
        assert_eq!(
            p.add_span(0, 10, 5).unwrap_err(),
            PlannerError::Range("request out of range")
        );
        // start == plan_end is a zero-width tail, rejected regardless of duration.
        assert!(p.add_span(100, 1, 1).is_err());
        // exactly touching the end (start + d - 1 == plan_end) succeeds.
        assert!(p.add_span(99, 1, 1).is_ok());
    }

    #[test]
    fn rem_span_round_trip_restores_prior_availability() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        let before = (0..100).map(|t| p.avail_resources_at(t).unwrap()).collect::<Vec<_>>();
        let id = p.add_span(20, 30, 2).unwrap();
        assert_ne!(p.avail_resources_at(25).unwrap(), before[25]);
        p.rem_span(id).unwrap();
        let after = (0..100).map(|t| p.avail_resources_at(t).unwrap()).collect::<Vec<_>>();
        assert_eq!(before, after);
    }

    #[test]
    fn rem_span_unknown_id_is_invalid() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        assert!(p.rem_span(12345).is_err());
    }

    #[test]
    fn reset_clears_spans_and_restores_full_capacity() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        p.add_span(0, 10, 3).unwrap();
        p.reset(0, 50).unwrap();
        assert_eq!(p.span_size(), 0);
        assert_eq!(p.avail_resources_at(0).unwrap(), 4);
        assert_eq!(p.base_time(), 0);
        assert_eq!(p.duration(), 50);
    }

    #[test]
    fn span_iteration_visits_every_live_span_once() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        let a = p.add_span(0, 10, 1).unwrap();
        let b = p.add_span(10, 10, 1).unwrap();
        let c = p.add_span(20, 10, 1).unwrap();
        let mut seen = vec![p.span_first().unwrap()];
        while let Ok(id) = p.span_next() {
            seen.push(id);
        }
        seen.sort();
        assert_eq!(seen, {
            let mut want = vec![a, b, c];
            want.sort();
            want
        });
    }

    #[test]
    fn mutation_invalidates_the_availability_iterator() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        assert_eq!(p.avail_time_first(0, 10, 1).unwrap(), 0);
        p.add_span(50, 10, 1).unwrap();
        // The prior iterator state is gone; a fresh avail_time_next call
        // without a new avail_time_first is rejected.
        assert_eq!(
            p.avail_time_next().unwrap_err(),
            PlannerError::Invalid("no live availability iterator")
        );
    }

    #[test]
    fn zero_request_is_accepted_as_a_zero_effect_reservation() {
        let mut p = Planner::new(0, 100, 4, "node").unwrap();
        let id = p.add_span(0, 10, 0).unwrap();
        assert_eq!(p.avail_resources_at(5).unwrap(), 4);
        assert_eq!(p.span_resource_count(id).unwrap(), 0);
    }
}
