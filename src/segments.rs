//! Turning a decoded state path into clean interval segments.
//!
//! A path is scanned for runs of states belonging to a set (sleep, on-bed),
//! nearby runs are joined with the short interruption recorded as an
//! internal gap, and whatever is still too short is dropped.

use serde::Serialize;
use std::collections::BTreeSet;

/// Pair of bin indices, `start <= end`. Both ends are meaningful bins: a run
/// `[5, 12]` covers bins 5 through 12, a gap `[12, 14]` spans from the last
/// bin of one run to the first bin of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// `end - start`, the measure used by the duration filter.
    pub fn span(&self) -> usize {
        self.end - self.start
    }

    /// Number of bins touched, counting both ends.
    pub fn bin_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_inside_of(&self, other: &Interval) -> bool {
        self.start >= other.start && self.end <= other.end
    }
}

/// Outer bound of a merged segment plus the gaps absorbed into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentWithGaps {
    pub bounds: Interval,
    pub gaps: Vec<Interval>,
}

impl SegmentWithGaps {
    pub fn new(bounds: Interval) -> Self {
        Self {
            bounds,
            gaps: Vec::new(),
        }
    }

    pub fn is_inside_of(&self, other: &SegmentWithGaps) -> bool {
        self.bounds.is_inside_of(&other.bounds)
    }

    /// Copy extended to `next`, with the interruption recorded as a gap.
    fn absorb(&self, next: Interval) -> SegmentWithGaps {
        let mut gaps = self.gaps.clone();
        gaps.push(Interval::new(self.bounds.end, next.start));
        SegmentWithGaps {
            bounds: Interval::new(self.bounds.start, next.end),
            gaps,
        }
    }
}

/// Runs of consecutive bins whose state is in `states`, ascending.
/// A run still open at the last bin closes there.
pub fn set_boundaries(path: &[usize], states: &BTreeSet<usize>) -> Vec<Interval> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, state) in path.iter().enumerate() {
        let inside = states.contains(state);
        match (inside, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                runs.push(Interval::new(start, i - 1));
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(start) = run_start {
        runs.push(Interval::new(start, path.len() - 1));
    }

    runs
}

/// Join runs separated by at most `acceptable_gap` bins (`next.start -
/// current.end`). Single left-to-right pass; no run is ever reordered.
pub fn mind_the_gaps(runs: &[Interval], acceptable_gap: usize) -> Vec<SegmentWithGaps> {
    let Some((first, rest)) = runs.split_first() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut current = SegmentWithGaps::new(*first);

    for &run in rest {
        let gap = run.start.saturating_sub(current.bounds.end);
        if gap > acceptable_gap {
            segments.push(current);
            current = SegmentWithGaps::new(run);
        } else {
            current = current.absorb(run);
        }
    }
    segments.push(current);

    segments
}

pub fn filter_by_duration(segments: Vec<SegmentWithGaps>, min_duration: usize) -> Vec<SegmentWithGaps> {
    segments
        .into_iter()
        .filter(|s| s.bounds.span() >= min_duration)
        .collect()
}

/// Extraction, gap absorption and duration filtering in one go.
pub fn segments_for_states(
    path: &[usize],
    states: &BTreeSet<usize>,
    acceptable_gap: usize,
    min_duration: usize,
) -> Vec<SegmentWithGaps> {
    let runs = set_boundaries(path, states);
    filter_by_duration(mind_the_gaps(&runs, acceptable_gap), min_duration)
}
