//! Missing-range computation over a sorted set of cached open times.

use market_data_ingestor::models::{interval::Step, range::TimeRange};

/// Returns the sub-ranges of `requested` that hold no cached bucket.
///
/// `cached` are open times, ascending and unique, normally the result of a
/// range read for `requested`. The output is sorted, pairwise disjoint and lies
/// inside `requested`. Together with the cached buckets it covers `requested`.
///
/// ```
/// use market_data_ingestor::models::{interval::Step, range::TimeRange};
/// use series_cache::gaps::compute_missing_ranges;
///
/// let requested = TimeRange::new(1_000, 7_000).unwrap();
/// let cached = [1_000, 2_000, 5_000, 6_000, 7_000];
/// let gaps = compute_missing_ranges(requested, &Step::Fixed(1_000), &cached);
/// assert_eq!(gaps, vec![TimeRange::new(3_000, 4_000).unwrap()]);
/// ```
pub fn compute_missing_ranges(
    requested: TimeRange,
    step: &Step,
    cached: &[i64],
) -> Vec<TimeRange> {
    let (Some(&first), Some(&last)) = (cached.first(), cached.last()) else {
        return vec![requested];
    };

    let mut gaps = Vec::new();
    let mut push = |start: i64, end: i64| {
        let start = start.max(requested.start_ms());
        let end = end.min(requested.end_ms());
        if let Ok(range) = TimeRange::new(start, end) {
            gaps.push(range);
        }
    };

    if requested.start_ms() < first {
        push(requested.start_ms(), step.prev_boundary(first));
    }

    for pair in cached.windows(2) {
        let expected = step.next_boundary(pair[0]);
        if expected < pair[1] {
            push(expected, step.prev_boundary(pair[1]));
        }
    }

    if requested.end_ms() > last {
        push(step.next_boundary(last), requested.end_ms());
    }

    gaps
}
