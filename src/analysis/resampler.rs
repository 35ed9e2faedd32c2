//! Fixed-interval resampling of irregular observation streams.
//!
//! Robots log observations at uneven rates and runs differ in length.
//! Resampling puts every run on a common time axis starting at 0 so
//! series from different runs can be charted side by side.

use crate::models::{Bucket, BucketedSeries, Observation, SimulationRecord};
use std::num::NonZeroU64;

/// Number of buckets needed to cover `max_duration_ms`.
pub fn bucket_count(interval_ms: NonZeroU64, max_duration_ms: u64) -> usize {
    max_duration_ms.div_ceil(interval_ms.get()) as usize
}

/// Bucket start timestamps for the given axis.
pub fn bucket_labels(interval_ms: NonZeroU64, max_duration_ms: u64) -> Vec<u64> {
    (0..bucket_count(interval_ms, max_duration_ms) as u64)
        .map(|k| k * interval_ms.get())
        .collect()
}

/// Latest observation timestamp across every run charted together.
///
/// Returns 0 when no run logged anything.
pub fn max_duration_ms<'a, I>(records: I) -> u64
where
    I: IntoIterator<Item = &'a SimulationRecord>,
{
    records
        .into_iter()
        .filter_map(SimulationRecord::last_timestamp_ms)
        .max()
        .unwrap_or(0)
}

/// Resample an observation stream onto fixed-width buckets.
///
/// Each bucket takes the selected value of the latest observation inside
/// it that carries one; observations with equal timestamps resolve to the
/// one appearing later in the stream. Empty buckets stay `None` and are
/// never filled in. Observations past the last bucket are ignored.
pub fn resample<'a, I, F>(
    events: I,
    select: F,
    interval_ms: NonZeroU64,
    max_duration_ms: u64,
) -> BucketedSeries
where
    I: IntoIterator<Item = &'a Observation>,
    F: Fn(&Observation) -> Option<f64>,
{
    let count = bucket_count(interval_ms, max_duration_ms);
    let width = interval_ms.get();

    // (timestamp, value) of the current winner per bucket
    let mut latest: Vec<Option<(u64, f64)>> = vec![None; count];

    for event in events {
        let Some(value) = select(event) else {
            continue;
        };
        let Some(slot) = latest.get_mut((event.timestamp_ms / width) as usize) else {
            continue;
        };
        match slot {
            Some((ts, _)) if *ts > event.timestamp_ms => {}
            _ => *slot = Some((event.timestamp_ms, value)),
        }
    }

    BucketedSeries {
        interval_ms: width,
        buckets: latest
            .into_iter()
            .enumerate()
            .map(|(k, winner)| Bucket {
                timestamp_ms: k as u64 * width,
                value: winner.map(|(_, v)| v),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{observation, record};
    use crate::models::TrustField;

    fn interval(ms: u64) -> NonZeroU64 {
        NonZeroU64::new(ms).unwrap()
    }

    fn direct(o: &Observation) -> Option<f64> {
        TrustField::Direct.select(o)
    }

    #[test]
    fn test_bucket_count_is_ceiling() {
        for (max, width, expected) in [(0, 10, 0), (1, 10, 1), (10, 10, 1), (11, 10, 2), (95, 10, 10), (7, 3, 3)] {
            let series = resample(std::iter::empty(), direct, interval(width), max);
            assert_eq!(series.buckets.len(), expected, "max={max} width={width}");
        }
    }

    #[test]
    fn test_labels_start_at_zero() {
        assert_eq!(bucket_labels(interval(25), 80), vec![0, 25, 50, 75]);
    }

    #[test]
    fn test_most_recent_wins_within_bucket() {
        let events = vec![
            observation(12, "p", Some(0.2)),
            observation(18, "p", Some(0.8)),
            observation(15, "p", Some(0.5)),
        ];
        let series = resample(&events, direct, interval(10), 30);
        assert_eq!(series.values(), vec![None, Some(0.8), None]);
    }

    #[test]
    fn test_equal_timestamps_take_later_event() {
        let events = vec![observation(5, "p", Some(0.1)), observation(5, "p", Some(0.9))];
        let series = resample(&events, direct, interval(10), 10);
        assert_eq!(series.values(), vec![Some(0.9)]);
    }

    #[test]
    fn test_missing_field_does_not_overwrite() {
        let events = vec![observation(1, "p", Some(0.3)), observation(9, "p", None)];
        let series = resample(&events, direct, interval(10), 10);
        assert_eq!(series.values(), vec![Some(0.3)]);
    }

    #[test]
    fn test_empty_buckets_stay_null() {
        let events = vec![observation(0, "p", Some(0.0)), observation(45, "p", Some(1.0))];
        let series = resample(&events, direct, interval(10), 50);
        assert_eq!(series.values(), vec![Some(0.0), None, None, None, Some(1.0)]);
        let starts: Vec<u64> = series.buckets.iter().map(|b| b.timestamp_ms).collect();
        assert_eq!(starts, vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn test_no_observations_yields_full_null_series() {
        let series = resample(std::iter::empty(), direct, interval(100), 1000);
        assert_eq!(series.buckets.len(), 10);
        assert!(series.values().iter().all(Option::is_none));
    }

    #[test]
    fn test_events_past_axis_are_ignored() {
        let events = vec![observation(30, "p", Some(0.5))];
        let series = resample(&events, direct, interval(10), 30);
        assert_eq!(series.values(), vec![None, None, None]);
    }

    #[test]
    fn test_max_duration_spans_all_runs() {
        let mut short = record("a", "1");
        short.data.robots.insert("r1".into(), vec![observation(40, "r2", None)]);
        let mut long = record("b", "1");
        long.data.robots.insert("r3".into(), vec![observation(90, "r1", None)]);
        let empty = record("c", "1");

        assert_eq!(max_duration_ms([&short, &long, &empty]), 90);
        assert_eq!(max_duration_ms([&empty]), 0);
    }

    #[test]
    fn test_resample_is_idempotent() {
        let events = vec![observation(3, "p", Some(0.4)), observation(13, "p", Some(0.6))];
        let first = resample(&events, direct, interval(5), 20);
        let second = resample(&events, direct, interval(5), 20);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
