//! Trust decomposition for a focal robot.
//!
//! Splits the trust a focal robot builds up into its direct, indirect
//! and contextual components, restricted to observations of a chosen
//! peer set, and marks the time windows in which those peers were
//! actively observed.

use crate::analysis::resampler::{bucket_labels, max_duration_ms, resample};
use crate::analysis::selection::{runs_for_robot, ObservedPolicy};
use crate::models::{
    Observation, ObservationWindow, RobotId, SimulationRecord, TrustField,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::num::NonZeroU64;
use tracing::debug;

/// Trust trajectories of the focal robot within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTrace {
    pub record_id: String,
    pub label: String,
    pub direct_trust_data: Vec<Option<f64>>,
    pub indirect_trust_data: Vec<Option<f64>>,
    pub context_data: Vec<Option<f64>>,
    /// Windows during which an observed peer was being observed.
    pub boxes: Vec<ObservationWindow>,
}

impl RunTrace {
    /// Values of one trust component.
    pub fn series(&self, field: TrustField) -> &[Option<f64>] {
        match field {
            TrustField::Direct => &self.direct_trust_data,
            TrustField::Indirect => &self.indirect_trust_data,
            TrustField::Context => &self.context_data,
        }
    }

    /// True when any component holds at least one value.
    pub fn has_values(&self) -> bool {
        TrustField::ALL
            .iter()
            .any(|&f| self.series(f).iter().any(Option::is_some))
    }
}

/// Decomposed trust of a focal robot across the runs charted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustDecomposition {
    pub focal: RobotId,
    pub observed: Vec<RobotId>,
    pub interval_ms: u64,
    /// Bucket start timestamps shared by every trace.
    pub labels: Vec<u64>,
    pub runs: Vec<RunTrace>,
}

impl TrustDecomposition {
    pub fn has_values(&self) -> bool {
        self.runs.iter().any(RunTrace::has_values)
    }
}

/// Decompose the focal robot's trust over the given runs.
///
/// `max_duration_ms` fixes the shared axis; runs ending earlier trail
/// with `None`. Never fails: runs without matching observations yield
/// all-`None` series and no windows.
pub fn decompose(
    focal: &str,
    observed: &BTreeSet<RobotId>,
    runs_for_focal: &[&SimulationRecord],
    max_duration_ms: u64,
    interval_ms: NonZeroU64,
) -> TrustDecomposition {
    let runs = runs_for_focal
        .iter()
        .map(|record| {
            let relevant: Vec<&Observation> = record
                .observations_of(focal)
                .iter()
                .filter(|o| observed.contains(&o.peer_id))
                .collect();

            debug!(
                "Run {}: {} observations of {} peers by {}",
                record.id,
                relevant.len(),
                observed.len(),
                focal
            );

            let component = |field: TrustField| {
                resample(relevant.iter().copied(), |o| field.select(o), interval_ms, max_duration_ms)
                    .values()
            };
            let direct = component(TrustField::Direct);
            let indirect = component(TrustField::Indirect);
            let context = component(TrustField::Context);

            // A bucket is occupied when any component resampled to a value
            let occupied: Vec<bool> = direct
                .iter()
                .zip(&indirect)
                .zip(&context)
                .map(|((d, i), c)| d.is_some() || i.is_some() || c.is_some())
                .collect();

            RunTrace {
                record_id: record.id.clone(),
                label: record.display_label().to_string(),
                direct_trust_data: direct,
                indirect_trust_data: indirect,
                context_data: context,
                boxes: merge_windows(&occupied, interval_ms),
            }
        })
        .collect();

    TrustDecomposition {
        focal: focal.to_string(),
        observed: observed.iter().cloned().collect(),
        interval_ms: interval_ms.get(),
        labels: bucket_labels(interval_ms, max_duration_ms),
        runs,
    }
}

/// Resolve `policy` and decompose over every run of `run_set` that logs `focal`.
///
/// The time axis spans the whole run set, not just the focal robot's runs.
pub fn decompose_with_policy(
    focal: &str,
    policy: &ObservedPolicy,
    run_set: &[&SimulationRecord],
    interval_ms: NonZeroU64,
) -> TrustDecomposition {
    let observed = policy.resolve(focal, run_set.iter().copied());
    let runs_for_focal = runs_for_robot(run_set, focal);
    let max_duration = max_duration_ms(run_set.iter().copied());

    decompose(focal, &observed, &runs_for_focal, max_duration, interval_ms)
}

/// Merge runs of adjacent occupied buckets into windows.
///
/// A window spans from the start of its first bucket to the end of its
/// last one, so an isolated bucket yields a window one interval wide.
pub fn merge_windows(occupied: &[bool], interval_ms: NonZeroU64) -> Vec<ObservationWindow> {
    let width = interval_ms.get();
    let mut windows = Vec::new();
    let mut open: Option<usize> = None;

    for (k, &present) in occupied.iter().enumerate() {
        match (present, open) {
            (true, None) => open = Some(k),
            (false, Some(start)) => {
                windows.push(window(start, k, width));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        windows.push(window(start, occupied.len(), width));
    }

    windows
}

fn window(first: usize, end_exclusive: usize, width: u64) -> ObservationWindow {
    ObservationWindow {
        start_ms: first as u64 * width,
        end_ms: end_exclusive as u64 * width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{observation, record};
    use crate::models::AuthorityInfo;

    fn interval(ms: u64) -> NonZeroU64 {
        NonZeroU64::new(ms).unwrap()
    }

    fn obs(ts: u64, peer: &str, direct: f64, indirect: Option<f64>, context: Option<f64>) -> Observation {
        Observation {
            timestamp_ms: ts,
            peer_id: peer.to_string(),
            direct_trust: Some(direct),
            indirect_trust: indirect,
            context,
        }
    }

    fn peers(ids: &[&str]) -> BTreeSet<RobotId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn swarm_run() -> SimulationRecord {
        let mut run = record("run-1", "1");
        run.data.authority.insert("focal".into(), AuthorityInfo { is_malicious: false });
        run.data.authority.insert("bad".into(), AuthorityInfo { is_malicious: true });
        run.data.authority.insert("good".into(), AuthorityInfo { is_malicious: false });
        run.data.robots.insert(
            "focal".into(),
            vec![
                obs(5, "bad", 0.5, Some(0.4), None),
                obs(12, "good", 0.9, None, Some(1.0)),
                obs(25, "bad", 0.3, None, Some(0.2)),
                obs(28, "bad", 0.2, None, None),
            ],
        );
        run
    }

    #[test]
    fn test_merge_windows() {
        let mut occupied = vec![false; 10];
        for k in [2, 3, 4, 7] {
            occupied[k] = true;
        }
        let windows = merge_windows(&occupied, interval(10));
        assert_eq!(
            windows,
            vec![
                ObservationWindow { start_ms: 20, end_ms: 50 },
                ObservationWindow { start_ms: 70, end_ms: 80 },
            ]
        );
    }

    #[test]
    fn test_merge_windows_runs_to_end() {
        let windows = merge_windows(&[true, false, true, true], interval(5));
        assert_eq!(
            windows,
            vec![
                ObservationWindow { start_ms: 0, end_ms: 5 },
                ObservationWindow { start_ms: 10, end_ms: 20 },
            ]
        );
        assert!(merge_windows(&[], interval(5)).is_empty());
    }

    #[test]
    fn test_decompose_filters_by_observed_peers() {
        let run = swarm_run();
        let result = decompose("focal", &peers(&["bad"]), &[&run], 30, interval(10));

        assert_eq!(result.labels, vec![0, 10, 20]);
        let trace = &result.runs[0];
        assert_eq!(trace.direct_trust_data, vec![Some(0.5), None, Some(0.2)]);
        assert_eq!(trace.indirect_trust_data, vec![Some(0.4), None, None]);
        assert_eq!(trace.context_data, vec![None, None, Some(0.2)]);
        assert_eq!(
            trace.boxes,
            vec![
                ObservationWindow { start_ms: 0, end_ms: 10 },
                ObservationWindow { start_ms: 20, end_ms: 30 },
            ]
        );
    }

    #[test]
    fn test_decompose_without_matches_is_all_null() {
        let run = swarm_run();
        let result = decompose("focal", &peers(&["stranger"]), &[&run], 30, interval(10));

        let trace = &result.runs[0];
        assert_eq!(trace.direct_trust_data, vec![None, None, None]);
        assert!(trace.boxes.is_empty());
        assert!(!result.has_values());
    }

    #[test]
    fn test_observation_without_trust_fields_opens_no_window() {
        let mut run = record("run-1", "1");
        run.data.robots.insert(
            "focal".into(),
            vec![
                observation(15, "peer", None),
                Observation {
                    context: Some(0.7),
                    ..observation(25, "peer", None)
                },
            ],
        );

        let result = decompose("focal", &peers(&["peer"]), &[&run], 30, interval(10));

        let trace = &result.runs[0];
        assert_eq!(trace.direct_trust_data, vec![None, None, None]);
        assert_eq!(trace.context_data, vec![None, None, Some(0.7)]);
        assert_eq!(trace.boxes, vec![ObservationWindow { start_ms: 20, end_ms: 30 }]);
    }

    #[test]
    fn test_decompose_with_policy_uses_whole_run_set_axis() {
        let run = swarm_run();
        let mut longer = record("run-2", "2");
        longer.data.robots.insert("other".into(), vec![obs(55, "focal", 0.1, None, None)]);
        let run_set = [&run, &longer];

        let result = decompose_with_policy("focal", &ObservedPolicy::MaliciousOnly, &run_set, interval(10));

        assert_eq!(result.labels.len(), 6);
        assert_eq!(result.observed, vec!["bad"]);
        // only run-1 logs the focal robot
        assert_eq!(result.runs.len(), 1);
        assert_eq!(result.runs[0].direct_trust_data[3..], [None, None, None]);
    }

    #[test]
    fn test_policies_select_different_peers() {
        let run = swarm_run();
        let run_set = [&run];

        let benign = decompose_with_policy("focal", &ObservedPolicy::NonMaliciousOnly, &run_set, interval(10));
        assert_eq!(benign.runs[0].direct_trust_data, vec![None, Some(0.9), None]);

        let all = decompose_with_policy("focal", &ObservedPolicy::Unfiltered, &run_set, interval(10));
        assert_eq!(all.runs[0].direct_trust_data, vec![Some(0.5), Some(0.9), Some(0.2)]);
        assert_eq!(all.runs[0].boxes, vec![ObservationWindow { start_ms: 0, end_ms: 30 }]);

        let single = decompose_with_policy(
            "focal",
            &ObservedPolicy::SpecificPeer("good".into()),
            &run_set,
            interval(10),
        );
        assert_eq!(single.observed, vec!["good"]);
        assert_eq!(single.runs[0].context_data, vec![None, Some(1.0), None]);
    }

    #[test]
    fn test_unknown_focal_robot() {
        let run = swarm_run();
        let result = decompose_with_policy("ghost", &ObservedPolicy::Unfiltered, &[&run], interval(10));
        assert!(result.runs.is_empty());
        assert!(result.observed.is_empty());
        assert_eq!(result.labels.len(), 3);
    }
}
