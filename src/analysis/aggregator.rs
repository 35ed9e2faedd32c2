//! Grouped statistics over completed runs.
//!
//! This module partitions runs by a categorical key and reduces each
//! partition to scalar summaries: mission success counts, malicious
//! detection rates and mean finish time split by trust condition.

use crate::models::SimulationRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Categorical key used to batch runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKey {
    /// Random seed of the run
    #[default]
    Seed,
    /// Caller-assigned analytics group id
    #[value(name = "group")]
    #[serde(rename = "group")]
    AnalyticsGroup,
}

/// Key reported for runs without an analytics group.
pub const UNGROUPED: &str = "ungrouped";

impl GroupKey {
    /// Extract this key from a record.
    pub fn key_of<'a>(&self, record: &'a SimulationRecord) -> &'a str {
        match self {
            GroupKey::Seed => &record.seed,
            GroupKey::AnalyticsGroup => record.analytics_group_id.as_deref().unwrap_or(UNGROUPED),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Seed => write!(f, "Seed"),
            GroupKey::AnalyticsGroup => write!(f, "Analytics Group"),
        }
    }
}

/// Records partitioned by key, keys in order of first occurrence.
#[derive(Debug, Clone)]
pub struct GroupPartition<'a, K> {
    groups: Vec<(K, Vec<&'a SimulationRecord>)>,
}

impl<'a, K: Eq> GroupPartition<'a, K> {
    pub fn get(&self, key: &K) -> Option<&[&'a SimulationRecord]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, records)| records.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[&'a SimulationRecord])> {
        self.groups.iter().map(|(k, r)| (k, r.as_slice()))
    }

    /// Consume the partition, ordering groups by key.
    pub fn into_sorted(mut self) -> Vec<(K, Vec<&'a SimulationRecord>)>
    where
        K: Ord,
    {
        self.groups.sort_by(|a, b| a.0.cmp(&b.0));
        self.groups
    }
}

/// Group records by `key_fn`, preserving first-seen key order.
pub fn group_by<'a, I, K, F>(records: I, key_fn: F) -> GroupPartition<'a, K>
where
    I: IntoIterator<Item = &'a SimulationRecord>,
    K: Eq + Hash + Clone,
    F: Fn(&SimulationRecord) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a SimulationRecord>)> = Vec::new();

    for record in records {
        let key = key_fn(record);
        match index.get(&key) {
            Some(&i) => groups[i].1.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![record]));
            }
        }
    }

    GroupPartition { groups }
}

/// Successful and failed mission counts per group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessRate {
    pub labels: Vec<String>,
    pub successful: Vec<u32>,
    pub failed: Vec<u32>,
}

/// Count mission outcomes per group, groups sorted by key.
pub fn mission_success_rate<'a, I>(records: I, key: GroupKey) -> SuccessRate
where
    I: IntoIterator<Item = &'a SimulationRecord>,
{
    // One sorted ordering feeds labels and both value arrays.
    let sorted = group_by(records, |r| key.key_of(r).to_string()).into_sorted();

    let mut rate = SuccessRate::default();
    for (label, group) in sorted {
        let successful = group.iter().filter(|r| r.was_mission_successful).count() as u32;
        rate.labels.push(label);
        rate.successful.push(successful);
        rate.failed.push(group.len() as u32 - successful);
    }
    rate
}

/// Detected vs undetected malicious robots per group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionRate {
    pub labels: Vec<String>,
    pub detected: Vec<u32>,
    pub not_detected: Vec<u32>,
    /// Percentage detected, rounded to 2 decimals. `None` when the group had no malicious robots.
    pub percentage: Vec<Option<f64>>,
}

/// Sum detections per group, groups sorted by key.
pub fn malicious_detection_rate<'a, I>(records: I, key: GroupKey) -> DetectionRate
where
    I: IntoIterator<Item = &'a SimulationRecord>,
{
    let sorted = group_by(records, |r| key.key_of(r).to_string()).into_sorted();

    let mut rate = DetectionRate::default();
    for (label, group) in sorted {
        let detected: u32 = group.iter().map(|r| r.number_of_detected_malicious_robots).sum();
        let not_detected: u32 = group.iter().map(|r| r.undetected_malicious_robots()).sum();
        rate.labels.push(label);
        rate.detected.push(detected);
        rate.not_detected.push(not_detected);
        rate.percentage.push(percentage(detected, detected + not_detected));
    }
    rate
}

/// Mean finish time per seed, split by whether trust was applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishTimeByCondition {
    pub labels: Vec<String>,
    /// `None` where no run of the seed had trust applied.
    pub trust_on: Vec<Option<f64>>,
    /// `None` where every run of the seed had trust applied.
    pub trust_off: Vec<Option<f64>>,
}

/// Mean finish time per seed and trust condition, seeds in first-seen order.
pub fn finish_time_by_condition<'a, I>(records: I) -> FinishTimeByCondition
where
    I: IntoIterator<Item = &'a SimulationRecord>,
{
    let by_seed = group_by(records, |r| r.seed.clone());

    let mut result = FinishTimeByCondition::default();
    for (seed, group) in by_seed.iter() {
        let branches = group_by(group.iter().copied(), |r| r.is_trust_applied);
        result.labels.push(seed.clone());
        result.trust_on.push(mean_finish_time(branches.get(&true)));
        result.trust_off.push(mean_finish_time(branches.get(&false)));
    }
    result
}

fn mean_finish_time(records: Option<&[&SimulationRecord]>) -> Option<f64> {
    let records = records.filter(|r| !r.is_empty())?;
    Some(records.iter().map(|r| r.time).sum::<f64>() / records.len() as f64)
}

/// `part / total * 100` rounded to 2 decimals, `None` when `total` is zero.
pub fn percentage(part: u32, total: u32) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let raw = f64::from(part) / f64::from(total) * 100.0;
    Some((raw * 100.0).round() / 100.0)
}

/// Headline numbers over a set of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub successful: usize,
    pub trust_applied: usize,
    pub malicious_robots: u32,
    pub detected_malicious_robots: u32,
}

impl RunSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a SimulationRecord>,
    {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            if record.was_mission_successful {
                summary.successful += 1;
            }
            if record.is_trust_applied {
                summary.trust_applied += 1;
            }
            summary.malicious_robots += record.number_of_malicious_robots;
            summary.detected_malicious_robots += record.number_of_detected_malicious_robots;
        }
        summary
    }

    /// Overall detection percentage.
    pub fn detection_percentage(&self) -> Option<f64> {
        percentage(self.detected_malicious_robots, self.malicious_robots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;

    fn grouped(id: &str, group: &str, success: bool) -> SimulationRecord {
        let mut r = record(id, "1");
        r.analytics_group_id = Some(group.to_string());
        r.was_mission_successful = success;
        r
    }

    fn timed(id: &str, seed: &str, trust: bool, time: f64) -> SimulationRecord {
        let mut r = record(id, seed);
        r.is_trust_applied = trust;
        r.time = time;
        r
    }

    #[test]
    fn test_group_by_keeps_first_seen_order() {
        let records = vec![record("1", "b"), record("2", "a"), record("3", "b")];
        let groups = group_by(&records, |r| r.seed.clone());

        let keys: Vec<&String> = groups.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        let b: Vec<_> = groups.get(&"b".to_string()).unwrap().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(b, vec!["1", "3"]);
    }

    #[test]
    fn test_group_by_empty() {
        let groups = group_by(std::iter::empty(), |r: &SimulationRecord| r.seed.clone());
        assert_eq!(groups.iter().count(), 0);
    }

    #[test]
    fn test_mission_success_rate() {
        let records = vec![
            grouped("1", "g1", true),
            grouped("2", "g1", false),
            grouped("3", "g2", true),
        ];
        let rate = mission_success_rate(&records, GroupKey::AnalyticsGroup);

        assert_eq!(rate.labels, vec!["g1", "g2"]);
        assert_eq!(rate.successful, vec![1, 1]);
        assert_eq!(rate.failed, vec![1, 0]);
    }

    #[test]
    fn test_success_rate_aligns_labels_with_values() {
        let records = vec![
            grouped("1", "zeta", false),
            grouped("2", "alpha", true),
            grouped("3", "zeta", false),
        ];
        let rate = mission_success_rate(&records, GroupKey::AnalyticsGroup);

        assert_eq!(rate.labels, vec!["alpha", "zeta"]);
        assert_eq!(rate.successful, vec![1, 0]);
        assert_eq!(rate.failed, vec![0, 2]);
    }

    #[test]
    fn test_ungrouped_records_share_a_key() {
        let records = vec![record("1", "1"), record("2", "2")];
        let rate = mission_success_rate(&records, GroupKey::AnalyticsGroup);
        assert_eq!(rate.labels, vec![UNGROUPED]);
        assert_eq!(rate.successful, vec![2]);
    }

    #[test]
    fn test_malicious_detection_rate() {
        let mut a = grouped("1", "g", true);
        a.number_of_malicious_robots = 4;
        a.number_of_detected_malicious_robots = 3;
        let b = SimulationRecord { id: "2".into(), ..a.clone() };

        let rate = malicious_detection_rate([&a, &b], GroupKey::AnalyticsGroup);
        assert_eq!(rate.labels, vec!["g"]);
        assert_eq!(rate.detected, vec![6]);
        assert_eq!(rate.not_detected, vec![2]);
        assert_eq!(rate.percentage, vec![Some(75.0)]);
    }

    #[test]
    fn test_overcounted_detections_do_not_offset_other_runs() {
        let mut overcounted = grouped("1", "g", true);
        overcounted.number_of_malicious_robots = 1;
        overcounted.number_of_detected_malicious_robots = 3;
        let mut missed = grouped("2", "g", false);
        missed.number_of_malicious_robots = 2;

        let rate = malicious_detection_rate([&overcounted, &missed], GroupKey::AnalyticsGroup);
        assert_eq!(rate.detected, vec![3]);
        assert_eq!(rate.not_detected, vec![2]);
        assert_eq!(rate.percentage, vec![Some(60.0)]);
    }

    #[test]
    fn test_detection_rate_without_malicious_robots() {
        let records = vec![grouped("1", "g", true)];
        let rate = malicious_detection_rate(&records, GroupKey::AnalyticsGroup);
        assert_eq!(rate.percentage, vec![None]);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), Some(33.33));
        assert_eq!(percentage(2, 3), Some(66.67));
        assert_eq!(percentage(0, 0), None);
    }

    #[test]
    fn test_finish_time_by_condition() {
        let records = vec![
            timed("1", "7", true, 100.0),
            timed("2", "7", true, 200.0),
            timed("3", "7", false, 400.0),
            timed("4", "3", false, 50.0),
        ];
        let result = finish_time_by_condition(&records);

        assert_eq!(result.labels, vec!["7", "3"]);
        assert_eq!(result.trust_on, vec![Some(150.0), None]);
        assert_eq!(result.trust_off, vec![Some(400.0), Some(50.0)]);
    }

    #[test]
    fn test_reducers_on_empty_input() {
        let none: Vec<SimulationRecord> = Vec::new();
        assert_eq!(mission_success_rate(&none, GroupKey::Seed), SuccessRate::default());
        assert_eq!(malicious_detection_rate(&none, GroupKey::Seed), DetectionRate::default());
        assert_eq!(finish_time_by_condition(&none), FinishTimeByCondition::default());
    }

    #[test]
    fn test_reducers_are_idempotent() {
        let records = vec![grouped("1", "g2", true), grouped("2", "g1", false)];
        let first = serde_json::to_string(&mission_success_rate(&records, GroupKey::AnalyticsGroup)).unwrap();
        let second = serde_json::to_string(&mission_success_rate(&records, GroupKey::AnalyticsGroup)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_summary() {
        let mut a = timed("1", "1", true, 1.0);
        a.number_of_malicious_robots = 2;
        a.number_of_detected_malicious_robots = 1;
        let mut b = timed("2", "1", false, 1.0);
        b.was_mission_successful = false;

        let summary = RunSummary::from_records([&a, &b]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.trust_applied, 1);
        assert_eq!(summary.detection_percentage(), Some(50.0));
    }
}
