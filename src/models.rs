//! Data models for swarm simulation analytics.
//!
//! This module contains the persisted record shape of a simulation run
//! and the series types produced by the analytics engine.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a robot within a run.
pub type RobotId = String;

/// Observations logged by one robot, ordered by time.
pub type RobotLog = Vec<Observation>;

/// A completed simulation run as persisted by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRecord {
    /// Unique id of the stored run.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Human readable label shown in legends.
    #[serde(default)]
    pub label: String,
    /// Random seed the run was started with.
    #[serde(deserialize_with = "string_or_number")]
    pub seed: String,
    /// Caller-assigned batch label for aggregate statistics.
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub analytics_group_id: Option<String>,
    /// Whether the trust layer was enabled for this run.
    pub is_trust_applied: bool,
    /// Whether the swarm completed its mission.
    pub was_mission_successful: bool,
    /// Finish time of the run.
    pub time: f64,
    /// Number of robots flagged malicious by the authority.
    #[serde(default)]
    pub number_of_malicious_robots: u32,
    /// Number of malicious robots the swarm detected.
    #[serde(default)]
    pub number_of_detected_malicious_robots: u32,
    /// Per-robot event logs and ground truth.
    pub data: RunLog,
}

impl SimulationRecord {
    /// Malicious robots that went undetected.
    ///
    /// Saturates at zero, so a run reporting more detections than malicious
    /// robots never reduces the undetected count of other runs in its group.
    pub fn undetected_malicious_robots(&self) -> u32 {
        self.number_of_malicious_robots
            .saturating_sub(self.number_of_detected_malicious_robots)
    }

    /// Observations logged by `robot`, or an empty slice if it never logged.
    pub fn observations_of(&self, robot: &str) -> &[Observation] {
        self.data
            .robots
            .get(robot)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Latest observation timestamp across every robot in the run.
    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.data
            .robots
            .values()
            .flat_map(|log| log.iter().map(|o| o.timestamp_ms))
            .max()
    }

    /// Label used in legends, falling back to the id.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Event logs and ground truth of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    /// Ground-truth maliciousness per robot.
    #[serde(default)]
    pub authority: BTreeMap<RobotId, AuthorityInfo>,
    /// Observation log per robot.
    #[serde(default)]
    pub robots: BTreeMap<RobotId, RobotLog>,
}

/// Authority designation of a robot, fixed for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityInfo {
    pub is_malicious: bool,
}

/// One observation a robot made about a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Milliseconds since the start of the run.
    pub timestamp_ms: u64,
    /// Robot being observed.
    #[serde(deserialize_with = "string_or_number")]
    pub peer_id: RobotId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_trust: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indirect_trust: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<f64>,
}

/// Trust component carried by an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustField {
    Direct,
    Indirect,
    Context,
}

impl TrustField {
    /// All components, in chart order.
    pub const ALL: [TrustField; 3] = [TrustField::Direct, TrustField::Indirect, TrustField::Context];

    /// Select this component from an observation.
    pub fn select(self, observation: &Observation) -> Option<f64> {
        match self {
            TrustField::Direct => observation.direct_trust,
            TrustField::Indirect => observation.indirect_trust,
            TrustField::Context => observation.context,
        }
    }
}

impl fmt::Display for TrustField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustField::Direct => write!(f, "Direct Trust"),
            TrustField::Indirect => write!(f, "Indirect Trust"),
            TrustField::Context => write!(f, "Context"),
        }
    }
}

/// One fixed-width time slice of a resampled series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket start, a multiple of the interval.
    pub timestamp_ms: u64,
    /// `None` when no observation fell in the bucket.
    pub value: Option<f64>,
}

/// A fixed-interval series starting at 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketedSeries {
    pub interval_ms: u64,
    pub buckets: Vec<Bucket>,
}

impl BucketedSeries {
    /// Bucket values in bucket order.
    pub fn values(&self) -> Vec<Option<f64>> {
        self.buckets.iter().map(|b| b.value).collect()
    }
}

/// A time range during which a peer was actively observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationWindow {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Robot ids split by ground-truth maliciousness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotPartition {
    pub malicious: Vec<RobotId>,
    pub nonmalicious: Vec<RobotId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

/// Ids and seeds are written as numbers by some simulator versions.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}
