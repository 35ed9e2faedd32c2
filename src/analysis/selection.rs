//! Record and robot selection.
//!
//! Decides which runs take part in a chart and which peers a focal
//! robot's observations are filtered to.

use crate::analysis::aggregator::GroupKey;
use crate::models::{RobotId, RobotPartition, SimulationRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Keep the records matching the checked ids and groups.
///
/// An empty `ids` or `groups` list means "no restriction". Input order is preserved.
pub fn select_records<'a>(
    records: &'a [SimulationRecord],
    ids: &[String],
    groups: &[String],
    key: GroupKey,
) -> Vec<&'a SimulationRecord> {
    records
        .iter()
        .filter(|r| ids.is_empty() || ids.contains(&r.id))
        .filter(|r| groups.is_empty() || groups.iter().any(|g| g == key.key_of(r)))
        .collect()
}

/// Split every robot with an authority entry into malicious and non-malicious.
///
/// A robot flagged malicious in any of the runs counts as malicious.
pub fn partition_robots<'a, I>(records: I) -> RobotPartition
where
    I: IntoIterator<Item = &'a SimulationRecord>,
{
    let mut malicious = BTreeSet::new();
    let mut all = BTreeSet::new();

    for record in records {
        for (robot, info) in &record.data.authority {
            all.insert(robot.clone());
            if info.is_malicious {
                malicious.insert(robot.clone());
            }
        }
    }

    RobotPartition {
        nonmalicious: all.difference(&malicious).cloned().collect(),
        malicious: malicious.into_iter().collect(),
    }
}

/// Runs in which `robot` logged at least one observation.
pub fn runs_for_robot<'a>(records: &[&'a SimulationRecord], robot: &str) -> Vec<&'a SimulationRecord> {
    records
        .iter()
        .copied()
        .filter(|r| !r.observations_of(robot).is_empty())
        .collect()
}

/// Which peers a focal robot's observations are restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservedPolicy {
    /// Every peer the focal robot ever logged.
    Unfiltered,
    /// Peers the authority flags malicious.
    MaliciousOnly,
    /// Peers the authority does not flag malicious.
    NonMaliciousOnly,
    /// A single chosen peer.
    SpecificPeer(RobotId),
}

impl ObservedPolicy {
    /// Resolve the observed peer set for `focal` over the given runs.
    ///
    /// One set covers every run. A robot flagged malicious in any run counts
    /// as malicious in all of them, so its observations in runs where it was
    /// honest still fall under [`MaliciousOnly`](Self::MaliciousOnly).
    pub fn resolve<'a, I>(&self, focal: &str, records: I) -> BTreeSet<RobotId>
    where
        I: IntoIterator<Item = &'a SimulationRecord> + Clone,
    {
        let logged: BTreeSet<RobotId> = records
            .clone()
            .into_iter()
            .flat_map(|r| r.observations_of(focal).iter().map(|o| o.peer_id.clone()))
            .collect();

        match self {
            ObservedPolicy::Unfiltered => logged,
            ObservedPolicy::MaliciousOnly => {
                partition_robots(records).malicious.into_iter().collect()
            }
            ObservedPolicy::NonMaliciousOnly => {
                let malicious: BTreeSet<RobotId> =
                    partition_robots(records).malicious.into_iter().collect();
                logged.difference(&malicious).cloned().collect()
            }
            ObservedPolicy::SpecificPeer(peer) => BTreeSet::from([peer.clone()]),
        }
    }

    /// Short description used in chart titles.
    pub fn describe(&self) -> String {
        match self {
            ObservedPolicy::Unfiltered => "all peers".to_string(),
            ObservedPolicy::MaliciousOnly => "malicious peers".to_string(),
            ObservedPolicy::NonMaliciousOnly => "non-malicious peers".to_string(),
            ObservedPolicy::SpecificPeer(peer) => format!("peer {peer}"),
        }
    }
}
