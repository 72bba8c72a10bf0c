//! Pod placement
//!
//! This module provides:
//! - Placement policies (first fit, best fit, worst fit)
//! - The eligibility filter shared by every policy
//! - Rescheduling of pods orphaned by a failed or removed node

mod reschedule;

pub use reschedule::{reschedule_pods, RescheduleReport};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Node, Pod};

/// Tie-break rule used to choose among eligible nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// First eligible node in registration order
    #[default]
    FirstFit,
    /// Eligible node left with the least slack after placement
    BestFit,
    /// Eligible node with the most free capacity
    WorstFit,
}

impl SchedulingPolicy {
    pub const ALL: [SchedulingPolicy; 3] = [
        SchedulingPolicy::FirstFit,
        SchedulingPolicy::BestFit,
        SchedulingPolicy::WorstFit,
    ];

    /// Resolve a policy name; unknown names fall back to first fit
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "best_fit" => SchedulingPolicy::BestFit,
            "worst_fit" => SchedulingPolicy::WorstFit,
            _ => SchedulingPolicy::FirstFit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingPolicy::FirstFit => "first_fit",
            SchedulingPolicy::BestFit => "best_fit",
            SchedulingPolicy::WorstFit => "worst_fit",
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the node that should host `pod`, as an index into `nodes`.
///
/// Returns `None` when no node passes the eligibility filter. Ties are
/// broken in favour of the node registered first.
pub fn select_node(nodes: &[Node], pod: &Pod, policy: SchedulingPolicy) -> Option<usize> {
    let mut eligible = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.is_eligible(pod));

    match policy {
        SchedulingPolicy::FirstFit => eligible.next().map(|(index, _)| index),
        SchedulingPolicy::BestFit => eligible
            .min_by_key(|(_, node)| slack_after(node, pod))
            .map(|(index, _)| index),
        SchedulingPolicy::WorstFit => {
            let mut best: Option<(usize, u64)> = None;
            for (index, node) in eligible {
                let free = node.cpu_available as u64 + node.memory_available as u64;
                if best.map_or(true, |(_, most)| free > most) {
                    best = Some((index, free));
                }
            }
            best.map(|(index, _)| index)
        }
    }
}

/// Capacity a node would have left after hosting `pod`
fn slack_after(node: &Node, pod: &Pod) -> u64 {
    (node.cpu_available - pod.cpu) as u64 + (node.memory_available - pod.memory) as u64
}
