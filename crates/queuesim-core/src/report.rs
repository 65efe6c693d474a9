use crate::stats::StatCounters;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub name: String,
    pub stats: StatCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub worker: usize,
    pub stats: StatCounters,
}

/// Clients dropped in front of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropBucket {
    pub target: String,
    pub count: u64,
    pub percent: Option<f64>,
}

/// Merged outcome of one request name across the whole network.
///
/// Percentages are relative to the number of clients generated for the load and are
/// absent when that number is unknown or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub request: String,
    pub generated: Option<u64>,
    pub successful: u64,
    pub successful_percent: Option<f64>,
    pub failed: Vec<DropBucket>,
}

impl RequestSummary {
    pub fn failed_total(&self) -> u64 {
        self.failed.iter().map(|bucket| bucket.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub elapsed_ms: u64,
    pub generated: BTreeMap<String, u64>,
    pub nodes: Vec<NodeReport>,
    pub dispatch: Vec<DispatchReport>,
    pub requests: Vec<RequestSummary>,
}

impl SimulationReport {
    /// Build the report from frozen node and dispatch counters.
    pub fn build(
        seed: u64,
        elapsed_ms: u64,
        generated: BTreeMap<String, u64>,
        nodes: Vec<NodeReport>,
        dispatch: Vec<DispatchReport>,
    ) -> Self {
        let requests = aggregate(
            nodes.iter().map(|n| &n.stats).chain(dispatch.iter().map(|d| &d.stats)),
            &generated,
        );
        Self {
            seed,
            elapsed_ms,
            generated,
            nodes,
            dispatch,
            requests,
        }
    }

    pub fn request(&self, name: &str) -> Option<&RequestSummary> {
        self.requests.iter().find(|r| r.request == name)
    }

    pub fn log(&self) {
        for node in &self.nodes {
            node.stats.log(&node.name);
        }
        for worker in &self.dispatch {
            worker.stats.log(&format!("worker #{}", worker.worker));
        }
        info!("--- total ---");
        for summary in &self.requests {
            info!(
                "{}: generated {}, successful {} ({}), failed {}",
                summary.request,
                summary
                    .generated
                    .map_or_else(|| "?".to_string(), |g| g.to_string()),
                summary.successful,
                format_percent(summary.successful_percent),
                summary.failed_total()
            );
            for bucket in &summary.failed {
                info!(
                    "{}: sent to {} {} times ({})",
                    summary.request,
                    bucket.target,
                    bucket.count,
                    format_percent(bucket.percent)
                );
            }
        }
    }
}

/// Merge counters into one view per request name and normalize against the
/// generated volume. Reads its inputs only, so the same counters always give the
/// same summaries.
pub fn aggregate<'a>(
    counters: impl IntoIterator<Item = &'a StatCounters>,
    generated: &BTreeMap<String, u64>,
) -> Vec<RequestSummary> {
    let mut merged = StatCounters::new();
    for stats in counters {
        merged.merge(stats);
    }

    let names: BTreeSet<&String> = generated
        .keys()
        .chain(merged.successful.keys())
        .chain(merged.failed.keys())
        .collect();

    names
        .into_iter()
        .map(|name| {
            let total = generated.get(name).copied();
            let successful = merged.successful_for(name);
            let failed = merged
                .failed
                .get(name)
                .map(|buckets| {
                    buckets
                        .iter()
                        .map(|(target, &count)| DropBucket {
                            target: target.clone(),
                            count,
                            percent: percent(count, total),
                        })
                        .collect()
                })
                .unwrap_or_default();

            RequestSummary {
                request: name.clone(),
                generated: total,
                successful,
                successful_percent: percent(successful, total),
                failed,
            }
        })
        .collect()
}

fn percent(count: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some(count as f64 * 100.0 / total as f64),
        _ => None,
    }
}

pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{p:.2}%"),
        None => "n/a".to_string(),
    }
}
