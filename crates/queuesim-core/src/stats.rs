use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Per-request outcome counters kept by a node or a dispatch worker.
///
/// `successful` counts clients whose itinerary ended at the holder, `forwarded`
/// counts clients handed off to their next hop, and `failed` counts drops bucketed by
/// the node the client could not be handed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCounters {
    pub successful: BTreeMap<String, u64>,
    pub forwarded: BTreeMap<String, u64>,
    pub failed: BTreeMap<String, BTreeMap<String, u64>>,
}

impl StatCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, request: &str) {
        *self.successful.entry(request.to_string()).or_default() += 1;
    }

    pub fn record_forwarded(&mut self, request: &str) {
        *self.forwarded.entry(request.to_string()).or_default() += 1;
    }

    pub fn record_failure(&mut self, request: &str, target: &str) {
        *self
            .failed
            .entry(request.to_string())
            .or_default()
            .entry(target.to_string())
            .or_default() += 1;
    }

    pub fn successful_for(&self, request: &str) -> u64 {
        self.successful.get(request).copied().unwrap_or(0)
    }

    pub fn forwarded_for(&self, request: &str) -> u64 {
        self.forwarded.get(request).copied().unwrap_or(0)
    }

    pub fn failed_for(&self, request: &str) -> u64 {
        self.failed
            .get(request)
            .map(|buckets| buckets.values().sum())
            .unwrap_or(0)
    }

    /// Every client of `request` this holder has processed, whatever the outcome.
    pub fn processed_for(&self, request: &str) -> u64 {
        self.successful_for(request) + self.forwarded_for(request) + self.failed_for(request)
    }

    pub fn merge(&mut self, other: &StatCounters) {
        for (request, count) in &other.successful {
            *self.successful.entry(request.clone()).or_default() += count;
        }
        for (request, count) in &other.forwarded {
            *self.forwarded.entry(request.clone()).or_default() += count;
        }
        for (request, buckets) in &other.failed {
            let merged = self.failed.entry(request.clone()).or_default();
            for (target, count) in buckets {
                *merged.entry(target.clone()).or_default() += count;
            }
        }
    }

    pub fn log(&self, label: &str) {
        info!("--- {} ---", label);
        info!("Successful:");
        for (request, count) in &self.successful {
            info!("{}: {} times", request, count);
        }
        info!("Forwarded:");
        for (request, count) in &self.forwarded {
            info!("{}: {} times", request, count);
        }
        info!("Failed:");
        for (request, buckets) in &self.failed {
            for (target, count) in buckets {
                info!("{}: sent to {} {} times", request, target, count);
            }
        }
    }
}
