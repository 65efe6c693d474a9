use crate::client::Client;
use crate::inflight::InFlight;
use crate::pacing::Pacer;
use crate::service::RoutingTable;
use crate::stats::StatCounters;
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// First-hop admission into the node network.
///
/// Each worker owns its counters outright and hands them back when the generation
/// queue is closed and drained.
pub struct DispatchWorker {
    index: usize,
    queue: Receiver<Client>,
    routes: RoutingTable,
    pacer: Pacer,
    inflight: InFlight,
    stats: StatCounters,
}

impl DispatchWorker {
    pub fn new(
        index: usize,
        queue: Receiver<Client>,
        routes: RoutingTable,
        pacer: Pacer,
        inflight: InFlight,
    ) -> Self {
        Self {
            index,
            queue,
            routes,
            pacer,
            inflight,
            stats: StatCounters::new(),
        }
    }

    pub fn stats(&self) -> &StatCounters {
        &self.stats
    }

    /// Push a freshly generated client to its first hop, or record the outcome
    /// right here when that is impossible.
    pub fn admit(&mut self, mut client: Client) {
        let Some(step) = client.advance() else {
            warn!("got load with empty path: {}", client.request_name());
            self.stats.record_success(client.request_name());
            self.inflight.complete();
            return;
        };

        let request_name = client.request_name().to_string();
        match self.routes.try_forward(&step.target, client) {
            Ok(()) => self.stats.record_forwarded(&request_name),
            Err(client) => {
                self.stats
                    .record_failure(client.request_name(), &step.target);
                self.inflight.complete();
            }
        }
    }

    pub async fn run(mut self) -> StatCounters {
        while let Ok(client) = self.queue.recv().await {
            self.admit(client);
            self.pacer.pause().await;
        }
        debug!("dispatch worker #{} stopped", self.index);
        self.stats
    }
}

/// Start `parallel` dispatch workers sharing one generation queue.
pub fn spawn_pool(
    parallel: usize,
    queue: Receiver<Client>,
    routes: RoutingTable,
    pacer: Pacer,
    inflight: InFlight,
) -> Vec<JoinHandle<StatCounters>> {
    (0..parallel)
        .map(|index| {
            let worker = DispatchWorker::new(
                index,
                queue.clone(),
                routes.clone(),
                pacer,
                inflight.clone(),
            );
            tokio::spawn(worker.run())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PathStep;
    use crate::config::ServiceConfig;
    use crate::service::Service;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn client(name: &str, steps: Vec<PathStep>) -> Client {
        Client::new(Arc::from(name), Arc::from(steps))
    }

    fn worker(routes: RoutingTable, inflight: InFlight) -> DispatchWorker {
        let (_tx, rx) = async_channel::bounded(1);
        DispatchWorker::new(0, rx, routes, Pacer::from_rps(0), inflight)
    }

    fn single_slot(request_process_time_ms: u64) -> ServiceConfig {
        ServiceConfig {
            max_client_conn: 1,
            request_process_time_ms,
            response_process_time_ms: request_process_time_ms,
            parallel: 1,
        }
    }

    #[tokio::test]
    async fn test_capacity_one_admits_exactly_one() {
        // workers are not started, so the first client stays queued
        let a = Service::new("a", single_slot(1));
        let routes = RoutingTable::new(HashMap::from([("a".to_string(), a.inbound())]));
        let inflight = InFlight::new();
        let mut worker = worker(routes, inflight.clone());

        for _ in 0..2 {
            inflight.begin();
            worker.admit(client("login", vec![PathStep::request("a")]));
        }

        assert_eq!(worker.stats().forwarded_for("login"), 1);
        assert_eq!(worker.stats().failed["login"]["a"], 1);
        assert_eq!(a.queue_len(), 1);
        assert_eq!(inflight.current(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_counts_queued_clients_only() {
        let a = Service::new("a", single_slot(10_000));
        let routes = RoutingTable::new(HashMap::from([("a".to_string(), a.inbound())]));
        let inflight = InFlight::new();
        let _node = a.run(routes.clone(), inflight.clone());
        let mut worker = worker(routes, inflight.clone());

        inflight.begin();
        worker.admit(client("login", vec![PathStep::request("a")]));

        // let the node's only worker pick the client up and start its long sleep
        for _ in 0..100 {
            if a.queue_len() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(a.queue_len(), 0);

        for _ in 0..2 {
            inflight.begin();
            worker.admit(client("login", vec![PathStep::request("a")]));
        }

        assert_eq!(worker.stats().forwarded_for("login"), 2);
        assert_eq!(worker.stats().failed["login"]["a"], 1);
        assert_eq!(a.queue_len(), 1);
        assert_eq!(inflight.current(), 2);
    }

    #[tokio::test]
    async fn test_empty_itinerary_counts_as_success() {
        let inflight = InFlight::new();
        let mut worker = worker(RoutingTable::default(), inflight.clone());

        inflight.begin();
        worker.admit(client("noop", Vec::new()));

        assert_eq!(worker.stats().successful_for("noop"), 1);
        assert_eq!(worker.stats().failed_for("noop"), 0);
        assert_eq!(inflight.current(), 0);
    }

    #[tokio::test]
    async fn test_unknown_first_hop_is_a_drop() {
        let inflight = InFlight::new();
        let mut worker = worker(RoutingTable::default(), inflight.clone());

        inflight.begin();
        worker.admit(client("login", vec![PathStep::request("ghost")]));

        assert_eq!(worker.stats().failed["login"]["ghost"], 1);
        assert_eq!(inflight.current(), 0);
    }

    #[tokio::test]
    async fn test_pool_accounts_for_every_client() {
        let a = Service::new("a", ServiceConfig::default());
        let routes = RoutingTable::new(HashMap::from([("a".to_string(), a.inbound())]));
        let inflight = InFlight::new();
        let (tx, rx) = async_channel::bounded(1);

        let handles = spawn_pool(3, rx, routes, Pacer::from_rps(0), inflight.clone());
        for i in 0..20 {
            let target = if i % 4 == 0 { "ghost" } else { "a" };
            inflight.begin();
            tx.send(client("login", vec![PathStep::request(target)]))
                .await
                .unwrap();
        }
        drop(tx);

        let mut merged = StatCounters::new();
        for h in handles {
            merged.merge(&h.await.unwrap());
        }
        assert_eq!(merged.processed_for("login"), 20);
        assert_eq!(merged.failed["login"]["ghost"], 5);
        assert_eq!(merged.forwarded_for("login"), 15);
        assert_eq!(a.queue_len(), 15);
    }
}
