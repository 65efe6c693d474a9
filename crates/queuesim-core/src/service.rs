use crate::client::{Client, PathKind};
use crate::config::ServiceConfig;
use crate::inflight::InFlight;
use crate::stats::StatCounters;
use async_channel::{Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

/// Node name to inbound queue, shared read-only by every node and dispatch worker.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Arc<HashMap<String, Sender<Client>>>,
}

impl RoutingTable {
    pub fn new(routes: HashMap<String, Sender<Client>>) -> Self {
        Self {
            routes: Arc::new(routes),
        }
    }

    /// Hand `client` to `target` without waiting.
    ///
    /// A full queue, a closed queue and an unknown target all give the client back
    /// so the caller can record the drop.
    pub fn try_forward(&self, target: &str, client: Client) -> Result<(), Client> {
        let Some(inbound) = self.routes.get(target) else {
            debug!("no route to {}, dropping {}", target, client.request_name());
            return Err(client);
        };

        match inbound.try_send(client) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(client)) => {
                debug!("{} is full, dropping {}", target, client.request_name());
                Err(client)
            }
            Err(TrySendError::Closed(client)) => {
                debug!("{} is closed, dropping {}", target, client.request_name());
                Err(client)
            }
        }
    }
}

/// A simulated processing stage: one bounded inbound queue drained by a fixed
/// number of workers.
pub struct Service {
    name: String,
    config: ServiceConfig,
    inbound: Sender<Client>,
    queue: Receiver<Client>,
    stats: Arc<Mutex<StatCounters>>,
}

impl Service {
    pub fn new(name: impl Into<String>, config: ServiceConfig) -> Self {
        // Config::validate rejects a zero capacity; async-channel panics on it
        let (inbound, queue) = async_channel::bounded(config.max_client_conn.max(1));
        Self {
            name: name.into(),
            config,
            inbound,
            queue,
            stats: Arc::new(Mutex::new(StatCounters::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle other nodes use to push clients into this one.
    pub fn inbound(&self) -> Sender<Client> {
        self.inbound.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Start the worker pool. Workers run until the inbound queue is closed and drained.
    pub fn run(&self, routes: RoutingTable, inflight: InFlight) -> Vec<JoinHandle<()>> {
        (0..self.config.parallel)
            .map(|idx| {
                let worker = NodeWorker {
                    node: self.name.clone(),
                    idx,
                    queue: self.queue.clone(),
                    request_time: self.config.request_process_time(),
                    response_time: self.config.response_process_time(),
                    routes: routes.clone(),
                    stats: Arc::clone(&self.stats),
                    inflight: inflight.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect()
    }

    /// Stop accepting clients. Queued clients are still handed to the workers.
    pub fn close(&self) -> bool {
        self.inbound.close()
    }

    pub async fn stats(&self) -> StatCounters {
        self.stats.lock().await.clone()
    }
}

struct NodeWorker {
    node: String,
    idx: usize,
    queue: Receiver<Client>,
    request_time: Duration,
    response_time: Duration,
    routes: RoutingTable,
    stats: Arc<Mutex<StatCounters>>,
    inflight: InFlight,
}

impl NodeWorker {
    async fn run(self) {
        while let Ok(client) = self.queue.recv().await {
            self.process(client).await;
        }
        debug!("{} worker #{} stopped", self.node, self.idx);
    }

    async fn process(&self, mut client: Client) {
        let delay = match client.phase() {
            PathKind::Request => self.request_time,
            PathKind::Response => self.response_time,
        };
        sleep(delay).await;

        let Some(step) = client.advance() else {
            self.stats.lock().await.record_success(client.request_name());
            self.inflight.complete();
            return;
        };

        let request_name = client.request_name().to_string();
        match self.routes.try_forward(&step.target, client) {
            Ok(()) => self.stats.lock().await.record_forwarded(&request_name),
            Err(client) => {
                self.stats
                    .lock()
                    .await
                    .record_failure(client.request_name(), &step.target);
                self.inflight.complete();
            }
        }
    }
}
