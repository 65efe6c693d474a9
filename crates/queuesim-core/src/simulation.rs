use crate::config::Config;
use crate::dispatch;
use crate::inflight::InFlight;
use crate::loader::{generate, LoadPool};
use crate::pacing::Pacer;
use crate::report::{DispatchReport, NodeReport, SimulationReport};
use crate::service::{RoutingTable, Service};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tokio::time::timeout;
use tracing::{info, warn};

/// Wires the configured services into a network, drives the load through it and
/// collects the report.
pub struct Simulation {
    config: Config,
    seed: u64,
}

impl Simulation {
    pub fn new(config: Config) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self { config, seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub async fn run(self) -> Result<SimulationReport> {
        let config = self.config;

        if config.load.is_empty() {
            warn!("load list is empty");
            return Ok(SimulationReport::build(
                self.seed,
                0,
                BTreeMap::new(),
                Vec::new(),
                Vec::new(),
            ));
        }

        for (load, target) in config.unknown_targets() {
            warn!("load {} routes through unknown node {}", load, target);
        }

        let services: Vec<Service> = config
            .services
            .iter()
            .map(|(name, cfg)| Service::new(name.clone(), cfg.clone()))
            .collect();
        let routes = RoutingTable::new(
            services
                .iter()
                .map(|s| (s.name().to_string(), s.inbound()))
                .collect::<HashMap<_, _>>(),
        );

        let inflight = InFlight::new();
        let mut node_handles = Vec::new();
        for service in &services {
            node_handles.extend(service.run(routes.clone(), inflight.clone()));
        }

        let pool = LoadPool::new(&config.load, StdRng::seed_from_u64(self.seed));
        let (dispatch_tx, dispatch_rx) = async_channel::bounded(1);
        let dispatch_handles = dispatch::spawn_pool(
            config.parallel,
            dispatch_rx,
            routes.clone(),
            Pacer::from_rps(config.rps),
            inflight.clone(),
        );

        info!(
            "started loading: {} clients, seed {}, {} dispatch workers at {} rps",
            pool.remaining(),
            self.seed,
            config.parallel,
            config.rps
        );
        let began = Instant::now();

        let generated = tokio::spawn(generate(pool, dispatch_tx, inflight.clone()))
            .await
            .context("load generator task failed")?;

        let mut dispatch_reports = Vec::with_capacity(dispatch_handles.len());
        for (worker, handle) in dispatch_handles.into_iter().enumerate() {
            let stats = handle
                .await
                .with_context(|| format!("dispatch worker #{worker} failed"))?;
            dispatch_reports.push(DispatchReport { worker, stats });
        }

        match config.drain_timeout() {
            Some(limit) => {
                if timeout(limit, inflight.wait_idle()).await.is_err() {
                    warn!(
                        "drain timed out after {:?} with {} clients in flight",
                        limit,
                        inflight.current()
                    );
                }
            }
            None => inflight.wait_idle().await,
        }

        for service in &services {
            service.close();
        }
        for handle in node_handles {
            handle.await.context("service worker failed")?;
        }

        let elapsed = began.elapsed();
        info!("ended loading, elapsed {:?}", elapsed);

        let mut nodes = Vec::with_capacity(services.len());
        for service in &services {
            nodes.push(NodeReport {
                name: service.name().to_string(),
                stats: service.stats().await,
            });
        }

        let report = SimulationReport::build(
            self.seed,
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            generated,
            nodes,
            dispatch_reports,
        );
        report.log();
        Ok(report)
    }
}
