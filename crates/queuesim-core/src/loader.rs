use crate::client::{Client, PathStep};
use crate::config::LoadConfig;
use crate::inflight::InFlight;
use async_channel::Sender;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Request path as request steps followed by response path as response steps.
pub fn expand_itinerary(load: &LoadConfig) -> Vec<PathStep> {
    load.request_path
        .iter()
        .map(PathStep::request)
        .chain(load.response_path.iter().map(PathStep::response))
        .collect()
}

/// A load still owing clients to the schedule.
#[derive(Debug, Clone)]
struct PendingLoad {
    name: Arc<str>,
    itinerary: Arc<[PathStep]>,
    remaining: u64,
}

/// Weighted draw-without-replacement over the configured loads.
///
/// Each draw picks a uniformly random pending load, so loads with more remaining
/// clients do not get more weight; a load leaves the pool (swap-remove) once its
/// count is spent.
pub struct LoadPool<R> {
    pending: Vec<PendingLoad>,
    rng: R,
}

impl<R: Rng> LoadPool<R> {
    pub fn new(loads: &BTreeMap<String, LoadConfig>, mut rng: R) -> Self {
        let mut pending = Vec::with_capacity(loads.len());

        for (name, load) in loads {
            if load.count == 0 {
                warn!("got load {} with 0 load count: {:?}", name, load);
                continue;
            }
            pending.push(PendingLoad {
                name: Arc::from(name.as_str()),
                itinerary: Arc::from(expand_itinerary(load)),
                remaining: load.count,
            });
        }

        pending.shuffle(&mut rng);

        Self { pending, rng }
    }

    pub fn remaining(&self) -> u64 {
        self.pending.iter().map(|load| load.remaining).sum()
    }

    pub fn draw(&mut self) -> Option<Client> {
        if self.pending.is_empty() {
            return None;
        }

        let idx = self.rng.gen_range(0..self.pending.len());
        let load = &mut self.pending[idx];
        let client = Client::new(Arc::clone(&load.name), Arc::clone(&load.itinerary));

        load.remaining -= 1;
        if load.remaining == 0 {
            self.pending.swap_remove(idx);
        }

        Some(client)
    }
}

impl<R: Rng> Iterator for LoadPool<R> {
    type Item = Client;

    fn next(&mut self) -> Option<Client> {
        self.draw()
    }
}

/// Feed every client of `pool` into the dispatch queue, waiting for a dispatch
/// worker to take each one. Returns the number of clients generated per load.
pub async fn generate<R: Rng>(
    pool: LoadPool<R>,
    dispatch: Sender<Client>,
    inflight: InFlight,
) -> BTreeMap<String, u64> {
    let mut generated: BTreeMap<String, u64> = BTreeMap::new();

    for client in pool {
        let name = client.request_name().to_string();
        inflight.begin();
        if dispatch.send(client).await.is_err() {
            warn!("dispatch queue closed, stopping generation");
            inflight.complete();
            break;
        }
        *generated.entry(name).or_default() += 1;
    }

    debug!("generation finished: {:?}", generated);
    generated
}
