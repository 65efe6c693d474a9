use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Count of generated clients that have not yet succeeded or been dropped.
///
/// The generator calls [`InFlight::begin`] for every client it creates and whoever
/// records a client's terminal outcome calls [`InFlight::complete`]. Once generation
/// and dispatch are over, a zero count means every queue is empty and it is safe to
/// close them.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    count: AtomicU64,
    idle: Notify,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) {
        self.inner.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn complete(&self) {
        let previous = self.inner.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "in-flight count underflow");
        if previous == 1 {
            // notify_one keeps a permit when nobody is waiting yet
            self.inner.idle.notify_one();
        }
    }

    pub fn current(&self) -> u64 {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Wait until the count drops to zero. Only meaningful once no more
    /// [`InFlight::begin`] calls can happen.
    pub async fn wait_idle(&self) {
        while self.current() != 0 {
            self.inner.idle.notified().await;
        }
    }
}
