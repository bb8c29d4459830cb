use async_channel::{Receiver, Sender, TrySendError};
use perfgate_core::{OverflowPolicy, RequestResult};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Bounded queue between the virtual users of a step and whatever drains it.
///
/// A push blocked under [`OverflowPolicy::Block`] gives up once `token` is cancelled.
pub(crate) fn step_buffer(
    capacity: usize,
    policy: OverflowPolicy,
    token: CancellationToken,
) -> (BufferProducer, Receiver<RequestResult>) {
    let (tx, rx) = async_channel::bounded(capacity);
    let producer = BufferProducer {
        tx,
        rx: rx.clone(),
        policy,
        token,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (producer, rx)
}

#[derive(Clone)]
pub(crate) struct BufferProducer {
    tx: Sender<RequestResult>,
    // NOTE: Only used to evict under `DropOldest`
    rx: Receiver<RequestResult>,
    policy: OverflowPolicy,
    token: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl BufferProducer {
    /// Queue a result. Returns `false` if the result itself was not accepted.
    pub async fn push(&self, result: RequestResult) -> bool {
        match self.policy {
            OverflowPolicy::Block => tokio::select! {
                biased;
                sent = self.tx.send(result) => sent.is_ok(),
                _ = self.token.cancelled() => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("Step ended while waiting for buffer room, dropping result");
                    false
                }
            },
            OverflowPolicy::DropNewest => match self.tx.try_send(result) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("Step buffer full, dropping newest result");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            },
            OverflowPolicy::DropOldest => {
                let mut result = result;
                loop {
                    match self.tx.try_send(result) {
                        Ok(()) => return true,
                        Err(TrySendError::Full(rejected)) => {
                            if self.rx.try_recv().is_ok() {
                                self.dropped.fetch_add(1, Ordering::Relaxed);
                                warn!("Step buffer full, evicted oldest result");
                            }
                            result = rejected;
                        }
                        Err(TrySendError::Closed(_)) => return false,
                    }
                }
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
