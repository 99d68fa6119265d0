use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::remote::RemoteApi;

/// Source of online/offline status.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receives every reachability change. The channel closes when the
    /// provider is dropped.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Switched by hand: `--offline`, tests.
#[derive(Debug)]
pub struct ManualNetwork {
    tx: watch::Sender<bool>,
}

impl ManualNetwork {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            info!(online, "network status switched");
        }
    }
}

impl NetworkStatus for ManualNetwork {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Treats the API server as "the network": online while its health endpoint
/// answers.
pub struct ProbeNetwork {
    remote: Arc<dyn RemoteApi>,
    tx: watch::Sender<bool>,
}

impl ProbeNetwork {
    /// Probes once so `is_online` is meaningful right away.
    pub async fn connect(remote: Arc<dyn RemoteApi>) -> Self {
        let (tx, _rx) = watch::channel(false);
        let network = Self { remote, tx };
        network.probe().await;
        network
    }

    #[tracing::instrument(skip(self))]
    pub async fn probe(&self) -> bool {
        let online = match self.remote.health().await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "health probe failed");
                false
            }
        };

        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            info!(online, "network status changed");
        }
        online
    }

    /// Re-probes every `every` until the returned task is aborted.
    pub fn spawn_polling(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.probe().await;
            }
        })
    }
}

impl NetworkStatus for ProbeNetwork {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
