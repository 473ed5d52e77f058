// wpa-common/src/context.rs
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};

use crate::config::Config;
use crate::progress::{NoopObserver, ProgressObserver};

/// Cloneable cancellation flag shared by every task of a run.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run state handed to every component: configuration, the bounded
/// download pool, the cancellation flag and the progress observer.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<Config>,
    pub cancel: CancelToken,
    pub observer: Arc<dyn ProgressObserver>,
    pool: Arc<Semaphore>,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        let permits = config.max_concurrent_downloads.max(1);
        Self {
            config: Arc::new(config),
            cancel: CancelToken::new(),
            observer: Arc::new(NoopObserver),
            pool: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        self.config.scratch_dir()
    }

    /// Semaphore capping concurrent registry and download work.
    pub fn pool(&self) -> Arc<Semaphore> {
        Arc::clone(&self.pool)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("pool_permits", &self.pool.available_permits())
            .finish()
    }
}
