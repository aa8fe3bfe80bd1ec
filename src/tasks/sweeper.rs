//! Expiration Sweeper
//!
//! Background task that periodically removes expired cache entries and
//! delivers expired keys to the user hook.
//!
//! One loop per cache waits on three sources at once: the sweep ticker, the
//! cancellation token and the expired-key queue. Full sweeps run on the
//! blocking pool so the loop keeps draining the queue while a sweep is in
//! progress.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{Cache, Inner};

/// Shortest accepted sweep interval.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

// == Sweeper Handle ==
/// Cancellation handle for a running sweeper.
pub(crate) struct SweeperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    // == Start ==
    /// Starts the background sweeper, sweeping every `interval`.
    ///
    /// The sweeper runs until [`Cache::stop`] is called, `token` is
    /// cancelled, or the last handle to the cache is dropped. Starting a
    /// sweeper while one is already running stops the old one first.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    /// * `token` - Parent token; the sweeper runs on a child of it, so
    ///   [`Cache::stop`] never cancels the caller's token
    /// * `interval` - Time between full sweeps, clamped to at least 1ms
    ///
    /// # Example
    /// ```ignore
    /// let cache: Cache<String> = Cache::new();
    /// cache.start_expired(&CancellationToken::new(), Duration::from_secs(1));
    /// // Later, during shutdown:
    /// cache.stop();
    /// ```
    pub fn start_expired(&self, token: &CancellationToken, interval: Duration) -> &Self {
        let token = token.child_token();
        let handle = spawn_sweeper(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.hook_rx),
            token.clone(),
            interval.max(MIN_SWEEP_INTERVAL),
        );

        if self.replace_sweeper(SweeperHandle { token, handle }) {
            warn!("Sweeper already running, replacing it");
        }
        self
    }

    /// Installs `sweeper`, cancelling any previous one.
    ///
    /// Returns true only if the previous sweeper task was still alive.
    fn replace_sweeper(&self, sweeper: SweeperHandle) -> bool {
        let Some(previous) = self.inner.sweeper.lock().replace(sweeper) else {
            return false;
        };
        let was_live = !previous.handle.is_finished();
        previous.token.cancel();
        was_live
    }

    // == Stop ==
    /// Signals the sweeper to stop without waiting for it.
    ///
    /// Hook calls already dispatched keep running to completion.
    pub fn stop(&self) {
        if let Some(sweeper) = self.inner.sweeper.lock().take() {
            sweeper.token.cancel();
        }
    }

    /// Returns true while a sweeper task is alive.
    pub fn is_running(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .as_ref()
            .is_some_and(|sweeper| !sweeper.handle.is_finished())
    }
}

/// Spawns the sweeper loop.
///
/// The task only holds a weak reference to the cache so it never keeps the
/// cache alive on its own.
fn spawn_sweeper<V>(
    cache: Weak<Inner<V>>,
    hook_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    token: CancellationToken,
    interval: Duration,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        // A replaced sweeper releases the queue once it has wound down.
        let mut expired_keys = tokio::select! {
            rx = hook_rx.lock_owned() => rx,
            _ = token.cancelled() => return,
        };

        info!(
            "Starting expiration sweeper with interval of {:?}",
            interval
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if sweep.as_ref().is_some_and(|s| !s.is_finished()) {
                        debug!("Previous sweep still running, skipping tick");
                        continue;
                    }
                    let Some(inner) = cache.upgrade() else { break };
                    let cache = Cache { inner };
                    let token = token.clone();
                    sweep = Some(tokio::task::spawn_blocking(move || {
                        let removed = cache.delete_expired(&token);
                        if removed > 0 {
                            info!("Sweep: removed {} expired entries", removed);
                        } else {
                            debug!("Sweep: no expired entries found");
                        }
                    }));
                }
                Some(key) = expired_keys.recv() => {
                    let Some(inner) = cache.upgrade() else { break };
                    let hook = inner.hook.read().clone();
                    drop(inner);
                    match hook {
                        // Hooks may block; a failing hook only takes down its own call.
                        Some(hook) => {
                            tokio::task::spawn_blocking(move || hook(&key));
                        }
                        None => debug!(key = %key, "Expired key with no hook installed"),
                    }
                }
            }
        }

        info!("Expiration sweeper stopped");
    })
}
