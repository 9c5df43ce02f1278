use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{READY_PROBE_INITIAL_BACKOFF_MS, READY_PROBE_MAX_BACKOFF_SECS};
use crate::state::AppState;

/// Owns the background tasks: a readiness barrier they wait on and a token that stops them.
pub struct Scheduler {
    cancel: CancellationToken,
    ready_tx: Arc<watch::Sender<bool>>,
    tasks: JoinSet<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            ready_tx: Arc::new(ready_tx),
            tasks: JoinSet::new(),
        }
    }

    pub fn readiness(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    #[cfg(test)]
    pub fn mark_ready(&self) {
        self.ready_tx.send_replace(true);
    }

    /// Probes the chat platform with capped backoff and opens the barrier on first success.
    pub fn spawn_ready_probe(&mut self, state: AppState) {
        let cancel = self.cancel.clone();
        let ready_tx = self.ready_tx.clone();
        self.tasks.spawn(async move {
            let mut backoff = Duration::from_millis(READY_PROBE_INITIAL_BACKOFF_MS);
            let max_backoff = Duration::from_secs(READY_PROBE_MAX_BACKOFF_SECS);
            loop {
                match state.messages.current_user().await {
                    Ok(user) => {
                        info!(bot_user_id = %user, "chat platform connection ready");
                        ready_tx.send_replace(true);
                        return;
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            retry_in_ms = backoff.as_millis() as u64,
                            "readiness probe failed"
                        );
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(max_backoff);
            }
        });
    }

    /// Runs `job` every `period` once ready, until shutdown. A tick that overruns the
    /// period delays the next one instead of bursting.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, job: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let mut ready = self.ready_tx.subscribe();
        self.tasks.spawn(async move {
            let opened = async move { ready.wait_for(|ready| *ready).await.is_ok() };
            tokio::select! {
                _ = cancel.cancelled() => return,
                opened = opened => {
                    if !opened {
                        return;
                    }
                }
            }
            info!(task = name, period_secs = period.as_secs_f64(), "periodic task started");

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                job(cancel.clone()).await;
            }
            info!(task = name, "periodic task stopped");
        });
    }

    /// Cancels every task and waits up to `timeout` for them to finish.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.cancel.cancel();
        let drain = async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result
                    && e.is_panic()
                {
                    warn!(error = %e, "background task panicked");
                }
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "background tasks did not stop in time, aborting"
            );
            self.tasks.abort_all();
        }
    }
}
