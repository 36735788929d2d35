//! Fixed-interval background loops.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Shortest period a loop will run at. A zero period would spin.
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A loop that runs `cycle` every `period`, first after one full period.
///
/// Dropping or stopping the handle ends the loop at the next tick. A cycle
/// that is already running is left to finish.
pub(crate) struct PeriodicTask {
    stop_tx: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub(crate) fn spawn<F, Fut>(period: Duration, mut cycle: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let (stop_tx, mut stop_rx) = watch::channel(());
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                if cycle().await.is_break() {
                    break;
                }
            }
        });
        Self { stop_tx, handle }
    }

    /// Stop ticking and wait for an in-progress cycle to finish.
    pub(crate) async fn stop(self) {
        let Self { stop_tx, handle } = self;
        drop(stop_tx);
        let _ = handle.await;
    }
}
