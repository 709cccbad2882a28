use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Terminal state of a delayed restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledOutcome {
    Cancelled,
    Fired,
}

/// A restart waiting out its delay on its own task. `Scheduled` is the state
/// while this handle exists; the task resolves to `Cancelled` or `Fired`.
#[derive(Debug)]
pub struct PendingAutoRestart {
    job_id: Uuid,
    cancel_tx: oneshot::Sender<()>,
    handle: JoinHandle<ScheduledOutcome>,
}

impl PendingAutoRestart {
    /// Spawns a task that sleeps for `delay` and then drives `on_fire` to
    /// completion. A cancel that arrives first drops `on_fire` unpolled.
    pub fn schedule<F>(job_id: Uuid, delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        // `sleep` saturates a deadline that would overflow the clock.
        let sleep = tokio::time::sleep(delay);

        let handle = tokio::spawn(async move {
            tokio::pin!(sleep);
            tokio::select! {
                biased;

                res = &mut cancel_rx => {
                    if res.is_ok() {
                        info!(%job_id, "Scheduled restart cancelled.");
                        return ScheduledOutcome::Cancelled;
                    }
                    // Handle dropped without cancelling: keep the schedule.
                    (&mut sleep).await;
                }
                _ = &mut sleep => {}
            }
            info!(%job_id, "Scheduled restart firing.");
            on_fire.await;
            ScheduledOutcome::Fired
        });

        debug!(%job_id, delay_seconds = delay.as_secs(), "Scheduled restart.");
        Self {
            job_id,
            cancel_tx,
            handle,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Requests cancellation. Has no effect once the restart has fired; the
    /// returned handle reports which terminal state was reached.
    pub fn cancel(self) -> JoinHandle<ScheduledOutcome> {
        if self.cancel_tx.send(()).is_err() {
            debug!(job_id = %self.job_id, "Scheduled restart already finished, nothing to cancel.");
        }
        self.handle
    }

    pub fn into_handle(self) -> JoinHandle<ScheduledOutcome> {
        self.handle
    }
}
