use crate::domain::payment::{PaymentId, PaymentStatus};
use crate::domain::ports::PaymentGatewayRef;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// A terminal status observed for the payment a poll was started for.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub generation: u64,
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
}

struct ActivePoll {
    generation: u64,
    payment_id: PaymentId,
    task: JoinHandle<()>,
}

/// Polls the gateway for one in-flight payment at a fixed interval.
///
/// Owns at most one polling task. `start` always stops the previous task
/// first, and `stop` makes any response still in flight inert: the task
/// checks the shared epoch before reporting, and `is_current` lets the
/// receiver drop reports that were queued before the stop.
pub struct StatusPoller {
    gateway: PaymentGatewayRef,
    interval: Duration,
    reports: mpsc::UnboundedSender<PollReport>,
    epoch: Arc<AtomicU64>,
    active: Option<ActivePoll>,
}

impl StatusPoller {
    pub fn new(
        gateway: PaymentGatewayRef,
        interval: Duration,
        reports: mpsc::UnboundedSender<PollReport>,
    ) -> Self {
        Self {
            gateway,
            interval,
            reports,
            epoch: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    /// Starts polling `payment_id`, replacing any active poll. Returns the
    /// generation stamped on the reports of this poll.
    pub fn start(&mut self, payment_id: PaymentId) -> u64 {
        self.stop();
        let generation = self.epoch.load(Ordering::SeqCst);
        let task = tokio::spawn(poll_loop(
            self.gateway.clone(),
            self.interval,
            payment_id.clone(),
            generation,
            self.epoch.clone(),
            self.reports.clone(),
        ));
        debug!(payment_id = %payment_id, generation, "status polling started");
        self.active = Some(ActivePoll {
            generation,
            payment_id,
            task,
        });
        generation
    }

    pub fn stop(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(active) = self.active.take() {
            active.task.abort();
            debug!(
                payment_id = %active.payment_id,
                generation = active.generation,
                "status polling stopped"
            );
        }
    }

    /// Whether a polling task is still running.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Whether `report` belongs to the poll that is currently owned.
    pub fn is_current(&self, report: &PollReport) -> bool {
        self.active.as_ref().is_some_and(|active| {
            active.generation == report.generation && active.payment_id == report.payment_id
        })
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    gateway: PaymentGatewayRef,
    period: Duration,
    payment_id: PaymentId,
    generation: u64,
    epoch: Arc<AtomicU64>,
    reports: mpsc::UnboundedSender<PollReport>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if epoch.load(Ordering::SeqCst) != generation {
            return;
        }
        match gateway.status(&payment_id).await {
            Ok(status) => {
                debug!(payment_id = %payment_id, %status, "status checked");
                if epoch.load(Ordering::SeqCst) != generation {
                    return;
                }
                if status.is_terminal() {
                    let _ = reports.send(PollReport {
                        generation,
                        payment_id,
                        status,
                    });
                    return;
                }
            }
            // retried by the next tick
            Err(e) => warn!(payment_id = %payment_id, error = %e, "status check failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryGateway;

    fn poller_with(
        gateway: &InMemoryGateway,
    ) -> (StatusPoller, mpsc::UnboundedReceiver<PollReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::new(Arc::new(gateway.clone()), Duration::from_secs(2), tx);
        (poller, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_terminal_status_and_stops() {
        let gateway = InMemoryGateway::new();
        let id = PaymentId::new("p1");
        gateway
            .script_statuses(
                &id,
                [PaymentStatus::Pending, PaymentStatus::Pending, PaymentStatus::Confirmed],
            )
            .await;
        let (mut poller, mut rx) = poller_with(&gateway);

        let generation = poller.start(id.clone());
        let report = rx.recv().await.unwrap();
        assert_eq!(report.generation, generation);
        assert_eq!(report.status, PaymentStatus::Confirmed);
        assert!(poller.is_current(&report));
        assert_eq!(gateway.status_calls(&id).await, 3);

        time::sleep(Duration::from_secs(10)).await;
        assert!(!poller.is_active());
        assert_eq!(gateway.status_calls(&id).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_waits_one_interval() {
        let gateway = InMemoryGateway::new();
        let id = PaymentId::new("p1");
        let (mut poller, _rx) = poller_with(&gateway);

        poller.start(id.clone());
        time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(gateway.status_calls(&id).await, 0);
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(gateway.status_calls(&id).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_leaves_single_active_poll() {
        let gateway = InMemoryGateway::new();
        let first = PaymentId::new("p1");
        let second = PaymentId::new("p2");
        gateway.script_statuses(&first, [PaymentStatus::Confirmed]).await;
        let (mut poller, mut rx) = poller_with(&gateway);

        poller.start(first.clone());
        poller.start(second.clone());
        assert!(poller.is_active());

        time::sleep(Duration::from_secs(9)).await;
        assert_eq!(gateway.status_calls(&first).await, 0);
        assert_eq!(gateway.status_calls(&second).await, 4);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_response() {
        let gateway = InMemoryGateway::new();
        gateway.set_status_delay(Duration::from_secs(1)).await;
        let id = PaymentId::new("p1");
        gateway.script_statuses(&id, [PaymentStatus::Confirmed]).await;
        let (mut poller, mut rx) = poller_with(&gateway);

        poller.start(id.clone());
        // request issued at 2s, answered at 3s
        time::sleep(Duration::from_millis(2_500)).await;
        poller.stop();
        time::sleep(Duration::from_secs(5)).await;

        assert!(rx.try_recv().is_err());
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_errors_retry_on_next_tick() {
        let gateway = InMemoryGateway::new();
        let id = PaymentId::new("p1");
        gateway.script_status_error(&id).await;
        gateway.script_statuses(&id, [PaymentStatus::Failed]).await;
        let (mut poller, mut rx) = poller_with(&gateway);

        poller.start(id.clone());
        let report = rx.recv().await.unwrap();
        assert_eq!(report.status, PaymentStatus::Failed);
        assert_eq!(gateway.status_calls(&id).await, 2);
    }
}
