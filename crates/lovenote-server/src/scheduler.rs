use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lovenote_api::daily::DailyService;

/// Checks on an interval whether today's daily message is due and sends it.
/// Returns once `shutdown` is cancelled.
pub async fn run_scheduler(daily: Arc<DailyService>, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Daily scheduler stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        match daily.run_due(Utc::now(), false).await {
            Ok(true) => info!("Scheduler: daily message sent"),
            Ok(false) => debug!("Scheduler: nothing due"),
            Err(e) => warn!("Scheduler error: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::FixedOffset;

    use lovenote_ai::{DailyMessageGenerator, ModelError, TextModel};
    use lovenote_db::Database;
    use lovenote_gateway::dispatcher::Dispatcher;
    use lovenote_notify::relay::{AlertError, AlertTransport};
    use lovenote_notify::{AlertRelay, DeliveryError, NotificationDispatcher, PushTransport};
    use lovenote_types::models::PushSubscription;

    struct NoPush;

    #[async_trait]
    impl PushTransport for NoPush {
        async fn deliver(&self, _: &PushSubscription, _: &[u8]) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    struct NoAlerts;

    #[async_trait]
    impl AlertTransport for NoAlerts {
        async fn send_text(&self, _: &str) -> Result<(), AlertError> {
            Ok(())
        }
    }

    struct EchoModel;

    #[async_trait]
    impl TextModel for EchoModel {
        async fn generate(&self, _: &str, _: &str) -> Result<String, ModelError> {
            Ok("Chào buổi sáng".into())
        }
    }

    fn daily_service() -> Arc<DailyService> {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let (alerts, _worker) = AlertRelay::spawn(Arc::new(NoAlerts));
        let notifier = Arc::new(NotificationDispatcher::new(db.clone(), Arc::new(NoPush), offset));
        let generator = Arc::new(DailyMessageGenerator::new(Arc::new(EchoModel), offset));
        Arc::new(DailyService::new(db, Dispatcher::new(), notifier, alerts, generator, offset, None))
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_scheduler(daily_service(), Duration::from_millis(10), shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
