use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lovenote_db::Database;

use crate::limiter::RateLimiter;
use crate::payload::NotificationPayload;
use crate::transport::PushTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    SilentHours,
    RateLimited,
    NoSubscriptions,
}

/// Aggregate result of one `send`. Skips are not errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: Option<SkipReason>,
}

impl SendReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            sent: 0,
            failed: 0,
            skipped: Some(reason),
        }
    }
}

/// Gates and fans out Web Push notifications for one user at a time.
pub struct NotificationDispatcher {
    db: Arc<Database>,
    transport: Arc<dyn PushTransport>,
    limiter: RateLimiter,
    /// Offset used to evaluate silent hours.
    local_offset: FixedOffset,
}

impl NotificationDispatcher {
    pub fn new(db: Arc<Database>, transport: Arc<dyn PushTransport>, local_offset: FixedOffset) -> Self {
        Self {
            db,
            transport,
            limiter: RateLimiter::new(local_offset),
            local_offset,
        }
    }

    /// Send `payload` to every active subscription of `user_id`.
    ///
    /// Never fails: storage errors are logged and reported as nothing sent.
    pub async fn send(&self, user_id: Uuid, payload: &NotificationPayload) -> SendReport {
        self.send_at(user_id, payload, Utc::now()).await
    }

    pub async fn send_at(&self, user_id: Uuid, payload: &NotificationPayload, now: DateTime<Utc>) -> SendReport {
        match self.try_send(user_id, payload, now).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Push dispatch for {} ({}) failed: {:#}", user_id, payload.tag, e);
                SendReport::default()
            }
        }
    }

    async fn try_send(
        &self,
        user_id: Uuid,
        payload: &NotificationPayload,
        now: DateTime<Utc>,
    ) -> anyhow::Result<SendReport> {
        let category = payload.category();

        // Preference gate
        let prefs = self.db.get_preferences(user_id)?.unwrap_or_default();
        if !prefs.allows(category) {
            debug!("{} notifications disabled for {}", category.as_str(), user_id);
            return Ok(SendReport::skipped(SkipReason::Disabled));
        }
        let local_hour = now.with_timezone(&self.local_offset).hour() as u8;
        if prefs.is_silent_at(local_hour) {
            debug!("Silent hours for {} at {}h", user_id, local_hour);
            return Ok(SendReport::skipped(SkipReason::SilentHours));
        }

        // Rate-limit gate
        if !self.limiter.is_seeded(user_id, category).await {
            let last = self.db.last_notification_sent(user_id, category)?;
            self.limiter.seed(user_id, category, last).await;
        }
        let reservation = match self.limiter.try_acquire(user_id, category, now).await {
            Ok(reservation) => reservation,
            Err(decision) => {
                debug!(
                    "Rate limited {} for {} (retry in {:?})",
                    category.as_str(),
                    user_id,
                    decision.retry_after
                );
                return Ok(SendReport::skipped(SkipReason::RateLimited));
            }
        };

        let subscriptions = match self.db.active_push_subscriptions(user_id) {
            Ok(subs) => subs,
            Err(e) => {
                self.limiter.release(reservation).await;
                return Err(e);
            }
        };
        if subscriptions.is_empty() {
            self.limiter.release(reservation).await;
            return Ok(SendReport::skipped(SkipReason::NoSubscriptions));
        }

        let body = payload.envelope();
        let results = join_all(
            subscriptions
                .iter()
                .map(|sub| self.transport.deliver(sub, &body)),
        )
        .await;

        let mut report = SendReport::default();
        for (sub, result) in subscriptions.iter().zip(results) {
            match result {
                Ok(()) => report.sent += 1,
                Err(e) if e.is_gone() => {
                    report.failed += 1;
                    info!("Push subscription gone, deactivating: {}", sub.endpoint);
                    if let Err(e) = self.db.deactivate_push_subscription(user_id, &sub.endpoint, now) {
                        warn!("Failed to deactivate subscription {}: {}", sub.endpoint, e);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Push to {} failed: {}", sub.endpoint, e);
                }
            }
        }

        if report.sent > 0 {
            if let Err(e) = self.db.insert_notification_log(user_id, &payload.tag, now) {
                warn!("Failed to record notification log for {}: {}", user_id, e);
            }
        } else {
            self.limiter.release(reservation).await;
        }

        info!(
            "Push {} to {}: sent={} failed={}",
            payload.tag, user_id, report.sent, report.failed
        );
        Ok(report)
    }
}
