use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lovenote_ai::{DailyMessageGenerator, InteractionHistory};
use lovenote_db::Database;
use lovenote_gateway::dispatcher::Dispatcher;
use lovenote_notify::{Alert, AlertRelay, NotificationDispatcher, NotificationPayload};
use lovenote_types::events::GatewayEvent;
use lovenote_types::models::{DailyNotification, NotificationCategory, Role};

pub const DEFAULT_SCHEDULE: &str = "08:00";

/// Once-per-day AI message for the client, shared by the scheduler, the cron
/// endpoints and `/ai/generate-message`.
pub struct DailyService {
    db: Arc<Database>,
    realtime: Dispatcher,
    notifier: Arc<NotificationDispatcher>,
    alerts: AlertRelay,
    generator: Arc<DailyMessageGenerator>,
    local_offset: FixedOffset,
    city: Option<String>,
}

impl DailyService {
    pub fn new(
        db: Arc<Database>,
        realtime: Dispatcher,
        notifier: Arc<NotificationDispatcher>,
        alerts: AlertRelay,
        generator: Arc<DailyMessageGenerator>,
        local_offset: FixedOffset,
        city: Option<String>,
    ) -> Self {
        Self {
            db,
            realtime,
            notifier,
            alerts,
            generator,
            local_offset,
            city,
        }
    }

    /// Send today's message if a schedule has passed (or `force`) and none
    /// went out yet. Returns whether it reached at least one device.
    pub async fn run_due(&self, now: DateTime<Utc>, force: bool) -> Result<bool> {
        if !force && !self.is_due(now)? {
            debug!("Daily message not due yet");
            return Ok(false);
        }

        let Some(client) = self.db.find_user_by_role(Role::Client)? else {
            debug!("No client user yet, skipping daily message");
            return Ok(false);
        };

        let Some(notification) = self.create_for(client.id, now).await? else {
            debug!("Daily message already sent today");
            return Ok(false);
        };

        let local = now.with_timezone(&self.local_offset);
        let mut payload = NotificationPayload::for_event(
            NotificationCategory::Daily,
            Some(&json!({ "content": notification.content })),
            now,
        );
        payload.tag = format!("daily-{}", local.format("%Y%m%d"));
        let report = self.notifier.send_at(client.id, &payload, now).await;
        if report.sent == 0 {
            warn!(
                "Daily message {} stored but not pushed (failed={} skipped={:?})",
                notification.id, report.failed, report.skipped
            );
            return Ok(false);
        }

        self.alerts.notify(Alert::DailyMessageSent {
            content: notification.content.clone(),
            emotion_level: notification.emotion_level,
        });
        info!(
            "Daily message {} delivered (push sent={} failed={})",
            notification.id, report.sent, report.failed
        );
        Ok(true)
    }

    /// Today's notification for `user_id`, generating it if needed.
    pub async fn today_for(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<DailyNotification> {
        let (start, end) = self.local_day_bounds(now)?;
        if let Some(existing) = self.db.daily_notification_between(user_id, start, end)? {
            return Ok(existing);
        }
        match self.create_for(user_id, now).await? {
            Some(created) => Ok(created),
            // Lost a race with another writer; theirs is today's.
            None => self
                .db
                .daily_notification_between(user_id, start, end)?
                .ok_or_else(|| anyhow::anyhow!("daily notification vanished")),
        }
    }

    /// Generate and insert unless one already exists for the local day.
    async fn create_for(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Option<DailyNotification>> {
        let (start, end) = self.local_day_bounds(now)?;
        if self.db.daily_notification_between(user_id, start, end)?.is_some() {
            return Ok(None);
        }

        let history = self.recent_history(now - Duration::hours(24))?;
        let generated = self
            .generator
            .generate_daily_message_at(&history, self.city.as_deref(), None, now)
            .await;

        let inserted = self.db.insert_daily_notification_once(
            user_id,
            &generated.content,
            generated.emotion_level,
            now,
            start,
            end,
        )?;
        if let Some(notification) = &inserted {
            self.realtime.publish(GatewayEvent::DailyNotificationCreated {
                notification: notification.clone(),
            });
        }
        Ok(inserted)
    }

    fn is_due(&self, now: DateTime<Utc>) -> Result<bool> {
        let local_time = now.with_timezone(&self.local_offset).time();
        let schedules = self.db.list_schedules(true)?;

        let times: Vec<NaiveTime> = if schedules.is_empty() {
            vec![parse_schedule_time(DEFAULT_SCHEDULE)?]
        } else {
            schedules
                .iter()
                .filter_map(|s| parse_schedule_time(&s.time).ok())
                .collect()
        };
        Ok(times.iter().any(|t| local_time >= *t))
    }

    fn local_day_bounds(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let midnight = now
            .with_timezone(&self.local_offset)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid local midnight"))?;
        let start = self
            .local_offset
            .from_local_datetime(&midnight)
            .single()
            .ok_or_else(|| anyhow::anyhow!("ambiguous local midnight"))?
            .with_timezone(&Utc);
        Ok((start, start + Duration::days(1)))
    }

    /// Both users' activity since `since`, newest first.
    fn recent_history(&self, since: DateTime<Utc>) -> Result<InteractionHistory> {
        let mut history = InteractionHistory::default();
        for role in [Role::Client, Role::Admin] {
            let Some(user) = self.db.find_user_by_role(role)? else {
                continue;
            };
            history.reactions.extend(self.db.reactions_since(user.id, since)?);
            history.messages.extend(self.db.messages_since(user.id, since)?);
            history.memories.extend(self.db.memories_since(user.id, since)?);
        }
        history.reactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }
}

/// Accepts zero-padded 24h "HH:MM".
pub fn parse_schedule_time(time: &str) -> Result<NaiveTime> {
    if time.len() != 5 {
        anyhow::bail!("schedule time must be HH:MM, got '{}'", time);
    }
    Ok(NaiveTime::parse_from_str(time, "%H:%M")?)
}
