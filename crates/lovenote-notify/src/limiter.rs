use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use lovenote_types::models::NotificationCategory;

/// How long a category stays closed after a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Fixed spacing after the last delivery.
    Floor(Duration),
    /// Reopens at the next local midnight.
    LocalDay,
}

pub fn default_window(category: NotificationCategory) -> Window {
    match category {
        NotificationCategory::Memory => Window::Floor(Duration::seconds(30)),
        NotificationCategory::Message => Window::Floor(Duration::seconds(10)),
        NotificationCategory::Reaction => Window::Floor(Duration::seconds(5)),
        NotificationCategory::Daily => Window::LocalDay,
        NotificationCategory::Other => Window::Floor(Duration::seconds(10)),
    }
}

type Key = (Uuid, NotificationCategory);

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after: Option<Duration>,
}

/// A granted slot. Hand it back through [`RateLimiter::release`] if nothing
/// was actually delivered.
#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    key: Key,
    previous: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
}

/// Limiter keyed by `(user, category)`: one send per window.
///
/// A key without state is "unseeded"; callers seed it from the persisted
/// delivery log so a restart does not reopen the window.
#[derive(Debug)]
pub struct RateLimiter {
    local_offset: FixedOffset,
    last_sent: Mutex<HashMap<Key, Option<DateTime<Utc>>>>,
}

impl RateLimiter {
    /// `local_offset` decides where a [`Window::LocalDay`] ends.
    pub fn new(local_offset: FixedOffset) -> Self {
        Self {
            local_offset,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Time left before `category` reopens after a delivery at `last`.
    fn remaining(&self, category: NotificationCategory, last: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        let reopens_at = match default_window(category) {
            Window::Floor(floor) => last + floor,
            Window::LocalDay => {
                let last_day = last.with_timezone(&self.local_offset).date_naive();
                let next_day = last_day.succ_opt()?.and_hms_opt(0, 0, 0)?;
                next_day.and_local_timezone(self.local_offset).single()?.with_timezone(&Utc)
            }
        };
        (now < reopens_at).then(|| reopens_at - now)
    }

    pub async fn is_seeded(&self, user_id: Uuid, category: NotificationCategory) -> bool {
        self.last_sent.lock().await.contains_key(&(user_id, category))
    }

    /// Record the last persisted delivery. Never moves an existing entry back.
    pub async fn seed(&self, user_id: Uuid, category: NotificationCategory, last: Option<DateTime<Utc>>) {
        let mut guard = self.last_sent.lock().await;
        let entry = guard.entry((user_id, category)).or_insert(None);
        if last > *entry {
            *entry = last;
        }
    }

    /// Claim the window for `now`, or report how long until it reopens.
    pub async fn try_acquire(
        &self,
        user_id: Uuid,
        category: NotificationCategory,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RateDecision> {
        let key = (user_id, category);
        let mut guard = self.last_sent.lock().await;
        let entry = guard.entry(key).or_insert(None);

        if let Some(last) = *entry {
            if let Some(retry_after) = self.remaining(category, last, now) {
                return Err(RateDecision {
                    allowed: false,
                    retry_after: Some(retry_after),
                });
            }
        }

        let previous = *entry;
        *entry = Some(now);
        Ok(Reservation { key, previous, at: now })
    }

    /// Undo a reservation unless a later one already replaced it.
    pub async fn release(&self, reservation: Reservation) {
        let mut guard = self.last_sent.lock().await;
        if let Some(entry) = guard.get_mut(&reservation.key) {
            if *entry == Some(reservation.at) {
                *entry = reservation.previous;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc7() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn second_send_inside_floor_is_rejected() {
        let limiter = RateLimiter::new(utc7());
        let user = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(limiter.try_acquire(user, NotificationCategory::Memory, t0).await.is_ok());
        let denied = limiter
            .try_acquire(user, NotificationCategory::Memory, t0 + Duration::seconds(10))
            .await
            .unwrap_err();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Some(Duration::seconds(20)));

        assert!(limiter
            .try_acquire(user, NotificationCategory::Memory, t0 + Duration::seconds(30))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new(utc7());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(limiter.try_acquire(alice, NotificationCategory::Reaction, t0).await.is_ok());
        assert!(limiter.try_acquire(bob, NotificationCategory::Reaction, t0).await.is_ok());
        assert!(limiter.try_acquire(alice, NotificationCategory::Message, t0).await.is_ok());
        assert!(limiter.try_acquire(alice, NotificationCategory::Reaction, t0).await.is_err());
    }

    #[tokio::test]
    async fn release_reopens_window() {
        let limiter = RateLimiter::new(utc7());
        let user = Uuid::new_v4();
        let t0 = at("2024-06-10T03:00:00Z");

        let reservation = limiter.try_acquire(user, NotificationCategory::Daily, t0).await.unwrap();
        limiter.release(reservation).await;
        assert!(limiter
            .try_acquire(user, NotificationCategory::Daily, t0 + Duration::seconds(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn daily_window_reopens_at_local_midnight() {
        let limiter = RateLimiter::new(utc7());
        let user = Uuid::new_v4();

        // 10:00 local on the 10th.
        let late_morning = at("2024-06-10T03:00:00Z");
        assert!(limiter.try_acquire(user, NotificationCategory::Daily, late_morning).await.is_ok());

        // 23:30 local, same day.
        let denied = limiter
            .try_acquire(user, NotificationCategory::Daily, at("2024-06-10T16:30:00Z"))
            .await
            .unwrap_err();
        assert_eq!(denied.retry_after, Some(Duration::minutes(30)));

        // 08:01 local on the 11th, under 24h after the first send.
        assert!(limiter
            .try_acquire(user, NotificationCategory::Daily, at("2024-06-11T01:01:00Z"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn seed_from_log_blocks_until_window_ends() {
        let limiter = RateLimiter::new(utc7());
        let user = Uuid::new_v4();
        let now = at("2024-06-10T05:00:00Z");

        assert!(!limiter.is_seeded(user, NotificationCategory::Memory).await);
        limiter
            .seed(user, NotificationCategory::Memory, Some(now - Duration::seconds(12)))
            .await;
        assert!(limiter.is_seeded(user, NotificationCategory::Memory).await);

        let denied = limiter
            .try_acquire(user, NotificationCategory::Memory, now)
            .await
            .unwrap_err();
        assert_eq!(denied.retry_after, Some(Duration::seconds(18)));

        limiter
            .seed(user, NotificationCategory::Daily, Some(now - Duration::hours(3)))
            .await;
        let denied = limiter
            .try_acquire(user, NotificationCategory::Daily, now)
            .await
            .unwrap_err();
        // 12:00 local, so the day ends in 12h.
        assert_eq!(denied.retry_after, Some(Duration::hours(12)));
    }

    #[test]
    fn default_windows() {
        assert_eq!(default_window(NotificationCategory::Memory), Window::Floor(Duration::seconds(30)));
        assert_eq!(default_window(NotificationCategory::Message), Window::Floor(Duration::seconds(10)));
        assert_eq!(default_window(NotificationCategory::Reaction), Window::Floor(Duration::seconds(5)));
        assert_eq!(default_window(NotificationCategory::Daily), Window::LocalDay);
        assert_eq!(default_window(NotificationCategory::Other), Window::Floor(Duration::seconds(10)));
    }
}
