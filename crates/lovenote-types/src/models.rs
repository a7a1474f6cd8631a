use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two principals of the app. Each role maps to exactly one user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
        }
    }

    /// The partner on the other side of the conversation.
    pub fn counterpart(&self) -> Role {
        match self {
            Self::Admin => Self::Client,
            Self::Client => Self::Admin,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "client" => Ok(Self::Client),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Approval state derived from `is_active` / `revoked_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Active,
    Pending,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fingerprint: String,
    pub user_agent: Option<String>,
    pub ip_hash: Option<String>,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    pub fn state(&self) -> DeviceState {
        if self.is_active {
            DeviceState::Active
        } else if self.revoked_at.is_some() {
            DeviceState::Revoked
        } else {
            DeviceState::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sender_role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Ai,
    QuickReply,
    Reaction,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::QuickReply => "quick_reply",
            Self::Reaction => "reaction",
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(Self::Ai),
            "quick_reply" => Ok(Self::QuickReply),
            "reaction" => Ok(Self::Reaction),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub emoji: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub emotion_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSchedule {
    pub id: Uuid,
    /// Local wall-clock time, "HH:MM".
    pub time: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Notification categories. Tags look like `memory-1718000000`; the category
/// is whatever precedes the first `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Memory,
    Message,
    Reaction,
    Daily,
    Other,
}

impl NotificationCategory {
    pub fn from_tag(tag: &str) -> Self {
        let base = tag.split('-').next().unwrap_or_default();
        match base {
            "memory" => Self::Memory,
            "message" => Self::Message,
            "reaction" => Self::Reaction,
            "daily" => Self::Daily,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Message => "message",
            Self::Reaction => "reaction",
            Self::Daily => "daily",
            Self::Other => "other",
        }
    }
}

/// Per-user notification settings. A missing row means `Default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub enable_memory: bool,
    pub enable_message: bool,
    pub enable_reaction: bool,
    pub enable_daily: bool,
    /// Hour (0-23) at which silent hours begin, inclusive.
    pub silent_start: Option<u8>,
    /// Hour (0-23) at which silent hours end, exclusive.
    pub silent_end: Option<u8>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enable_memory: true,
            enable_message: true,
            enable_reaction: true,
            enable_daily: true,
            silent_start: None,
            silent_end: None,
        }
    }
}

impl NotificationPreferences {
    pub fn allows(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Memory => self.enable_memory,
            NotificationCategory::Message => self.enable_message,
            NotificationCategory::Reaction => self.enable_reaction,
            NotificationCategory::Daily => self.enable_daily,
            NotificationCategory::Other => true,
        }
    }

    /// Whether `hour` falls inside the silent window. Windows may wrap past
    /// midnight (22 -> 7). An empty window (start == end) silences nothing.
    pub fn is_silent_at(&self, hour: u8) -> bool {
        let (Some(start), Some(end)) = (self.silent_start, self.silent_end) else {
            return false;
        };
        if start == end {
            false
        } else if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_tag_uses_prefix() {
        assert_eq!(NotificationCategory::from_tag("memory-1718000000"), NotificationCategory::Memory);
        assert_eq!(NotificationCategory::from_tag("daily-2024-06-10"), NotificationCategory::Daily);
        assert_eq!(NotificationCategory::from_tag("reaction"), NotificationCategory::Reaction);
        assert_eq!(NotificationCategory::from_tag("message-x"), NotificationCategory::Message);
        assert_eq!(NotificationCategory::from_tag("test-123"), NotificationCategory::Other);
        assert_eq!(NotificationCategory::from_tag(""), NotificationCategory::Other);
    }

    #[test]
    fn silent_hours_wraparound() {
        let prefs = NotificationPreferences {
            silent_start: Some(22),
            silent_end: Some(7),
            ..Default::default()
        };
        assert!(prefs.is_silent_at(22));
        assert!(prefs.is_silent_at(23));
        assert!(prefs.is_silent_at(0));
        assert!(prefs.is_silent_at(6));
        assert!(!prefs.is_silent_at(7));
        assert!(!prefs.is_silent_at(12));
        assert!(!prefs.is_silent_at(21));
    }

    #[test]
    fn silent_hours_same_day_window() {
        let prefs = NotificationPreferences {
            silent_start: Some(13),
            silent_end: Some(15),
            ..Default::default()
        };
        assert!(!prefs.is_silent_at(12));
        assert!(prefs.is_silent_at(13));
        assert!(prefs.is_silent_at(14));
        assert!(!prefs.is_silent_at(15));
    }

    #[test]
    fn default_preferences_allow_everything() {
        let prefs = NotificationPreferences::default();
        for hour in 0..24 {
            assert!(!prefs.is_silent_at(hour));
        }
        assert!(prefs.allows(NotificationCategory::Memory));
        assert!(prefs.allows(NotificationCategory::Daily));
        assert!(prefs.allows(NotificationCategory::Other));
    }

    #[test]
    fn device_state_derivation() {
        let now = Utc::now();
        let mut device = Device {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            fingerprint: "fp".into(),
            user_agent: None,
            ip_hash: None,
            is_active: false,
            revoked_at: None,
            created_at: now,
            last_seen: now,
        };
        assert_eq!(device.state(), DeviceState::Pending);
        device.revoked_at = Some(now);
        assert_eq!(device.state(), DeviceState::Revoked);
        device.is_active = true;
        device.revoked_at = None;
        assert_eq!(device.state(), DeviceState::Active);
    }

    #[test]
    fn role_round_trip_and_counterpart() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.counterpart(), Role::Client);
    }
}
