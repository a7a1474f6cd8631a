use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{
    DailyNotification, Device, MessageKind, NotificationPreferences, Role,
};

// -- Generic envelopes --

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub token: String,
    pub fingerprint: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub role: Role,
}

// -- Devices --

#[derive(Debug, Deserialize)]
pub struct CheckStatusRequest {
    pub token: String,
    pub fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusResponse {
    pub success: bool,
    pub is_approved: bool,
    pub needs_approval: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    Approve,
    Deny,
    Revoke,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceActionRequest {
    pub device_id: Uuid,
    pub action: DeviceAction,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub success: bool,
    pub devices: Vec<Device>,
}

// -- Push --

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionPayload {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscribeRequest {
    pub user_id: Uuid,
    pub subscription: SubscriptionPayload,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSendRequest {
    pub user_id: Uuid,
    /// Free-form event type ("memory", "reaction", ...); mapped to a category.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushSendResponse {
    pub success: bool,
    pub sent: usize,
    pub failed: usize,
}

// -- Telegram relay --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Reaction,
    Message,
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramAlertRequest {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

// -- Cron --

#[derive(Debug, Deserialize)]
pub struct CronQuery {
    #[serde(default)]
    pub token: Option<String>,
    /// Skip the schedule check and send now (still once per day).
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CronResponse {
    pub success: bool,
    pub sent: bool,
}

// -- AI --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMessageRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct GenerateMessageResponse {
    pub success: bool,
    pub notification: DailyNotification,
}

#[derive(Debug, Deserialize)]
pub struct QuickRepliesRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuickRepliesResponse {
    pub success: bool,
    pub replies: Vec<String>,
}

// -- Preferences --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub changes: PreferencesPatch,
}

/// Partial preferences update. Absent fields keep their stored value; an
/// explicit `null` silent hour clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub enable_memory: Option<bool>,
    pub enable_message: Option<bool>,
    pub enable_reaction: Option<bool>,
    pub enable_daily: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub silent_start: Option<Option<u8>>,
    #[serde(default, deserialize_with = "present")]
    pub silent_end: Option<Option<u8>>,
}

impl PreferencesPatch {
    pub fn apply_to(&self, mut base: NotificationPreferences) -> NotificationPreferences {
        if let Some(v) = self.enable_memory {
            base.enable_memory = v;
        }
        if let Some(v) = self.enable_message {
            base.enable_message = v;
        }
        if let Some(v) = self.enable_reaction {
            base.enable_reaction = v;
        }
        if let Some(v) = self.enable_daily {
            base.enable_daily = v;
        }
        if let Some(v) = self.silent_start {
            base.silent_start = v;
        }
        if let Some(v) = self.silent_end {
            base.silent_end = v;
        }
        base
    }
}

/// Distinguishes a field sent as `null` from one left out.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreferencesResponse {
    pub success: bool,
    pub preferences: NotificationPreferences,
}

// -- Interactions --

#[derive(Debug, Deserialize)]
pub struct CreateReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Whose rows to list; defaults to the caller.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub success: bool,
    pub count: u64,
}

// -- Schedules --

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub time: String,
}
