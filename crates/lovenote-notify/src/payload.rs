use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use lovenote_types::models::NotificationCategory;

const ICON: &str = "/icons/icon-192x192.png";
const BADGE: &str = "/icons/badge-72x72.png";
const VIBRATE: [u32; 3] = [200, 100, 200];
const MAX_BODY_CHARS: usize = 120;

/// What the caller wants shown; [`NotificationPayload::envelope`] turns it into
/// the JSON the service worker expects.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub data: Value,
    pub require_interaction: bool,
    pub silent: bool,
}

#[derive(Debug, Serialize)]
struct Action {
    action: &'static str,
    title: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    title: &'a str,
    body: &'a str,
    icon: &'static str,
    badge: &'static str,
    tag: &'a str,
    data: &'a Value,
    vibrate: &'static [u32],
    silent: bool,
    require_interaction: bool,
    actions: [Action; 2],
}

impl NotificationPayload {
    pub fn category(&self) -> NotificationCategory {
        NotificationCategory::from_tag(&self.tag)
    }

    /// Standard Web Push JSON envelope.
    pub fn envelope(&self) -> Vec<u8> {
        let envelope = Envelope {
            title: &self.title,
            body: &self.body,
            icon: ICON,
            badge: BADGE,
            tag: &self.tag,
            data: &self.data,
            vibrate: &VIBRATE,
            silent: self.silent,
            require_interaction: self.require_interaction,
            actions: [
                Action { action: "open", title: "Mở" },
                Action { action: "close", title: "Đóng" },
            ],
        };
        // Serializing plain strings/values cannot fail.
        serde_json::to_vec(&envelope).unwrap_or_default()
    }

    /// Build the user-facing text for an app event.
    ///
    /// `data` may carry `content`, `emoji` or `body` depending on the event.
    pub fn for_event(category: NotificationCategory, data: Option<&Value>, now: DateTime<Utc>) -> Self {
        let field = |name: &str| {
            data.and_then(|d| d.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let (title, body, tag, require_interaction) = match category {
            NotificationCategory::Memory => (
                "💭 Có người đang nhớ bạn".to_string(),
                "Ai đó vừa nghĩ về bạn đấy!".to_string(),
                format!("memory-{}", now.timestamp_millis()),
                false,
            ),
            NotificationCategory::Message => (
                "💌 Tin nhắn mới".to_string(),
                field("content").unwrap_or_else(|| "Bạn có tin nhắn mới".to_string()),
                format!("message-{}", now.timestamp_millis()),
                false,
            ),
            NotificationCategory::Reaction => (
                "💝 Cảm xúc mới".to_string(),
                match field("emoji") {
                    Some(emoji) => format!("Đã gửi cho bạn {}", emoji),
                    None => "Bạn vừa nhận được một cảm xúc".to_string(),
                },
                format!("reaction-{}", now.timestamp_millis()),
                false,
            ),
            NotificationCategory::Daily => (
                "🌅 Lời nhắn hôm nay".to_string(),
                field("content").unwrap_or_else(|| "Lời nhắn hôm nay đã sẵn sàng".to_string()),
                format!("daily-{}", now.format("%Y%m%d")),
                true,
            ),
            NotificationCategory::Other => (
                field("title").unwrap_or_else(|| "Thông báo".to_string()),
                field("body").unwrap_or_else(|| "Bạn có thông báo mới".to_string()),
                format!("other-{}", now.timestamp_millis()),
                false,
            ),
        };

        let mut payload_data = data.cloned().unwrap_or_else(|| json!({}));
        if let Value::Object(map) = &mut payload_data {
            map.entry("url").or_insert_with(|| json!("/"));
            map.insert("type".to_string(), json!(category.as_str()));
        }

        Self {
            title,
            body: truncate_chars(&body, MAX_BODY_CHARS),
            tag,
            data: payload_data,
            require_interaction,
            silent: false,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_contains_standard_fields() {
        let payload = NotificationPayload::for_event(NotificationCategory::Memory, None, Utc::now());
        let value: Value = serde_json::from_slice(&payload.envelope()).unwrap();

        assert_eq!(value["title"], "💭 Có người đang nhớ bạn");
        assert_eq!(value["icon"], ICON);
        assert_eq!(value["badge"], BADGE);
        assert_eq!(value["vibrate"], json!([200, 100, 200]));
        assert_eq!(value["requireInteraction"], false);
        assert_eq!(value["actions"].as_array().unwrap().len(), 2);
        assert_eq!(value["data"]["url"], "/");
        assert!(value["tag"].as_str().unwrap().starts_with("memory-"));
    }

    #[test]
    fn tags_map_back_to_their_category() {
        let now = Utc::now();
        for category in [
            NotificationCategory::Memory,
            NotificationCategory::Message,
            NotificationCategory::Reaction,
            NotificationCategory::Daily,
            NotificationCategory::Other,
        ] {
            assert_eq!(NotificationPayload::for_event(category, None, now).category(), category);
        }
    }

    #[test]
    fn event_data_feeds_the_body() {
        let data = json!({ "emoji": "🥰" });
        let payload = NotificationPayload::for_event(NotificationCategory::Reaction, Some(&data), Utc::now());
        assert!(payload.body.contains("🥰"));
        assert_eq!(payload.data["type"], "reaction");

        let long = "a".repeat(500);
        let data = json!({ "content": long });
        let payload = NotificationPayload::for_event(NotificationCategory::Daily, Some(&data), Utc::now());
        assert_eq!(payload.body.chars().count(), MAX_BODY_CHARS);
        assert!(payload.require_interaction);
    }
}
