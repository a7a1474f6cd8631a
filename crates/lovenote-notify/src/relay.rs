//! Admin alerts relayed to a Telegram chat.
//!
//! Producers push onto an unbounded queue and move on; a single worker drains
//! it so a slow or failing Telegram API never holds up a request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lovenote_types::models::Role;

/// Something the admin should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    DeviceNeedsApproval {
        role: Role,
        device_id: Uuid,
        user_agent: Option<String>,
    },
    DeviceApproved {
        role: Role,
        device_id: Uuid,
    },
    MemorySent {
        sender: Role,
    },
    ReactionCreated {
        sender: Role,
        emoji: String,
    },
    MessageCreated {
        sender: Role,
        content: String,
    },
    DailyMessageSent {
        content: String,
        emotion_level: u8,
    },
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "Admin",
        Role::Client => "Em",
    }
}

impl Alert {
    /// Telegram HTML text. User-supplied fields are escaped.
    pub fn render(&self) -> String {
        match self {
            Alert::DeviceNeedsApproval { role, device_id, user_agent } => format!(
                "🔐 <b>Thiết bị mới cần xác nhận</b>\nNgười dùng: {}\nThiết bị: <code>{}</code>\nTrình duyệt: {}",
                role_label(*role),
                device_id,
                escape_html(user_agent.as_deref().unwrap_or("không rõ")),
            ),
            Alert::DeviceApproved { role, device_id } => format!(
                "✅ <b>Thiết bị đã được xác nhận</b>\nNgười dùng: {}\nThiết bị: <code>{}</code>",
                role_label(*role),
                device_id,
            ),
            Alert::MemorySent { sender } => {
                format!("💭 <b>{}</b> vừa bấm nút nhớ", role_label(*sender))
            }
            Alert::ReactionCreated { sender, emoji } => format!(
                "💝 <b>{}</b> đã thả cảm xúc {}",
                role_label(*sender),
                escape_html(emoji),
            ),
            Alert::MessageCreated { sender, content } => format!(
                "💌 <b>{}</b> đã gửi tin nhắn:\n{}",
                role_label(*sender),
                escape_html(content),
            ),
            Alert::DailyMessageSent { content, emotion_level } => format!(
                "🌅 <b>Lời nhắn hôm nay đã gửi</b> (cảm xúc {}/100)\n{}",
                emotion_level,
                escape_html(content),
            ),
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram rejected message (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },
}

#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), AlertError>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramTransport {
    http: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramTransport {
    pub fn new(
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self, AlertError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }
}

#[async_trait]
impl AlertTransport for TelegramTransport {
    async fn send_text(&self, text: &str) -> Result<(), AlertError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };
        let resp = self.http.post(self.send_url()).json(&body).send().await?;
        let status = resp.status().as_u16();
        let parsed: TelegramResponse = resp.json().await?;
        if !parsed.ok {
            return Err(AlertError::Rejected {
                status,
                description: parsed.description.unwrap_or_default(),
            });
        }
        debug!("Telegram alert delivered");
        Ok(())
    }
}

/// Cheap cloneable handle to the alert queue.
#[derive(Clone)]
pub struct AlertRelay {
    tx: mpsc::UnboundedSender<Alert>,
}

impl AlertRelay {
    /// Start the background worker. The worker exits once every handle is dropped.
    pub fn spawn(transport: Arc<dyn AlertTransport>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_alert_worker(rx, transport));
        (Self { tx }, handle)
    }

    /// Queue an alert. Never blocks and never fails the caller.
    pub fn notify(&self, alert: Alert) {
        if self.tx.send(alert).is_err() {
            warn!("Alert worker stopped, dropping alert");
        }
    }
}

pub async fn run_alert_worker(mut rx: mpsc::UnboundedReceiver<Alert>, transport: Arc<dyn AlertTransport>) {
    info!("Alert relay started");
    while let Some(alert) = rx.recv().await {
        if let Err(e) = transport.send_text(&alert.render()).await {
            warn!("Failed to relay alert: {}", e);
        }
    }
    info!("Alert relay stopped");
}
