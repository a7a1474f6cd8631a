//! Outbound notifications: Web Push delivery with preference and rate-limit
//! gates, and the Telegram alert relay for the admin.

pub mod dispatcher;
pub mod limiter;
pub mod payload;
pub mod relay;
pub mod transport;

pub use dispatcher::{NotificationDispatcher, SendReport, SkipReason};
pub use payload::NotificationPayload;
pub use relay::{Alert, AlertRelay, AlertTransport, TelegramTransport};
pub use transport::{DeliveryError, PushTransport, WebPushTransport};
