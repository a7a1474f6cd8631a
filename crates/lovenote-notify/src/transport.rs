use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use thiserror::Error;
use tracing::debug;
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushError, WebPushMessage,
    WebPushMessageBuilder,
};

use lovenote_types::models::PushSubscription;

/// How long push services keep an undelivered message (seconds).
const DEFAULT_TTL: u32 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The push service no longer knows this subscription (404 / 410).
    #[error("subscription gone (HTTP {0})")]
    Gone(u16),

    #[error("push service rejected message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to build push message: {0}")]
    Build(#[from] WebPushError),

    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl DeliveryError {
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone(_))
    }
}

/// Delivers one encrypted payload to one browser subscription.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<(), DeliveryError>;
}

/// Web Push over HTTPS: `web-push` handles VAPID signing and aes128gcm
/// encryption, reqwest carries the request.
pub struct WebPushTransport {
    client: Client,
    vapid_pem: Arc<[u8]>,
    subject: String,
    ttl: u32,
}

impl WebPushTransport {
    /// `vapid_pem` is the VAPID private key in PEM form; it is parsed once
    /// here so a bad key fails at startup.
    pub fn new(vapid_pem: Vec<u8>, subject: impl Into<String>) -> Result<Self, DeliveryError> {
        VapidSignatureBuilder::from_pem_no_sub(vapid_pem.as_slice())?;

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            vapid_pem: Arc::from(vapid_pem),
            subject: subject.into(),
            ttl: DEFAULT_TTL,
        })
    }

    fn build_message(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<WebPushMessage, WebPushError> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.p256dh,
            &subscription.auth,
        );

        let mut signature = VapidSignatureBuilder::from_pem(&self.vapid_pem[..], &info)?;
        signature.add_claim("sub", self.subject.as_str());
        let signature = signature.build()?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_ttl(self.ttl);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.build()
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<(), DeliveryError> {
        let message = self.build_message(subscription, payload)?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(payload) = message.payload {
            request = request
                .header(CONTENT_ENCODING, "aes128gcm")
                .header(CONTENT_TYPE, "application/octet-stream");
            for (name, value) in payload.crypto_headers {
                request = request.header(name, value);
            }
            request = request.body(payload.content);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        debug!("Push to {} answered {}", subscription.endpoint, status);

        classify_status(status, response.text().await.unwrap_or_default())
    }
}

fn classify_status(status: u16, body: String) -> Result<(), DeliveryError> {
    match status {
        200..=299 => Ok(()),
        404 | 410 => Err(DeliveryError::Gone(status)),
        _ => Err(DeliveryError::Rejected { status, body }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(classify_status(201, String::new()).is_ok());
        assert!(classify_status(404, String::new()).unwrap_err().is_gone());
        assert!(classify_status(410, String::new()).unwrap_err().is_gone());

        let err = classify_status(429, "slow down".into()).unwrap_err();
        assert!(!err.is_gone());
        assert!(err.to_string().contains("429"));
    }
}
