//! In-memory app wiring with fake push, alert and model backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use uuid::Uuid;

use lovenote_ai::{DailyMessageGenerator, ModelError, TextModel};
use lovenote_db::Database;
use lovenote_gateway::dispatcher::Dispatcher;
use lovenote_notify::relay::{AlertError, AlertTransport};
use lovenote_notify::{AlertRelay, DeliveryError, NotificationDispatcher, PushTransport};
use lovenote_types::models::{PushSubscription, Role};

use crate::daily::DailyService;
use crate::gate::AuthGate;
use crate::registry::DeviceRegistry;
use crate::state::{AppState, AppStateInner};

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const CLIENT_TOKEN: &str = "test-client-token";
pub const CRON_SECRET: &str = "test-cron-secret";
pub const MODEL_REPLY: &str = "Chào buổi sáng! Hôm nay trời mát, nhớ mang áo khoác nhé.";

#[derive(Default)]
pub struct CountingPush {
    calls: AtomicUsize,
}

impl CountingPush {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for CountingPush {
    async fn deliver(&self, _subscription: &PushSubscription, _payload: &[u8]) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl AlertTransport for RecordingAlerts {
    async fn send_text(&self, text: &str) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub struct FixedModel;

#[async_trait]
impl TextModel for FixedModel {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, ModelError> {
        Ok(MODEL_REPLY.to_string())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub push: Arc<CountingPush>,
    pub alerts: Arc<RecordingAlerts>,
}

impl TestApp {
    /// Must be called inside a tokio runtime (the alert worker is spawned).
    pub fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let realtime = Dispatcher::new();

        let alert_transport = Arc::new(RecordingAlerts::default());
        let (alerts, _worker) = AlertRelay::spawn(alert_transport.clone());

        let push = Arc::new(CountingPush::default());
        let notifier = Arc::new(NotificationDispatcher::new(db.clone(), push.clone(), offset));
        let generator = Arc::new(DailyMessageGenerator::new(Arc::new(FixedModel), offset));

        let registry = Arc::new(DeviceRegistry::new(db.clone(), realtime.clone(), alerts.clone()));
        let gate = Arc::new(AuthGate::new(db.clone(), registry.clone(), ADMIN_TOKEN, CLIENT_TOKEN));
        let daily = Arc::new(DailyService::new(
            db.clone(),
            realtime.clone(),
            notifier.clone(),
            alerts.clone(),
            generator.clone(),
            offset,
            Some("Hà Nội".to_string()),
        ));

        let state = Arc::new(AppStateInner {
            db,
            realtime,
            gate,
            registry,
            notifier,
            alerts,
            generator,
            daily,
            cron_secret: CRON_SECRET.to_string(),
        });

        Self {
            state,
            push,
            alerts: alert_transport,
        }
    }

    /// Client user with one active push subscription.
    pub fn client_with_subscription(&self) -> Uuid {
        let client = self.state.db.ensure_user(Role::Client, Utc::now()).unwrap();
        self.state
            .db
            .upsert_push_subscription(client.id, "https://push.test/client", "p256dh", "auth", None, Utc::now())
            .unwrap();
        client.id
    }

    /// Log in with `token` from `fingerprint`; returns the user id.
    pub fn login(&self, token: &str, fingerprint: &str) -> Uuid {
        self.state.gate.login(token, fingerprint, None, None).unwrap().user_id
    }
}
