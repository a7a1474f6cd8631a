use std::sync::Arc;

use lovenote_ai::DailyMessageGenerator;
use lovenote_db::Database;
use lovenote_gateway::dispatcher::Dispatcher;
use lovenote_notify::{AlertRelay, NotificationDispatcher};

use crate::daily::DailyService;
use crate::gate::AuthGate;
use crate::registry::DeviceRegistry;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler can reach. Built once in `main`.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub realtime: Dispatcher,
    pub gate: Arc<AuthGate>,
    pub registry: Arc<DeviceRegistry>,
    pub notifier: Arc<NotificationDispatcher>,
    pub alerts: AlertRelay,
    pub generator: Arc<DailyMessageGenerator>,
    pub daily: Arc<DailyService>,
    pub cron_secret: String,
}
