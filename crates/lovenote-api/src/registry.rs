use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use lovenote_db::Database;
use lovenote_gateway::dispatcher::Dispatcher;
use lovenote_notify::{Alert, AlertRelay};
use lovenote_types::events::GatewayEvent;
use lovenote_types::models::{Device, Role};

use crate::error::ApiError;

/// What a login attempt from one browser resolved to.
#[derive(Debug, Clone)]
pub struct DeviceDecision {
    pub device: Device,
    pub access_granted: bool,
    pub needs_approval: bool,
    /// The device was approved once and later revoked.
    pub revoked: bool,
}

/// Owns device approval state. Every change is mirrored to the realtime
/// gateway and, where the admin should act or know, to the alert relay.
pub struct DeviceRegistry {
    db: Arc<Database>,
    realtime: Dispatcher,
    alerts: AlertRelay,
}

impl DeviceRegistry {
    pub fn new(db: Arc<Database>, realtime: Dispatcher, alerts: AlertRelay) -> Self {
        Self { db, realtime, alerts }
    }

    pub fn resolve(
        &self,
        user_id: Uuid,
        fingerprint: &str,
        user_agent: Option<&str>,
        ip_hash: Option<&str>,
        role: Role,
    ) -> Result<DeviceDecision, ApiError> {
        self.resolve_at(user_id, fingerprint, user_agent, ip_hash, role, Utc::now())
    }

    pub fn resolve_at(
        &self,
        user_id: Uuid,
        fingerprint: &str,
        user_agent: Option<&str>,
        ip_hash: Option<&str>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<DeviceDecision, ApiError> {
        // Admin is trusted unconditionally; a client only gets its first device for free.
        let resolution = self.db.resolve_device(user_id, fingerprint, user_agent, ip_hash, now, |has_live_device| {
            role == Role::Admin || !has_live_device
        })?;
        let device = resolution.device;

        if resolution.created {
            info!("New {} device {} (active: {})", role, device.id, device.is_active);
        }

        if device.is_active {
            return Ok(DeviceDecision {
                device,
                access_granted: true,
                needs_approval: false,
                revoked: false,
            });
        }

        let revoked = device.revoked_at.is_some();
        self.alerts.notify(Alert::DeviceNeedsApproval {
            role,
            device_id: device.id,
            user_agent: device.user_agent.clone(),
        });
        self.realtime.publish(GatewayEvent::DeviceUpdated { device: device.clone() });

        Ok(DeviceDecision {
            device,
            access_granted: false,
            needs_approval: true,
            revoked,
        })
    }

    pub fn approve(&self, device_id: Uuid) -> Result<Device, ApiError> {
        let device = self
            .db
            .approve_device(device_id)?
            .ok_or(ApiError::NotFound("Không tìm thấy thiết bị"))?;
        info!("Device {} approved", device.id);

        let role = self.owner_role(&device)?;
        self.alerts.notify(Alert::DeviceApproved { role, device_id: device.id });
        self.realtime.publish(GatewayEvent::DeviceUpdated { device: device.clone() });
        Ok(device)
    }

    /// Hard-delete the row; the next login from that browser starts over.
    pub fn deny(&self, device_id: Uuid) -> Result<Device, ApiError> {
        let device = self
            .db
            .delete_device(device_id)?
            .ok_or(ApiError::NotFound("Không tìm thấy thiết bị"))?;
        info!("Device {} denied and removed", device.id);

        self.realtime.publish(GatewayEvent::DeviceRemoved {
            user_id: device.user_id,
            device_id: device.id,
        });
        Ok(device)
    }

    pub fn revoke(&self, device_id: Uuid) -> Result<Device, ApiError> {
        self.revoke_at(device_id, Utc::now())
    }

    pub fn revoke_at(&self, device_id: Uuid, now: DateTime<Utc>) -> Result<Device, ApiError> {
        let device = self
            .db
            .revoke_device(device_id, now)?
            .ok_or(ApiError::NotFound("Không tìm thấy thiết bị"))?;
        info!("Device {} revoked", device.id);

        self.realtime.publish(GatewayEvent::DeviceUpdated { device: device.clone() });
        Ok(device)
    }

    pub fn list(&self, user_id: Option<Uuid>) -> Result<Vec<Device>, ApiError> {
        Ok(self.db.list_devices(user_id)?)
    }

    fn owner_role(&self, device: &Device) -> Result<Role, ApiError> {
        let user = self
            .db
            .get_user(device.user_id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("device {} has no owner", device.id)))?;
        Ok(user.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use lovenote_notify::relay::{AlertError, AlertTransport};

    #[derive(Default)]
    struct NullTransport {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertTransport for NullTransport {
        async fn send_text(&self, text: &str) -> Result<(), AlertError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn registry() -> (Arc<Database>, DeviceRegistry, Dispatcher) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let realtime = Dispatcher::new();
        let (alerts, _worker) = AlertRelay::spawn(Arc::new(NullTransport::default()));
        (db.clone(), DeviceRegistry::new(db, realtime.clone(), alerts), realtime)
    }

    #[tokio::test]
    async fn first_client_device_is_active_second_is_pending() {
        let (db, registry, _) = registry();
        let client = db.ensure_user(Role::Client, Utc::now()).unwrap();

        let first = registry.resolve(client.id, "fp-a", Some("Safari"), None, Role::Client).unwrap();
        assert!(first.access_granted);

        let second = registry.resolve(client.id, "fp-b", Some("Chrome"), None, Role::Client).unwrap();
        assert!(!second.access_granted);
        assert!(second.needs_approval);
        assert!(!second.revoked);

        // Logging in again does not reset or duplicate anything.
        let again = registry.resolve(client.id, "fp-b", None, None, Role::Client).unwrap();
        assert_eq!(again.device.id, second.device.id);
        assert!(again.needs_approval);
        assert_eq!(registry.list(Some(client.id)).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn admin_devices_are_always_active() {
        let (db, registry, _) = registry();
        let admin = db.ensure_user(Role::Admin, Utc::now()).unwrap();

        for fp in ["laptop", "phone", "tablet"] {
            assert!(registry.resolve(admin.id, fp, None, None, Role::Admin).unwrap().access_granted);
        }
    }

    #[tokio::test]
    async fn approve_revoke_deny_lifecycle() {
        let (db, registry, realtime) = registry();
        let mut events = realtime.subscribe();
        let client = db.ensure_user(Role::Client, Utc::now()).unwrap();
        registry.resolve(client.id, "fp-a", None, None, Role::Client).unwrap();
        let pending = registry.resolve(client.id, "fp-b", None, None, Role::Client).unwrap();
        assert!(matches!(events.try_recv(), Ok(GatewayEvent::DeviceUpdated { .. })));

        let approved = registry.approve(pending.device.id).unwrap();
        assert!(approved.is_active);
        assert!(registry.resolve(client.id, "fp-b", None, None, Role::Client).unwrap().access_granted);

        registry.revoke(pending.device.id).unwrap();
        let after_revoke = registry.resolve(client.id, "fp-b", None, None, Role::Client).unwrap();
        assert!(!after_revoke.access_granted);
        assert!(after_revoke.revoked);

        let denied = registry.deny(pending.device.id).unwrap();
        assert_eq!(denied.id, pending.device.id);
        assert!(db.get_device(pending.device.id).unwrap().is_none());

        assert!(matches!(registry.approve(Uuid::new_v4()), Err(ApiError::NotFound(_))));
    }
}
