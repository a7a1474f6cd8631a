use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use lovenote_db::Database;
use lovenote_gateway::connection::IdentityVerifier;
use lovenote_types::models::Role;

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::registry::DeviceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user_id: Uuid,
    pub role: Role,
    pub device_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub is_approved: bool,
    pub needs_approval: bool,
}

/// Maps the two static role tokens to users and defers device approval to
/// the [`DeviceRegistry`]. Holds no sessions: every call re-checks.
pub struct AuthGate {
    db: Arc<Database>,
    registry: Arc<DeviceRegistry>,
    admin_digest: [u8; 32],
    client_digest: [u8; 32],
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Constant-time secret comparison over fixed-length digests.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    !presented.is_empty() && bool::from(digest(presented)[..].ct_eq(&digest(expected)[..]))
}

impl AuthGate {
    pub fn new(db: Arc<Database>, registry: Arc<DeviceRegistry>, admin_token: &str, client_token: &str) -> Self {
        Self {
            db,
            registry,
            admin_digest: digest(admin_token),
            client_digest: digest(client_token),
        }
    }

    /// Constant-time token to role mapping. Both secrets are always compared.
    pub fn role_for_token(&self, token: &str) -> Option<Role> {
        if token.is_empty() {
            return None;
        }
        let presented = digest(token);
        let is_admin: bool = presented[..].ct_eq(&self.admin_digest[..]).into();
        let is_client: bool = presented[..].ct_eq(&self.client_digest[..]).into();
        match (is_admin, is_client) {
            (true, _) => Some(Role::Admin),
            (false, true) => Some(Role::Client),
            _ => None,
        }
    }

    pub fn login(
        &self,
        token: &str,
        fingerprint: &str,
        user_agent: Option<&str>,
        ip_hash: Option<&str>,
    ) -> Result<LoginOutcome, ApiError> {
        let role = self.role_for_token(token).ok_or(ApiError::InvalidToken)?;
        if fingerprint.trim().is_empty() {
            return Err(ApiError::BadRequest("Thiếu mã thiết bị".into()));
        }

        let user = self.db.ensure_user(role, Utc::now())?;
        let decision = self
            .registry
            .resolve(user.id, fingerprint, user_agent, ip_hash, role)?;

        if decision.needs_approval {
            info!("{} login from unapproved device {} (revoked: {})", role, decision.device.id, decision.revoked);
            return Err(ApiError::DeviceNotApproved {
                role,
                revoked: decision.revoked,
            });
        }

        info!("{} logged in from device {}", role, decision.device.id);
        Ok(LoginOutcome {
            user_id: user.id,
            role,
            device_id: decision.device.id,
        })
    }

    /// Read-only approval check used by the waiting screen's poll.
    pub fn check_status(&self, token: &str, fingerprint: &str) -> Result<DeviceStatus, ApiError> {
        let role = self.role_for_token(token).ok_or(ApiError::InvalidToken)?;

        let Some(user) = self.db.find_user_by_role(role)? else {
            return Ok(DeviceStatus { is_approved: false, needs_approval: false });
        };
        let status = match self.db.find_device(user.id, fingerprint)? {
            Some(device) => DeviceStatus {
                is_approved: device.is_active,
                needs_approval: !device.is_active,
            },
            None => DeviceStatus { is_approved: false, needs_approval: false },
        };
        Ok(status)
    }

    /// Per-request check for protected routes: valid token and an existing,
    /// active device. Never creates rows.
    pub fn authenticate(&self, token: &str, fingerprint: &str) -> Result<Caller, ApiError> {
        let role = self.role_for_token(token).ok_or(ApiError::InvalidToken)?;
        let user = self.db.find_user_by_role(role)?.ok_or(ApiError::InvalidToken)?;
        let device = self
            .db
            .find_device(user.id, fingerprint)?
            .ok_or(ApiError::DeviceNotApproved { role, revoked: false })?;

        if !device.is_active {
            return Err(ApiError::DeviceNotApproved {
                role,
                revoked: device.revoked_at.is_some(),
            });
        }

        Ok(Caller {
            user_id: user.id,
            role,
            device_id: device.id,
        })
    }
}

impl IdentityVerifier for AuthGate {
    fn verify(&self, token: &str, fingerprint: &str) -> Option<(Uuid, Role)> {
        match self.authenticate(token, fingerprint) {
            Ok(caller) => Some((caller.user_id, caller.role)),
            Err(e) => {
                warn!("Gateway identify rejected: {}", e);
                None
            }
        }
    }
}
