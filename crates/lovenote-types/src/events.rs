use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DailyNotification, Device, Memory, Message, Reaction, Role};

/// Events sent over the realtime gateway. Every row event carries the
/// `user_id` that owns the row; clients only receive ids they subscribed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful identification
    Ready { user_id: Uuid, role: Role },

    MemoryCreated { memory: Memory },

    ReactionCreated { reaction: Reaction },

    MessageCreated { message: Message },

    DailyNotificationCreated { notification: DailyNotification },

    /// A device row was inserted or its approval state changed
    DeviceUpdated { device: Device },

    /// A device row was deleted (denied)
    DeviceRemoved { user_id: Uuid, device_id: Uuid },
}

impl GatewayEvent {
    /// Returns the owning user for row events. `None` means the event is
    /// addressed to the connection itself.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Ready { .. } => None,
            Self::MemoryCreated { memory } => Some(memory.user_id),
            Self::ReactionCreated { reaction } => Some(reaction.user_id),
            Self::MessageCreated { message } => Some(message.user_id),
            Self::DailyNotificationCreated { notification } => Some(notification.user_id),
            Self::DeviceUpdated { device } => Some(device.user_id),
            Self::DeviceRemoved { user_id, .. } => Some(*user_id),
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate with the static role token and this browser's fingerprint
    Identify { token: String, fingerprint: String },

    /// Replace the set of users whose row events this connection receives
    Subscribe { user_ids: Vec<Uuid> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn row_events_expose_owner() {
        let user_id = Uuid::new_v4();
        let event = GatewayEvent::MemoryCreated {
            memory: Memory {
                id: Uuid::new_v4(),
                user_id,
                sender_role: Role::Client,
                created_at: Utc::now(),
            },
        };
        assert_eq!(event.user_id(), Some(user_id));
        assert_eq!(
            GatewayEvent::Ready { user_id, role: Role::Admin }.user_id(),
            None
        );
    }

    #[test]
    fn identify_command_wire_format() {
        let cmd: GatewayCommand = serde_json::from_str(
            r#"{"type":"Identify","data":{"token":"abc","fingerprint":"fp"}}"#,
        )
        .unwrap();
        assert!(matches!(cmd, GatewayCommand::Identify { ref token, .. } if token == "abc"));
    }
}
