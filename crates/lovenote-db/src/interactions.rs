//! Append-only interaction rows: memories, reactions, messages.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use lovenote_types::models::{Memory, Message, MessageKind, Reaction, Role};

use crate::Database;
use crate::models::{memory_from_row, message_from_row, reaction_from_row};

impl Database {
    // -- Memories --

    pub fn insert_memory(&self, user_id: Uuid, sender_role: Role, now: DateTime<Utc>) -> Result<Memory> {
        let memory = Memory {
            id: Uuid::new_v4(),
            user_id,
            sender_role,
            created_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO memories (id, user_id, sender_role, created_at) VALUES (?1, ?2, ?3, ?4)",
                (memory.id.to_string(), user_id.to_string(), sender_role.as_str(), now),
            )?;
            Ok(())
        })?;
        Ok(memory)
    }

    /// Newest first.
    pub fn list_memories(&self, user_id: Uuid, limit: u32) -> Result<Vec<Memory>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, sender_role, created_at FROM memories
                 WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map((user_id.to_string(), limit), memory_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Count memories, optionally restricted to those a given role sent.
    pub fn count_memories(&self, sender_role: Option<Role>) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM memories WHERE (?1 IS NULL OR sender_role = ?1)",
                [sender_role.map(|r| r.as_str())],
                |r| r.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    pub fn memories_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Memory>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, sender_role, created_at FROM memories
                 WHERE user_id = ?1 AND created_at >= ?2 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map((user_id.to_string(), since), memory_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    pub fn insert_reaction(&self, user_id: Uuid, emoji: &str, now: DateTime<Utc>) -> Result<Reaction> {
        let reaction = Reaction {
            id: Uuid::new_v4(),
            user_id,
            emoji: emoji.to_string(),
            created_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reactions (id, user_id, emoji, created_at) VALUES (?1, ?2, ?3, ?4)",
                (reaction.id.to_string(), user_id.to_string(), emoji, now),
            )?;
            Ok(())
        })?;
        Ok(reaction)
    }

    pub fn list_reactions(&self, user_id: Uuid, limit: u32) -> Result<Vec<Reaction>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, emoji, created_at FROM reactions
                 WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map((user_id.to_string(), limit), reaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn reactions_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Reaction>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, emoji, created_at FROM reactions
                 WHERE user_id = ?1 AND created_at >= ?2 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map((user_id.to_string(), since), reaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        user_id: Uuid,
        content: &str,
        kind: MessageKind,
        emoji: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            user_id,
            content: content.to_string(),
            kind,
            emoji: emoji.map(str::to_string),
            created_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, user_id, content, type, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (message.id.to_string(), user_id.to_string(), content, kind.as_str(), emoji, now),
            )?;
            Ok(())
        })?;
        Ok(message)
    }

    pub fn list_messages(&self, user_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, content, type, emoji, created_at FROM messages
                 WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map((user_id.to_string(), limit), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn messages_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, content, type, emoji, created_at FROM messages
                 WHERE user_id = ?1 AND created_at >= ?2 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map((user_id.to_string(), since), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn interactions_are_listed_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let user = db.ensure_user(Role::Client, Utc::now()).unwrap();
        let t0 = Utc::now() - Duration::hours(2);

        db.insert_reaction(user.id, "❤️", t0).unwrap();
        db.insert_reaction(user.id, "😊", t0 + Duration::minutes(5)).unwrap();

        let reactions = db.list_reactions(user.id, 10).unwrap();
        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[0].emoji, "😊");

        let recent = db.reactions_since(user.id, t0 + Duration::minutes(1)).unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn messages_keep_kind_and_emoji() {
        let db = Database::open_in_memory().unwrap();
        let user = db.ensure_user(Role::Client, Utc::now()).unwrap();
        db.insert_message(user.id, "Cảm ơn anh", MessageKind::QuickReply, None, Utc::now())
            .unwrap();
        db.insert_message(user.id, "", MessageKind::Reaction, Some("🥰"), Utc::now())
            .unwrap();

        let messages = db.list_messages(user.id, 10).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.kind == MessageKind::Reaction && m.emoji.as_deref() == Some("🥰")));
    }

    #[test]
    fn memory_counts_filter_by_sender() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.ensure_user(Role::Admin, Utc::now()).unwrap();
        let client = db.ensure_user(Role::Client, Utc::now()).unwrap();
        db.insert_memory(client.id, Role::Client, Utc::now()).unwrap();
        db.insert_memory(client.id, Role::Client, Utc::now()).unwrap();
        db.insert_memory(admin.id, Role::Admin, Utc::now()).unwrap();

        assert_eq!(db.count_memories(None).unwrap(), 3);
        assert_eq!(db.count_memories(Some(Role::Client)).unwrap(), 2);
        assert_eq!(db.list_memories(client.id, 1).unwrap().len(), 1);
    }
}
