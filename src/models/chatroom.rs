use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chatroom {
    pub id: i64,
    /// Externally-visible identifier, immutable once created.
    pub chatroom_id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Chatroom {
    /// Time-derived opaque identifier, e.g. `chatroom_20250830124501337_a91c`.
    /// The random suffix keeps ids distinct even within one millisecond.
    pub fn generate_external_id() -> String {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let suffix: u16 = rand::thread_rng().gen();
        format!("chatroom_{}_{:04x}", stamp, suffix)
    }

    pub async fn create(pool: &PgPool, user_id: i64, external_id: &str) -> Result<Self> {
        let chatroom = query_as::<_, Chatroom>(
            r#"
            INSERT INTO chatrooms (chatroom_id, user_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(chatroom)
    }

    pub async fn get_by_external_id(pool: &PgPool, external_id: &str) -> Result<Option<Self>> {
        let chatroom = query_as::<_, Chatroom>("SELECT * FROM chatrooms WHERE chatroom_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?;
        Ok(chatroom)
    }

    pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Self>> {
        let chatrooms = query_as::<_, Chatroom>(
            "SELECT * FROM chatrooms WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(chatrooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_ids_are_distinct_and_prefixed() {
        let a = Chatroom::generate_external_id();
        let b = Chatroom::generate_external_id();
        assert!(a.starts_with("chatroom_"));
        assert_ne!(a, b);
    }
}
