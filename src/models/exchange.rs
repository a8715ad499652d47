use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, query_scalar, FromRow, PgPool};

/// One prompt and its answer. The row is written by the worker once the
/// answer (or captured error text) is known; `response_message` is never
/// touched again after that single write.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageExchange {
    pub id: i64,
    pub chat_id: i64,
    pub request_message: String,
    pub response_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageExchange {
    pub async fn record(
        pool: &PgPool,
        chat_id: i64,
        request_message: &str,
        response_message: &str,
    ) -> Result<Self> {
        let exchange = query_as::<_, MessageExchange>(
            r#"
            INSERT INTO chatroom_history (chat_id, request_message, response_message)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(request_message)
        .bind(response_message)
        .fetch_one(pool)
        .await?;
        Ok(exchange)
    }

    /// Exchanges for a chatroom, most recent request first.
    pub async fn history_for_chat(pool: &PgPool, chat_id: i64) -> Result<Vec<Self>> {
        let history = query_as::<_, MessageExchange>(
            "SELECT * FROM chatroom_history WHERE chat_id = $1 ORDER BY created_at DESC",
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;
        Ok(history)
    }

    /// Count of exchanges created on `day` across all chatrooms owned by the
    /// user. The quota gate recomputes this per request rather than keeping a
    /// counter; the chatroom_history table is the source of truth.
    ///
    /// The `::date` cast resolves in the database session timezone while
    /// `day` comes from the host clock; both sides must be configured to the
    /// same timezone for the day boundary to agree.
    pub async fn count_on_day_for_user(pool: &PgPool, user_id: i64, day: NaiveDate) -> Result<i64> {
        let count = query_scalar::<_, i64>(
            r#"
            SELECT COUNT(ch.id)
            FROM chatroom_history ch
            JOIN chatrooms c ON c.id = ch.chat_id
            WHERE c.user_id = $1
              AND ch.created_at::date = $2
            "#,
        )
        .bind(user_id)
        .bind(day)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}
