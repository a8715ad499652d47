use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, PgPool, Type};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "subscription_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Basic,
    Pro,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub mobile: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub subscription_tier: SubscriptionTier,
    /// Recorded by the billing flow but not yet consulted by the quota gate.
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewUser {
    pub mobile: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl User {
    pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_mobile(pool: &PgPool, mobile: &str) -> Result<Option<Self>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE mobile = $1")
            .bind(mobile)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// Inserts a new user. The tier always starts at `basic`; upgrades go
    /// through the payment webhook only.
    pub async fn create(pool: &PgPool, new: NewUser) -> Result<Self> {
        let user = query_as::<_, User>(
            r#"
            INSERT INTO users (mobile, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&new.mobile)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    pub async fn update_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<()> {
        query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_subscription_tier(
        pool: &PgPool,
        id: i64,
        tier: SubscriptionTier,
    ) -> Result<()> {
        query("UPDATE users SET subscription_tier = $1, updated_at = $2 WHERE id = $3")
            .bind(tier)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
