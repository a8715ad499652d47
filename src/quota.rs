use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tracing::debug;

use crate::models::{SubscriptionTier, User};
use crate::store::ConversationStore;

/// At most this many admitted actions per basic-tier user per calendar day.
/// Chatroom creation and prompt submission share the counter, which counts
/// completed exchange rows. The day is the host's local date and the count
/// query casts timestamps in the database session timezone; the two are
/// assumed to match.
pub const DAILY_PROMPT_LIMIT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    CreateChatroom,
    SubmitPrompt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Deny(String),
}

/// Decides whether a user may act now. Pure decision over the already
/// fetched user plus one count query; no writes. The check and whatever
/// write follows it are deliberately not atomic: concurrent submissions from
/// one user can overshoot the ceiling by a few, which is accepted.
pub struct QuotaLedger {
    store: Arc<dyn ConversationStore>,
    daily_limit: i64,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn ConversationStore>, daily_limit: i64) -> Self {
        Self { store, daily_limit }
    }

    pub async fn check_and_admit(&self, user: &User, action: ActionKind) -> Result<Admission> {
        if user.subscription_tier != SubscriptionTier::Basic {
            // TODO: enforce subscription_expires_at once the downgrade path
            // of the payment webhook is wired up.
            return Ok(Admission::Admit);
        }

        let today = Local::now().date_naive();
        let count = self.store.count_exchanges_today(user.id, today).await?;
        debug!(
            user_id = user.id,
            count,
            ?action,
            "quota check for basic tier"
        );

        if count >= self.daily_limit {
            Ok(Admission::Deny("Daily prompt limit reached".to_string()))
        } else {
            Ok(Admission::Admit)
        }
    }
}
