use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

/// Marketplace user identifier, assigned by the backend that fronts this
/// ledger. Opaque here; the ledger only requires it to be non-empty.
pub type UserId = String;

/// Per-user balance record. At most one wallet exists per user, created
/// lazily the first time the user is looked up or takes part in a transfer.
/// The balance is never allowed to go negative and is mutated only by the
/// ledger itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            balance_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the balance covers a debit of the given amount.
    pub fn can_cover(&self, amount_cents: Cents) -> bool {
        self.balance_cents >= amount_cents
    }
}
