use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, UserId};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Funds leaving a wallet (the sender side of a transfer)
    Debit,
    /// Funds entering a wallet (the recipient side of a transfer, or an
    /// operator funding adjustment)
    Credit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Debit => "debit",
            TransactionKind::Credit => "credit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debit" => Some(TransactionKind::Debit),
            "credit" => Some(TransactionKind::Credit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single entry in one wallet's history. Entries are immutable once
/// committed - the ledger is append-only and has no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Monotonically increasing sequence number; assignment order = commit order
    pub sequence: i64,
    /// Wallet this entry belongs to
    pub wallet_user_id: UserId,
    pub kind: TransactionKind,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    /// Trip/shipment this entry settles
    pub trip_id: String,
    /// The other party: the recipient on a debit, the sender on a credit
    pub counterparty_id: Option<UserId>,
    /// Payment processor charge id, when the entry is backed by an external charge
    pub processor_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    fn new(
        kind: TransactionKind,
        wallet_user_id: UserId,
        amount_cents: Cents,
        trip_id: impl Into<String>,
    ) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by the repository at commit time
            wallet_user_id,
            kind,
            amount_cents,
            trip_id: trip_id.into(),
            counterparty_id: None,
            processor_reference: None,
            created_at: Utc::now(),
        }
    }

    /// Entry for funds leaving a wallet.
    pub fn debit(wallet_user_id: UserId, amount_cents: Cents, trip_id: impl Into<String>) -> Self {
        Self::new(TransactionKind::Debit, wallet_user_id, amount_cents, trip_id)
    }

    /// Entry for funds entering a wallet.
    pub fn credit(wallet_user_id: UserId, amount_cents: Cents, trip_id: impl Into<String>) -> Self {
        Self::new(TransactionKind::Credit, wallet_user_id, amount_cents, trip_id)
    }

    pub fn with_counterparty(mut self, counterparty_id: impl Into<UserId>) -> Self {
        self.counterparty_id = Some(counterparty_id.into());
        self
    }

    pub fn with_processor_reference(mut self, reference: impl Into<String>) -> Self {
        self.processor_reference = Some(reference.into());
        self
    }
}
