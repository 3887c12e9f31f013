use thiserror::Error;

use crate::domain::Cents;

/// Ledger error taxonomy. Every operation returns a typed result; nothing is
/// swallowed, and a transfer is never partially applied.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient funds for {user_id}: balance {balance_cents}, required {required_cents}")]
    InsufficientFunds {
        user_id: String,
        balance_cents: Cents,
        required_cents: Cents,
    },

    #[error("Payment processor rejected the charge: {0}")]
    PaymentProcessor(String),

    #[error("Payment processor outcome unknown: {0}; check the charge status before retrying")]
    PaymentProcessorAmbiguous(String),

    /// The one case the ledger cannot heal on its own: the external charge
    /// exists but the balances were not updated. Requires manual
    /// reconciliation against the processor.
    #[error(
        "Charge {charge_id} succeeded but the ledger commit failed \
         ({sender_id} -> {recipient_id}, {amount_cents} cents): {reason}"
    )]
    PostChargeCommitFailure {
        charge_id: String,
        sender_id: String,
        recipient_id: String,
        amount_cents: Cents,
        reason: String,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] anyhow::Error),
}
