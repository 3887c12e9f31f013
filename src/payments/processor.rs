use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Cents;

/// Failure classification for a charge attempt. `Declined` and `Unreachable`
/// mean the charge definitively did not happen; `Ambiguous` means it may
/// have, and the caller must check with the processor before retrying.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("charge declined: {0}")]
    Declined(String),

    #[error("processor unreachable: {0}")]
    Unreachable(String),

    #[error("charge outcome unknown: {0}")]
    Ambiguous(String),
}

/// Everything the processor needs to create one charge for a transfer.
/// The amount is the full gross transfer amount; the commission split is
/// carried as metadata for the processor-side paper trail.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_cents: Cents,
    pub currency: String,
    pub trip_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub commission_cents: Cents,
    pub description: String,
    /// Stable per-attempt key so a resend can never double-charge
    pub idempotency_key: String,
}

/// Processor-assigned identifiers for a created charge. The client secret is
/// handed back to the mobile app to confirm the payment.
#[derive(Debug, Clone)]
pub struct Charge {
    pub id: String,
    pub client_secret: String,
}

/// External payment processor boundary. Called exactly once per transfer
/// attempt; the ledger never retries on its own.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError>;
}
