use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::domain::{
    build_audit_report, commission_for, net_after_commission, AuditReport, Cents, Transaction,
    Wallet,
};
use crate::payments::{Charge, ChargeRequest, GatewayError, PaymentProcessor};
use crate::storage::Repository;

use super::LedgerError;

/// Currency every wallet is denominated in. Amounts cross the processor
/// boundary in minor units of this currency.
pub const PLATFORM_CURRENCY: &str = "usd";

/// Application service providing the ledger's operations. This is the primary
/// interface for any client (CLI, API, admin tooling).
pub struct WalletService {
    repo: Repository,
    processor: Arc<dyn PaymentProcessor>,
}

/// A wallet together with its full transaction history.
#[derive(Debug, Clone, Serialize)]
pub struct WalletStatement {
    pub wallet: Wallet,
    pub transactions: Vec<Transaction>,
}

/// Transfer request as received from a client app.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender_id: String,
    pub recipient_id: String,
    /// Gross amount in cents; commission is taken out of this
    pub amount_cents: Cents,
    pub trip_id: String,
    /// Attempt counter feeding the processor idempotency key. Bump it only
    /// after confirming with the processor that the previous attempt did not
    /// charge.
    pub attempt: u32,
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub charge_id: String,
    pub client_secret: String,
    pub amount_cents: Cents,
    pub commission_cents: Cents,
    pub net_amount_cents: Cents,
}

impl WalletService {
    /// Create a new service over an already-connected repository.
    pub fn new(repo: Repository, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { repo, processor }
    }

    /// Initialize a new database at the given path.
    pub async fn init(
        database_path: &str,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{database_path}?mode=rwc");
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, processor))
    }

    /// Connect to an existing database.
    pub async fn connect(
        database_path: &str,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{database_path}");
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, processor))
    }

    // ========================
    // Wallet operations
    // ========================

    /// Wallet plus full history. Creates a zero-balance wallet on first
    /// access; creation is an idempotent upsert, so repeated or concurrent
    /// lookups still yield exactly one wallet.
    pub async fn wallet(&self, user_id: &str) -> Result<WalletStatement, LedgerError> {
        Self::require_id(user_id, "user id")?;
        let wallet = self.repo.get_or_create_wallet(user_id).await?;
        let transactions = self.repo.list_transactions_for_wallet(user_id).await?;
        Ok(WalletStatement {
            wallet,
            transactions,
        })
    }

    /// Balance-only projection of [`WalletService::wallet`].
    pub async fn balance(&self, user_id: &str) -> Result<Cents, LedgerError> {
        Self::require_id(user_id, "user id")?;
        Ok(self.repo.get_or_create_wallet(user_id).await?.balance_cents)
    }

    /// Operator credit adjustment, recorded as a normal ledger entry with the
    /// given reference as its trip context.
    pub async fn fund(
        &self,
        user_id: &str,
        amount_cents: Cents,
        reference: &str,
    ) -> Result<Wallet, LedgerError> {
        Self::require_id(user_id, "user id")?;
        Self::require_id(reference, "funding reference")?;
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(self.repo.fund_wallet(user_id, amount_cents, reference).await?)
    }

    // ========================
    // Transfer
    // ========================

    /// Move funds from sender to recipient: validate, pre-check the sender's
    /// balance, charge the processor for the gross amount, then commit both
    /// wallet mutations and both ledger entries atomically.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, LedgerError> {
        Self::validate(&request)?;

        let sender = self.repo.get_or_create_wallet(&request.sender_id).await?;
        self.repo.get_or_create_wallet(&request.recipient_id).await?;

        if !sender.can_cover(request.amount_cents) {
            return Err(LedgerError::InsufficientFunds {
                user_id: request.sender_id,
                balance_cents: sender.balance_cents,
                required_cents: request.amount_cents,
            });
        }

        let commission = commission_for(request.amount_cents);
        let net = net_after_commission(request.amount_cents);

        let charge = self
            .processor
            .create_charge(&ChargeRequest {
                amount_cents: request.amount_cents,
                currency: PLATFORM_CURRENCY.to_string(),
                trip_id: request.trip_id.clone(),
                sender_id: request.sender_id.clone(),
                recipient_id: request.recipient_id.clone(),
                commission_cents: commission,
                description: format!("Baggo delivery payment for trip {}", request.trip_id),
                idempotency_key: format!("transfer-{}-{}", request.trip_id, request.attempt),
            })
            .await
            .map_err(|err| {
                let message = err.to_string();
                match err {
                    GatewayError::Ambiguous(_) => LedgerError::PaymentProcessorAmbiguous(message),
                    GatewayError::Declined(_) | GatewayError::Unreachable(_) => {
                        LedgerError::PaymentProcessor(message)
                    }
                }
            })?;

        self.commit(&request, &charge, net).await?;

        info!(
            charge_id = %charge.id,
            sender = %request.sender_id,
            recipient = %request.recipient_id,
            amount_cents = request.amount_cents,
            commission_cents = commission,
            "transfer committed"
        );

        Ok(TransferReceipt {
            charge_id: charge.id,
            client_secret: charge.client_secret,
            amount_cents: request.amount_cents,
            commission_cents: commission,
            net_amount_cents: net,
        })
    }

    /// Commit the ledger side of a charged transfer. Runs on a spawned task:
    /// once the external charge exists, the commit must run to completion
    /// even if the caller drops the future.
    async fn commit(
        &self,
        request: &TransferRequest,
        charge: &Charge,
        net: Cents,
    ) -> Result<(), LedgerError> {
        let debit = Transaction::debit(
            request.sender_id.clone(),
            request.amount_cents,
            request.trip_id.clone(),
        )
        .with_counterparty(request.recipient_id.clone())
        .with_processor_reference(charge.id.clone());

        let credit = Transaction::credit(
            request.recipient_id.clone(),
            net,
            request.trip_id.clone(),
        )
        .with_counterparty(request.sender_id.clone())
        .with_processor_reference(charge.id.clone());

        let repo = self.repo.clone();
        let outcome = tokio::spawn(async move { repo.commit_transfer(debit, credit).await })
            .await
            .unwrap_or_else(|join_err| Err(anyhow::anyhow!("commit task aborted: {join_err}")));

        outcome.map_err(|err| {
            error!(
                charge_id = %charge.id,
                sender = %request.sender_id,
                recipient = %request.recipient_id,
                amount_cents = request.amount_cents,
                "ledger commit failed after successful charge: {err:#}"
            );
            LedgerError::PostChargeCommitFailure {
                charge_id: charge.id.clone(),
                sender_id: request.sender_id.clone(),
                recipient_id: request.recipient_id.clone(),
                amount_cents: request.amount_cents,
                reason: format!("{err:#}"),
            }
        })
    }

    fn validate(request: &TransferRequest) -> Result<(), LedgerError> {
        Self::require_id(&request.sender_id, "sender id")?;
        Self::require_id(&request.recipient_id, "recipient id")?;
        Self::require_id(&request.trip_id, "trip id")?;
        if request.sender_id == request.recipient_id {
            return Err(LedgerError::InvalidRequest(
                "Sender and recipient must differ".to_string(),
            ));
        }
        if request.amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn require_id(value: &str, what: &str) -> Result<(), LedgerError> {
        if value.trim().is_empty() {
            return Err(LedgerError::InvalidRequest(format!("Missing {what}")));
        }
        Ok(())
    }

    // ========================
    // Integrity
    // ========================

    /// Check ledger integrity: sequence gaps, invalid amounts, negative
    /// balances, and drift between stored balances and replayed history.
    pub async fn check_integrity(&self) -> Result<AuditReport, LedgerError> {
        let stats = self.repo.get_audit_stats().await?;
        let wallets = self.repo.list_wallets().await?;
        let replayed = self.repo.replay_all_balances().await?;

        Ok(build_audit_report(
            &wallets,
            &replayed,
            stats.transaction_count,
            stats.has_sequence_gaps,
            stats.invalid_amounts,
        ))
    }
}
