use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{TransferRequest, WalletService};
use crate::domain::{format_cents, parse_cents, TransactionKind};
use crate::payments::{PaymentProcessor, StripeGateway};

/// Environment variable holding the payment processor secret key.
pub const GATEWAY_SECRET_ENV: &str = "BAGGO_STRIPE_SECRET_KEY";

/// Baggo Ledger - wallet balances and peer-to-peer transfers
#[derive(Parser)]
#[command(name = "baggo-ledger")]
#[command(about = "Wallet ledger and escrow-style payment transfers for the Baggo marketplace")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "baggo-ledger.db")]
    pub database: String,

    /// Payment processor API base URL
    #[arg(long, default_value = "https://api.stripe.com")]
    pub gateway_url: String,

    /// Payment processor request timeout in seconds
    #[arg(long, default_value = "30")]
    pub gateway_timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ledger database
    Init,

    /// Wallet queries and operator adjustments
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Move funds between two users via a processor charge
    Transfer {
        /// Gross amount to transfer (e.g., "20.00" or "20")
        amount: String,

        /// Sending user id
        #[arg(long)]
        from: String,

        /// Receiving user id
        #[arg(long)]
        to: String,

        /// Trip the payment settles
        #[arg(long)]
        trip: String,

        /// Attempt counter for the processor idempotency key; bump only after
        /// confirming a previous attempt did not charge
        #[arg(long, default_value = "1")]
        attempt: u32,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Show a wallet and its transaction history
    Show {
        /// User id
        user: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a wallet's balance
    Balance {
        /// User id
        user: String,
    },

    /// Credit a wallet (operator adjustment)
    Fund {
        /// User id
        user: String,

        /// Amount to credit (e.g., "100.00")
        #[arg(short, long)]
        amount: String,

        /// Reference recorded on the ledger entry
        #[arg(short, long)]
        reference: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let secret = std::env::var(GATEWAY_SECRET_ENV).unwrap_or_default();
        let gateway = StripeGateway::new(
            &self.gateway_url,
            &secret,
            Duration::from_secs(self.gateway_timeout),
        )?;
        let processor: Arc<dyn PaymentProcessor> = Arc::new(gateway);

        match self.command {
            Commands::Init => {
                WalletService::init(&self.database, processor).await?;
                println!("Initialized ledger database at {}", self.database);
                Ok(())
            }
            Commands::Wallet(cmd) => {
                let service = WalletService::connect(&self.database, processor).await?;
                run_wallet_command(&service, cmd).await
            }
            Commands::Transfer {
                amount,
                from,
                to,
                trip,
                attempt,
            } => {
                anyhow::ensure!(
                    !secret.is_empty(),
                    "{GATEWAY_SECRET_ENV} must be set to run transfers"
                );
                let amount_cents = parse_cents(&amount).context("Invalid amount")?;
                let service = WalletService::connect(&self.database, processor).await?;

                let receipt = service
                    .transfer(TransferRequest {
                        sender_id: from,
                        recipient_id: to,
                        amount_cents,
                        trip_id: trip,
                        attempt,
                    })
                    .await?;

                println!("Transfer committed (charge {})", receipt.charge_id);
                println!("  Gross:      {}", format_cents(receipt.amount_cents));
                println!("  Commission: {}", format_cents(receipt.commission_cents));
                println!("  Net:        {}", format_cents(receipt.net_amount_cents));
                println!("  Client secret: {}", receipt.client_secret);
                Ok(())
            }
            Commands::Check => {
                let service = WalletService::connect(&self.database, processor).await?;
                run_check_command(&service).await
            }
        }
    }
}

async fn run_wallet_command(service: &WalletService, cmd: WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::Show { user, json } => {
            let statement = service.wallet(&user).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&statement)?);
                return Ok(());
            }

            println!("Wallet {}", statement.wallet.user_id);
            println!("  Balance: {}", format_cents(statement.wallet.balance_cents));
            println!(
                "  Created: {}",
                statement.wallet.created_at.format("%Y-%m-%d %H:%M")
            );

            if statement.transactions.is_empty() {
                println!("  No transactions");
                return Ok(());
            }

            println!("  Transactions:");
            for entry in &statement.transactions {
                let sign = match entry.kind {
                    TransactionKind::Debit => "-",
                    TransactionKind::Credit => "+",
                };
                println!(
                    "    [{}] {} {}{}  trip={} counterparty={} ref={}",
                    entry.sequence,
                    entry.created_at.format("%Y-%m-%d"),
                    sign,
                    format_cents(entry.amount_cents),
                    entry.trip_id,
                    entry.counterparty_id.as_deref().unwrap_or("-"),
                    entry.processor_reference.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        WalletCommands::Balance { user } => {
            let balance = service.balance(&user).await?;
            println!("{}", format_cents(balance));
            Ok(())
        }
        WalletCommands::Fund {
            user,
            amount,
            reference,
        } => {
            let amount_cents = parse_cents(&amount).context("Invalid amount")?;
            let wallet = service.fund(&user, amount_cents, &reference).await?;
            println!(
                "Credited {} to {} (balance now {})",
                format_cents(amount_cents),
                wallet.user_id,
                format_cents(wallet.balance_cents)
            );
            Ok(())
        }
    }
}

async fn run_check_command(service: &WalletService) -> Result<()> {
    let report = service.check_integrity().await?;

    println!("Ledger integrity check");
    println!("  Wallets:      {}", report.wallet_count);
    println!("  Transactions: {}", report.transaction_count);

    if report.is_clean() {
        println!("  OK: no issues found");
        return Ok(());
    }

    if report.has_sequence_gaps {
        println!("  FAIL: sequence gaps detected");
    }
    if report.invalid_amounts > 0 {
        println!(
            "  FAIL: {} transactions with non-positive amounts",
            report.invalid_amounts
        );
    }
    if report.negative_balances > 0 {
        println!(
            "  FAIL: {} wallets with negative balances",
            report.negative_balances
        );
    }
    for drift in &report.drifted {
        println!(
            "  FAIL: wallet {} stores {} but history replays to {}",
            drift.user_id,
            format_cents(drift.stored_cents),
            format_cents(drift.replayed_cents)
        );
    }

    anyhow::bail!("Ledger integrity check failed")
}
