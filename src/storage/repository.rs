use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{Cents, Transaction, TransactionKind, UserId, Wallet};

use super::MIGRATION_001_INITIAL;

/// Raw transaction statistics for the integrity audit.
#[derive(Debug, Clone)]
pub struct AuditStats {
    pub transaction_count: i64,
    pub has_sequence_gaps: bool,
    pub invalid_amounts: i64,
}

/// Repository for persisting and querying wallets and ledger transactions.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Wallet operations
    // ========================

    /// Look up a wallet, creating it with a zero balance if absent. Creation
    /// rides on the primary-key constraint, so concurrent first access for
    /// the same user yields exactly one wallet row.
    pub async fn get_or_create_wallet(&self, user_id: &str) -> Result<Wallet> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance_cents, created_at, updated_at)
            VALUES (?, 0, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Failed to create wallet")?;

        self.find_wallet(user_id)
            .await?
            .context("Wallet missing after upsert")
    }

    /// Get a wallet by user id, without creating one.
    pub async fn find_wallet(&self, user_id: &str) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance_cents, created_at, updated_at
            FROM wallets
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch wallet")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_wallet(&row)?)),
            None => Ok(None),
        }
    }

    /// List all wallets, ordered by user id.
    pub async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let rows = sqlx::query(
            "SELECT user_id, balance_cents, created_at, updated_at FROM wallets ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list wallets")?;

        rows.iter().map(Self::row_to_wallet).collect()
    }

    /// Credit a wallet outside the transfer flow (operator adjustment),
    /// creating it if needed. The reference is recorded as the ledger entry's
    /// trip context.
    pub async fn fund_wallet(
        &self,
        user_id: &str,
        amount_cents: Cents,
        reference: &str,
    ) -> Result<Wallet> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open storage transaction")?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance_cents, created_at, updated_at)
            VALUES (?, 0, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .context("Failed to create wallet")?;

        sqlx::query("UPDATE wallets SET balance_cents = balance_cents + ?, updated_at = ? WHERE user_id = ?")
            .bind(amount_cents)
            .bind(&now)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to credit wallet")?;

        let mut entry = Transaction::credit(user_id.to_string(), amount_cents, reference);
        entry.sequence = Self::next_sequence(&mut tx).await?;
        Self::insert_transaction(&mut tx, &entry).await?;

        tx.commit().await.context("Failed to commit funding")?;

        self.find_wallet(user_id)
            .await?
            .context("Wallet missing after funding")
    }

    // ========================
    // Transfer commit
    // ========================

    /// Apply a transfer as one atomic unit: debit the sender, credit the
    /// recipient, and append both ledger entries. Either everything commits
    /// or nothing does.
    ///
    /// The debit re-asserts the sender's balance inside the transaction, so a
    /// concurrent transfer that drained the wallet since the caller's
    /// pre-check aborts the commit instead of driving the balance negative.
    pub async fn commit_transfer(&self, mut debit: Transaction, mut credit: Transaction) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open storage transaction")?;
        let now = Utc::now().to_rfc3339();

        let debited = sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents - ?, updated_at = ?
            WHERE user_id = ? AND balance_cents >= ?
            "#,
        )
        .bind(debit.amount_cents)
        .bind(&now)
        .bind(&debit.wallet_user_id)
        .bind(debit.amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to debit sender wallet")?;

        if debited.rows_affected() != 1 {
            anyhow::bail!(
                "sender {} no longer covers {} cents",
                debit.wallet_user_id,
                debit.amount_cents
            );
        }

        let credited = sqlx::query(
            "UPDATE wallets SET balance_cents = balance_cents + ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(credit.amount_cents)
        .bind(&now)
        .bind(&credit.wallet_user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to credit recipient wallet")?;

        if credited.rows_affected() != 1 {
            anyhow::bail!("recipient wallet {} is missing", credit.wallet_user_id);
        }

        debit.sequence = Self::next_sequence(&mut tx).await?;
        Self::insert_transaction(&mut tx, &debit).await?;
        credit.sequence = Self::next_sequence(&mut tx).await?;
        Self::insert_transaction(&mut tx, &credit).await?;

        tx.commit().await.context("Failed to commit transfer")?;
        Ok(())
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to advance transaction sequence")?;

        Ok(row.get("value"))
    }

    async fn insert_transaction(conn: &mut SqliteConnection, entry: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, wallet_user_id, kind, amount_cents, trip_id, counterparty_id, processor_reference, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.sequence)
        .bind(&entry.wallet_user_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount_cents)
        .bind(&entry.trip_id)
        .bind(&entry.counterparty_id)
        .bind(&entry.processor_reference)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to insert transaction")?;
        Ok(())
    }

    // ========================
    // Transaction queries
    // ========================

    /// List a wallet's transactions in commit order.
    pub async fn list_transactions_for_wallet(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence, wallet_user_id, kind, amount_cents, trip_id, counterparty_id, processor_reference, created_at
            FROM transactions
            WHERE wallet_user_id = ?
            ORDER BY sequence
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    // ========================
    // Integrity audit
    // ========================

    /// Replay every wallet's balance from its transaction history in a single
    /// query. Wallets with no transactions won't be in the map (balance = 0).
    pub async fn replay_all_balances(&self) -> Result<HashMap<UserId, Cents>> {
        let rows = sqlx::query(
            r#"
            SELECT
                wallet_user_id,
                SUM(CASE WHEN kind = 'credit' THEN amount_cents ELSE -amount_cents END) as balance
            FROM transactions
            GROUP BY wallet_user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to replay balances")?;

        let mut balances = HashMap::new();
        for row in rows {
            let user_id: String = row.get("wallet_user_id");
            let balance: Cents = row.get("balance");
            balances.insert(user_id, balance);
        }

        Ok(balances)
    }

    /// Get raw transaction statistics for integrity checking.
    pub async fn get_audit_stats(&self) -> Result<AuditStats> {
        let transaction_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let sequence_check = sqlx::query(
            r#"
            SELECT
                MIN(sequence) as min_seq,
                MAX(sequence) as max_seq,
                COUNT(*) as count
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let min_seq: Option<i64> = sequence_check.get("min_seq");
        let max_seq: Option<i64> = sequence_check.get("max_seq");
        let count: i64 = sequence_check.get("count");

        let has_sequence_gaps = match (min_seq, max_seq) {
            (Some(min), Some(max)) => (max - min + 1) != count,
            _ => false,
        };

        let invalid_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE amount_cents <= 0")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        Ok(AuditStats {
            transaction_count,
            has_sequence_gaps,
            invalid_amounts,
        })
    }

    // ========================
    // Row mapping
    // ========================

    fn row_to_wallet(row: &sqlx::sqlite::SqliteRow) -> Result<Wallet> {
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(Wallet {
            user_id: row.get("user_id"),
            balance_cents: row.get("balance_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .context("Invalid updated_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("kind");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            wallet_user_id: row.get("wallet_user_id"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            trip_id: row.get("trip_id"),
            counterparty_id: row.get("counterparty_id"),
            processor_reference: row.get("processor_reference"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
