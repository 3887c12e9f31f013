use std::collections::HashMap;

use super::{Cents, Transaction, TransactionKind, UserId, Wallet};

/// Replay a wallet's balance from its transaction history.
/// Balance = sum of credits - sum of debits
pub fn replay_balance(transactions: &[Transaction]) -> Cents {
    transactions.iter().fold(0, |balance, entry| match entry.kind {
        TransactionKind::Credit => balance + entry.amount_cents,
        TransactionKind::Debit => balance - entry.amount_cents,
    })
}

/// A wallet whose stored balance disagrees with the balance replayed from its
/// transaction history. Any drift means a commit was applied partially and
/// needs manual reconciliation.
#[derive(Debug, Clone)]
pub struct BalanceDrift {
    pub user_id: UserId,
    pub stored_cents: Cents,
    pub replayed_cents: Cents,
}

/// Outcome of a full-ledger integrity audit.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub wallet_count: i64,
    pub transaction_count: i64,
    pub has_sequence_gaps: bool,
    pub invalid_amounts: i64,
    pub negative_balances: i64,
    pub drifted: Vec<BalanceDrift>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        !self.has_sequence_gaps
            && self.invalid_amounts == 0
            && self.negative_balances == 0
            && self.drifted.is_empty()
    }
}

/// Build an audit report from stored wallets, per-wallet replayed balances,
/// and the raw transaction statistics.
pub fn build_audit_report(
    wallets: &[Wallet],
    replayed: &HashMap<UserId, Cents>,
    transaction_count: i64,
    has_sequence_gaps: bool,
    invalid_amounts: i64,
) -> AuditReport {
    let negative_balances = wallets.iter().filter(|w| w.balance_cents < 0).count() as i64;

    let drifted = wallets
        .iter()
        .filter_map(|wallet| {
            let replayed_cents = replayed.get(&wallet.user_id).copied().unwrap_or(0);
            (replayed_cents != wallet.balance_cents).then(|| BalanceDrift {
                user_id: wallet.user_id.clone(),
                stored_cents: wallet.balance_cents,
                replayed_cents,
            })
        })
        .collect();

    AuditReport {
        wallet_count: wallets.len() as i64,
        transaction_count,
        has_sequence_gaps,
        invalid_amounts,
        negative_balances,
        drifted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_with_balance(user_id: &str, balance_cents: Cents) -> Wallet {
        let mut wallet = Wallet::new(user_id);
        wallet.balance_cents = balance_cents;
        wallet
    }

    #[test]
    fn test_replay_balance_empty() {
        assert_eq!(replay_balance(&[]), 0);
    }

    #[test]
    fn test_replay_balance_mixed() {
        let entries = vec![
            Transaction::credit("user".into(), 10_000, "seed"),
            Transaction::debit("user".into(), 2_000, "trip-1"),
            Transaction::credit("user".into(), 1_800, "trip-2"),
        ];

        assert_eq!(replay_balance(&entries), 9_800);
    }

    #[test]
    fn test_audit_clean_ledger() {
        let wallets = vec![
            wallet_with_balance("a", 8_000),
            wallet_with_balance("b", 1_800),
        ];
        let replayed = HashMap::from([("a".to_string(), 8_000), ("b".to_string(), 1_800)]);

        let report = build_audit_report(&wallets, &replayed, 4, false, 0);

        assert!(report.is_clean());
        assert_eq!(report.wallet_count, 2);
        assert_eq!(report.transaction_count, 4);
    }

    #[test]
    fn test_audit_detects_drift() {
        let wallets = vec![wallet_with_balance("a", 8_000)];
        let replayed = HashMap::from([("a".to_string(), 7_000)]);

        let report = build_audit_report(&wallets, &replayed, 2, false, 0);

        assert!(!report.is_clean());
        assert_eq!(report.drifted.len(), 1);
        assert_eq!(report.drifted[0].stored_cents, 8_000);
        assert_eq!(report.drifted[0].replayed_cents, 7_000);
    }

    #[test]
    fn test_audit_treats_missing_history_as_zero() {
        // A wallet with no transactions replays to zero; a non-zero stored
        // balance without history is drift.
        let wallets = vec![wallet_with_balance("fresh", 0), wallet_with_balance("odd", 500)];
        let replayed = HashMap::new();

        let report = build_audit_report(&wallets, &replayed, 0, false, 0);

        assert_eq!(report.drifted.len(), 1);
        assert_eq!(report.drifted[0].user_id, "odd");
    }

    #[test]
    fn test_audit_counts_negative_balances() {
        let wallets = vec![wallet_with_balance("a", -100)];
        let replayed = HashMap::from([("a".to_string(), -100)]);

        let report = build_audit_report(&wallets, &replayed, 1, false, 0);

        assert!(!report.is_clean());
        assert_eq!(report.negative_balances, 1);
    }
}
