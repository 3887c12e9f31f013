mod common;

use std::sync::Arc;

use anyhow::Result;
use baggo_ledger::application::LedgerError;
use baggo_ledger::domain::TransactionKind;
use common::test_service;

#[tokio::test]
async fn test_wallet_created_lazily_with_zero_balance() -> Result<()> {
    let (service, _processor, _temp) = test_service().await?;

    let statement = service.wallet("user-ana").await?;

    assert_eq!(statement.wallet.user_id, "user-ana");
    assert_eq!(statement.wallet.balance_cents, 0);
    assert!(statement.transactions.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_balance_read_materializes_wallet_once() -> Result<()> {
    let (service, _processor, _temp) = test_service().await?;

    assert_eq!(service.balance("user-bo").await?, 0);
    assert_eq!(service.balance("user-bo").await?, 0);

    let report = service.check_integrity().await?;
    assert_eq!(report.wallet_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_first_access_creates_one_wallet() -> Result<()> {
    let (service, _processor, _temp) = test_service().await?;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(
            async move { service.balance("user-race").await },
        ));
    }
    for handle in handles {
        assert_eq!(handle.await??, 0);
    }

    let report = service.check_integrity().await?;
    assert_eq!(report.wallet_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_fund_credits_wallet_and_records_entry() -> Result<()> {
    let (service, _processor, _temp) = test_service().await?;

    let wallet = service.fund("user-cy", 10_000, "opening-balance").await?;
    assert_eq!(wallet.balance_cents, 10_000);

    let statement = service.wallet("user-cy").await?;
    assert_eq!(statement.transactions.len(), 1);

    let entry = &statement.transactions[0];
    assert_eq!(entry.kind, TransactionKind::Credit);
    assert_eq!(entry.amount_cents, 10_000);
    assert_eq!(entry.trip_id, "opening-balance");
    assert!(entry.counterparty_id.is_none());
    assert!(entry.processor_reference.is_none());
    Ok(())
}

#[tokio::test]
async fn test_fund_rejects_non_positive_amount() -> Result<()> {
    let (service, _processor, _temp) = test_service().await?;

    let result = service.fund("user-cy", 0, "opening-balance").await;
    assert!(matches!(result, Err(LedgerError::InvalidRequest(_))));

    let result = service.fund("user-cy", -100, "opening-balance").await;
    assert!(matches!(result, Err(LedgerError::InvalidRequest(_))));
    Ok(())
}

#[tokio::test]
async fn test_blank_user_id_rejected() -> Result<()> {
    let (service, _processor, _temp) = test_service().await?;

    let result = service.balance("  ").await;
    assert!(matches!(result, Err(LedgerError::InvalidRequest(_))));

    let result = service.wallet("").await;
    assert!(matches!(result, Err(LedgerError::InvalidRequest(_))));
    Ok(())
}

#[tokio::test]
async fn test_updated_at_refreshed_on_mutation() -> Result<()> {
    let (service, _processor, _temp) = test_service().await?;

    let before = service.wallet("user-dee").await?.wallet;
    service.fund("user-dee", 500, "top-up").await?;
    let after = service.wallet("user-dee").await?.wallet;

    assert!(after.updated_at >= before.updated_at);
    assert_eq!(after.created_at, before.created_at);
    Ok(())
}
