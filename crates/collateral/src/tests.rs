use std::sync::Arc;

use assert_matches::assert_matches;
use poagov_core::{Address, Amount, Signal};
use poagov_db::Database;
use poagov_util_error::BoxedErrorResult;

use crate::{CollateralError, CollateralLedger};

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

async fn temp_ledger() -> BoxedErrorResult<CollateralLedger> {
    let db = Database::new_in_memory().await?;
    Ok(CollateralLedger::new(Arc::new(db)))
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn deposit_accumulates() -> BoxedErrorResult<()> {
    let ledger = temp_ledger().await?;

    assert_eq!(ledger.balance(addr(1)).await, Amount::ZERO);

    ledger.deposit(addr(1), Amount::new(4500)).await?;
    assert_eq!(ledger.balance(addr(1)).await, Amount::new(4500));

    ledger.deposit(addr(1), Amount::new(500)).await?;
    assert_eq!(ledger.balance(addr(1)).await, Amount::new(5000));

    // other addresses are unaffected
    assert_eq!(ledger.balance(addr(2)).await, Amount::ZERO);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn rejects_invalid_deposits() -> BoxedErrorResult<()> {
    let ledger = temp_ledger().await?;

    assert_matches!(
        ledger.deposit(Address::ZERO, Amount::new(1)).await,
        Err(CollateralError::InvalidAddress)
    );
    assert_matches!(
        ledger.deposit(addr(1), Amount::ZERO).await,
        Err(CollateralError::InvalidAmount { .. })
    );

    // rejected operations leave no trace, not even a signal
    assert_eq!(ledger.get_signals().await, vec![]);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn withdraw_requires_sufficient_balance() -> BoxedErrorResult<()> {
    let ledger = temp_ledger().await?;

    ledger.deposit(addr(1), Amount::new(100)).await?;

    assert_matches!(
        ledger.withdraw(addr(1), Amount::new(101)).await,
        Err(CollateralError::InvalidAmount { .. })
    );
    assert_eq!(ledger.balance(addr(1)).await, Amount::new(100));

    ledger.withdraw(addr(1), Amount::new(100)).await?;
    assert_eq!(ledger.balance(addr(1)).await, Amount::ZERO);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn signals_are_appended_in_order() -> BoxedErrorResult<()> {
    let ledger = temp_ledger().await?;

    ledger.deposit(addr(1), Amount::new(10)).await?;
    ledger.deposit(addr(2), Amount::new(20)).await?;
    ledger.withdraw(addr(1), Amount::new(5)).await?;

    assert_eq!(
        ledger.get_signals().await,
        vec![
            Signal::CollateralDeposited {
                address: addr(1),
                amount: Amount::new(10)
            },
            Signal::CollateralDeposited {
                address: addr(2),
                amount: Amount::new(20)
            },
            Signal::CollateralWithdrawn {
                address: addr(1),
                amount: Amount::new(5)
            },
        ]
    );

    Ok(())
}
