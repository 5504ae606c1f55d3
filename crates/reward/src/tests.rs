use std::sync::Arc;

use assert_matches::assert_matches;
use poagov_core::{Address, Amount, Signal};
use poagov_db::Database;
use poagov_keys::KeyDirectory;
use poagov_util_error::BoxedErrorResult;

use crate::{RewardConfig, RewardEngine, RewardError};

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

const GOVERNANCE: u8 = 0xb1;
const EMISSION: u8 = 0xe1;
const KEY_AUTHORITY: u8 = 0xa0;

const BASE: Amount = Amount::COIN;
const EMISSION_AMOUNT: Amount = Amount::new(100);

struct Setup {
    engine: RewardEngine,
    keys: Arc<KeyDirectory>,
}

impl Setup {
    async fn new() -> BoxedErrorResult<Self> {
        let db = Arc::new(Database::new_in_memory().await?);
        let keys = Arc::new(KeyDirectory::new(db.clone(), addr(KEY_AUTHORITY)));
        let engine = RewardEngine::new(
            RewardConfig::builder()
                .base_reward(BASE)
                .emission_funds(addr(EMISSION))
                .emission_funds_amount(EMISSION_AMOUNT)
                .governance_caller(addr(GOVERNANCE))
                .build(),
            db,
            keys.clone(),
        )?;
        Ok(Self { engine, keys })
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn override_precedence() -> BoxedErrorResult<()> {
    let setup = Setup::new().await?;

    assert_eq!(setup.engine.effective_reward(addr(1)).await, BASE);

    setup
        .engine
        .set_global_override(addr(GOVERNANCE), Amount::new(500))
        .await?;
    assert_eq!(setup.engine.effective_reward(addr(1)).await, Amount::new(500));

    // the account override trumps the global one
    setup
        .engine
        .set_account_override(addr(GOVERNANCE), addr(1), Amount::new(200))
        .await?;
    assert_eq!(setup.engine.effective_reward(addr(1)).await, Amount::new(200));
    assert_eq!(setup.engine.effective_reward(addr(2)).await, Amount::new(500));

    // zero clears, falling back down the chain
    setup
        .engine
        .set_account_override(addr(GOVERNANCE), addr(1), Amount::ZERO)
        .await?;
    assert_eq!(setup.engine.effective_reward(addr(1)).await, Amount::new(500));
    setup
        .engine
        .set_global_override(addr(GOVERNANCE), Amount::ZERO)
        .await?;
    assert_eq!(setup.engine.effective_reward(addr(1)).await, BASE);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn overrides_must_stay_below_base() -> BoxedErrorResult<()> {
    let setup = Setup::new().await?;

    for amount in [
        BASE,
        Amount::new(BASE.to_number() + 1),
        Amount::new(2 * BASE.to_number()),
    ] {
        assert_matches!(
            setup.engine.set_global_override(addr(GOVERNANCE), amount).await,
            Err(RewardError::InvalidAmount { .. })
        );
        assert_matches!(
            setup
                .engine
                .set_account_override(addr(GOVERNANCE), addr(1), amount)
                .await,
            Err(RewardError::InvalidAmount { .. })
        );
    }
    assert_eq!(setup.engine.effective_reward(addr(1)).await, BASE);

    assert_matches!(
        setup.engine.set_global_override(addr(9), Amount::new(1)).await,
        Err(RewardError::Unauthorized)
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn reward_credits_payouts_and_emission() -> BoxedErrorResult<()> {
    let setup = Setup::new().await?;

    // validator 1 pays out to a separate key, validator 2 to itself
    setup
        .keys
        .set_payout_key(addr(KEY_AUTHORITY), addr(1), addr(0x11))
        .await?;

    setup
        .engine
        .reward(Address::SYSTEM_DEFAULT, &[addr(1), addr(2)], &[0, 0])
        .await?;

    assert_eq!(setup.engine.credited(addr(0x11)).await, BASE);
    assert_eq!(setup.engine.credited(addr(1)).await, Amount::ZERO);
    assert_eq!(setup.engine.credited(addr(2)).await, BASE);
    assert_eq!(setup.engine.credited(addr(EMISSION)).await, EMISSION_AMOUNT);

    assert_eq!(
        setup.engine.get_signals().await,
        vec![Signal::Rewarded {
            receivers: vec![addr(0x11), addr(2), addr(EMISSION)],
            amounts: vec![BASE, BASE, EMISSION_AMOUNT],
        }]
    );

    // a second round accumulates
    setup
        .engine
        .reward(Address::SYSTEM_DEFAULT, &[addr(2)], &[0])
        .await?;
    assert_eq!(
        setup.engine.credited(addr(2)).await,
        Amount::new(2 * BASE.to_number())
    );
    assert_eq!(
        setup.engine.credited(addr(EMISSION)).await,
        Amount::new(2 * EMISSION_AMOUNT.to_number())
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn reward_applies_overrides() -> BoxedErrorResult<()> {
    let setup = Setup::new().await?;

    setup
        .engine
        .set_account_override(addr(GOVERNANCE), addr(1), Amount::new(200))
        .await?;

    setup
        .engine
        .reward(Address::SYSTEM_DEFAULT, &[addr(1), addr(2)], &[0, 0])
        .await?;

    assert_eq!(setup.engine.credited(addr(1)).await, Amount::new(200));
    assert_eq!(setup.engine.credited(addr(2)).await, BASE);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn reward_rejections() -> BoxedErrorResult<()> {
    let setup = Setup::new().await?;

    assert_matches!(
        setup.engine.reward(addr(9), &[addr(1)], &[0]).await,
        Err(RewardError::Unauthorized)
    );
    assert_matches!(
        setup
            .engine
            .reward(Address::SYSTEM_DEFAULT, &[addr(1), addr(2)], &[0])
            .await,
        Err(RewardError::InvalidArguments)
    );
    // only block authors (offset zero) are rewardable
    assert_matches!(
        setup
            .engine
            .reward(Address::SYSTEM_DEFAULT, &[addr(1)], &[1])
            .await,
        Err(RewardError::InvalidArguments)
    );
    // one bad mining key aborts the whole round
    assert_matches!(
        setup
            .engine
            .reward(Address::SYSTEM_DEFAULT, &[addr(1), Address::ZERO], &[0, 0])
            .await,
        Err(RewardError::Key { .. })
    );

    assert_eq!(setup.engine.credited(addr(1)).await, Amount::ZERO);
    assert_eq!(setup.engine.credited(addr(EMISSION)).await, Amount::ZERO);
    assert_eq!(setup.engine.get_signals().await, vec![]);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn construction_rejects_bad_config() -> BoxedErrorResult<()> {
    let db = Arc::new(Database::new_in_memory().await?);
    let keys = Arc::new(KeyDirectory::new(db.clone(), addr(KEY_AUTHORITY)));

    assert_matches!(
        RewardEngine::new(
            RewardConfig::builder()
                .base_reward(Amount::ZERO)
                .emission_funds(addr(EMISSION))
                .emission_funds_amount(EMISSION_AMOUNT)
                .governance_caller(addr(GOVERNANCE))
                .build(),
            db.clone(),
            keys.clone(),
        ),
        Err(RewardError::InvalidAmount { .. })
    );
    assert_matches!(
        RewardEngine::new(
            RewardConfig::builder()
                .base_reward(BASE)
                .emission_funds(Address::ZERO)
                .emission_funds_amount(EMISSION_AMOUNT)
                .governance_caller(addr(GOVERNANCE))
                .build(),
            db,
            keys,
        ),
        Err(RewardError::InvalidAddress)
    );

    Ok(())
}
