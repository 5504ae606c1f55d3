use std::sync::Arc;

use assert_matches::assert_matches;
use poagov_core::{Address, ModuleKind, Signal};
use poagov_db::Database;
use poagov_util_error::BoxedErrorResult;

use crate::{ModuleAddresses, ModuleEntry, ModuleRegistry, RegistryError};

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

const DEPLOYER: u8 = 0xd0;

/// Stable addresses 0x10.., logic addresses 0x20.., per kind index
fn all_modules() -> ModuleAddresses {
    let entry = |i: u8| ModuleEntry {
        stable: addr(0x10 + i),
        logic: addr(0x20 + i),
    };
    ModuleAddresses {
        key_directory: entry(0),
        ballots_storage: entry(1),
        validator_metadata: entry(2),
        voting_to_change_keys: entry(3),
        voting_to_change_min_threshold: entry(4),
        voting_to_change_registry: entry(5),
        voting_to_manage_emission_funds: entry(6),
        reward_engine: entry(7),
    }
}

fn registry_authority() -> Address {
    all_modules().voting_to_change_registry.stable
}

async fn temp_registry() -> BoxedErrorResult<ModuleRegistry> {
    let db = Database::new_in_memory().await?;
    Ok(ModuleRegistry::new(Arc::new(db), addr(DEPLOYER)))
}

async fn registered_registry() -> BoxedErrorResult<ModuleRegistry> {
    let registry = temp_registry().await?;
    registry.initialize(addr(0xc0)).await?;
    registry.register_all(addr(DEPLOYER), all_modules()).await?;
    Ok(registry)
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn initialize_is_single_shot() -> BoxedErrorResult<()> {
    let registry = temp_registry().await?;

    assert_eq!(registry.consensus_addr().await, None);
    assert_matches!(
        registry.initialize(Address::ZERO).await,
        Err(RegistryError::InvalidAddress)
    );

    registry.initialize(addr(0xc0)).await?;
    assert_eq!(registry.consensus_addr().await, Some(addr(0xc0)));

    assert_matches!(
        registry.initialize(addr(0xc1)).await,
        Err(RegistryError::DoubleInitialization)
    );
    assert_eq!(registry.consensus_addr().await, Some(addr(0xc0)));

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn register_all_covers_every_kind() -> BoxedErrorResult<()> {
    let registry = registered_registry().await?;

    for kind in ModuleKind::ALL {
        let entry = all_modules().entry(kind);
        assert_eq!(registry.stable_address(kind).await, Some(entry.stable));
        assert_eq!(registry.logic_address(kind).await, Some(entry.logic));
    }
    assert_eq!(registry.entries().await.len(), ModuleKind::ALL.len());

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn register_all_rejections() -> BoxedErrorResult<()> {
    let registry = temp_registry().await?;

    assert_matches!(
        registry.register_all(addr(9), all_modules()).await,
        Err(RegistryError::Unauthorized)
    );

    let mut bad = all_modules();
    bad.reward_engine.logic = Address::ZERO;
    assert_matches!(
        registry.register_all(addr(DEPLOYER), bad).await,
        Err(RegistryError::InvalidAddress)
    );
    // the rejected batch registered nothing
    assert_eq!(registry.entries().await, vec![]);

    registry.register_all(addr(DEPLOYER), all_modules()).await?;
    assert_matches!(
        registry.register_all(addr(DEPLOYER), all_modules()).await,
        Err(RegistryError::AlreadyExists)
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn upgrade_preserves_stable_address() -> BoxedErrorResult<()> {
    let registry = registered_registry().await?;

    let kind = ModuleKind::RewardEngine;
    let stable_before = registry.stable_address(kind).await;

    registry
        .upgrade_logic(registry_authority(), kind, addr(0x77))
        .await?;

    assert_eq!(registry.stable_address(kind).await, stable_before);
    assert_eq!(registry.logic_address(kind).await, Some(addr(0x77)));
    assert_eq!(
        registry.get_signals().await,
        vec![Signal::LogicUpgraded {
            kind,
            logic: addr(0x77)
        }]
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn upgrade_rejections() -> BoxedErrorResult<()> {
    let registry = registered_registry().await?;

    assert_matches!(
        registry
            .upgrade_logic(addr(9), ModuleKind::KeyDirectory, addr(0x77))
            .await,
        Err(RegistryError::Unauthorized)
    );
    assert_matches!(
        registry
            .upgrade_logic(registry_authority(), ModuleKind::KeyDirectory, Address::ZERO)
            .await,
        Err(RegistryError::InvalidAddress)
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn batch_upgrade_is_atomic() -> BoxedErrorResult<()> {
    let registry = registered_registry().await?;

    // second entry is invalid, so the first must not land either
    let res = registry
        .upgrade_logic_batch(
            registry_authority(),
            &[
                (ModuleKind::KeyDirectory, addr(0x70)),
                (ModuleKind::BallotsStorage, Address::ZERO),
            ],
        )
        .await;
    assert_matches!(res, Err(RegistryError::InvalidAddress));

    assert_eq!(
        registry.logic_address(ModuleKind::KeyDirectory).await,
        Some(all_modules().key_directory.logic)
    );
    assert_eq!(registry.get_signals().await, vec![]);

    // a valid batch lands all entries and one signal each
    registry
        .upgrade_logic_batch(
            registry_authority(),
            &[
                (ModuleKind::KeyDirectory, addr(0x70)),
                (ModuleKind::BallotsStorage, addr(0x71)),
            ],
        )
        .await?;

    assert_eq!(
        registry.logic_address(ModuleKind::KeyDirectory).await,
        Some(addr(0x70))
    );
    assert_eq!(
        registry.logic_address(ModuleKind::BallotsStorage).await,
        Some(addr(0x71))
    );
    assert_eq!(registry.get_signals().await.len(), 2);

    Ok(())
}
