// SPDX-License-Identifier: MIT

//! Module registry
//!
//! The level of indirection that makes governance modules upgradeable:
//! each [`ModuleKind`] has a stable address that never changes and a
//! logic address that governance can repoint. Batch upgrades are
//! all-or-nothing, so modules that hold pointers to each other can
//! never observe a half-upgraded registry.

mod tables;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use bincode::{Decode, Encode};
use poagov_core::signal::{load_signals, push_signal};
use poagov_core::{Address, ModuleKind, Signal};
use poagov_db::Database;
use poagov_db::ctx::WriteTransactionCtx;
use poagov_db::error::{DbTxResult, TxSnafu};
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, info};

const LOG_TARGET: &str = "poagov::registry";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RegistryError {
    #[snafu(display("Caller is not authorized for this registry operation"))]
    Unauthorized,
    #[snafu(display("Registry is already initialized"))]
    DoubleInitialization,
    #[snafu(display("Modules are already registered"))]
    AlreadyExists,
    #[snafu(display("Module kind {kind} is not registered"))]
    NotFound { kind: ModuleKind },
    #[snafu(display("Zero address where a real address is required"))]
    InvalidAddress,
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Stable address plus current logic address of one module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct ModuleEntry {
    pub stable: Address,
    pub logic: Address,
}

/// One entry per module kind, so registration is total by construction
#[derive(Debug, Clone, Copy)]
pub struct ModuleAddresses {
    pub key_directory: ModuleEntry,
    pub ballots_storage: ModuleEntry,
    pub validator_metadata: ModuleEntry,
    pub voting_to_change_keys: ModuleEntry,
    pub voting_to_change_min_threshold: ModuleEntry,
    pub voting_to_change_registry: ModuleEntry,
    pub voting_to_manage_emission_funds: ModuleEntry,
    pub reward_engine: ModuleEntry,
}

impl ModuleAddresses {
    pub fn entry(&self, kind: ModuleKind) -> ModuleEntry {
        match kind {
            ModuleKind::KeyDirectory => self.key_directory,
            ModuleKind::BallotsStorage => self.ballots_storage,
            ModuleKind::ValidatorMetadata => self.validator_metadata,
            ModuleKind::VotingToChangeKeys => self.voting_to_change_keys,
            ModuleKind::VotingToChangeMinThreshold => self.voting_to_change_min_threshold,
            ModuleKind::VotingToChangeRegistry => self.voting_to_change_registry,
            ModuleKind::VotingToManageEmissionFunds => self.voting_to_manage_emission_funds,
            ModuleKind::RewardEngine => self.reward_engine,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleKind, ModuleEntry)> + '_ {
        ModuleKind::ALL.into_iter().map(|kind| (kind, self.entry(kind)))
    }
}

pub struct ModuleRegistry {
    db: Arc<Database>,
    /// Bootstrap authority allowed to register the initial module set
    deployer: Address,
}

impl ModuleRegistry {
    pub fn new(db: Arc<Database>, deployer: Address) -> Self {
        Self { db, deployer }
    }

    /// Bind the consensus component's address, exactly once
    pub async fn initialize(&self, consensus: Address) -> RegistryResult<()> {
        self.db
            .write_with_expect_falliable(|dbtx| {
                if consensus.is_zero() {
                    return InvalidAddressSnafu.fail().context(TxSnafu);
                }

                let mut tbl = dbtx.open_table(&tables::consensus_addr::TABLE)?;
                if tbl.get(&())?.is_some() {
                    return DoubleInitializationSnafu.fail().context(TxSnafu);
                }
                tbl.insert(&(), &consensus)?;

                Ok(())
            })
            .await?;

        info!(target: LOG_TARGET, consensus = %consensus.to_short(), "Registry initialized");
        Ok(())
    }

    /// Register the stable and logic address of every module kind
    ///
    /// Single shot: fails with `AlreadyExists` once anything is
    /// registered. One transaction, so a rejected batch registers
    /// nothing.
    pub async fn register_all(
        &self,
        caller: Address,
        modules: ModuleAddresses,
    ) -> RegistryResult<()> {
        self.db
            .write_with_expect_falliable(|dbtx| {
                if caller != self.deployer {
                    return UnauthorizedSnafu.fail().context(TxSnafu);
                }

                let mut tbl = dbtx.open_table(&tables::modules::TABLE)?;
                if tbl.range(..)?.next().transpose()?.is_some() {
                    return AlreadyExistsSnafu.fail().context(TxSnafu);
                }
                for (kind, entry) in modules.iter() {
                    if entry.stable.is_zero() || entry.logic.is_zero() {
                        return InvalidAddressSnafu.fail().context(TxSnafu);
                    }
                    tbl.insert(&kind, &entry)?;
                }

                Ok(())
            })
            .await?;

        info!(target: LOG_TARGET, "All modules registered");
        Ok(())
    }

    /// Repoint the logic address of one module kind
    pub async fn upgrade_logic(
        &self,
        caller: Address,
        kind: ModuleKind,
        new_logic: Address,
    ) -> RegistryResult<()> {
        self.upgrade_logic_batch(caller, &[(kind, new_logic)]).await
    }

    /// Repoint the logic addresses of several module kinds at once
    ///
    /// Every change is validated before any is written, so one bad
    /// entry leaves all logic pointers untouched.
    pub async fn upgrade_logic_batch(
        &self,
        caller: Address,
        changes: &[(ModuleKind, Address)],
    ) -> RegistryResult<()> {
        self.db
            .write_with_expect_falliable(|dbtx| {
                Self::upgrade_logic_batch_tx(dbtx, caller, changes)
            })
            .await?;

        for (kind, new_logic) in changes {
            debug!(
                target: LOG_TARGET,
                %kind,
                logic = %new_logic.to_short(),
                "Module logic upgraded"
            );
        }
        Ok(())
    }

    fn upgrade_logic_batch_tx(
        dbtx: &WriteTransactionCtx,
        caller: Address,
        changes: &[(ModuleKind, Address)],
    ) -> DbTxResult<(), RegistryError> {
        let mut tbl = dbtx.open_table(&tables::modules::TABLE)?;

        let authority = tbl
            .get(&ModuleKind::VotingToChangeRegistry)?
            .map(|g| g.value().stable);
        if authority != Some(caller) {
            return UnauthorizedSnafu.fail().context(TxSnafu);
        }

        // validate everything up front
        let mut upgraded = Vec::with_capacity(changes.len());
        for &(kind, new_logic) in changes {
            if new_logic.is_zero() {
                return InvalidAddressSnafu.fail().context(TxSnafu);
            }
            let Some(entry) = tbl.get(&kind)?.map(|g| g.value()) else {
                return NotFoundSnafu { kind }.fail().context(TxSnafu);
            };
            upgraded.push((
                kind,
                ModuleEntry {
                    stable: entry.stable,
                    logic: new_logic,
                },
            ));
        }

        let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
        for (kind, entry) in upgraded {
            tbl.insert(&kind, &entry)?;
            push_signal(
                &mut signals,
                &Signal::LogicUpgraded {
                    kind,
                    logic: entry.logic,
                },
            )?;
        }

        Ok(())
    }

    pub async fn stable_address(&self, kind: ModuleKind) -> Option<Address> {
        self.entry(kind).await.map(|e| e.stable)
    }

    pub async fn logic_address(&self, kind: ModuleKind) -> Option<Address> {
        self.entry(kind).await.map(|e| e.logic)
    }

    async fn entry(&self, kind: ModuleKind) -> Option<ModuleEntry> {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::modules::TABLE)?;
                Ok(tbl.get(&kind)?.map(|g| g.value()))
            })
            .await
    }

    pub async fn entries(&self) -> Vec<(ModuleKind, ModuleEntry)> {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::modules::TABLE)?;
                tbl.range(..)?
                    .map(|kv| {
                        let (k, v) = kv?;
                        Ok((k.value(), v.value()))
                    })
                    .collect()
            })
            .await
    }

    pub async fn consensus_addr(&self) -> Option<Address> {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::consensus_addr::TABLE)?;
                Ok(tbl.get(&())?.map(|g| g.value()))
            })
            .await
    }

    pub async fn get_signals(&self) -> Vec<Signal> {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::signals::TABLE)?;
                Ok(load_signals(&tbl)?)
            })
            .await
    }
}
