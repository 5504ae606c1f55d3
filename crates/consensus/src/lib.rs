// SPDX-License-Identifier: MIT

//! Validator-set consensus
//!
//! Owns the active validator set and the two-phase change protocol:
//! governance initiates a change (add or remove one validator), the
//! block-processing system caller finalizes it. At most one change is
//! in flight at a time; the active set stays untouched until
//! finalization commits.

mod tables;


use std::sync::Arc;

use poagov_collateral::{CollateralError, CollateralLedger};
use poagov_core::signal::{load_signals, push_signal};
use poagov_core::{Address, Amount, Signal, ValidatorSet};
use poagov_db::Database;
use poagov_db::error::TxSnafu;
use snafu::{ResultExt as _, Snafu};
use tokio::sync::watch;
use tracing::{debug, info};

const LOG_TARGET: &str = "poagov::consensus";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConsensusError {
    #[snafu(display("Caller is not authorized for this operation"))]
    Unauthorized,
    #[snafu(display("A validator-set change is already pending"))]
    AlreadyPending,
    #[snafu(display("No validator-set change is pending"))]
    AlreadyFinalized,
    #[snafu(display("Zero address where a validator identity is required"))]
    InvalidAddress,
    #[snafu(display("Validator is already a member"))]
    AlreadyExists,
    #[snafu(display("Validator is not a member"))]
    NotFound,
    #[snafu(display("Removal would leave the validator set empty"))]
    EmptyValidatorSet,
    #[snafu(display("Insufficient collateral: required {required}, actual {actual}"))]
    InvalidAmount { required: Amount, actual: Amount },
    #[snafu(display("Storage was bootstrapped with a different master of ceremony"))]
    DoubleInitialization,
    #[snafu(display("Collateral operation failed"))]
    Collateral { source: CollateralError },
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Bootstrap authority, always the first member of the genesis set
    pub master_of_ceremony: Address,
    /// The identity allowed to finalize initiated changes
    pub system_caller: Address,
    /// Collateral a new validator must have deposited before admission
    pub required_collateral: Amount,
    /// Members of the genesis set besides the master of ceremony
    pub initial_validators: Vec<Address>,
    /// Governance module allowed to initiate changes, once registered
    pub voting_authority: Option<Address>,
}

#[bon::bon]
impl ConsensusConfig {
    #[builder]
    pub fn new(
        master_of_ceremony: Address,
        #[builder(default = Address::SYSTEM_DEFAULT)] system_caller: Address,
        required_collateral: Amount,
        #[builder(default)] initial_validators: Vec<Address>,
        voting_authority: Option<Address>,
    ) -> Self {
        Self {
            master_of_ceremony,
            system_caller,
            required_collateral,
            initial_validators,
            voting_authority,
        }
    }
}

#[derive(Debug)]
pub struct ValidatorSetConsensus {
    db: Arc<Database>,
    collateral: Arc<CollateralLedger>,
    config: ConsensusConfig,
    validators_tx: watch::Sender<ValidatorSet>,
}

impl ValidatorSetConsensus {
    /// Bootstrap the genesis validator set, or resume from existing
    /// storage
    ///
    /// The genesis set is the master of ceremony followed by the
    /// configured initial validators, already finalized. Resuming a
    /// database bootstrapped with a different master of ceremony is
    /// `DoubleInitialization`.
    pub async fn init(
        config: ConsensusConfig,
        db: Arc<Database>,
        collateral: Arc<CollateralLedger>,
    ) -> ConsensusResult<Self> {
        if config.master_of_ceremony.is_zero() {
            return InvalidAddressSnafu.fail();
        }

        let mut genesis = ValidatorSet::new();
        genesis.push(config.master_of_ceremony);
        for validator in &config.initial_validators {
            if validator.is_zero() {
                return InvalidAddressSnafu.fail();
            }
            if !genesis.push(*validator) {
                return AlreadyExistsSnafu.fail();
            }
        }

        let master_of_ceremony = config.master_of_ceremony;
        let current = db
            .write_with_expect_falliable(move |dbtx| {
                let mut moc_tbl = dbtx.open_table(&tables::master_of_ceremony::TABLE)?;
                let existing_moc = moc_tbl.get(&())?.map(|g| g.value());
                match existing_moc {
                    Some(existing) if existing != master_of_ceremony => {
                        DoubleInitializationSnafu.fail().context(TxSnafu)
                    }
                    Some(_) => {
                        let tbl = dbtx.open_table(&tables::current_validators::TABLE)?;
                        Ok(tbl.get(&())?.map(|g| g.value()).unwrap_or_default())
                    }
                    None => {
                        moc_tbl.insert(&(), &master_of_ceremony)?;
                        let mut cur_tbl = dbtx.open_table(&tables::current_validators::TABLE)?;
                        cur_tbl.insert(&(), &genesis)?;
                        // pending mirrors current whenever no change is in flight
                        let mut pending_tbl = dbtx.open_table(&tables::pending_validators::TABLE)?;
                        pending_tbl.insert(&(), &genesis)?;
                        let mut fin_tbl = dbtx.open_table(&tables::finalized::TABLE)?;
                        fin_tbl.insert(&(), &true)?;
                        Ok(genesis)
                    }
                }
            })
            .await?;

        info!(
            target: LOG_TARGET,
            master_of_ceremony = %master_of_ceremony.to_short(),
            validators = current.len(),
            "Validator-set consensus ready"
        );

        let (validators_tx, _) = watch::channel(current);

        Ok(Self {
            db,
            collateral,
            config,
            validators_tx,
        })
    }

    /// Initiate adding a validator to the set
    ///
    /// With `check_collateral`, admission additionally requires the
    /// candidate to have deposited the configured collateral.
    pub async fn add_validator(
        &self,
        caller: Address,
        validator: Address,
        check_collateral: bool,
    ) -> ConsensusResult<()> {
        let authorized = self.is_governance_caller(caller);
        let required = self.config.required_collateral;
        let actual = self.collateral.balance(validator).await;

        self.db
            .write_with_expect_falliable(move |dbtx| {
                if !authorized {
                    return UnauthorizedSnafu.fail().context(TxSnafu);
                }

                let mut fin_tbl = dbtx.open_table(&tables::finalized::TABLE)?;
                if !fin_tbl.get(&())?.map(|g| g.value()).unwrap_or(true) {
                    return AlreadyPendingSnafu.fail().context(TxSnafu);
                }
                if validator.is_zero() {
                    return InvalidAddressSnafu.fail().context(TxSnafu);
                }

                let cur_tbl = dbtx.open_table(&tables::current_validators::TABLE)?;
                let mut proposed = cur_tbl.get(&())?.map(|g| g.value()).unwrap_or_default();
                if !proposed.push(validator) {
                    return AlreadyExistsSnafu.fail().context(TxSnafu);
                }
                if check_collateral && actual < required {
                    return InvalidAmountSnafu { required, actual }.fail().context(TxSnafu);
                }

                let mut pending_tbl = dbtx.open_table(&tables::pending_validators::TABLE)?;
                pending_tbl.insert(&(), &proposed)?;
                fin_tbl.insert(&(), &false)?;

                let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
                push_signal(&mut signals, &Signal::ChangeInitiated { proposed })?;

                Ok(())
            })
            .await?;

        debug!(target: LOG_TARGET, validator = %validator.to_short(), "Validator addition initiated");
        Ok(())
    }

    /// Initiate removing a validator from the set
    pub async fn remove_validator(
        &self,
        caller: Address,
        validator: Address,
    ) -> ConsensusResult<()> {
        let authorized = self.is_governance_caller(caller);

        self.db
            .write_with_expect_falliable(move |dbtx| {
                if !authorized {
                    return UnauthorizedSnafu.fail().context(TxSnafu);
                }

                let mut fin_tbl = dbtx.open_table(&tables::finalized::TABLE)?;
                if !fin_tbl.get(&())?.map(|g| g.value()).unwrap_or(true) {
                    return AlreadyPendingSnafu.fail().context(TxSnafu);
                }

                let cur_tbl = dbtx.open_table(&tables::current_validators::TABLE)?;
                let mut proposed = cur_tbl.get(&())?.map(|g| g.value()).unwrap_or_default();
                if !proposed.remove(validator) {
                    return NotFoundSnafu.fail().context(TxSnafu);
                }
                if proposed.is_empty() {
                    return EmptyValidatorSetSnafu.fail().context(TxSnafu);
                }

                let mut pending_tbl = dbtx.open_table(&tables::pending_validators::TABLE)?;
                pending_tbl.insert(&(), &proposed)?;
                fin_tbl.insert(&(), &false)?;

                let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
                push_signal(&mut signals, &Signal::ChangeInitiated { proposed })?;

                Ok(())
            })
            .await?;

        debug!(target: LOG_TARGET, validator = %validator.to_short(), "Validator removal initiated");
        Ok(())
    }

    /// Commit the pending validator-set change
    ///
    /// Only the system caller may finalize. The new set is published to
    /// watchers after the transaction commits.
    pub async fn finalize(&self, caller: Address) -> ConsensusResult<()> {
        let system_caller = self.config.system_caller;
        let validators_tx = self.validators_tx.clone();

        let validators = self
            .db
            .write_with_expect_falliable(move |dbtx| {
                if caller != system_caller {
                    return UnauthorizedSnafu.fail().context(TxSnafu);
                }

                let mut fin_tbl = dbtx.open_table(&tables::finalized::TABLE)?;
                if fin_tbl.get(&())?.map(|g| g.value()).unwrap_or(true) {
                    return AlreadyFinalizedSnafu.fail().context(TxSnafu);
                }

                let pending_tbl = dbtx.open_table(&tables::pending_validators::TABLE)?;
                let validators = pending_tbl.get(&())?.map(|g| g.value()).unwrap_or_default();

                let mut cur_tbl = dbtx.open_table(&tables::current_validators::TABLE)?;
                cur_tbl.insert(&(), &validators)?;
                fin_tbl.insert(&(), &true)?;

                let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
                push_signal(
                    &mut signals,
                    &Signal::ChangeFinalized {
                        validators: validators.clone(),
                    },
                )?;

                let published = validators.clone();
                dbtx.on_commit(move || {
                    validators_tx.send_replace(published);
                });

                Ok(validators)
            })
            .await?;

        info!(target: LOG_TARGET, validators = validators.len(), "Validator-set change finalized");
        Ok(())
    }

    /// Withdraw collateral, unless the caller is a serving validator
    pub async fn withdraw_collateral(
        &self,
        caller: Address,
        amount: Amount,
    ) -> ConsensusResult<()> {
        if self.is_validator(caller).await {
            return UnauthorizedSnafu.fail();
        }
        self.collateral
            .withdraw(caller, amount)
            .await
            .context(CollateralSnafu)
    }

    pub async fn get_validators(&self) -> ValidatorSet {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::current_validators::TABLE)?;
                Ok(tbl.get(&())?.map(|g| g.value()).unwrap_or_default())
            })
            .await
    }

    pub async fn get_pending(&self) -> ValidatorSet {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::pending_validators::TABLE)?;
                Ok(tbl.get(&())?.map(|g| g.value()).unwrap_or_default())
            })
            .await
    }

    pub async fn is_finalized(&self) -> bool {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::finalized::TABLE)?;
                Ok(tbl.get(&())?.map(|g| g.value()).unwrap_or(true))
            })
            .await
    }

    pub async fn is_validator(&self, address: Address) -> bool {
        self.get_validators().await.contains(&address)
    }

    pub fn master_of_ceremony(&self) -> Address {
        self.config.master_of_ceremony
    }

    /// The finalized validator set, updated after every finalization
    pub fn validators_rx(&self) -> watch::Receiver<ValidatorSet> {
        self.validators_tx.subscribe()
    }

    pub async fn get_signals(&self) -> Vec<Signal> {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::signals::TABLE)?;
                Ok(load_signals(&tbl)?)
            })
            .await
    }

    fn is_governance_caller(&self, caller: Address) -> bool {
        caller == self.config.master_of_ceremony
            || self.config.voting_authority == Some(caller)
    }
}
