// SPDX-License-Identifier: MIT

//! Reward engine
//!
//! Credits block authors (through their payout keys) and the emission
//! sink once per reward round. Governance can lower the effective
//! reward below the configured base, globally or per mining key, but
//! never raise it.

mod tables;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use poagov_core::signal::{load_signals, push_signal};
use poagov_core::{Address, Amount, Signal};
use poagov_db::Database;
use poagov_db::error::TxSnafu;
use poagov_keys::{KeyDirectory, KeyDirectoryError};
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

const LOG_TARGET: &str = "poagov::reward";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RewardError {
    #[snafu(display("Caller is not authorized for this operation"))]
    Unauthorized,
    #[snafu(display("Amount {amount} is not valid against base reward {base}"))]
    InvalidAmount { amount: Amount, base: Amount },
    #[snafu(display("Zero address where a real address is required"))]
    InvalidAddress,
    #[snafu(display("Mining keys and block offsets must be parallel arrays of block authors"))]
    InvalidArguments,
    #[snafu(transparent)]
    Key { source: KeyDirectoryError },
}

pub type RewardResult<T> = Result<T, RewardError>;

#[derive(Debug, Clone)]
pub struct RewardConfig {
    /// Reward per block author per round, the override ceiling
    pub base_reward: Amount,
    /// Where the per-round emission credit goes
    pub emission_funds: Address,
    /// Credited to the emission sink once per reward round
    pub emission_funds_amount: Amount,
    /// The identity allowed to trigger reward rounds
    pub system_caller: Address,
    /// The identity allowed to set reward overrides
    pub governance_caller: Address,
}

#[bon::bon]
impl RewardConfig {
    #[builder]
    pub fn new(
        base_reward: Amount,
        emission_funds: Address,
        emission_funds_amount: Amount,
        #[builder(default = Address::SYSTEM_DEFAULT)] system_caller: Address,
        governance_caller: Address,
    ) -> Self {
        Self {
            base_reward,
            emission_funds,
            emission_funds_amount,
            system_caller,
            governance_caller,
        }
    }
}

#[derive(Debug)]
pub struct RewardEngine {
    db: Arc<Database>,
    keys: Arc<KeyDirectory>,
    config: RewardConfig,
}

impl RewardEngine {
    pub fn new(
        config: RewardConfig,
        db: Arc<Database>,
        keys: Arc<KeyDirectory>,
    ) -> RewardResult<Self> {
        if config.base_reward.is_zero() {
            return InvalidAmountSnafu {
                amount: config.base_reward,
                base: config.base_reward,
            }
            .fail();
        }
        if config.emission_funds.is_zero() {
            return InvalidAddressSnafu.fail();
        }
        Ok(Self { db, keys, config })
    }

    /// Set (or with zero, clear) the global reward override
    pub async fn set_global_override(&self, caller: Address, amount: Amount) -> RewardResult<()> {
        let base = self.config.base_reward;
        let governance_caller = self.config.governance_caller;

        self.db
            .write_with_expect_falliable(move |dbtx| {
                if caller != governance_caller {
                    return UnauthorizedSnafu.fail().context(TxSnafu);
                }
                if base <= amount {
                    return InvalidAmountSnafu { amount, base }.fail().context(TxSnafu);
                }

                let mut tbl = dbtx.open_table(&tables::global_override::TABLE)?;
                if amount.is_zero() {
                    tbl.remove(&())?;
                } else {
                    tbl.insert(&(), &amount)?;
                }

                Ok(())
            })
            .await?;

        debug!(target: LOG_TARGET, %amount, "Global reward override set");
        Ok(())
    }

    /// Set (or with zero, clear) the reward override of one mining key
    pub async fn set_account_override(
        &self,
        caller: Address,
        mining_key: Address,
        amount: Amount,
    ) -> RewardResult<()> {
        let base = self.config.base_reward;
        let governance_caller = self.config.governance_caller;

        self.db
            .write_with_expect_falliable(move |dbtx| {
                if caller != governance_caller {
                    return UnauthorizedSnafu.fail().context(TxSnafu);
                }
                if base <= amount {
                    return InvalidAmountSnafu { amount, base }.fail().context(TxSnafu);
                }

                let mut tbl = dbtx.open_table(&tables::account_overrides::TABLE)?;
                if amount.is_zero() {
                    tbl.remove(&mining_key)?;
                } else {
                    tbl.insert(&mining_key, &amount)?;
                }

                Ok(())
            })
            .await?;

        debug!(
            target: LOG_TARGET,
            mining_key = %mining_key.to_short(),
            %amount,
            "Account reward override set"
        );
        Ok(())
    }

    /// What a block authored by `mining_key` earns right now
    ///
    /// Account override first, then the global one, then the base.
    pub async fn effective_reward(&self, mining_key: Address) -> Amount {
        let base = self.config.base_reward;
        self.db
            .read_with_expect(move |dbtx| {
                let account_tbl = dbtx.open_table(&tables::account_overrides::TABLE)?;
                if let Some(amount) = account_tbl.get(&mining_key)?.map(|g| g.value()) {
                    return Ok(amount);
                }
                let global_tbl = dbtx.open_table(&tables::global_override::TABLE)?;
                Ok(global_tbl.get(&())?.map(|g| g.value()).unwrap_or(base))
            })
            .await
    }

    /// Run one reward round for the given block authors
    ///
    /// `mining_keys` and `block_offsets` are parallel arrays; only
    /// offset zero (the block author itself) is rewardable. Payout keys
    /// are resolved before anything is written, so one bad key aborts
    /// the whole round.
    pub async fn reward(
        &self,
        caller: Address,
        mining_keys: &[Address],
        block_offsets: &[u64],
    ) -> RewardResult<()> {
        if caller != self.config.system_caller {
            return UnauthorizedSnafu.fail();
        }
        if mining_keys.len() != block_offsets.len()
            || block_offsets.iter().any(|offset| *offset != 0)
        {
            return InvalidArgumentsSnafu.fail();
        }

        let mut payouts = Vec::with_capacity(mining_keys.len());
        for mining_key in mining_keys {
            payouts.push((*mining_key, self.keys.resolve_payout(*mining_key).await?));
        }

        let base = self.config.base_reward;
        let emission_funds = self.config.emission_funds;
        let emission_amount = self.config.emission_funds_amount;

        let (receivers, amounts) = self
            .db
            .write_with_expect_falliable(move |dbtx| {
                let account_tbl = dbtx.open_table(&tables::account_overrides::TABLE)?;
                let global_tbl = dbtx.open_table(&tables::global_override::TABLE)?;
                let global = global_tbl.get(&())?.map(|g| g.value());

                let mut receivers = Vec::with_capacity(payouts.len() + 1);
                let mut amounts = Vec::with_capacity(payouts.len() + 1);
                for (mining_key, payout) in payouts {
                    let amount = match account_tbl.get(&mining_key)?.map(|g| g.value()) {
                        Some(amount) => amount,
                        None => global.unwrap_or(base),
                    };
                    receivers.push(payout);
                    amounts.push(amount);
                }
                receivers.push(emission_funds);
                amounts.push(emission_amount);

                let mut credited_tbl = dbtx.open_table(&tables::credited::TABLE)?;
                for (receiver, amount) in receivers.iter().zip(&amounts) {
                    let credited = credited_tbl
                        .get(receiver)?
                        .map(|g| g.value())
                        .unwrap_or(Amount::ZERO);
                    let Some(credited) = credited.checked_add_amount(*amount) else {
                        return InvalidAmountSnafu {
                            amount: *amount,
                            base,
                        }
                        .fail()
                        .context(TxSnafu);
                    };
                    credited_tbl.insert(receiver, &credited)?;
                }

                let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
                push_signal(
                    &mut signals,
                    &Signal::Rewarded {
                        receivers: receivers.clone(),
                        amounts: amounts.clone(),
                    },
                )?;

                Ok((receivers, amounts))
            })
            .await?;

        debug!(
            target: LOG_TARGET,
            receivers = receivers.len(),
            total = %amounts
                .iter()
                .try_fold(Amount::ZERO, |acc, a| acc.checked_add_amount(*a))
                .unwrap_or(Amount::MAX),
            "Reward round credited"
        );
        Ok(())
    }

    /// Accumulated credits of one payout address
    pub async fn credited(&self, address: Address) -> Amount {
        self.db
            .read_with_expect(move |dbtx| {
                let tbl = dbtx.open_table(&tables::credited::TABLE)?;
                Ok(tbl.get(&address)?.map(|g| g.value()).unwrap_or(Amount::ZERO))
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
