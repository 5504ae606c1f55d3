// SPDX-License-Identifier: MIT

//! Collateral ledger
//!
//! Tracks per-address deposited stake. Leaf component: it knows nothing
//! about validators; the consensus component consults it for admission
//! checks and gates withdrawals on membership.

mod tables;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use poagov_core::signal::{load_signals, push_signal};
use poagov_core::{Address, Amount, Signal};
use poagov_db::Database;
use poagov_db::error::TxSnafu;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

const LOG_TARGET: &str = "poagov::collateral";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CollateralError {
    #[snafu(display("Zero address where a real identity is required"))]
    InvalidAddress,
    #[snafu(display("Invalid amount: {amount}"))]
    InvalidAmount { amount: Amount },
}

pub type CollateralResult<T> = Result<T, CollateralError>;

#[derive(Debug)]
pub struct CollateralLedger {
    db: Arc<Database>,
}

impl CollateralLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Credit `amount` of collateral to `from`
    pub async fn deposit(&self, from: Address, amount: Amount) -> CollateralResult<()> {
        self.db
            .write_with_expect_falliable(|dbtx| {
                if from.is_zero() {
                    return InvalidAddressSnafu.fail().context(TxSnafu);
                }
                if amount.is_zero() {
                    return InvalidAmountSnafu { amount }.fail().context(TxSnafu);
                }

                let mut tbl = dbtx.open_table(&tables::balances::TABLE)?;
                let balance = tbl.get(&from)?.map(|g| g.value()).unwrap_or(Amount::ZERO);
                let Some(balance) = balance.checked_add_amount(amount) else {
                    return InvalidAmountSnafu { amount }.fail().context(TxSnafu);
                };
                tbl.insert(&from, &balance)?;

                let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
                push_signal(
                    &mut signals,
                    &Signal::CollateralDeposited {
                        address: from,
                        amount,
                    },
                )?;

                Ok(())
            })
            .await?;

        debug!(target: LOG_TARGET, address = %from.to_short(), %amount, "Collateral deposited");
        Ok(())
    }

    /// Debit `amount` of collateral from `from`
    ///
    /// Only amount validity is checked here. In production wiring this
    /// is reachable solely through
    /// `ValidatorSetConsensus::withdraw_collateral`, which rejects
    /// withdrawals by serving validators.
    pub async fn withdraw(&self, from: Address, amount: Amount) -> CollateralResult<()> {
        self.db
            .write_with_expect_falliable(|dbtx| {
                if amount.is_zero() {
                    return InvalidAmountSnafu { amount }.fail().context(TxSnafu);
                }

                let mut tbl = dbtx.open_table(&tables::balances::TABLE)?;
                let balance = tbl.get(&from)?.map(|g| g.value()).unwrap_or(Amount::ZERO);
                let Some(balance) = balance.checked_sub_amount(amount) else {
                    return InvalidAmountSnafu { amount }.fail().context(TxSnafu);
                };
                if balance.is_zero() {
                    tbl.remove(&from)?;
                } else {
                    tbl.insert(&from, &balance)?;
                }

                let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
                push_signal(
                    &mut signals,
                    &Signal::CollateralWithdrawn {
                        address: from,
                        amount,
                    },
                )?;

                Ok(())
            })
            .await?;

        debug!(target: LOG_TARGET, address = %from.to_short(), %amount, "Collateral withdrawn");
        Ok(())
    }

    /// Current balance, zero when the address never deposited
    pub async fn balance(&self, address: Address) -> Amount {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::balances::TABLE)?;
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
