// SPDX-License-Identifier: MIT

//! Key directory
//!
//! Maps a validator's mining key (its consensus identity) to an
//! optional payout key. The reward engine resolves every receiver
//! through [`KeyDirectory::resolve_payout`] before crediting anything.

mod tables;


use std::sync::Arc;

use poagov_core::signal::{load_signals, push_signal};
use poagov_core::{Address, Signal};
use poagov_db::Database;
use poagov_db::error::TxSnafu;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

const LOG_TARGET: &str = "poagov::keys";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum KeyDirectoryError {
    #[snafu(display("Caller is not the key-management authority"))]
    Unauthorized,
    #[snafu(display("Zero mining key"))]
    InvalidKey,
}

pub type KeyDirectoryResult<T> = Result<T, KeyDirectoryError>;

#[derive(Debug)]
pub struct KeyDirectory {
    db: Arc<Database>,
    /// The only caller allowed to rebind payout keys
    voting_authority: Address,
}

impl KeyDirectory {
    pub fn new(db: Arc<Database>, voting_authority: Address) -> Self {
        Self {
            db,
            voting_authority,
        }
    }

    /// Bind (or with a zero `payout_key`, clear) the payout key of a
    /// mining key
    pub async fn set_payout_key(
        &self,
        caller: Address,
        mining_key: Address,
        payout_key: Address,
    ) -> KeyDirectoryResult<()> {
        self.db
            .write_with_expect_falliable(|dbtx| {
                if caller != self.voting_authority {
                    return UnauthorizedSnafu.fail().context(TxSnafu);
                }
                if mining_key.is_zero() {
                    return InvalidKeySnafu.fail().context(TxSnafu);
                }

                let mut tbl = dbtx.open_table(&tables::mining_to_payout::TABLE)?;
                if payout_key.is_zero() {
                    tbl.remove(&mining_key)?;
                } else {
                    tbl.insert(&mining_key, &payout_key)?;
                }

                let mut signals = dbtx.open_table(&tables::signals::TABLE)?;
                push_signal(
                    &mut signals,
                    &Signal::PayoutKeyChanged {
                        mining_key,
                        payout_key,
                    },
                )?;

                Ok(())
            })
            .await?;

        debug!(
            target: LOG_TARGET,
            mining_key = %mining_key.to_short(),
            payout_key = %payout_key.to_short(),
            "Payout key changed"
        );
        Ok(())
    }

    /// Where rewards earned by `mining_key` should be sent
    ///
    /// Falls back to the mining key itself when no payout key is bound.
    pub async fn resolve_payout(&self, mining_key: Address) -> KeyDirectoryResult<Address> {
        if mining_key.is_zero() {
            return InvalidKeySnafu.fail();
        }
        Ok(self.payout_key(mining_key).await.unwrap_or(mining_key))
    }

    /// The bound payout key, if any
    pub async fn payout_key(&self, mining_key: Address) -> Option<Address> {
        self.db
            .read_with_expect(|dbtx| {
                let tbl = dbtx.open_table(&tables::mining_to_payout::TABLE)?;
                Ok(tbl.get(&mining_key)?.map(|g| g.value()))
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
