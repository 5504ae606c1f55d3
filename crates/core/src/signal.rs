use bincode::{Decode, Encode};
use poagov_util_array_type::{array_type_fixed_size_define, array_type_fixed_size_impl_serde};
use poagov_util_db::redb_bincode::{ReadableTable, StorageError, Table};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::module::ModuleKind;
use crate::validator_set::ValidatorSet;

array_type_fixed_size_define! {
    /// Position of a signal in a component's append-only log
    #[derive(Encode, Decode, Clone, Copy, Hash)]
    pub struct SignalSeq(u64);
}

array_type_fixed_size_impl_serde!(SignalSeq);

/// The externally observable side channel of every governance component
///
/// Signals are appended to a component's own log table inside the same
/// write transaction as the state change they describe, so a rejected
/// operation emits nothing and watchers never observe partial effects.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum Signal {
    /// A validator-set change was proposed and awaits finalization
    ChangeInitiated { proposed: ValidatorSet },
    /// A proposed validator-set change was committed by the system caller
    ChangeFinalized { validators: ValidatorSet },
    CollateralDeposited { address: Address, amount: Amount },
    CollateralWithdrawn { address: Address, amount: Amount },
    PayoutKeyChanged { mining_key: Address, payout_key: Address },
    /// Per-block reward distribution: parallel receiver/amount arrays
    Rewarded { receivers: Vec<Address>, amounts: Vec<Amount> },
    LogicUpgraded { kind: ModuleKind, logic: Address },
}

/// Append a signal at the end of a log table
///
/// Must run inside the same write transaction as the state change the
/// signal describes.
pub fn push_signal(
    tbl: &mut Table<'_, SignalSeq, Signal>,
    signal: &Signal,
) -> Result<SignalSeq, StorageError> {
    let seq = match tbl.range(..)?.next_back().transpose()? {
        Some((last, _)) => last.value().next_expect(),
        None => SignalSeq::ZERO,
    };
    tbl.insert(&seq, signal)?;
    Ok(seq)
}

/// Read a log table in append order
pub fn load_signals(
    tbl: &impl ReadableTable<SignalSeq, Signal>,
) -> Result<Vec<Signal>, StorageError> {
    tbl.range(..)?
        .map(|kv| {
            let (_, v) = kv?;
            Ok(v.value())
        })
        .collect()
}
