use poagov_core::{Address, Amount, Signal, SignalSeq};
use poagov_util_db::def_table;

def_table! {
    /// Global reward override, absent when unset
    ///
    /// Only ever holds a non-zero value below the base reward.
    global_override: () => Amount
}

def_table! {
    /// Per-mining-key reward overrides, trumping the global one
    account_overrides: Address => Amount
}

def_table! {
    /// Accumulated credits per payout address
    credited: Address => Amount
}

def_table! {
    /// Append-only observable signal log
    signals: SignalSeq => Signal
}
