use poagov_core::{Address, Signal, SignalSeq};
use poagov_util_db::def_table;

def_table! {
    /// Payout key per mining key
    ///
    /// Absence means rewards go to the mining key itself.
    mining_to_payout: Address => Address
}

def_table! {
    /// Append-only observable signal log
    signals: SignalSeq => Signal
}
