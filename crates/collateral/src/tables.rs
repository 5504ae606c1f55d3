use poagov_core::{Address, Amount, Signal, SignalSeq};
use poagov_util_db::def_table;

def_table! {
    /// Deposited stake per address
    ///
    /// Increases only via an explicit deposit; decreases only via an
    /// explicit withdrawal. Whether the holder is allowed to withdraw
    /// at all is the consensus component's call.
    balances: Address => Amount
}

def_table! {
    /// Append-only observable signal log
    signals: SignalSeq => Signal
}
