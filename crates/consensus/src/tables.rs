use poagov_core::{Address, Signal, SignalSeq, ValidatorSet};
use poagov_util_db::def_table;

def_table! {
    /// The active validator set
    current_validators: () => ValidatorSet
}

def_table! {
    /// The proposed validator set awaiting finalization
    pending_validators: () => ValidatorSet
}

def_table! {
    /// Whether the last initiated change has been committed
    finalized: () => bool
}

def_table! {
    /// The bootstrap authority this database was initialized with
    master_of_ceremony: () => Address
}

def_table! {
    /// Append-only observable signal log
    signals: SignalSeq => Signal
}
