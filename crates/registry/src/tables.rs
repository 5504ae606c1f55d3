use poagov_core::{Address, ModuleKind, Signal, SignalSeq};
use poagov_util_db::def_table;

use crate::ModuleEntry;

def_table! {
    /// Stable and logic address per module kind
    modules: ModuleKind => ModuleEntry
}

def_table! {
    /// The consensus component's address, bound once at initialization
    consensus_addr: () => Address
}

def_table! {
    /// Append-only observable signal log
    signals: SignalSeq => Signal
}
