// SPDX-License-Identifier: MIT

//! Core types of the PoA governance system
//!
//! Focused on the identities, amounts and observable signals shared by
//! every governance component. No component logic lives here.

pub mod address;
pub mod amount;
pub mod module;
pub mod signal;
pub mod validator_set;

pub use address::Address;
pub use amount::Amount;
pub use module::ModuleKind;
pub use signal::{Signal, SignalSeq};
pub use validator_set::ValidatorSet;
