use core::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The closed set of governance module kinds tracked by the registry
///
/// Unlike validators, module kinds are fixed at compile time: the
/// registry maps each kind to its stable address and current logic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub enum ModuleKind {
    KeyDirectory,
    BallotsStorage,
    ValidatorMetadata,
    VotingToChangeKeys,
    VotingToChangeMinThreshold,
    VotingToChangeRegistry,
    VotingToManageEmissionFunds,
    RewardEngine,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 8] = [
        ModuleKind::KeyDirectory,
        ModuleKind::BallotsStorage,
        ModuleKind::ValidatorMetadata,
        ModuleKind::VotingToChangeKeys,
        ModuleKind::VotingToChangeMinThreshold,
        ModuleKind::VotingToChangeRegistry,
        ModuleKind::VotingToManageEmissionFunds,
        ModuleKind::RewardEngine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::KeyDirectory => "key-directory",
            ModuleKind::BallotsStorage => "ballots-storage",
            ModuleKind::ValidatorMetadata => "validator-metadata",
            ModuleKind::VotingToChangeKeys => "voting-to-change-keys",
            ModuleKind::VotingToChangeMinThreshold => "voting-to-change-min-threshold",
            ModuleKind::VotingToChangeRegistry => "voting-to-change-registry",
            ModuleKind::VotingToManageEmissionFunds => "voting-to-manage-emission-funds",
            ModuleKind::RewardEngine => "reward-engine",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
