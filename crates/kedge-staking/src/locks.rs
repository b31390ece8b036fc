//! Lock-duration and multiplier table
//!
//! Index 0 is always the reserved no-lock entry (0 blocks, 100%). Entries are
//! captured into a slot at stake time, so overwriting a tier never changes
//! live stakes.

use crate::constants::NO_LOCK_INDEX;
use crate::error::{Result, StakingError};
use serde::{Deserialize, Serialize};

/// One lock option: how long the stake is locked and the staking-unit
/// multiplier it earns (percent, 100 = 1.0x)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTier {
    pub lock_blocks: u64,
    pub multiplier_percent: u64,
}

impl LockTier {
    pub const NO_LOCK: Self = Self {
        lock_blocks: 0,
        multiplier_percent: 100,
    };
}

/// Admin-configurable lock table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockTable {
    tiers: Vec<LockTier>,
}

impl LockTable {
    /// Create a table holding only the reserved no-lock tier
    pub fn new() -> Self {
        Self {
            tiers: vec![LockTier::NO_LOCK],
        }
    }

    /// Append a tier; returns its index
    pub fn add(&mut self, lock_blocks: u64, multiplier_percent: u64) -> usize {
        self.tiers.push(LockTier {
            lock_blocks,
            multiplier_percent,
        });
        self.tiers.len() - 1
    }

    /// Overwrite an existing tier in place
    pub fn update(&mut self, index: usize, lock_blocks: u64, multiplier_percent: u64) -> Result<()> {
        let len = self.tiers.len();
        let tier = self
            .tiers
            .get_mut(index)
            .ok_or(StakingError::LockIndexOutOfBounds { index, len })?;
        *tier = LockTier {
            lock_blocks,
            multiplier_percent,
        };
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&LockTier> {
        self.tiers.get(index)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
