//! Logical block clock
//!
//! The ledger never reads wall-clock time; every operation carries the block
//! number at which it executes. `BlockClock` is a shared monotonic counter a
//! host (or a test harness) uses to produce those numbers.

use crate::types::BlockNumber;
use parking_lot::Mutex;

/// Shared monotonic block counter
pub struct BlockClock {
    height: Mutex<BlockNumber>,
}

impl BlockClock {
    /// Create a clock starting at the given height
    pub fn new(genesis: BlockNumber) -> Self {
        Self {
            height: Mutex::new(genesis),
        }
    }

    /// Current block height
    pub fn now(&self) -> BlockNumber {
        *self.height.lock()
    }

    /// Advance by one block and return the new height
    pub fn advance(&self) -> BlockNumber {
        let mut height = self.height.lock();
        *height += 1;
        *height
    }

    /// Advance by `blocks` and return the new height
    pub fn advance_by(&self, blocks: u64) -> BlockNumber {
        let mut height = self.height.lock();
        *height += blocks;
        *height
    }

    /// Set the height directly; ignored if it would move the clock backwards
    pub fn set(&self, height: BlockNumber) {
        let mut current = self.height.lock();
        if height > *current {
            *current = height;
        }
    }
}

impl Default for BlockClock {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let clock = BlockClock::new(100);

        assert_eq!(clock.now(), 100);
        assert_eq!(clock.advance(), 101);
        assert_eq!(clock.advance_by(9), 110);
        assert_eq!(clock.now(), 110);
    }

    #[test]
    fn test_set_never_rewinds() {
        let clock = BlockClock::new(50);

        clock.set(40);
        assert_eq!(clock.now(), 50);

        clock.set(60);
        assert_eq!(clock.now(), 60);
    }
}
