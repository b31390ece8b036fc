//! # Kedge Staking
//!
//! Reward-streaming and stake-accounting engine. Distributes a pool of reward
//! tokens to staked-token holders proportionally to their stake-weighted time
//! in the pool, and grants auxiliary "tickets" from accumulated stake-time,
//! with a one-time NFT reward boost.
//!
//! Every state-changing operation costs O(1) regardless of staker count or
//! elapsed blocks. The trick is collapsing per-staker, per-block bookkeeping
//! into two running aggregates:
//!
//! ```text
//! ┌────────────────────────────────────────────────┬───────────────────┐
//! │ HISTORY (closed)                               │ CURRENT PERIOD    │
//! │ one weighted-average reward per unit per block │ live stream query │
//! └────────────────────────────────────────────────┴───────────────────┘
//!   history_start_block            history_end_block                now
//! ```
//!
//! Each stake/unstake/stream-add rolls the current period into history with a
//! single weighted-mean merge. A stake slot checkpoints the aggregate at
//! entry; its exact reward is recovered later from the checkpoint difference.
//!
//! ## Modules
//!
//! | Module    | Responsibility                                     |
//! |-----------|----------------------------------------------------|
//! | `streams` | append-only reward-rate segments, cursored queries |
//! | `history` | global aggregate and the roll-up choke point       |
//! | `locks`   | lock-duration / multiplier table                   |
//! | `slots`   | per-staker slot arena and checkpoint math          |
//! | `tickets` | stake-time ticket accrual                          |
//! | `engine`  | the `StakingLedger` facade wiring it all together  |

pub mod engine;
pub mod error;
pub mod history;
pub mod locks;
pub mod slots;
pub mod streams;
pub mod tickets;

// Re-exports
pub use engine::{LedgerConfig, LedgerSnapshot, OpContext, StakeInput, StakingLedger, UnstakeReceipt};
pub use error::{Result, StakingError};
pub use history::HistoryAggregate;
pub use locks::{LockTable, LockTier};
pub use slots::{SlotArena, StakeSlot};
pub use streams::{RewardSegment, RewardStream, StreamBook, StreamCursor};

/// Fixed-point and bookkeeping constants
pub mod constants {
    use kedge_core::Amount;

    /// Fixed-point scale for the history average reward (12 decimals)
    pub const SCALE: Amount = 1_000_000_000_000;

    /// Multiplier percentage base (100 = 1.0x)
    pub const PERCENT_BASE: Amount = 100;

    /// Amount seeded at construction so the pool is never empty
    pub const BOOTSTRAP_STAKE: Amount = 1;

    /// Reserved lock-table index: no lock, 1.0x multiplier
    pub const NO_LOCK_INDEX: usize = 0;
}

pub use constants::*;
