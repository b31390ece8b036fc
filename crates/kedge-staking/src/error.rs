//! Error types for staking ledger operations

use kedge_core::{Address, Amount, BlockNumber};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, StakingError>;

/// Errors that can occur in staking ledger operations
///
/// Every variant is reported synchronously; an operation that fails leaves no
/// partial state change behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    // === Reward Streams ===
    /// Stream index skips ahead of the append-only sequence
    #[error("Reward stream index {got} skips ahead (next expected {expected})")]
    SkippedStreamIndex { expected: usize, got: usize },

    /// Segment does not strictly extend the stream's timeline
    #[error("Segment end block {end_block} must exceed previous end {previous_end}")]
    InvalidSegmentBounds {
        end_block: BlockNumber,
        previous_end: BlockNumber,
    },

    // === Stake Operations ===
    /// Lock index outside the configured table
    #[error("Lock index {index} out of bounds (table has {len} entries)")]
    LockIndexOutOfBounds { index: usize, len: usize },

    /// No slot at that index for the staker
    #[error("Stake slot {slot} not found")]
    SlotNotFound { slot: usize },

    /// Unstake attempted before the lock expired
    #[error("Stake is still locked through block {unlocks_after}")]
    StakeStillLocked { unlocks_after: BlockNumber },

    /// Slot is empty or already withdrawn
    #[error("Nothing to unstake in slot {slot}")]
    NothingToUnstake { slot: usize },

    // === NFT Boost ===
    /// At most one NFT per slot
    #[error("Stake slot {slot} already holds a token")]
    StakeAlreadyHasToken { slot: usize },

    /// Rarity register has no entry for the token
    #[error("No rarity registered for token {token_id} of collection {collection}")]
    NftNotRegistered { collection: Address, token_id: u64 },

    /// NFT could not be moved into custody (unapproved, paused, not owned)
    #[error("Could not take custody of token {token_id} of collection {collection}")]
    CouldNotAddNft { collection: Address, token_id: u64 },

    // === Capability Failures ===
    /// Fungible token transfer refused (balance or allowance)
    #[error("Token transfer of {amount} from {from} to {to} failed")]
    TokenTransferFailed {
        from: Address,
        to: Address,
        amount: Amount,
    },

    /// Ticket minter refused (privilege revoked)
    #[error("Minting {amount} tickets to {to} failed")]
    TicketMintFailed { to: Address, amount: u64 },

    // === Authorization ===
    /// Admin-only operation called by someone else
    #[error("Caller {caller} is not the ledger admin")]
    Unauthorized { caller: Address },
}

impl StakingError {
    /// Check if the error clears on retry without any admin intervention on
    /// the ledger itself (waiting out a lock, topping up an allowance,
    /// unpausing a transport, restoring a minter role)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StakeStillLocked { .. }
                | Self::CouldNotAddNft { .. }
                | Self::TokenTransferFailed { .. }
                | Self::TicketMintFailed { .. }
        )
    }
}
