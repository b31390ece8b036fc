//! # Kedge Tokens
//!
//! External capability seams consumed by the staking ledger:
//!
//! - `FungibleToken` - the staked/reward token (transfer, transfer_from,
//!   balance queries)
//! - `NftTransport` - NFT custody moves across collections (transfer,
//!   ownership lookup)
//! - `RarityRegister` - rarity lookup for the NFT reward boost
//! - `TicketMinter` - mints auxiliary ticket tokens to stakers
//!
//! All capabilities are synchronous and atomic: a call either fully succeeds
//! or fully fails, signalled by its return value. The ledger maps failures to
//! its own error taxonomy.
//!
//! The `mock` module provides in-memory implementations for tests, including
//! a pausable NFT transport used to exercise the two-phase NFT return path.

pub mod mock;
pub mod traits;

pub use mock::*;
pub use traits::*;
