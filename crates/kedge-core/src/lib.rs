//! # Kedge Core
//!
//! Fundamental types for the Kedge staking ledger:
//! - `Address` - 32-byte account/contract identifier
//! - `BlockNumber` / `Amount` - the discrete time counter and token quantity
//! - `BlockClock` - a logical block counter for hosts and test harnesses
//!
//! The ledger itself is host-agnostic: it only requires a monotonically
//! increasing block number supplied with each operation. `BlockClock` is the
//! reference source of that counter.

pub mod clock;
pub mod types;

pub use clock::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::BlockClock;
    pub use crate::types::{Address, Amount, BlockNumber};
}
