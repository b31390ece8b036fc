//! Capability traits for the external collaborators of the ledger
//!
//! Implementations are expected to behave atomically: on a `false`/`None`
//! return, no partial state change may have happened.

use kedge_core::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Reference to one NFT: collection contract plus token id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NftRef {
    pub collection: Address,
    pub token_id: u64,
}

/// Fungible token capability (staked token and reward token)
pub trait FungibleToken: Send + Sync {
    /// Move `amount` from `from` to `to` on `from`'s own authority.
    /// Returns false on insufficient balance.
    fn transfer(&self, from: Address, to: Address, amount: Amount) -> bool;

    /// Move `amount` from `from` to `to` on `spender`'s authority.
    /// Returns false on insufficient balance or allowance.
    fn transfer_from(&self, spender: Address, from: Address, to: Address, amount: Amount) -> bool;

    /// Balance of `owner`
    fn balance_of(&self, owner: Address) -> Amount;
}

/// NFT custody capability, multiplexing collections by address
pub trait NftTransport: Send + Sync {
    /// Move one token between owners. Returns false if the token does not
    /// exist, `from` is not the owner, or the transport refuses (paused).
    fn transfer(&self, nft: NftRef, from: Address, to: Address) -> bool;

    /// Current owner of a token, `None` if it does not exist
    fn owner_of(&self, nft: NftRef) -> Option<Address>;
}

/// Rarity lookup for the NFT reward boost. 0 means "not registered".
pub trait RarityRegister: Send + Sync {
    fn nft_rarity(&self, nft: NftRef) -> u64;
}

/// Ticket minting capability. Returns false if the caller lost the minter
/// privilege; the ledger propagates that as a failure.
pub trait TicketMinter: Send + Sync {
    fn mint(&self, to: Address, amount: u64) -> bool;
}
