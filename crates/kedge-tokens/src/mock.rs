//! In-memory capability implementations for tests and local runs
//!
//! Each mock keeps its state behind a `parking_lot::Mutex` so a single
//! instance can be shared between the ledger and the test harness via `Arc`.

use crate::traits::{FungibleToken, NftRef, NftTransport, RarityRegister, TicketMinter};
use kedge_core::{Address, Amount};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Fungible token with balances and spender allowances
#[derive(Default)]
pub struct MockFungibleToken {
    state: Mutex<FungibleState>,
}

#[derive(Default)]
struct FungibleState {
    balances: HashMap<Address, Amount>,
    /// (owner, spender) -> remaining allowance
    allowances: HashMap<(Address, Address), Amount>,
}

impl MockFungibleToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `owner` out of thin air
    pub fn mint(&self, owner: Address, amount: Amount) {
        let mut state = self.state.lock();
        *state.balances.entry(owner).or_default() += amount;
    }

    /// Let `spender` move up to `amount` of `owner`'s balance
    pub fn approve(&self, owner: Address, spender: Address, amount: Amount) {
        let mut state = self.state.lock();
        state.allowances.insert((owner, spender), amount);
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        let state = self.state.lock();
        state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn move_balance(state: &mut FungibleState, from: Address, to: Address, amount: Amount) -> bool {
        let available = state.balances.get(&from).copied().unwrap_or(0);
        if available < amount {
            return false;
        }
        state.balances.insert(from, available - amount);
        *state.balances.entry(to).or_default() += amount;
        true
    }
}

impl FungibleToken for MockFungibleToken {
    fn transfer(&self, from: Address, to: Address, amount: Amount) -> bool {
        let mut state = self.state.lock();
        Self::move_balance(&mut state, from, to, amount)
    }

    fn transfer_from(&self, spender: Address, from: Address, to: Address, amount: Amount) -> bool {
        let mut state = self.state.lock();
        if spender != from {
            let allowed = state
                .allowances
                .get(&(from, spender))
                .copied()
                .unwrap_or(0);
            if allowed < amount {
                return false;
            }
            if !Self::move_balance(&mut state, from, to, amount) {
                return false;
            }
            state.allowances.insert((from, spender), allowed - amount);
            return true;
        }
        Self::move_balance(&mut state, from, to, amount)
    }

    fn balance_of(&self, owner: Address) -> Amount {
        self.state.lock().balances.get(&owner).copied().unwrap_or(0)
    }
}

/// NFT transport with a pause switch
///
/// Pausing makes every transfer fail while ownership stays intact, which is
/// how tests exercise the ledger's swallowed-failure NFT return path.
#[derive(Default)]
pub struct MockNftTransport {
    state: Mutex<NftState>,
}

#[derive(Default)]
struct NftState {
    owners: HashMap<NftRef, Address>,
    paused: bool,
}

impl MockNftTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, nft: NftRef, owner: Address) {
        self.state.lock().owners.insert(nft, owner);
    }

    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn unpause(&self) {
        self.state.lock().paused = false;
    }
}

impl NftTransport for MockNftTransport {
    fn transfer(&self, nft: NftRef, from: Address, to: Address) -> bool {
        let mut state = self.state.lock();
        if state.paused {
            return false;
        }
        match state.owners.get(&nft) {
            Some(owner) if *owner == from => {
                state.owners.insert(nft, to);
                true
            }
            _ => false,
        }
    }

    fn owner_of(&self, nft: NftRef) -> Option<Address> {
        self.state.lock().owners.get(&nft).copied()
    }
}

/// Rarity register backed by a plain map; unknown tokens report 0
#[derive(Default)]
pub struct MockRarityRegister {
    rarities: Mutex<HashMap<NftRef, u64>>,
}

impl MockRarityRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_rarity(&self, nft: NftRef, rarity: u64) {
        self.rarities.lock().insert(nft, rarity);
    }
}

impl RarityRegister for MockRarityRegister {
    fn nft_rarity(&self, nft: NftRef) -> u64 {
        self.rarities.lock().get(&nft).copied().unwrap_or(0)
    }
}

/// Ticket minter with a revocable minting privilege
pub struct MockTicketMinter {
    state: Mutex<MinterState>,
}

struct MinterState {
    minted: HashMap<Address, u64>,
    enabled: bool,
}

impl MockTicketMinter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MinterState {
                minted: HashMap::new(),
                enabled: true,
            }),
        }
    }

    /// Simulate the minter role being revoked
    pub fn revoke(&self) {
        self.state.lock().enabled = false;
    }

    pub fn restore(&self) {
        self.state.lock().enabled = true;
    }

    /// Total tickets minted to `owner` so far
    pub fn minted_to(&self, owner: Address) -> u64 {
        self.state.lock().minted.get(&owner).copied().unwrap_or(0)
    }
}

impl Default for MockTicketMinter {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketMinter for MockTicketMinter {
    fn mint(&self, to: Address, amount: u64) -> bool {
        let mut state = self.state.lock();
        if !state.enabled {
            return false;
        }
        *state.minted.entry(to).or_default() += amount;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    #[test]
    fn test_transfer_respects_balance() {
        let token = MockFungibleToken::new();
        token.mint(alice(), 100);

        assert!(token.transfer(alice(), bob(), 60));
        assert!(!token.transfer(alice(), bob(), 60));
        assert_eq!(token.balance_of(alice()), 40);
        assert_eq!(token.balance_of(bob()), 60);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let token = MockFungibleToken::new();
        token.mint(alice(), 100);
        token.approve(alice(), bob(), 50);

        assert!(token.transfer_from(bob(), alice(), bob(), 30));
        assert_eq!(token.allowance(alice(), bob()), 20);
        assert!(!token.transfer_from(bob(), alice(), bob(), 30));
    }

    #[test]
    fn test_nft_transfer_and_pause() {
        let nfts = MockNftTransport::new();
        let nft = NftRef {
            collection: Address::from_label("apes"),
            token_id: 1,
        };
        nfts.mint(nft, alice());

        nfts.pause();
        assert!(!nfts.transfer(nft, alice(), bob()));
        assert_eq!(nfts.owner_of(nft), Some(alice()));

        nfts.unpause();
        assert!(nfts.transfer(nft, alice(), bob()));
        assert_eq!(nfts.owner_of(nft), Some(bob()));
    }

    #[test]
    fn test_nft_transfer_requires_ownership() {
        let nfts = MockNftTransport::new();
        let nft = NftRef {
            collection: Address::from_label("apes"),
            token_id: 7,
        };
        nfts.mint(nft, alice());

        assert!(!nfts.transfer(nft, bob(), alice()));
    }

    #[test]
    fn test_rarity_defaults_to_zero() {
        let register = MockRarityRegister::new();
        let nft = NftRef {
            collection: Address::from_label("apes"),
            token_id: 1,
        };

        assert_eq!(register.nft_rarity(nft), 0);
        register.store_rarity(nft, 200);
        assert_eq!(register.nft_rarity(nft), 200);
    }

    #[test]
    fn test_minter_revocation() {
        let minter = MockTicketMinter::new();

        assert!(minter.mint(alice(), 3));
        minter.revoke();
        assert!(!minter.mint(alice(), 1));
        assert_eq!(minter.minted_to(alice()), 3);
    }
}
