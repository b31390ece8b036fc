//! The staking ledger facade
//!
//! `StakingLedger` owns the stream book, the history aggregate, the lock
//! table and the slot arena, and talks to the outside world through the
//! capability traits. Every operation is one atomic state transition at an
//! explicit block number; fallible external calls are ordered ahead of local
//! mutation so a failure leaves no partial write behind.
//!
//! Operation shape, shared by stake/unstake/stream-add:
//!
//! 1. validate preconditions
//! 2. roll the current period into history (§`history`)
//! 3. settle external transfers
//! 4. mutate slots and totals
//!
//! NFT custody is tracked in a map keyed by `(staker, slot)` rather than in
//! the slot itself: a failed return during unstake keeps the entry, and the
//! tombstoned slot no longer blocks the later `unstake_nft` retry.

use crate::constants::{BOOTSTRAP_STAKE, NO_LOCK_INDEX, PERCENT_BASE};
use crate::error::{Result, StakingError};
use crate::history::HistoryAggregate;
use crate::locks::{LockTable, LockTier};
use crate::slots::{SlotArena, StakeSlot};
use crate::streams::{RewardStream, StreamBook};
use crate::tickets;
use kedge_core::{Address, Amount, BlockNumber};
use kedge_tokens::{FungibleToken, NftRef, NftTransport, RarityRegister, TicketMinter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Who is calling, and at which block
#[derive(Clone, Copy, Debug)]
pub struct OpContext {
    pub caller: Address,
    pub block: BlockNumber,
}

impl OpContext {
    pub fn new(caller: Address, block: BlockNumber) -> Self {
        Self { caller, block }
    }
}

/// Stake parameters: chosen lock tier plus an optional NFT to attach in the
/// same operation
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StakeInput {
    pub lock_index: usize,
    pub nft: Option<NftRef>,
}

impl StakeInput {
    pub fn with_lock(lock_index: usize) -> Self {
        Self {
            lock_index,
            nft: None,
        }
    }

    pub fn with_nft(lock_index: usize, nft: NftRef) -> Self {
        Self {
            lock_index,
            nft: Some(nft),
        }
    }

    pub fn no_lock() -> Self {
        Self::with_lock(NO_LOCK_INDEX)
    }
}

/// What a full unstake settled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnstakeReceipt {
    pub principal: Amount,
    pub reward: Amount,
    pub tickets_claimed: u64,
    /// `None` when no NFT was held; `Some(false)` when the return transfer
    /// failed and the token stays in custody for an `unstake_nft` retry
    pub nft_returned: Option<bool>,
}

/// Construction parameters
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub admin: Address,
    /// The ledger's own account: escrow destination for stakes and segment
    /// budgets, custodian for attached NFTs
    pub ledger_address: Address,
    pub genesis_block: BlockNumber,
    /// Tiers appended after the reserved no-lock index 0
    pub lock_tiers: Vec<LockTier>,
    pub tickets_minting_ratio: Amount,
    pub tickets_minting_chill_period: u64,
}

/// Serializable copy of the whole ledger state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub aggregate: HistoryAggregate,
    pub streams: StreamBook,
    pub locks: LockTable,
    pub slots: SlotArena,
    pub staked_nfts: Vec<(Address, usize, NftRef)>,
    pub tickets_minting_ratio: Amount,
    pub tickets_minting_chill_period: u64,
}

/// The staking ledger
pub struct StakingLedger {
    admin: Address,
    address: Address,
    token: Arc<dyn FungibleToken>,
    nfts: Arc<dyn NftTransport>,
    rarity: Arc<dyn RarityRegister>,
    minter: Arc<dyn TicketMinter>,
    streams: StreamBook,
    aggregate: HistoryAggregate,
    locks: LockTable,
    slots: SlotArena,
    staked_nfts: HashMap<(Address, usize), NftRef>,
    tickets_minting_ratio: Amount,
    tickets_minting_chill_period: u64,
}

impl StakingLedger {
    /// Create the ledger and seed the bootstrap stake from the admin, so the
    /// pool is never empty. Requires an allowance of at least
    /// `BOOTSTRAP_STAKE` from the admin towards the ledger address.
    pub fn new(
        config: LedgerConfig,
        token: Arc<dyn FungibleToken>,
        nfts: Arc<dyn NftTransport>,
        rarity: Arc<dyn RarityRegister>,
        minter: Arc<dyn TicketMinter>,
    ) -> Result<Self> {
        let mut locks = LockTable::new();
        for tier in &config.lock_tiers {
            locks.add(tier.lock_blocks, tier.multiplier_percent);
        }

        let mut ledger = Self {
            admin: config.admin,
            address: config.ledger_address,
            token,
            nfts,
            rarity,
            minter,
            streams: StreamBook::new(config.genesis_block),
            aggregate: HistoryAggregate::new(config.genesis_block),
            locks,
            slots: SlotArena::new(),
            staked_nfts: HashMap::new(),
            tickets_minting_ratio: config.tickets_minting_ratio,
            tickets_minting_chill_period: config.tickets_minting_chill_period,
        };

        ledger.stake_internal(
            config.admin,
            config.admin,
            BOOTSTRAP_STAKE,
            StakeInput::no_lock(),
            config.genesis_block,
        )?;

        Ok(ledger)
    }

    // === Operations ===

    /// Add a reward segment to stream `stream_index` (opening the stream if
    /// it is the next free index), escrowing its full budget from the admin.
    /// Returns the escrowed budget.
    pub fn add_reward_stream(
        &mut self,
        ctx: &OpContext,
        stream_index: usize,
        rate_per_block: Amount,
        end_block: BlockNumber,
    ) -> Result<Amount> {
        self.require_admin(ctx.caller)?;
        let budget = self
            .streams
            .segment_budget(stream_index, rate_per_block, end_block)?;
        if budget > 0
            && !self
                .token
                .transfer_from(self.address, ctx.caller, self.address, budget)
        {
            return Err(StakingError::TokenTransferFailed {
                from: ctx.caller,
                to: self.address,
                amount: budget,
            });
        }
        self.streams
            .add_segment(stream_index, rate_per_block, end_block)?;
        // reward retroactive to the last roll-up is folded into history now
        self.roll_up(ctx.block);
        log::info!(
            "reward stream {}: +{}/block through block {} (escrowed {})",
            stream_index,
            rate_per_block,
            end_block,
            budget
        );
        Ok(budget)
    }

    /// Stake `amount` for the caller; returns the new slot index
    pub fn stake(&mut self, ctx: &OpContext, amount: Amount, input: StakeInput) -> Result<usize> {
        self.stake_internal(ctx.caller, ctx.caller, amount, input, ctx.block)
    }

    /// Stake on behalf of `beneficiary`: tokens debited from the caller, the
    /// slot belongs to the beneficiary
    pub fn stake_for(
        &mut self,
        ctx: &OpContext,
        beneficiary: Address,
        amount: Amount,
        input: StakeInput,
    ) -> Result<usize> {
        self.stake_internal(ctx.caller, beneficiary, amount, input, ctx.block)
    }

    fn stake_internal(
        &mut self,
        payer: Address,
        beneficiary: Address,
        amount: Amount,
        input: StakeInput,
        block: BlockNumber,
    ) -> Result<usize> {
        let tier = *self
            .locks
            .get(input.lock_index)
            .ok_or(StakingError::LockIndexOutOfBounds {
                index: input.lock_index,
                len: self.locks.len(),
            })?;
        if let Some(nft) = input.nft {
            if self.rarity.nft_rarity(nft) == 0 {
                return Err(StakingError::NftNotRegistered {
                    collection: nft.collection,
                    token_id: nft.token_id,
                });
            }
        }

        self.roll_up(block);

        // the new slot starts participating right after the closed history,
        // which is exactly the operation block
        let entered = self.aggregate.history_end_block() + 1;
        let units = amount * tier.multiplier_percent as Amount / PERCENT_BASE;
        let mut slot = StakeSlot {
            active: true,
            amount_staked: amount,
            staking_units: units,
            lock_index: input.lock_index,
            locked_till: entered + tier.lock_blocks,
            entered_at_block: entered,
            history_average_when_entered: self.aggregate.history_average_reward(),
            reward_credit: 0,
            minting_ratio_when_entered: self.tickets_minting_ratio,
            chill_period_when_entered: self.tickets_minting_chill_period,
            tickets_minted: 0,
        };
        // first chill period is mintable immediately
        let entry_tickets = tickets::claimable_tickets(&slot, block);

        // every fallible external call settles before any ledger state is
        // written; a failure after the escrow undoes the earlier transfers
        if !self
            .token
            .transfer_from(self.address, payer, self.address, amount)
        {
            return Err(StakingError::TokenTransferFailed {
                from: payer,
                to: self.address,
                amount,
            });
        }
        if let Some(nft) = input.nft {
            if !self.nfts.transfer(nft, beneficiary, self.address) {
                self.refund(payer, amount);
                return Err(StakingError::CouldNotAddNft {
                    collection: nft.collection,
                    token_id: nft.token_id,
                });
            }
        }
        if entry_tickets > 0 && !self.minter.mint(beneficiary, entry_tickets) {
            if let Some(nft) = input.nft {
                if !self.nfts.transfer(nft, self.address, beneficiary) {
                    log::warn!("could not hand {:?} back to {}", nft, beneficiary);
                }
            }
            self.refund(payer, amount);
            return Err(StakingError::TicketMintFailed {
                to: beneficiary,
                amount: entry_tickets,
            });
        }

        slot.tickets_minted = entry_tickets;
        let index = self.slots.push(beneficiary, slot);
        self.aggregate.add_stake(amount, units);
        if let Some(nft) = input.nft {
            self.staked_nfts.insert((beneficiary, index), nft);
        }

        log::info!(
            "stake: {} -> slot {} of {} (amount {}, units {}, locked till {})",
            payer,
            index,
            beneficiary,
            amount,
            units,
            entered + tier.lock_blocks
        );
        Ok(index)
    }

    /// Attach an NFT to one of the caller's slots, taking it into custody and
    /// granting the one-time rarity boost on the slot's history reward to
    /// date. Returns the granted credit.
    pub fn add_nft_to_stake(
        &mut self,
        ctx: &OpContext,
        slot_index: usize,
        nft: NftRef,
    ) -> Result<Amount> {
        self.attach_nft(ctx.caller, slot_index, nft, ctx.block)
    }

    fn attach_nft(
        &mut self,
        staker: Address,
        slot_index: usize,
        nft: NftRef,
        block: BlockNumber,
    ) -> Result<Amount> {
        match self.slots.get(staker, slot_index) {
            Some(slot) if slot.active => {}
            _ => return Err(StakingError::SlotNotFound { slot: slot_index }),
        }
        if self.staked_nfts.contains_key(&(staker, slot_index)) {
            return Err(StakingError::StakeAlreadyHasToken { slot: slot_index });
        }
        let rarity = self.rarity.nft_rarity(nft);
        if rarity == 0 {
            return Err(StakingError::NftNotRegistered {
                collection: nft.collection,
                token_id: nft.token_id,
            });
        }
        self.roll_up(block);

        let credit = self
            .slots
            .get(staker, slot_index)
            .map(|slot| slot.reward_from_history(&self.aggregate) * rarity as Amount / PERCENT_BASE)
            .unwrap_or(0);

        // the credit is escrowed from the admin at attach time, like a
        // stream budget, so the final payout is always token-backed
        if credit > 0
            && !self
                .token
                .transfer_from(self.address, self.admin, self.address, credit)
        {
            return Err(StakingError::TokenTransferFailed {
                from: self.admin,
                to: self.address,
                amount: credit,
            });
        }
        if !self.nfts.transfer(nft, staker, self.address) {
            if credit > 0 {
                self.refund(self.admin, credit);
            }
            return Err(StakingError::CouldNotAddNft {
                collection: nft.collection,
                token_id: nft.token_id,
            });
        }

        if let Some(slot) = self.slots.get_mut(staker, slot_index) {
            slot.reward_credit += credit;
        }
        self.aggregate.fund_reward(credit);
        self.staked_nfts.insert((staker, slot_index), nft);

        log::info!(
            "nft boost: slot {} of {} holds {:?} (rarity {}, credit {})",
            slot_index,
            staker,
            nft,
            rarity,
            credit
        );
        Ok(credit)
    }

    /// Withdraw a slot in full: principal plus accrued reward, leftover
    /// tickets, and a best-effort NFT return
    pub fn unstake(&mut self, ctx: &OpContext, slot_index: usize) -> Result<UnstakeReceipt> {
        match self.slots.get(ctx.caller, slot_index) {
            Some(slot) if slot.active && slot.amount_staked > 0 => {
                if ctx.block <= slot.locked_till {
                    return Err(StakingError::StakeStillLocked {
                        unlocks_after: slot.locked_till,
                    });
                }
            }
            _ => return Err(StakingError::NothingToUnstake { slot: slot_index }),
        }

        self.roll_up(ctx.block);

        let (principal, units, reward, claimable) = match self.slots.get(ctx.caller, slot_index) {
            Some(slot) => (
                slot.amount_staked,
                slot.staking_units,
                slot.reward_from_history(&self.aggregate) + slot.reward_credit,
                tickets::claimable_tickets(slot, ctx.block),
            ),
            None => return Err(StakingError::NothingToUnstake { slot: slot_index }),
        };

        // tickets first: a mint failure aborts before any token moves
        if claimable > 0 {
            if !self.minter.mint(ctx.caller, claimable) {
                return Err(StakingError::TicketMintFailed {
                    to: ctx.caller,
                    amount: claimable,
                });
            }
            if let Some(slot) = self.slots.get_mut(ctx.caller, slot_index) {
                slot.tickets_minted += claimable;
            }
        }

        let payout = principal + reward;
        if !self.token.transfer(self.address, ctx.caller, payout) {
            return Err(StakingError::TokenTransferFailed {
                from: self.address,
                to: ctx.caller,
                amount: payout,
            });
        }

        self.aggregate.remove_stake(principal, units);
        self.aggregate.pay_reward(reward);

        // best effort: a refused transfer keeps the NFT recoverable later
        let nft_returned = match self.staked_nfts.get(&(ctx.caller, slot_index)).copied() {
            Some(nft) => {
                if self.nfts.transfer(nft, self.address, ctx.caller) {
                    self.staked_nfts.remove(&(ctx.caller, slot_index));
                    Some(true)
                } else {
                    log::warn!(
                        "unstake: NFT {:?} return to {} failed, kept in custody",
                        nft,
                        ctx.caller
                    );
                    Some(false)
                }
            }
            None => None,
        };

        if let Some(slot) = self.slots.get_mut(ctx.caller, slot_index) {
            slot.tombstone();
        }

        log::info!(
            "unstake: slot {} of {} paid {} principal + {} reward",
            slot_index,
            ctx.caller,
            principal,
            reward
        );
        Ok(UnstakeReceipt {
            principal,
            reward,
            tickets_claimed: claimable,
            nft_returned,
        })
    }

    /// Retry returning a custodied NFT after the lock expired. `Ok(false)`
    /// when nothing is held or the transfer is still refused.
    pub fn unstake_nft(&mut self, ctx: &OpContext, slot_index: usize) -> Result<bool> {
        let locked_till = self
            .slots
            .get(ctx.caller, slot_index)
            .map(|slot| slot.locked_till)
            .ok_or(StakingError::SlotNotFound { slot: slot_index })?;
        if ctx.block <= locked_till {
            return Err(StakingError::StakeStillLocked {
                unlocks_after: locked_till,
            });
        }
        match self.staked_nfts.get(&(ctx.caller, slot_index)).copied() {
            None => Ok(false),
            Some(nft) => {
                if self.nfts.transfer(nft, self.address, ctx.caller) {
                    self.staked_nfts.remove(&(ctx.caller, slot_index));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Mint all newly claimable tickets for one of the caller's slots.
    /// Claiming zero is an Ok no-op.
    pub fn claim_tickets(&mut self, ctx: &OpContext, slot_index: usize) -> Result<u64> {
        self.claim_tickets_for(ctx.caller, slot_index, ctx.block)
    }

    fn claim_tickets_for(
        &mut self,
        staker: Address,
        slot_index: usize,
        block: BlockNumber,
    ) -> Result<u64> {
        let claimable = match self.slots.get(staker, slot_index) {
            Some(slot) => tickets::claimable_tickets(slot, block),
            None => return Err(StakingError::SlotNotFound { slot: slot_index }),
        };
        if claimable == 0 {
            return Ok(0);
        }
        if !self.minter.mint(staker, claimable) {
            return Err(StakingError::TicketMintFailed {
                to: staker,
                amount: claimable,
            });
        }
        if let Some(slot) = self.slots.get_mut(staker, slot_index) {
            slot.tickets_minted += claimable;
        }
        Ok(claimable)
    }

    // === Admin configuration ===

    pub fn add_lock_duration(
        &mut self,
        ctx: &OpContext,
        lock_blocks: u64,
        multiplier_percent: u64,
    ) -> Result<usize> {
        self.require_admin(ctx.caller)?;
        Ok(self.locks.add(lock_blocks, multiplier_percent))
    }

    pub fn update_lock_duration(
        &mut self,
        ctx: &OpContext,
        index: usize,
        lock_blocks: u64,
        multiplier_percent: u64,
    ) -> Result<()> {
        self.require_admin(ctx.caller)?;
        self.locks.update(index, lock_blocks, multiplier_percent)
    }

    /// Only affects slots entered after the change
    pub fn set_tickets_minting_ratio(&mut self, ctx: &OpContext, ratio: Amount) -> Result<()> {
        self.require_admin(ctx.caller)?;
        self.tickets_minting_ratio = ratio;
        Ok(())
    }

    /// Only affects slots entered after the change
    pub fn set_tickets_minting_chill_period(&mut self, ctx: &OpContext, chill: u64) -> Result<()> {
        self.require_admin(ctx.caller)?;
        self.tickets_minting_chill_period = chill;
        Ok(())
    }

    pub fn set_rarity_register(
        &mut self,
        ctx: &OpContext,
        rarity: Arc<dyn RarityRegister>,
    ) -> Result<()> {
        self.require_admin(ctx.caller)?;
        self.rarity = rarity;
        Ok(())
    }

    // === Views ===

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn history_start_block(&self) -> BlockNumber {
        self.aggregate.history_start_block()
    }

    pub fn history_end_block(&self) -> BlockNumber {
        self.aggregate.history_end_block()
    }

    pub fn history_length(&self) -> u64 {
        self.aggregate.history_length()
    }

    pub fn history_average_reward(&self) -> Amount {
        self.aggregate.history_average_reward()
    }

    pub fn history_reward_pot(&self) -> Amount {
        self.aggregate.history_reward_pot()
    }

    pub fn total_currently_staked(&self) -> Amount {
        self.aggregate.total_currently_staked()
    }

    pub fn total_staking_units(&self) -> Amount {
        self.aggregate.total_staking_units()
    }

    pub fn total_distributed_rewards(&self) -> Amount {
        self.aggregate.total_distributed_rewards()
    }

    pub fn current_period_length(&self, now: BlockNumber) -> u64 {
        self.aggregate.current_period_length(now)
    }

    /// Reward accrued in the still-open period `(history_end_block, now]`
    pub fn current_period_reward(&self, now: BlockNumber) -> Amount {
        self.streams
            .total_reward_in_range(self.aggregate.history_end_block(), now)
    }

    pub fn current_period_average_reward(&self, now: BlockNumber) -> Amount {
        let length = self.aggregate.current_period_length(now);
        self.aggregate
            .period_average(self.current_period_reward(now), length)
    }

    pub fn slot(&self, staker: Address, index: usize) -> Option<&StakeSlot> {
        self.slots.get(staker, index)
    }

    pub fn slot_count(&self, staker: Address) -> usize {
        self.slots.slot_count(staker)
    }

    pub fn total_staked_for(&self, staker: Address) -> Amount {
        self.slots.total_staked_for(staker)
    }

    pub fn staked_nft(&self, staker: Address, index: usize) -> Option<NftRef> {
        self.staked_nfts.get(&(staker, index)).copied()
    }

    /// Live positions across all stakers; their amounts always sum to
    /// `total_currently_staked`
    pub fn active_slots(&self) -> impl Iterator<Item = (&Address, &StakeSlot)> {
        self.slots.active_slots()
    }

    /// Blocks the slot has spent inside the closed history window
    pub fn staker_time_in_history(&self, staker: Address, index: usize) -> u64 {
        self.slots
            .get(staker, index)
            .map(|slot| slot.time_in_history(&self.aggregate))
            .unwrap_or(0)
    }

    pub fn history_average_for_stake(&self, staker: Address, index: usize) -> Amount {
        self.slots
            .get(staker, index)
            .map(|slot| slot.history_average_for_stake(&self.aggregate))
            .unwrap_or(0)
    }

    pub fn reward_from_history(&self, staker: Address, index: usize) -> Amount {
        self.slots
            .get(staker, index)
            .map(|slot| slot.reward_from_history(&self.aggregate))
            .unwrap_or(0)
    }

    /// The slot's pool share of the still-open period
    pub fn reward_from_current(&self, staker: Address, index: usize, now: BlockNumber) -> Amount {
        let total = self.aggregate.total_currently_staked();
        if total == 0 {
            return 0;
        }
        self.slots
            .get(staker, index)
            .filter(|slot| slot.active)
            .map(|slot| self.current_period_reward(now) * slot.amount_staked / total)
            .unwrap_or(0)
    }

    /// Full accrued reward of a slot at block `now`
    pub fn staker_reward(&self, staker: Address, index: usize, now: BlockNumber) -> Amount {
        let credit = self
            .slots
            .get(staker, index)
            .map(|slot| slot.reward_credit)
            .unwrap_or(0);
        self.reward_from_current(staker, index, now)
            + self.reward_from_history(staker, index)
            + credit
    }

    pub fn claimable_tickets(&self, staker: Address, index: usize, now: BlockNumber) -> u64 {
        self.slots
            .get(staker, index)
            .map(|slot| tickets::claimable_tickets(slot, now))
            .unwrap_or(0)
    }

    pub fn lock_tier(&self, index: usize) -> Option<&LockTier> {
        self.locks.get(index)
    }

    pub fn lock_tier_count(&self) -> usize {
        self.locks.len()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.stream_count()
    }

    pub fn stream(&self, index: usize) -> Option<&RewardStream> {
        self.streams.stream(index)
    }

    pub fn tickets_minting_ratio(&self) -> Amount {
        self.tickets_minting_ratio
    }

    pub fn tickets_minting_chill_period(&self) -> u64 {
        self.tickets_minting_chill_period
    }

    /// Serializable copy of the full state
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            aggregate: self.aggregate.clone(),
            streams: self.streams.clone(),
            locks: self.locks.clone(),
            slots: self.slots.clone(),
            staked_nfts: self
                .staked_nfts
                .iter()
                .map(|(&(staker, index), &nft)| (staker, index, nft))
                .collect(),
            tickets_minting_ratio: self.tickets_minting_ratio,
            tickets_minting_chill_period: self.tickets_minting_chill_period,
        }
    }

    // === Internals ===

    /// Undo an escrow transfer while unwinding a failed operation
    fn refund(&self, to: Address, amount: Amount) {
        if !self.token.transfer(self.address, to, amount) {
            log::warn!("refund of {} to {} failed", amount, to);
        }
    }

    fn require_admin(&self, caller: Address) -> Result<()> {
        if caller != self.admin {
            return Err(StakingError::Unauthorized { caller });
        }
        Ok(())
    }

    /// Close the period `(history_end_block, block − 1]` into history. The
    /// operation block itself stays in the open period; a second operation in
    /// the same block finds an empty period and changes nothing.
    fn roll_up(&mut self, block: BlockNumber) {
        let end = self.aggregate.history_end_block();
        let close = block.saturating_sub(1);
        if close <= end {
            return;
        }
        let reward = self.streams.total_reward_in_range_advancing(end, close);
        self.aggregate.roll_up(close, reward);
    }
}
