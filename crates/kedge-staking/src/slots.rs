//! Per-staker stake slots and checkpoint reward math
//!
//! Slots live in an arena per staker: indices are stable, a fully withdrawn
//! slot is tombstoned (fields zeroed, `active` cleared) and never reused. The
//! explicit flag distinguishes a tombstone from a legitimately zero slot.
//!
//! A slot checkpoints the global aggregate at entry; its exact history reward
//! is backed out later from the difference of two weighted sums, without any
//! per-block per-staker data:
//!
//! ```text
//! avg_for_stake = (H·len − H_entry·len_before_entry) / blocks_participated
//! reward_from_history = blocks_participated · avg_for_stake · amount / SCALE
//! ```

use crate::constants::SCALE;
use crate::history::HistoryAggregate;
use kedge_core::{Address, Amount, BlockNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One stake position
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSlot {
    /// Tombstone flag; false once fully withdrawn
    pub active: bool,
    pub amount_staked: Amount,
    /// `amount_staked × multiplier / 100`; drives ticket accrual only
    pub staking_units: Amount,
    pub lock_index: usize,
    pub locked_till: BlockNumber,
    pub entered_at_block: BlockNumber,
    /// Checkpoint of the global history average at entry (× SCALE)
    pub history_average_when_entered: Amount,
    /// One-off additions, e.g. the NFT boost
    pub reward_credit: Amount,
    pub minting_ratio_when_entered: Amount,
    pub chill_period_when_entered: u64,
    pub tickets_minted: u64,
}

impl StakeSlot {
    /// Blocks this slot has participated in the closed history window
    pub fn time_in_history(&self, aggregate: &HistoryAggregate) -> u64 {
        (aggregate.history_end_block() + 1).saturating_sub(self.entered_at_block)
    }

    /// Length of the history window before this slot entered
    fn history_length_before_entry(&self, aggregate: &HistoryAggregate) -> u64 {
        self.entered_at_block
            .saturating_sub(1)
            .saturating_sub(aggregate.history_start_block())
    }

    /// The slot-specific average reward per token per block (× SCALE) over
    /// exactly the sub-window the slot was present
    pub fn history_average_for_stake(&self, aggregate: &HistoryAggregate) -> Amount {
        let participated = self.time_in_history(aggregate) as Amount;
        if participated == 0 {
            return 0;
        }
        let whole = aggregate.history_average_reward() * aggregate.history_length() as Amount;
        let before = self.history_average_when_entered
            * self.history_length_before_entry(aggregate) as Amount;
        // floor dust in the running mean can leave `whole` a hair under
        whole.saturating_sub(before) / participated
    }

    /// Reward earned from the closed history window
    pub fn reward_from_history(&self, aggregate: &HistoryAggregate) -> Amount {
        let participated = self.time_in_history(aggregate) as Amount;
        participated * self.history_average_for_stake(aggregate) * self.amount_staked / SCALE
    }

    /// Zero the slot, leaving only the tombstone
    pub fn tombstone(&mut self) {
        *self = StakeSlot::default();
    }
}

/// All stake slots, indexed per staker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SlotArena {
    slots: HashMap<Address, Vec<StakeSlot>>,
}

impl SlotArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot for `staker`; returns its index
    pub fn push(&mut self, staker: Address, slot: StakeSlot) -> usize {
        let slots = self.slots.entry(staker).or_default();
        slots.push(slot);
        slots.len() - 1
    }

    pub fn get(&self, staker: Address, index: usize) -> Option<&StakeSlot> {
        self.slots.get(&staker).and_then(|slots| slots.get(index))
    }

    pub fn get_mut(&mut self, staker: Address, index: usize) -> Option<&mut StakeSlot> {
        self.slots
            .get_mut(&staker)
            .and_then(|slots| slots.get_mut(index))
    }

    /// Number of slots ever created for `staker` (tombstones included)
    pub fn slot_count(&self, staker: Address) -> usize {
        self.slots.get(&staker).map(|slots| slots.len()).unwrap_or(0)
    }

    /// Sum of live principal for `staker`
    pub fn total_staked_for(&self, staker: Address) -> Amount {
        self.slots
            .get(&staker)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|slot| slot.active)
                    .map(|slot| slot.amount_staked)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Live slots across all stakers
    pub fn active_slots(&self) -> impl Iterator<Item = (&Address, &StakeSlot)> {
        self.slots
            .iter()
            .flat_map(|(staker, slots)| slots.iter().map(move |slot| (staker, slot)))
            .filter(|(_, slot)| slot.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_entered_at(entered: BlockNumber, checkpoint: Amount, amount: Amount) -> StakeSlot {
        StakeSlot {
            active: true,
            amount_staked: amount,
            staking_units: amount,
            lock_index: 0,
            locked_till: entered,
            entered_at_block: entered,
            history_average_when_entered: checkpoint,
            reward_credit: 0,
            minting_ratio_when_entered: 100,
            chill_period_when_entered: 1,
            tickets_minted: 0,
        }
    }

    #[test]
    fn test_time_in_history() {
        let mut aggregate = HistoryAggregate::new(100);
        aggregate.add_stake(100, 100);
        let slot = slot_entered_at(105, 0, 100);

        // history still ends at genesis: not in history yet
        assert_eq!(slot.time_in_history(&aggregate), 0);

        aggregate.roll_up(110, 0);
        assert_eq!(slot.time_in_history(&aggregate), 6);
    }

    #[test]
    fn test_full_window_participant_sees_whole_average() {
        let mut aggregate = HistoryAggregate::new(100);
        let slot = slot_entered_at(101, 0, 200);
        aggregate.add_stake(200, 200);

        // one period, avg = 1000 * SCALE / 200 / 10 = SCALE / 2
        aggregate.roll_up(110, 1000);

        assert_eq!(slot.history_average_for_stake(&aggregate), SCALE / 2);
        // 10 blocks * SCALE/2 * 200 / SCALE = 1000
        assert_eq!(slot.reward_from_history(&aggregate), 1000);
    }

    #[test]
    fn test_late_entrant_only_earns_its_subwindow() {
        let mut aggregate = HistoryAggregate::new(100);
        aggregate.add_stake(100, 100);

        // period 1: blocks 101..=110, pool 100, reward 1000
        aggregate.roll_up(110, 1000);

        // late entrant doubles the pool at block 111
        let late = slot_entered_at(111, aggregate.history_average_reward(), 100);
        aggregate.add_stake(100, 100);

        // period 2: blocks 111..=120, pool 200, reward 1000
        aggregate.roll_up(120, 1000);

        // late entrant was present only for period 2: avg SCALE/2000*... =
        // 1000 * SCALE / 200 / 10 = SCALE/2; its share 10 * SCALE/2 * 100/SCALE = 500
        assert_eq!(late.history_average_for_stake(&aggregate), SCALE / 2);
        assert_eq!(late.reward_from_history(&aggregate), 500);
    }

    #[test]
    fn test_tombstone_zeroes_everything() {
        let mut slot = slot_entered_at(42, 7, 100);
        slot.tickets_minted = 3;
        slot.tombstone();

        assert!(!slot.active);
        assert_eq!(slot, StakeSlot::default());
    }

    #[test]
    fn test_arena_indexing_and_totals() {
        let mut arena = SlotArena::new();
        let alice = Address::from_label("alice");

        let a = arena.push(alice, slot_entered_at(10, 0, 100));
        let b = arena.push(alice, slot_entered_at(20, 0, 50));
        assert_eq!((a, b), (0, 1));
        assert_eq!(arena.slot_count(alice), 2);
        assert_eq!(arena.total_staked_for(alice), 150);

        arena.get_mut(alice, 0).unwrap().tombstone();
        assert_eq!(arena.slot_count(alice), 2);
        assert_eq!(arena.total_staked_for(alice), 50);
        assert_eq!(arena.active_slots().count(), 1);
    }
}
