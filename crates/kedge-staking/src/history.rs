//! Global ledger aggregate and the roll-up choke point
//!
//! The closed history window `(history_start_block, history_end_block]` is
//! summarized by a single running weighted mean: `history_average_reward`,
//! the reward per staked token per block, fixed-point scaled by `SCALE`.
//!
//! `roll_up` is the only writer of the history fields. Every state-changing
//! operation at block `B` closes the period `(history_end_block, B−1]` first,
//! so the total staked amount is constant within any closed period and the
//! running mean is exactly equivalent to per-block bookkeeping. A second
//! operation in the same block sees an empty period and rolls up as a no-op.
//!
//! All divisions are floor divisions; remainders of a few base units stay in
//! `history_reward_pot` and are never paid out.

use crate::constants::SCALE;
use kedge_core::{Amount, BlockNumber};
use serde::{Deserialize, Serialize};

/// The single shared ledger aggregate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryAggregate {
    history_start_block: BlockNumber,
    history_end_block: BlockNumber,
    /// Reward per staked token per block over the closed window, × SCALE
    history_average_reward: Amount,
    /// Reward escrow attributed to closed periods, minus rewards paid out
    history_reward_pot: Amount,
    total_currently_staked: Amount,
    total_staking_units: Amount,
    total_distributed_rewards: Amount,
}

impl HistoryAggregate {
    pub fn new(genesis_block: BlockNumber) -> Self {
        Self {
            history_start_block: genesis_block,
            history_end_block: genesis_block,
            history_average_reward: 0,
            history_reward_pot: 0,
            total_currently_staked: 0,
            total_staking_units: 0,
            total_distributed_rewards: 0,
        }
    }

    pub fn history_start_block(&self) -> BlockNumber {
        self.history_start_block
    }

    pub fn history_end_block(&self) -> BlockNumber {
        self.history_end_block
    }

    pub fn history_average_reward(&self) -> Amount {
        self.history_average_reward
    }

    pub fn history_reward_pot(&self) -> Amount {
        self.history_reward_pot
    }

    pub fn total_currently_staked(&self) -> Amount {
        self.total_currently_staked
    }

    pub fn total_staking_units(&self) -> Amount {
        self.total_staking_units
    }

    pub fn total_distributed_rewards(&self) -> Amount {
        self.total_distributed_rewards
    }

    /// Length of the closed history window in blocks
    pub fn history_length(&self) -> u64 {
        self.history_end_block - self.history_start_block
    }

    /// Length of the still-open period at block `now`
    pub fn current_period_length(&self, now: BlockNumber) -> u64 {
        now.saturating_sub(self.history_end_block)
    }

    /// Average reward per staked token per block (× SCALE) for a period of
    /// `length` blocks paying `reward` in total; 0 for an empty pool or
    /// period
    pub fn period_average(&self, reward: Amount, length: u64) -> Amount {
        if self.total_currently_staked == 0 || length == 0 {
            return 0;
        }
        reward * SCALE / self.total_currently_staked / length as Amount
    }

    /// Merge the period `(history_end_block, close]` paying `period_reward`
    /// into the history aggregate. No-op when the period is empty.
    pub fn roll_up(&mut self, close: BlockNumber, period_reward: Amount) {
        if close <= self.history_end_block {
            return;
        }
        let period_length = (close - self.history_end_block) as Amount;
        let history_length = self.history_length() as Amount;
        let period_average = self.period_average(period_reward, period_length as u64);
        let new_length = history_length + period_length;

        log::debug!(
            "roll-up: period ({}, {}] reward {} avg {} -> window length {}",
            self.history_end_block,
            close,
            period_reward,
            period_average,
            new_length
        );

        self.history_average_reward = (period_length * period_average
            + history_length * self.history_average_reward)
            / new_length;
        self.history_reward_pot += period_reward;
        self.history_end_block = close;
    }

    /// Register newly staked tokens
    pub fn add_stake(&mut self, amount: Amount, units: Amount) {
        self.total_currently_staked += amount;
        self.total_staking_units += units;
    }

    /// Remove withdrawn tokens
    pub fn remove_stake(&mut self, amount: Amount, units: Amount) {
        self.total_currently_staked = self.total_currently_staked.saturating_sub(amount);
        self.total_staking_units = self.total_staking_units.saturating_sub(units);
    }

    /// Add already-escrowed reward to the pot outside the roll-up path
    /// (one-off boost credits)
    pub fn fund_reward(&mut self, reward: Amount) {
        self.history_reward_pot += reward;
    }

    /// Account a reward payout against the pot
    pub fn pay_reward(&mut self, reward: Amount) {
        self.history_reward_pot = self.history_reward_pot.saturating_sub(reward);
        self.total_distributed_rewards += reward;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_period_roll_up_is_noop() {
        let mut aggregate = HistoryAggregate::new(100);
        aggregate.add_stake(50, 50);
        aggregate.roll_up(110, 1000);
        let before = aggregate.clone();

        // same close again: nothing changes, reward is not double counted
        aggregate.roll_up(110, 9999);
        assert_eq!(aggregate, before);
    }

    #[test]
    fn test_single_period_average() {
        let mut aggregate = HistoryAggregate::new(100);
        aggregate.add_stake(100, 100);

        // 10 blocks paying 50 in total over a pool of 100
        aggregate.roll_up(110, 50);

        assert_eq!(aggregate.history_end_block(), 110);
        assert_eq!(aggregate.history_length(), 10);
        // 50 * SCALE / 100 / 10
        assert_eq!(aggregate.history_average_reward(), SCALE / 20);
        assert_eq!(aggregate.history_reward_pot(), 50);
    }

    #[test]
    fn test_weighted_merge_of_two_periods() {
        let mut aggregate = HistoryAggregate::new(100);
        aggregate.add_stake(100, 100);

        // period 1: 10 blocks, avg 0.05 * SCALE
        aggregate.roll_up(110, 50);
        // period 2: 30 blocks, 600 reward -> avg 0.2 * SCALE
        aggregate.roll_up(140, 600);

        // weighted mean: (10 * 0.05 + 30 * 0.2) / 40 = 0.1625
        assert_eq!(aggregate.history_average_reward(), SCALE * 1625 / 10_000);
        assert_eq!(aggregate.history_reward_pot(), 650);
        assert_eq!(aggregate.history_length(), 40);
    }

    #[test]
    fn test_zero_pool_period_contributes_zero_average() {
        let mut aggregate = HistoryAggregate::new(0);
        aggregate.roll_up(10, 500);

        assert_eq!(aggregate.history_average_reward(), 0);
        // reward still lands in the pot
        assert_eq!(aggregate.history_reward_pot(), 500);
    }

    #[test]
    fn test_pay_reward_updates_pot_and_distributed() {
        let mut aggregate = HistoryAggregate::new(0);
        aggregate.add_stake(10, 10);
        aggregate.roll_up(5, 100);

        aggregate.pay_reward(60);
        assert_eq!(aggregate.history_reward_pot(), 40);
        assert_eq!(aggregate.total_distributed_rewards(), 60);
    }

    #[test]
    fn test_fund_reward_tops_up_pot_without_touching_the_window() {
        let mut aggregate = HistoryAggregate::new(0);
        aggregate.add_stake(10, 10);
        aggregate.roll_up(5, 100);
        let average = aggregate.history_average_reward();

        aggregate.fund_reward(30);
        assert_eq!(aggregate.history_reward_pot(), 130);
        assert_eq!(aggregate.history_average_reward(), average);
        assert_eq!(aggregate.history_end_block(), 5);
    }

    #[test]
    fn test_current_period_length() {
        let mut aggregate = HistoryAggregate::new(100);
        assert_eq!(aggregate.current_period_length(100), 0);
        assert_eq!(aggregate.current_period_length(107), 7);

        aggregate.add_stake(1, 1);
        aggregate.roll_up(107, 0);
        assert_eq!(aggregate.current_period_length(107), 0);
    }
}
