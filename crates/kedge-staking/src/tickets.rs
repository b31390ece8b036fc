//! Ticket accrual from accumulated stake-time
//!
//! Tickets accrue per elapsed chill period, using the ratio and chill period
//! snapshotted into the slot at entry. The first chill period is credited at
//! the stake block itself, and accrual freezes once `locked_till` is reached.
//! All divisions floor.

use crate::slots::StakeSlot;
use kedge_core::BlockNumber;

/// Chill periods elapsed for a slot at block `now`
///
/// `floor((min(now, locked_till) − entered + chill) / chill)` — 1 at entry,
/// then one more per full chill period, frozen at the lock end.
pub fn accrued_periods(slot: &StakeSlot, now: BlockNumber) -> u64 {
    let chill = slot.chill_period_when_entered;
    if !slot.active || chill == 0 {
        return 0;
    }
    let frozen_at = now.min(slot.locked_till).max(slot.entered_at_block);
    let blocks = frozen_at - slot.entered_at_block + chill;
    blocks / chill
}

/// Tickets mintable right now: accrued minus already minted
pub fn claimable_tickets(slot: &StakeSlot, now: BlockNumber) -> u64 {
    let periods = accrued_periods(slot, now) as u128;
    if slot.minting_ratio_when_entered == 0 {
        return 0;
    }
    let accrued = slot.staking_units.saturating_mul(periods) / slot.minting_ratio_when_entered;
    accrued
        .saturating_sub(slot.tickets_minted as u128)
        .min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use kedge_core::Amount;

    fn slot(units: Amount, ratio: Amount, chill: u64, entered: u64, locked_till: u64) -> StakeSlot {
        StakeSlot {
            active: true,
            amount_staked: units,
            staking_units: units,
            lock_index: 1,
            locked_till,
            entered_at_block: entered,
            history_average_when_entered: 0,
            reward_credit: 0,
            minting_ratio_when_entered: ratio,
            chill_period_when_entered: chill,
            tickets_minted: 0,
        }
    }

    #[test]
    fn test_first_period_credited_at_entry() {
        let slot = slot(300, 100, 1, 50, 60);

        assert_eq!(accrued_periods(&slot, 50), 1);
        assert_eq!(claimable_tickets(&slot, 50), 3);
    }

    #[test]
    fn test_floor_division_boundary() {
        // units below the ratio mint nothing until enough periods stack up
        let slot = slot(300, 500, 1, 50, 60);

        assert_eq!(claimable_tickets(&slot, 50), 0); // 300*1/500 floors to 0
        assert_eq!(claimable_tickets(&slot, 51), 1); // 300*2/500 = 1
        assert_eq!(claimable_tickets(&slot, 54), 3); // 300*5/500 = 3
    }

    #[test]
    fn test_accrual_is_monotonic_then_frozen() {
        let slot = slot(1000, 100, 5, 100, 120);

        let mut previous = 0;
        for now in 100..=120 {
            let claimable = claimable_tickets(&slot, now);
            assert!(claimable >= previous);
            previous = claimable;
        }
        // frozen at locked_till: (120 - 100 + 5) / 5 = 5 periods
        assert_eq!(accrued_periods(&slot, 120), 5);
        assert_eq!(claimable_tickets(&slot, 120), claimable_tickets(&slot, 500));
    }

    #[test]
    fn test_already_minted_are_deducted() {
        let mut s = slot(300, 100, 1, 50, 60);
        s.tickets_minted = 3;

        assert_eq!(claimable_tickets(&s, 50), 0);
        assert_eq!(claimable_tickets(&s, 52), 6); // 300*3/100 - 3
    }

    #[test]
    fn test_inactive_slot_accrues_nothing() {
        let mut s = slot(300, 100, 1, 50, 60);
        s.tombstone();

        assert_eq!(claimable_tickets(&s, 55), 0);
    }

    #[test]
    fn test_no_lock_freezes_at_entry() {
        let slot = slot(500, 100, 1, 50, 50);

        assert_eq!(accrued_periods(&slot, 50), 1);
        assert_eq!(accrued_periods(&slot, 90), 1);
    }
}
