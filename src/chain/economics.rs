// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::database::Database;
use crate::chain::store::{ObjectId, Row, StoreErr};
use crate::consensus::*;
use bincode::{Decode, Encode};
use std::collections::BTreeMap;

/// Singleton ledger of the emission pools. The pools are pre-funded at
/// genesis with the entire future emission, so
/// `pools + circulating + burned == total_supply` holds at every block.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct EconomicModel {
    pub id: ObjectId,

    pub mining_pool_from_coinbase: Share,
    pub mining_pool_from_fees: Share,
    pub interest_pool_from_coinbase: Share,
    pub interest_pool_from_fees: Share,
    pub promotion_pool: Share,

    /// Genesis seed of the promotion pool, for the unlock schedule
    pub initial_promotion_pool: Share,

    /// Genesis seed of the coinbase mining pool
    pub initial_mining_pool: Share,

    /// Coinbase mining rewards withdrawn so far
    pub withdrawn_mining_coinbase: Share,

    pub burned: Share,

    pub init_supply: Share,
    pub total_supply: Share,

    /// Everything ever moved out of the pools into circulation
    pub accumulated_supply: Share,

    /// Circulating supply snapshot per block, for audit and replay
    /// checks. Never overwritten.
    pub supply_records: BTreeMap<u64, Share>,
}

impl Row for EconomicModel {
    const TABLE: &'static str = "economic_model";

    fn id(&self) -> ObjectId {
        self.id
    }
}

/// Result of a mining-reward withdrawal. `shortfall` marks a withdrawal
/// saturated at the pool balance, distinctly from the error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningWithdrawal {
    pub amount: Share,
    pub shortfall: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EconomicsErr {
    /// `numerator > denominator` or zero denominator
    InvalidRatio,

    /// Requested promotion amount exceeds what has unlocked
    PromotionPoolLocked { available: Share },

    /// Genesis supplies are negative or inconsistent
    InvalidGenesis,

    Store(StoreErr),
}

impl From<StoreErr> for EconomicsErr {
    fn from(other: StoreErr) -> Self {
        Self::Store(other)
    }
}

impl EconomicModel {
    /// Coinbase mining shares unlocked but not yet withdrawn at `block_num`.
    #[must_use]
    pub fn unlocked_mining_coinbase(&self, block_num: u64) -> Share {
        let elapsed = block_num.min(EMISSION_BLOCKS);
        let unlocked_total =
            split_proportional(self.initial_mining_pool, elapsed, EMISSION_BLOCKS);
        (unlocked_total - self.withdrawn_mining_coinbase).clamp(0, self.mining_pool_from_coinbase)
    }

    /// Promotion shares unlocked but not yet spent at `block_num`.
    #[must_use]
    pub fn available_promotion_pool(&self, block_num: u64) -> Share {
        let elapsed = block_num.min(PROMOTION_POOL_UNLOCK_BLOCKS);
        let unlocked_total = split_proportional(
            self.initial_promotion_pool,
            elapsed,
            PROMOTION_POOL_UNLOCK_BLOCKS,
        );
        let spent = self.initial_promotion_pool - self.promotion_pool;
        (unlocked_total - spent).clamp(0, self.promotion_pool)
    }

    /// Full mining reward claimable at `block_num`: the unlocked coinbase
    /// share plus the entire fee-sourced pool.
    #[must_use]
    pub fn mining_reward(&self, block_num: u64) -> Share {
        self.unlocked_mining_coinbase(block_num) + self.mining_pool_from_fees
    }
}

impl Database {
    /// One-time genesis initialisation of the economic model. The entire
    /// future emission is parked in the pools.
    pub fn init_economics(
        &mut self,
        init_supply: Share,
        total_supply: Share,
    ) -> Result<(), EconomicsErr> {
        if init_supply < 0 || total_supply < init_supply {
            return Err(EconomicsErr::InvalidGenesis);
        }
        assert!(
            self.economics.is_empty(),
            "economic model initialised twice"
        );

        let reserve = total_supply - init_supply;
        let promotion = percent_of(reserve, PROMOTION_POOL_PERCENT);
        let mining = percent_of(reserve - promotion, MINING_POOL_PERCENT);
        let interest = reserve - promotion - mining;

        self.economics.create(|id| EconomicModel {
            id,
            mining_pool_from_coinbase: mining,
            mining_pool_from_fees: 0,
            interest_pool_from_coinbase: interest,
            interest_pool_from_fees: 0,
            promotion_pool: promotion,
            initial_promotion_pool: promotion,
            initial_mining_pool: mining,
            withdrawn_mining_coinbase: 0,
            burned: 0,
            init_supply,
            total_supply,
            accumulated_supply: 0,
            supply_records: BTreeMap::new(),
        })?;

        Ok(())
    }

    /// Append a circulating-supply snapshot for `block_num`. Replaying
    /// the same block is a no-op, never a double record.
    pub fn record_block(&mut self, block_num: u64, current_supply: Share) -> Result<(), StoreErr> {
        let id = self.econ().id;
        self.economics.modify(id, |e| {
            e.supply_records.entry(block_num).or_insert(current_supply);
        })
    }

    pub fn get_mining_reward(&self, block_num: u64) -> Share {
        self.econ().mining_reward(block_num)
    }

    /// Withdraw `numerator/denominator` of the mining reward claimable
    /// at `block_num`, decrementing the pools. Ratios above one are
    /// rejected; a thin pool saturates and reports a shortfall.
    pub fn withdraw_mining_reward(
        &mut self,
        block_num: u64,
        numerator: u64,
        denominator: u64,
    ) -> Result<MiningWithdrawal, EconomicsErr> {
        if denominator == 0 || numerator > denominator {
            return Err(EconomicsErr::InvalidRatio);
        }

        let econ = self.econ();
        let coinbase_due =
            split_proportional(econ.unlocked_mining_coinbase(block_num), numerator, denominator);
        let fees_due = split_proportional(econ.mining_pool_from_fees, numerator, denominator);

        let coinbase_paid = coinbase_due.min(econ.mining_pool_from_coinbase);
        let fees_paid = fees_due.min(econ.mining_pool_from_fees);
        let shortfall = coinbase_paid < coinbase_due || fees_paid < fees_due;

        let id = econ.id;
        self.economics.modify(id, |e| {
            e.mining_pool_from_coinbase -= coinbase_paid;
            e.withdrawn_mining_coinbase += coinbase_paid;
            e.mining_pool_from_fees -= fees_paid;
            e.accumulated_supply += coinbase_paid + fees_paid;
        })?;

        Ok(MiningWithdrawal {
            amount: coinbase_paid + fees_paid,
            shortfall,
        })
    }

    /// Interest on `holding` over `period_secs`, drawn from the interest
    /// pools (fee-sourced first). Returns the amount actually paid,
    /// saturated at the pool contents.
    pub fn withdraw_interests(
        &mut self,
        holding: Share,
        period_secs: u64,
    ) -> Result<Share, StoreErr> {
        let due = interest_amount(holding, period_secs);
        if due == 0 {
            return Ok(0);
        }

        let econ = self.econ();
        let from_fees = due.min(econ.interest_pool_from_fees);
        let from_coinbase = (due - from_fees).min(econ.interest_pool_from_coinbase);

        let id = econ.id;
        self.economics.modify(id, |e| {
            e.interest_pool_from_fees -= from_fees;
            e.interest_pool_from_coinbase -= from_coinbase;
            e.accumulated_supply += from_fees + from_coinbase;
        })?;

        Ok(from_fees + from_coinbase)
    }

    pub fn get_available_promotion_pool(&self, block_num: u64) -> Share {
        self.econ().available_promotion_pool(block_num)
    }

    /// Withdraw from the promotion pool. Fails when `amount` exceeds the
    /// unlocked balance at `block_num`.
    pub fn withdraw_from_promotion_pool(
        &mut self,
        amount: Share,
        block_num: u64,
    ) -> Result<(), EconomicsErr> {
        let available = self.get_available_promotion_pool(block_num);
        if amount > available {
            return Err(EconomicsErr::PromotionPoolLocked { available });
        }

        let id = self.econ().id;
        self.economics.modify(id, |e| {
            e.promotion_pool -= amount;
            e.accumulated_supply += amount;
        })?;

        Ok(())
    }

    /// Route a collected fee into the fee-sourced pools per the fixed
    /// split. Fees re-enter the pools, so they leave circulating supply.
    pub fn add_fee(&mut self, fee: Share) -> Result<(), StoreErr> {
        debug_assert!(fee >= 0);
        let to_mining = percent_of(fee, FEE_POOL_MINING_PERCENT);
        let to_interest = fee - to_mining;

        let id = self.econ().id;
        self.economics.modify(id, |e| {
            e.mining_pool_from_fees += to_mining;
            e.interest_pool_from_fees += to_interest;
            e.accumulated_supply -= fee;
        })
    }

    /// Destroy shares. They stay inside `total_supply` as `burned`.
    pub fn burn(&mut self, amount: Share) -> Result<(), StoreErr> {
        debug_assert!(amount >= 0);
        let id = self.econ().id;
        self.economics.modify(id, |e| {
            e.burned += amount;
            e.accumulated_supply -= amount;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        let mut db = Database::new();
        db.init_economics(INIT_SUPPLY, TOTAL_SUPPLY).unwrap();
        db
    }

    #[test]
    fn genesis_pools_cover_the_reserve() {
        let db = db();
        let e = db.econ();
        assert_eq!(
            e.mining_pool_from_coinbase + e.interest_pool_from_coinbase + e.promotion_pool,
            TOTAL_SUPPLY - INIT_SUPPLY
        );
        assert_eq!(e.initial_promotion_pool, e.promotion_pool);
        assert_eq!(e.burned, 0);
    }

    #[test]
    fn double_genesis_is_rejected() {
        let mut db = db();
        assert_eq!(
            db.init_economics(-1, TOTAL_SUPPLY),
            Err(EconomicsErr::InvalidGenesis)
        );
        assert_eq!(
            db.init_economics(10, 5),
            Err(EconomicsErr::InvalidGenesis)
        );
    }

    #[test]
    fn record_block_is_idempotent() {
        let mut db = db();
        db.record_block(100, 1_234).unwrap();
        db.record_block(100, 9_999).unwrap();
        assert_eq!(db.econ().supply_records.get(&100), Some(&1_234));
    }

    #[test]
    fn mining_withdrawal_splits_and_decrements() {
        let mut db = db();
        // Make the numbers legible: a fresh model with a round pool
        let id = db.econ().id;
        db.economics
            .modify(id, |e| {
                e.mining_pool_from_coinbase = 1_000;
                e.initial_mining_pool = 1_000;
                e.withdrawn_mining_coinbase = 0;
                e.mining_pool_from_fees = 0;
            })
            .unwrap();

        // Everything unlocked at the end of the emission schedule
        let w = db
            .withdraw_mining_reward(EMISSION_BLOCKS, 1, 2)
            .unwrap();
        assert_eq!(w.amount, 500);
        assert!(!w.shortfall);
        assert_eq!(db.econ().mining_pool_from_coinbase, 500);
    }

    #[test]
    fn mining_withdrawal_rejects_bad_ratio() {
        let mut db = db();
        assert_eq!(
            db.withdraw_mining_reward(1, 3, 2),
            Err(EconomicsErr::InvalidRatio)
        );
        assert_eq!(
            db.withdraw_mining_reward(1, 1, 0),
            Err(EconomicsErr::InvalidRatio)
        );
    }

    #[test]
    fn promotion_pool_unlocks_linearly() {
        let mut db = db();
        let initial = db.econ().initial_promotion_pool;

        assert_eq!(db.get_available_promotion_pool(0), 0);
        let half = db.get_available_promotion_pool(PROMOTION_POOL_UNLOCK_BLOCKS / 2);
        assert_eq!(half, initial / 2);
        assert_eq!(
            db.get_available_promotion_pool(PROMOTION_POOL_UNLOCK_BLOCKS),
            initial
        );

        let err = db
            .withdraw_from_promotion_pool(half + 1, PROMOTION_POOL_UNLOCK_BLOCKS / 2)
            .unwrap_err();
        assert!(matches!(err, EconomicsErr::PromotionPoolLocked { .. }));

        db.withdraw_from_promotion_pool(half, PROMOTION_POOL_UNLOCK_BLOCKS / 2)
            .unwrap();
        assert_eq!(db.econ().promotion_pool, initial - half);
        assert_eq!(
            db.get_available_promotion_pool(PROMOTION_POOL_UNLOCK_BLOCKS / 2),
            0
        );
    }

    #[test]
    fn fees_split_between_pools() {
        let mut db = db();
        db.add_fee(1_001).unwrap();
        let e = db.econ();
        assert_eq!(e.mining_pool_from_fees, 500);
        assert_eq!(e.interest_pool_from_fees, 501);
    }

    #[test]
    fn burned_shares_stay_inside_total_supply() {
        let mut db = db();
        db.burn(1_000).unwrap();
        let e = db.econ();
        assert_eq!(e.burned, 1_000);
        assert_eq!(e.accumulated_supply, -1_000);
    }

    #[test]
    fn interest_draws_fee_pool_first() {
        let mut db = db();
        db.add_fee(100).unwrap();
        let fee_pool_before = db.econ().interest_pool_from_fees;
        let coinbase_before = db.econ().interest_pool_from_coinbase;

        let paid = db
            .withdraw_interests(100 * COIN, SECONDS_PER_YEAR)
            .unwrap();
        assert_eq!(paid, 2 * COIN);

        let e = db.econ();
        assert_eq!(e.interest_pool_from_fees, 0);
        assert_eq!(
            e.interest_pool_from_coinbase,
            coinbase_before - (paid - fee_pool_before)
        );
    }
}
