// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::database::Database;
use crate::chain::store::StoreErr;
use crate::consensus::*;
use crate::primitives::{AccountName, PublicKey};
use itertools::Itertools;
use log::*;

impl Database {
    /// Timestamp of the future slot `slot_num` (1 = the next slot after
    /// head). Slot 0 is the head block's own slot and never a valid
    /// production target.
    #[must_use]
    pub fn get_slot_time(&self, slot_num: u64) -> u64 {
        self.dgp().time + slot_num * BLOCK_INTERVAL_SECONDS
    }

    /// Which future slot `when` falls into, relative to head. Times at or
    /// before head map to slot 0.
    #[must_use]
    pub fn get_slot_at_time(&self, when: u64) -> u64 {
        let head_time = self.dgp().time;
        if when <= head_time {
            return 0;
        }
        (when - head_time) / BLOCK_INTERVAL_SECONDS
    }

    /// Witness scheduled for the future slot `slot_num`, derived from the
    /// absolute slot so every node agrees without communication.
    pub fn get_scheduled_witness(&self, slot_num: u64) -> Result<AccountName, StoreErr> {
        let schedule = self.schedule();
        if schedule.current_shuffled_witnesses.is_empty() {
            return Err(StoreErr::Corruption("empty witness schedule"));
        }
        let aslot = self.dgp().current_aslot + slot_num;
        let index = (aslot % schedule.current_shuffled_witnesses.len() as u64) as usize;
        Ok(schedule.current_shuffled_witnesses[index].clone())
    }

    /// Recompute the active witness set at a round boundary: rank by
    /// vote, order the winners by accumulated virtual scheduling time so
    /// the least recently favoured go first, and republish the slot
    /// mapping. A changed set resets the virtual clocks to stop a stale
    /// time base from starving new entrants.
    pub fn update_witness_schedule(&mut self) -> Result<(), StoreErr> {
        // Vote ranking, highest first. The index orders ties by owner
        // name; direction is irrelevant as long as it is deterministic.
        let ranked: Vec<(AccountName, u128, Share)> = self
            .witnesses
            .indexes
            .by_vote
            .iter()
            .rev()
            .filter_map(|(_, &id)| self.witnesses.find(id))
            .filter(|w| w.running && !w.signing_key.is_null())
            .map(|w| (w.owner.clone(), w.virtual_scheduled_time, w.votes))
            .take(WITNESSES_PER_ROUND)
            .collect();

        if ranked.is_empty() {
            return Err(StoreErr::Corruption("no eligible witnesses"));
        }

        let previous: Vec<AccountName> = self
            .schedule()
            .current_shuffled_witnesses
            .iter()
            .sorted()
            .cloned()
            .collect();
        let current: Vec<AccountName> =
            ranked.iter().map(|(name, _, _)| name.clone()).sorted().collect();

        let set_changed = previous != current;
        if set_changed {
            self.reset_virtual_schedule_time(&current)?;
        }

        // Order the active set by virtual scheduled time, ascending
        let mut with_time: Vec<(u128, AccountName)> = current
            .iter()
            .map(|name| {
                let w = self.find_witness(name).expect("ranked witness exists");
                (w.virtual_scheduled_time, name.clone())
            })
            .collect();
        with_time.sort();
        let shuffled: Vec<AccountName> = with_time.into_iter().map(|(_, name)| name).collect();

        // Medianise the voted chain properties over the active set
        let fees: Vec<Share> = current
            .iter()
            .filter_map(|name| self.find_witness(name))
            .map(|w| w.props.account_creation_fee)
            .collect();
        let sizes: Vec<u32> = current
            .iter()
            .filter_map(|name| self.find_witness(name))
            .map(|w| w.props.maximum_block_size)
            .collect();
        let majority_fee = median(fees).unwrap_or(ACCOUNT_CREATION_FEE);
        let majority_size = median(sizes).unwrap_or(DEFAULT_MAX_BLOCK_SIZE);

        let schedule_id = self.schedule().id;
        self.witness_schedules.modify(schedule_id, |s| {
            s.current_shuffled_witnesses = shuffled;
            s.majority_props.account_creation_fee = majority_fee;
            s.majority_props.maximum_block_size = majority_size;
        })?;
        self.modify_dgp(|dgp| dgp.maximum_block_size = majority_size)?;

        Ok(())
    }

    /// Zero the virtual clock base and restart every active witness one
    /// vote-weighted step past it.
    fn reset_virtual_schedule_time(&mut self, active: &[AccountName]) -> Result<(), StoreErr> {
        let schedule_id = self.schedule().id;
        self.witness_schedules
            .modify(schedule_id, |s| s.current_virtual_time = 0)?;

        for name in active {
            let Some(witness) = self.find_witness(name) else {
                continue;
            };
            let id = witness.id;
            let step = VIRTUAL_SCHEDULE_LAP / (witness.votes.unsigned_abs() as u128 + 1);
            self.witnesses
                .modify(id, |w| w.virtual_scheduled_time = step)?;
        }

        Ok(())
    }

    /// Advance the producer's virtual clock and confirm its block.
    pub fn note_block_produced(
        &mut self,
        owner: &AccountName,
        block_num: u64,
    ) -> Result<(), StoreErr> {
        let witness = self.get_witness(owner)?;
        let id = witness.id;
        let step = VIRTUAL_SCHEDULE_LAP / (witness.votes.unsigned_abs() as u128 + 1);

        self.witnesses.modify(id, |w| {
            w.last_confirmed_block_num = block_num;
            w.consecutive_missed = 0;
            w.virtual_scheduled_time = w.virtual_scheduled_time.wrapping_add(step);
        })?;

        let schedule_id = self.schedule().id;
        let new_time = self.get_witness(owner)?.virtual_scheduled_time;
        self.witness_schedules
            .modify(schedule_id, |s| s.current_virtual_time = new_time)?;

        Ok(())
    }

    /// Record the witnesses of skipped slots `1..slot_num` as having
    /// missed. Returns owners that crossed the consecutive-miss
    /// threshold; the pipeline shuts them down via a virtual operation.
    pub fn process_missed_slots(&mut self, slot_num: u64) -> Result<Vec<AccountName>, StoreErr> {
        let mut shutdowns = vec![];

        for missed_slot in 1..slot_num {
            let owner = self.get_scheduled_witness(missed_slot)?;
            let Some(witness) = self.find_witness(&owner) else {
                continue;
            };
            let id = witness.id;
            self.witnesses.modify(id, |w| {
                w.total_missed += 1;
                w.consecutive_missed += 1;
            })?;

            let witness = self.witnesses.get(id)?;
            if witness.consecutive_missed >= WITNESS_MISSED_SHUTDOWN_THRESHOLD
                && !witness.signing_key.is_null()
            {
                shutdowns.push(owner);
            }
        }

        Ok(shutdowns)
    }

    /// Disable a witness: clear its signing key so it drops out of the
    /// next schedule.
    pub fn shutdown_witness(&mut self, owner: &AccountName) -> Result<(), StoreErr> {
        let id = self.get_witness(owner)?.id;
        warn!("shutting down witness {owner}");
        self.witnesses.modify(id, |w| {
            w.signing_key = PublicKey::null();
            w.running = false;
            w.consecutive_missed = 0;
        })
    }

    /// Last block confirmed by at least the irreversibility quorum of
    /// the active set. Never moves backwards.
    pub fn update_last_irreversible_block(&mut self) -> Result<(), StoreErr> {
        let active = self.schedule().current_shuffled_witnesses.clone();
        let mut confirmed: Vec<u64> = active
            .iter()
            .filter_map(|name| self.find_witness(name))
            .map(|w| w.last_confirmed_block_num)
            .collect();

        if confirmed.is_empty() {
            return Ok(());
        }

        confirmed.sort_unstable();
        let offset = (confirmed.len() * (100 - IRREVERSIBLE_THRESHOLD_PERCENT as usize)) / 100;
        let candidate = confirmed[offset.min(confirmed.len() - 1)];

        self.modify_dgp(|dgp| {
            if candidate > dgp.last_irreversible_block_num {
                dgp.last_irreversible_block_num = candidate;
            }
        })
    }
}
