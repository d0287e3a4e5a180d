// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use crate::consensus::Share;
use crate::primitives::{AccountName, ChainProperties, Price, PublicKey};
use bincode::{Decode, Encode};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct Witness {
    pub id: ObjectId,
    pub owner: AccountName,
    pub created: u64,
    pub url: String,

    /// Null when the witness has been shut down
    pub signing_key: PublicKey,

    /// Approval weight, in vesting shares of the approving accounts
    pub votes: Share,

    /// Virtual scheduling clock; the least-accumulated active witnesses
    /// are scheduled next round
    pub virtual_scheduled_time: u128,

    pub total_missed: u32,

    /// Misses since the last produced block; reset on production,
    /// shutdown past the threshold
    pub consecutive_missed: u32,

    pub last_confirmed_block_num: u64,

    /// This witness's vote on chain parameters
    pub props: ChainProperties,

    pub running: bool,

    /// Last published exchange rate per symbol
    pub reported_prices: Vec<Price>,
}

impl Row for Witness {
    const TABLE: &'static str = "witness";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct WitnessIndexes {
    pub by_name: BTreeMap<AccountName, ObjectId>,

    /// Iterated in reverse for vote ranking
    pub by_vote: BTreeMap<(Share, AccountName), ObjectId>,

    pub by_schedule_time: BTreeMap<(u128, ObjectId), ObjectId>,
}

impl IndexSet<Witness> for WitnessIndexes {
    fn insert(&mut self, row: &Witness) -> Result<(), StoreErr> {
        if self.by_name.contains_key(&row.owner) {
            return Err(StoreErr::DuplicateKey("witness.by_name"));
        }
        self.by_name.insert(row.owner.clone(), row.id);
        self.by_vote.insert((row.votes, row.owner.clone()), row.id);
        self.by_schedule_time
            .insert((row.virtual_scheduled_time, row.id), row.id);
        Ok(())
    }

    fn remove(&mut self, row: &Witness) {
        self.by_name.remove(&row.owner);
        self.by_vote.remove(&(row.votes, row.owner.clone()));
        self.by_schedule_time
            .remove(&(row.virtual_scheduled_time, row.id));
    }
}

/// Singleton: the active witness set for the current round.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct WitnessSchedule {
    pub id: ObjectId,

    /// Slot assignment for the current round; index derived from the
    /// absolute slot number
    pub current_shuffled_witnesses: Vec<AccountName>,

    /// Virtual time base of the current schedule
    pub current_virtual_time: u128,

    /// Chain parameters medianised over the active set
    pub majority_props: ChainProperties,
}

impl Row for WitnessSchedule {
    const TABLE: &'static str = "witness_schedule";

    fn id(&self) -> ObjectId {
        self.id
    }
}
