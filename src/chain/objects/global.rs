// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{ObjectId, Row};
use crate::consensus::Share;
use crate::primitives::{AccountName, Hash256};
use bincode::{Decode, Encode};

/// Singleton rewritten on every applied block.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct DynamicGlobalProperties {
    pub id: ObjectId,
    pub head_block_number: u64,
    pub head_block_id: Hash256,

    /// Head block timestamp, unix seconds
    pub time: u64,

    pub current_witness: AccountName,

    /// Circulating supply: everything outside the emission pools
    pub current_supply: Share,

    pub total_vesting_shares: Share,

    /// Effective maximum block size, medianised from witness votes
    pub maximum_block_size: u32,

    /// Absolute slot count since genesis, including missed slots
    pub current_aslot: u64,

    /// Bitmask of the last 128 slots; bit 0 is the most recent slot
    pub recent_slots_filled: u128,

    /// Popcount of `recent_slots_filled`, cached
    pub participation_count: u32,

    pub last_irreversible_block_num: u64,
}

impl Row for DynamicGlobalProperties {
    const TABLE: &'static str = "dynamic_global_properties";

    fn id(&self) -> ObjectId {
        self.id
    }
}

/// Singleton tracking hardfork progression.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct HardforkProperties {
    pub id: ObjectId,

    /// Activation timestamps of every processed hardfork, in order
    pub processed_hardforks: Vec<u64>,

    /// Highest hardfork version applied so far
    pub current_hardfork_version: u32,

    pub next_hardfork_version: u32,

    /// Activation time of the next scheduled hardfork, or zero when none
    /// remain
    pub next_hardfork_time: u64,
}

impl Row for HardforkProperties {
    const TABLE: &'static str = "hardfork_properties";

    fn id(&self) -> ObjectId {
        self.id
    }
}
