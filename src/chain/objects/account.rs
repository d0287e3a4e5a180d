// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use crate::consensus::Share;
use crate::primitives::{AccountName, Authority, PublicKey};
use bincode::{Decode, Encode};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct Account {
    pub id: ObjectId,
    pub name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,

    /// Liquid balance in shares
    pub balance: Share,

    /// Vesting balance in shares (1:1 with the core coin)
    pub vesting_shares: Share,

    /// Head block time at the last interest payout on the vesting
    /// balance. Interest accrues from this point and is settled whenever
    /// the vesting balance is next touched.
    pub last_interest_payment: u64,

    /// Account paying this account's bandwidth fees, when set
    pub fee_sponsor: Option<AccountName>,

    /// Witness approvals with the vote weight locked at approval time,
    /// sorted by witness name
    pub witness_votes: Vec<(AccountName, Share)>,

    pub created: u64,
}

impl Row for Account {
    const TABLE: &'static str = "account";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct AccountIndexes {
    pub by_name: BTreeMap<AccountName, ObjectId>,
}

impl IndexSet<Account> for AccountIndexes {
    fn insert(&mut self, row: &Account) -> Result<(), StoreErr> {
        if self.by_name.contains_key(&row.name) {
            return Err(StoreErr::DuplicateKey("account.by_name"));
        }
        self.by_name.insert(row.name.clone(), row.id);
        Ok(())
    }

    fn remove(&mut self, row: &Account) {
        self.by_name.remove(&row.name);
    }
}

/// Per-account bandwidth accounting. Lifetime counters only ever grow;
/// the `act_*` pair is valid within
/// `[last_block_num_reset, last_block_num_reset + window)` and must be
/// lazily reset before use outside that range.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct AccountBandwidth {
    pub id: ObjectId,
    pub account: AccountName,
    pub total_bandwidth: u64,
    pub total_tx_count: u64,
    pub act_fee_free_bandwidth: u64,
    pub act_fee_free_tx_count: u64,
    pub last_block_num_reset: u64,
}

impl Row for AccountBandwidth {
    const TABLE: &'static str = "account_bandwidth";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct BandwidthIndexes {
    pub by_account: BTreeMap<AccountName, ObjectId>,
}

impl IndexSet<AccountBandwidth> for BandwidthIndexes {
    fn insert(&mut self, row: &AccountBandwidth) -> Result<(), StoreErr> {
        if self.by_account.contains_key(&row.account) {
            return Err(StoreErr::DuplicateKey("account_bandwidth.by_account"));
        }
        self.by_account.insert(row.account.clone(), row.id);
        Ok(())
    }

    fn remove(&mut self, row: &AccountBandwidth) {
        self.by_account.remove(&row.account);
    }
}
