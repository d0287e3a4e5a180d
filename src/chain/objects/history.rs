// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use crate::primitives::{AccountName, Hash256};
use bincode::{Decode, Encode};
use std::collections::BTreeMap;

/// Append-only record of one applied operation, user or virtual.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct OperationObject {
    pub id: ObjectId,
    pub trx_id: Hash256,
    pub block: u64,
    pub trx_in_block: u32,
    pub op_in_trx: u32,

    /// Zero for the user operation itself; counts up for virtual
    /// operations synthesized at the same position
    pub virtual_op: u32,

    pub timestamp: u64,
    pub serialized_op: Vec<u8>,
    pub fee_payer: AccountName,
}

impl Row for OperationObject {
    const TABLE: &'static str = "operation";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct OperationIndexes {
    pub by_location: BTreeMap<(u64, u32, u32, u32), ObjectId>,
}

impl IndexSet<OperationObject> for OperationIndexes {
    fn insert(&mut self, row: &OperationObject) -> Result<(), StoreErr> {
        let key = (row.block, row.trx_in_block, row.op_in_trx, row.virtual_op);
        if self.by_location.contains_key(&key) {
            return Err(StoreErr::DuplicateKey("operation.by_location"));
        }
        self.by_location.insert(key, row.id);
        Ok(())
    }

    fn remove(&mut self, row: &OperationObject) {
        self.by_location
            .remove(&(row.block, row.trx_in_block, row.op_in_trx, row.virtual_op));
    }
}

/// Links an account to an operation record under a per-account monotonic
/// sequence, for reverse-chronological history queries.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct AccountHistory {
    pub id: ObjectId,
    pub account: AccountName,
    pub sequence: u64,
    pub op_id: ObjectId,
}

impl Row for AccountHistory {
    const TABLE: &'static str = "account_history";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct AccountHistoryIndexes {
    pub by_account: BTreeMap<(AccountName, u64), ObjectId>,
}

impl IndexSet<AccountHistory> for AccountHistoryIndexes {
    fn insert(&mut self, row: &AccountHistory) -> Result<(), StoreErr> {
        let key = (row.account.clone(), row.sequence);
        if self.by_account.contains_key(&key) {
            return Err(StoreErr::DuplicateKey("account_history.by_account"));
        }
        self.by_account.insert(key, row.id);
        Ok(())
    }

    fn remove(&mut self, row: &AccountHistory) {
        self.by_account.remove(&(row.account.clone(), row.sequence));
    }
}

impl AccountHistoryIndexes {
    /// Next history sequence for an account: one past the index tail.
    #[must_use]
    pub fn next_sequence(&self, account: &AccountName) -> u64 {
        let range = (account.clone(), 0)..=(account.clone(), u64::MAX);
        self.by_account
            .range(range)
            .next_back()
            .map(|((_, seq), _)| seq + 1)
            .unwrap_or(1)
    }
}
