// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use crate::consensus::Share;
use crate::primitives::AccountName;
use bincode::{Decode, Encode};
use std::collections::BTreeMap;

/// Funds held by an agent between two parties. Created by
/// escrow_transfer, destroyed when fully released or rejected.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct Escrow {
    pub id: ObjectId,
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,

    /// Sender-chosen id, unique per `from`
    pub escrow_id: u32,

    pub amount: Share,

    /// Agent fee, held until ratification and paid out on full approval
    pub pending_fee: Share,

    pub ratification_deadline: u64,
    pub escrow_expiration: u64,
    pub to_approved: bool,
    pub agent_approved: bool,
    pub disputed: bool,
}

impl Escrow {
    /// Both parties have ratified; the agent fee has been paid out and
    /// funds can be released.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.to_approved && self.agent_approved
    }
}

impl Row for Escrow {
    const TABLE: &'static str = "escrow";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct EscrowIndexes {
    pub by_from_id: BTreeMap<(AccountName, u32), ObjectId>,

    /// Partitioned so un-ratified escrows sort before approved ones;
    /// the deadline sweep walks only the `false` prefix.
    pub by_ratification_deadline: BTreeMap<(bool, u64, ObjectId), ObjectId>,
}

impl IndexSet<Escrow> for EscrowIndexes {
    fn insert(&mut self, row: &Escrow) -> Result<(), StoreErr> {
        let from_key = (row.from.clone(), row.escrow_id);
        if self.by_from_id.contains_key(&from_key) {
            return Err(StoreErr::DuplicateKey("escrow.by_from_id"));
        }
        self.by_from_id.insert(from_key, row.id);
        self.by_ratification_deadline
            .insert((row.is_approved(), row.ratification_deadline, row.id), row.id);
        Ok(())
    }

    fn remove(&mut self, row: &Escrow) {
        self.by_from_id.remove(&(row.from.clone(), row.escrow_id));
        self.by_ratification_deadline
            .remove(&(row.is_approved(), row.ratification_deadline, row.id));
    }
}
