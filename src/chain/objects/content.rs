// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use crate::primitives::{AccountName, AppId};
use bincode::{Decode, Encode};
use std::collections::BTreeMap;

/// Stored payload of a custom_json or custom_binary operation. Sequence
/// counters are scoped per (app, sender) and per (app, recipient) and
/// strictly monotonic; the next sequence is derived from the index tail.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct CustomContent {
    pub id: ObjectId,
    pub app_id: AppId,
    pub sender: AccountName,
    pub recipients: Vec<AccountName>,

    pub sender_sequence: u64,

    /// Sequence assigned per recipient, parallel to `recipients`
    pub recipient_sequences: Vec<(AccountName, u64)>,

    /// True for custom_binary payloads, false for json
    pub binary: bool,
    pub payload: Vec<u8>,

    pub timestamp: u64,
}

impl Row for CustomContent {
    const TABLE: &'static str = "custom_content";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct ContentIndexes {
    pub by_app: BTreeMap<(AppId, ObjectId), ObjectId>,
    pub by_sender: BTreeMap<(AppId, AccountName, u64), ObjectId>,
    pub by_recipient: BTreeMap<(AppId, AccountName, u64), ObjectId>,
    pub by_sender_time: BTreeMap<(AppId, AccountName, u64, ObjectId), ObjectId>,
    pub by_recipient_time: BTreeMap<(AppId, AccountName, u64, ObjectId), ObjectId>,
}

impl IndexSet<CustomContent> for ContentIndexes {
    fn insert(&mut self, row: &CustomContent) -> Result<(), StoreErr> {
        let sender_key = (row.app_id, row.sender.clone(), row.sender_sequence);
        if self.by_sender.contains_key(&sender_key) {
            return Err(StoreErr::DuplicateKey("custom_content.by_sender"));
        }
        for (recipient, seq) in &row.recipient_sequences {
            if self
                .by_recipient
                .contains_key(&(row.app_id, recipient.clone(), *seq))
            {
                return Err(StoreErr::DuplicateKey("custom_content.by_recipient"));
            }
        }

        self.by_app.insert((row.app_id, row.id), row.id);
        self.by_sender.insert(sender_key, row.id);
        self.by_sender_time
            .insert((row.app_id, row.sender.clone(), row.timestamp, row.id), row.id);

        for (recipient, seq) in &row.recipient_sequences {
            self.by_recipient
                .insert((row.app_id, recipient.clone(), *seq), row.id);
            self.by_recipient_time.insert(
                (row.app_id, recipient.clone(), row.timestamp, row.id),
                row.id,
            );
        }

        Ok(())
    }

    fn remove(&mut self, row: &CustomContent) {
        self.by_app.remove(&(row.app_id, row.id));
        self.by_sender
            .remove(&(row.app_id, row.sender.clone(), row.sender_sequence));
        self.by_sender_time
            .remove(&(row.app_id, row.sender.clone(), row.timestamp, row.id));

        for (recipient, seq) in &row.recipient_sequences {
            self.by_recipient
                .remove(&(row.app_id, recipient.clone(), *seq));
            self.by_recipient_time
                .remove(&(row.app_id, recipient.clone(), row.timestamp, row.id));
        }
    }
}

impl ContentIndexes {
    /// Next sender sequence for (app, sender): one past the index tail.
    #[must_use]
    pub fn next_sender_sequence(&self, app_id: AppId, sender: &AccountName) -> u64 {
        let range = (app_id, sender.clone(), 0)..=(app_id, sender.clone(), u64::MAX);
        self.by_sender
            .range(range)
            .next_back()
            .map(|((_, _, seq), _)| seq + 1)
            .unwrap_or(1)
    }

    /// Next recipient sequence for (app, recipient).
    #[must_use]
    pub fn next_recipient_sequence(&self, app_id: AppId, recipient: &AccountName) -> u64 {
        let range = (app_id, recipient.clone(), 0)..=(app_id, recipient.clone(), u64::MAX);
        self.by_recipient
            .range(range)
            .next_back()
            .map(|((_, _, seq), _)| seq + 1)
            .unwrap_or(1)
    }
}
