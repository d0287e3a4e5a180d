// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use crate::primitives::Price;
use bincode::{Decode, Encode};
use std::collections::{BTreeMap, VecDeque};

/// Rolling median price history for one quoted symbol. A new median of
/// the active witness feeds is pushed once per feed interval; the
/// current median is the median over the retained window.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct FeedHistory {
    pub id: ObjectId,
    pub symbol: String,
    pub current_median: Option<Price>,
    pub price_history: VecDeque<Price>,
}

impl Row for FeedHistory {
    const TABLE: &'static str = "feed_history";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct FeedIndexes {
    pub by_symbol: BTreeMap<String, ObjectId>,
}

impl IndexSet<FeedHistory> for FeedIndexes {
    fn insert(&mut self, row: &FeedHistory) -> Result<(), StoreErr> {
        if self.by_symbol.contains_key(&row.symbol) {
            return Err(StoreErr::DuplicateKey("feed_history.by_symbol"));
        }
        self.by_symbol.insert(row.symbol.clone(), row.id);
        Ok(())
    }

    fn remove(&mut self, row: &FeedHistory) {
        self.by_symbol.remove(&row.symbol);
    }
}
