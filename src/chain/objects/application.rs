// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use crate::primitives::{AccountName, ApplicationPrice};
use bincode::{Decode, Encode};
use std::collections::BTreeMap;

/// Registered application. Custom content references applications by
/// numeric id; content for ids with no application row is stored inert.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct Application {
    pub id: ObjectId,
    pub name: String,
    pub author: AccountName,
    pub url: String,
    pub metadata: String,
    pub price_param: ApplicationPrice,
    pub created: u64,
}

impl Row for Application {
    const TABLE: &'static str = "application";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct ApplicationIndexes {
    pub by_name: BTreeMap<String, ObjectId>,
    pub by_author: BTreeMap<(AccountName, ObjectId), ObjectId>,
}

impl IndexSet<Application> for ApplicationIndexes {
    fn insert(&mut self, row: &Application) -> Result<(), StoreErr> {
        if self.by_name.contains_key(&row.name) {
            return Err(StoreErr::DuplicateKey("application.by_name"));
        }
        self.by_name.insert(row.name.clone(), row.id);
        self.by_author.insert((row.author.clone(), row.id), row.id);
        Ok(())
    }

    fn remove(&mut self, row: &Application) {
        self.by_name.remove(&row.name);
        self.by_author.remove(&(row.author.clone(), row.id));
    }
}

/// Purchase record for one (application, buyer) pair.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct ApplicationBuying {
    pub id: ObjectId,
    pub app_id: ObjectId,
    pub buyer: AccountName,
    pub created: u64,
}

impl Row for ApplicationBuying {
    const TABLE: &'static str = "application_buying";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Default)]
pub struct ApplicationBuyingIndexes {
    pub by_app_buyer: BTreeMap<(ObjectId, AccountName), ObjectId>,
    pub by_buyer: BTreeMap<(AccountName, u64, ObjectId), ObjectId>,
}

impl IndexSet<ApplicationBuying> for ApplicationBuyingIndexes {
    fn insert(&mut self, row: &ApplicationBuying) -> Result<(), StoreErr> {
        let key = (row.app_id, row.buyer.clone());
        if self.by_app_buyer.contains_key(&key) {
            return Err(StoreErr::DuplicateKey("application_buying.by_app_buyer"));
        }
        self.by_app_buyer.insert(key, row.id);
        self.by_buyer
            .insert((row.buyer.clone(), row.created, row.id), row.id);
        Ok(())
    }

    fn remove(&mut self, row: &ApplicationBuying) {
        self.by_app_buyer.remove(&(row.app_id, row.buyer.clone()));
        self.by_buyer
            .remove(&(row.buyer.clone(), row.created, row.id));
    }
}
