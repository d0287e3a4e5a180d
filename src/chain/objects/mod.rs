// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

mod account;
mod application;
mod content;
mod escrow;
mod feed;
mod global;
mod history;
mod witness;

pub use account::*;
pub use application::*;
pub use content::*;
pub use escrow::*;
pub use feed::*;
pub use global::*;
pub use history::*;
pub use witness::*;

use crate::chain::store::{IndexSet, Row, StoreErr};

/// Index bundle for singleton tables, which are only ever addressed by
/// their fixed id.
#[derive(Default)]
pub struct NoIndexes;

impl<T: Row> IndexSet<T> for NoIndexes {
    fn insert(&mut self, _row: &T) -> Result<(), StoreErr> {
        Ok(())
    }

    fn remove(&mut self, _row: &T) {}
}
