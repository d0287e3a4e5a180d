// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::database::Database;
use crate::chain::objects::AccountBandwidth;
use crate::chain::store::StoreErr;
use crate::consensus::*;
use crate::primitives::AccountName;

/// Outcome of bandwidth accounting for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandwidthCharge {
    /// Within the rolling fee-free quota
    FeeFree,

    /// Quota spent; the fee payer owes this fee
    Fee(Share),
}

impl Database {
    /// Account one transaction of `tx_size` bytes against `account` at
    /// `head_block_num`. The rolling window counters are only valid
    /// within `[last_block_num_reset, last_block_num_reset + window)`;
    /// they are lazily reset here, before the new transaction is
    /// counted. Lifetime counters always accumulate.
    pub fn update_account_bandwidth(
        &mut self,
        account: &AccountName,
        tx_size: u64,
        head_block_num: u64,
    ) -> Result<BandwidthCharge, StoreErr> {
        let row_id = match self.find_bandwidth(account).map(|row| row.id) {
            Some(id) => id,
            None => {
                self.bandwidth
                    .create(|id| AccountBandwidth {
                        id,
                        account: account.clone(),
                        total_bandwidth: 0,
                        total_tx_count: 0,
                        act_fee_free_bandwidth: 0,
                        act_fee_free_tx_count: 0,
                        last_block_num_reset: head_block_num,
                    })?
                    .id
            }
        };

        let row = self.bandwidth.get(row_id)?;
        let window_expired =
            head_block_num.saturating_sub(row.last_block_num_reset) >= BANDWIDTH_WINDOW_BLOCKS;

        let (act_bandwidth, act_tx_count) = if window_expired {
            (0, 0)
        } else {
            (row.act_fee_free_bandwidth, row.act_fee_free_tx_count)
        };

        let fee_free = act_bandwidth + tx_size <= FEE_FREE_BYTES_PER_WINDOW
            && act_tx_count < FEE_FREE_TXS_PER_WINDOW;

        self.bandwidth.modify(row_id, |row| {
            if window_expired {
                row.act_fee_free_bandwidth = 0;
                row.act_fee_free_tx_count = 0;
                row.last_block_num_reset = head_block_num;
            }
            row.total_bandwidth += tx_size;
            row.total_tx_count += 1;
            if fee_free {
                row.act_fee_free_bandwidth += tx_size;
                row.act_fee_free_tx_count += 1;
            }
        })?;

        if fee_free {
            Ok(BandwidthCharge::FeeFree)
        } else {
            Ok(BandwidthCharge::Fee(BANDWIDTH_FEE))
        }
    }
}
