// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use static_assertions::*;

/// Share type. All balances, fees and pool contents are counts of the
/// smallest indivisible unit. Signed so that deltas and shortfalls can be
/// expressed, but a negative balance never appears in committed state.
pub type Share = i64;

/// Shares per coin.
pub const COIN: Share = 1_000_000;

/// Blocks are produced every `n` seconds by the scheduled witness
pub const BLOCK_INTERVAL_SECONDS: u64 = 3;

/// Number of witness slots per scheduling round. The schedule is
/// reshuffled once every round
pub const WITNESSES_PER_ROUND: usize = 21;

/// A witness that misses this many slots in a row is shut down via a
/// virtual operation
pub const WITNESS_MISSED_SHUTDOWN_THRESHOLD: u32 = 3;

/// Percent of active witnesses that must have confirmed a block before it
/// counts as irreversible
pub const IRREVERSIBLE_THRESHOLD_PERCENT: u32 = 75;

/// Default maximum block size in bytes. Witnesses vote on the effective
/// value; this is the genesis setting
pub const DEFAULT_MAX_BLOCK_SIZE: u32 = 131_072;

/// Hard floor for the voted maximum block size
pub const MIN_BLOCK_SIZE_LIMIT: u32 = 16_384;

/// Max bytes per signed transaction
pub const MAX_TRANSACTION_SIZE: u64 = 65_536;

/// Transactions may not set an expiration further than this many seconds
/// past the head block time
pub const MAX_TIME_UNTIL_EXPIRATION: u64 = 300;

/// Rolling bandwidth window, in blocks (one hour at the block interval)
pub const BANDWIDTH_WINDOW_BLOCKS: u64 = 1_200;

/// Fee-free bytes an account may use within one bandwidth window
pub const FEE_FREE_BYTES_PER_WINDOW: u64 = 65_536;

/// Fee-free transaction count within one bandwidth window
pub const FEE_FREE_TXS_PER_WINDOW: u64 = 100;

/// Fee charged per transaction once the fee-free window quota is spent
pub const BANDWIDTH_FEE: Share = COIN / 10;

/// Minimum fee for creating an account
pub const ACCOUNT_CREATION_FEE: Share = COIN;

/// Total shares that will ever exist
pub const TOTAL_SUPPLY: Share = 350_000_000 * COIN;

/// Shares in circulation at genesis
pub const INIT_SUPPLY: Share = 175_000_000 * COIN;

/// Percent of the genesis emission reserve seeding the promotion pool
pub const PROMOTION_POOL_PERCENT: u32 = 10;

/// Percent of the remaining emission reserve seeding the mining pool; the
/// rest seeds the interest pool
pub const MINING_POOL_PERCENT: u32 = 75;

/// Percent of every collected fee routed to the mining fee pool; the rest
/// goes to the interest fee pool
pub const FEE_POOL_MINING_PERCENT: u32 = 50;

/// Blocks over which the genesis mining pool unlocks linearly (about ten
/// years at the block interval)
pub const EMISSION_BLOCKS: u64 = 105_120_000;

/// Blocks over which the promotion pool unlocks linearly
pub const PROMOTION_POOL_UNLOCK_BLOCKS: u64 = 105_120_000;

/// Yearly interest on vesting holdings, in percent
pub const INTEREST_APR_PERCENT: u32 = 2;

/// Seconds per interest year
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Witness price feeds fold into the feed history once per this many
/// blocks (one hour at the block interval)
pub const FEED_INTERVAL_BLOCKS: u64 = 1_200;

/// Median price entries retained in a feed history deque
pub const FEED_HISTORY_WINDOW: usize = 24;

/// Most witness votes a single account may cast
pub const MAX_WITNESS_VOTES_PER_ACCOUNT: usize = 30;

/// Account name length bounds
pub const MIN_ACCOUNT_NAME_LENGTH: usize = 3;
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 16;

/// Max bytes for a transfer memo
pub const MAX_MEMO_SIZE: usize = 2_048;

/// Max bytes for a custom json or binary payload
pub const MAX_CUSTOM_DATA_SIZE: usize = 8_192;

/// Max recipients of a single custom content operation
pub const MAX_CUSTOM_RECIPIENTS: usize = 16;

/// One lap of the virtual schedule clock. A witness advances by
/// `lap / (votes + 1)` per produced block, so heavily voted witnesses
/// accumulate virtual time slower and are scheduled more often
pub const VIRTUAL_SCHEDULE_LAP: u128 = u128::MAX >> 1;

/// Hardfork schedule: activation timestamps (unix seconds), in order.
/// Version `n + 1` activates at `HARDFORK_TIMES[n]`
pub const HARDFORK_TIMES: &[u64] = &[1_893_456_000];

const_assert!(INIT_SUPPLY <= TOTAL_SUPPLY);
const_assert!(PROMOTION_POOL_PERCENT <= 100);
const_assert!(MINING_POOL_PERCENT <= 100);
const_assert!(FEE_POOL_MINING_PERCENT <= 100);
const_assert!(BANDWIDTH_WINDOW_BLOCKS > 0);
const_assert!(WITNESSES_PER_ROUND > 0);

/// Share check
#[must_use]
pub fn share_check(amount: Share) -> bool {
    amount >= 0
}

/// `amount * numerator / denominator` with a 128-bit intermediate and
/// floor rounding. Callers validate `numerator <= denominator`; the
/// widened multiply means the product cannot overflow for any valid
/// `Share` input.
#[must_use]
pub fn split_proportional(amount: Share, numerator: u64, denominator: u64) -> Share {
    debug_assert!(denominator > 0);
    debug_assert!(numerator <= denominator);
    let wide = i128::from(amount) * i128::from(numerator) / i128::from(denominator);
    wide as Share
}

/// Percent split with the same widening rules as [`split_proportional`]
#[must_use]
pub fn percent_of(amount: Share, percent: u32) -> Share {
    split_proportional(amount, u64::from(percent), 100)
}

/// Deterministic interest over a holding and an elapsed period. Pure
/// function of its inputs; floor rounded.
#[must_use]
pub fn interest_amount(holding: Share, period_secs: u64) -> Share {
    if holding <= 0 {
        return 0;
    }

    let wide = i128::from(holding) * i128::from(period_secs) * i128::from(INTEREST_APR_PERCENT)
        / (100 * i128::from(SECONDS_PER_YEAR));
    wide as Share
}

/// Median of a set of totally ordered values. The upper-middle element is
/// taken for even counts so the result is always a member of the input.
pub fn median<T: Ord>(mut values: Vec<T>) -> Option<T> {
    if values.is_empty() {
        return None;
    }

    let mid = values.len() / 2;
    values.sort();
    Some(values.swap_remove(mid))
}
