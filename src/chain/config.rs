// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::*;
use crate::primitives::{AccountName, PublicKey};
use std::path::PathBuf;

/// Everything the chain core needs at construction. Passed explicitly so
/// several chain instances can coexist in one process; the core reads no
/// global configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub network_name: String,

    /// Directory holding the backing segment
    pub data_dir: PathBuf,

    /// Keep all state in anonymous memory; nothing is persisted
    pub memory_only: bool,

    /// Initial size of the backing segment in bytes
    pub segment_initial_bytes: u64,

    /// Grow the segment on demand instead of failing with out-of-space
    pub segment_autoscale: bool,

    /// Growth factor in percent applied per resize (at least the needed
    /// capacity is always reached)
    pub segment_scale_percent: u64,

    /// Snapshot the state to the segment every `n` blocks
    pub flush_interval_blocks: u64,

    /// How long a single writer may hold the write lock before yielding
    pub write_lock_hold_time_ms: u64,

    /// Cap on the pending transaction queue
    pub max_pending_transactions: usize,

    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone)]
pub struct GenesisConfig {
    pub init_supply: Share,
    pub total_supply: Share,
    /// The genesis authority account; also the only witness at genesis
    pub initial_witness: AccountName,
    pub initial_signing_key: PublicKey,
    /// Unix seconds of the genesis state; block 1 lands one interval
    /// after it
    pub initial_timestamp: u64,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            init_supply: INIT_SUPPLY,
            total_supply: TOTAL_SUPPLY,
            initial_witness: "initminer".to_string(),
            initial_signing_key: PublicKey::null(),
            initial_timestamp: 1_700_000_000,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::new("testnet")
    }
}

impl ChainConfig {
    pub fn new(network_name: &str) -> Self {
        Self {
            network_name: network_name.to_string(),
            data_dir: PathBuf::from("."),
            memory_only: false,
            segment_initial_bytes: 256 * 1024 * 1024,
            segment_autoscale: true,
            segment_scale_percent: 150,
            flush_interval_blocks: 1_000,
            write_lock_hold_time_ms: 500,
            max_pending_transactions: 4_096,
            genesis: GenesisConfig::default(),
        }
    }

    /// In-memory configuration with the given genesis signing key. The
    /// replay-determinism and pipeline tests run two of these side by
    /// side.
    pub fn memory(network_name: &str, initial_signing_key: PublicKey) -> Self {
        let mut config = Self::new(network_name);
        config.memory_only = true;
        config.segment_initial_bytes = 8 * 1024 * 1024;
        config.genesis.initial_signing_key = initial_signing_key;
        config
    }

    /// Domain-separation key for transaction and block digests.
    #[must_use]
    pub fn chain_key(&self) -> String {
        format!("{}.chain", self.network_name)
    }

    #[must_use]
    pub fn segment_path(&self) -> PathBuf {
        let mut path = self.data_dir.clone();
        path.push(format!("{}.state", self.network_name));
        path
    }
}
