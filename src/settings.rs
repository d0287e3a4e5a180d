// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::ChainConfig;
use crate::primitives::PublicKey;
use config::{Config, ConfigError, Environment, File};
use lazy_static::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::fs::{metadata, File as FsFile};
use std::io::Write;
use std::path::PathBuf;

lazy_static! {
    pub static ref SETTINGS: Settings = Settings::new().unwrap();
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Node settings.
    pub node: Node,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    /// Network instance this node follows
    pub network_name: String,

    /// Data directory. Empty means the platform default
    pub data_dir: String,

    /// Run without a backing file; state is lost on exit
    pub memory_only: bool,

    /// Initial backing segment size in megabytes
    pub db_size_mb: u64,

    /// Grow the segment on demand instead of refusing writes
    pub db_autoscale: bool,

    /// Growth factor in percent per resize
    pub db_scale_percent: u64,

    /// Blocks between state snapshots
    pub flush_interval_blocks: u64,

    /// Milliseconds a writer may hold the write lock before yielding
    pub write_lock_hold_time_ms: u64,

    /// Pending transaction queue cap
    pub max_pending_transactions: usize,

    /// Produce blocks for this witness account, if set
    pub witness: Option<String>,

    /// Hex-encoded signing key for the witness account
    pub witness_signing_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node: Node {
                network_name: "testnet".to_string(),
                data_dir: String::new(),
                memory_only: false,
                db_size_mb: 256,
                db_autoscale: true,
                db_scale_percent: 150,
                flush_interval_blocks: 1_000,
                write_lock_hold_time_ms: 500,
                max_pending_transactions: 4_096,
                witness: None,
                witness_signing_key: None,
            },
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut config_path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_path.push("Ambercoin");
        config_path.push("config.toml");

        let default_settings = Settings::default();
        if metadata(&config_path).is_err() {
            // Write the default configuration so the operator has a file
            // to edit; fall back to env vars if the write fails
            if let Some(parent) = config_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let settings_str = toml::ser::to_string_pretty(&default_settings).unwrap();
            match FsFile::create(&config_path) {
                Ok(mut file) => {
                    file.write_all(settings_str.as_bytes()).unwrap_or(());
                }
                Err(err) => {
                    error!("Failed to create configuration! Reason: {err:#?}");
                }
            }
        }

        let s = Config::builder()
            .add_source(File::with_name(&config_path.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("ambercoin").separator("_"))
            .set_default("node.network_name", default_settings.node.network_name)?
            .set_default("node.data_dir", default_settings.node.data_dir)?
            .set_default("node.memory_only", default_settings.node.memory_only)?
            .set_default("node.db_size_mb", default_settings.node.db_size_mb)?
            .set_default("node.db_autoscale", default_settings.node.db_autoscale)?
            .set_default("node.db_scale_percent", default_settings.node.db_scale_percent)?
            .set_default(
                "node.flush_interval_blocks",
                default_settings.node.flush_interval_blocks,
            )?
            .set_default(
                "node.write_lock_hold_time_ms",
                default_settings.node.write_lock_hold_time_ms,
            )?
            .set_default(
                "node.max_pending_transactions",
                default_settings.node.max_pending_transactions as u64,
            )?
            .build()?;

        s.try_deserialize()
    }

    /// The explicit chain configuration handed to the core. The core
    /// never reads `SETTINGS` itself.
    pub fn chain_config(&self) -> ChainConfig {
        let mut config = ChainConfig::new(&self.node.network_name);
        config.memory_only = self.node.memory_only;
        config.segment_initial_bytes = self.node.db_size_mb * 1024 * 1024;
        config.segment_autoscale = self.node.db_autoscale;
        config.segment_scale_percent = self.node.db_scale_percent.max(101);
        config.flush_interval_blocks = self.node.flush_interval_blocks.max(1);
        config.write_lock_hold_time_ms = self.node.write_lock_hold_time_ms;
        config.max_pending_transactions = self.node.max_pending_transactions;

        config.data_dir = if self.node.data_dir.is_empty() {
            let mut dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
            dir.push("Ambercoin");
            dir
        } else {
            PathBuf::from(&self.node.data_dir)
        };

        config
    }

    /// Witness signing key parsed from the settings file, if configured.
    pub fn witness_signing_key(&self) -> Option<(String, ed25519_dalek::SigningKey)> {
        let witness = self.node.witness.clone()?;
        let hex_key = self.node.witness_signing_key.as_ref()?;
        let bytes = hex::decode(hex_key).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some((witness, ed25519_dalek::SigningKey::from_bytes(&bytes)))
    }

    /// Public key for the configured witness, if any.
    pub fn witness_public_key(&self) -> Option<PublicKey> {
        self.witness_signing_key()
            .map(|(_, sk)| PublicKey::from_signing_key(&sk))
    }
}
