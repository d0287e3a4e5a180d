// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

pub mod bandwidth;
pub mod config;
pub mod database;
pub mod economics;
pub mod evaluator;
pub mod notifications;
pub mod objects;
pub mod pipeline;
pub mod store;
pub mod witness_schedule;

pub use config::{ChainConfig, GenesisConfig};
pub use pipeline::{Chain, ChainErr, ChainSignals, SkipFlags};
