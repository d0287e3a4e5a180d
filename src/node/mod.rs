// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

pub mod write_queue;

pub use write_queue::{PinnedChain, WriteQueue};
