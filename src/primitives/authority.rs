// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::PublicKey;
use bincode::{Decode, Encode};
use std::collections::HashSet;

/// Weighted-key threshold authority. A set of provided signer keys
/// satisfies the authority when their weights sum to at least the
/// threshold.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Authority {
    pub weight_threshold: u32,
    pub key_auths: Vec<(PublicKey, u16)>,
}

impl Authority {
    /// Single-key authority with threshold 1.
    #[must_use]
    pub fn single(key: PublicKey) -> Self {
        Self {
            weight_threshold: 1,
            key_auths: vec![(key, 1)],
        }
    }

    /// Structural validity: a non-zero threshold that the listed weights
    /// can actually reach, and no duplicate keys.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.weight_threshold == 0 || self.key_auths.is_empty() {
            return false;
        }

        let mut seen = HashSet::with_capacity(self.key_auths.len());
        let mut total: u64 = 0;

        for (key, weight) in &self.key_auths {
            if !seen.insert(*key) {
                return false;
            }
            total += u64::from(*weight);
        }

        total >= u64::from(self.weight_threshold)
    }

    /// An authority nothing can satisfy. Used to lock deleted accounts.
    #[must_use]
    pub fn impossible() -> Self {
        Self {
            weight_threshold: 1,
            key_auths: vec![],
        }
    }

    #[must_use]
    pub fn is_satisfied_by(&self, signers: &HashSet<PublicKey>) -> bool {
        let mut total: u64 = 0;

        for (key, weight) in &self.key_auths {
            if signers.contains(key) {
                total += u64::from(*weight);
                if total >= u64::from(self.weight_threshold) {
                    return true;
                }
            }
        }

        false
    }
}
