// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use bincode::{Decode, Encode};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;

/// Ed25519 public key carried as raw bytes in chain state and operations.
/// Parsed into a dalek key only at verification time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct PublicKey(pub [u8; 32]);

/// Detached ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Signature(pub [u8; 64]);

impl PublicKey {
    #[must_use]
    pub fn from_signing_key(key: &SigningKey) -> Self {
        Self(key.verifying_key().to_bytes())
    }

    /// The null key marks a shut-down witness. It is not a valid curve
    /// point and never verifies.
    #[must_use]
    pub fn null() -> Self {
        Self([0; 32])
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == [0; 32]
    }

    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify_strict(message, &sig).is_ok()
    }
}

impl Signature {
    #[must_use]
    pub fn sign(key: &SigningKey, message: &[u8]) -> Self {
        Self(key.sign(message).to_bytes())
    }

    #[must_use]
    pub fn zero() -> Self {
        Self([0; 64])
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::zero()
    }
}

/// Fresh random keypair. Test harnesses and the wallet boundary use this;
/// consensus code never generates keys.
#[must_use]
pub fn generate_keypair() -> (SigningKey, PublicKey) {
    let signing = SigningKey::generate(&mut OsRng);
    let public = PublicKey::from_signing_key(&signing);
    (signing, public)
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}
