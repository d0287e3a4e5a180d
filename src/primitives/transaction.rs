// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::*;
use crate::primitives::{AccountName, Hash256, Operation, OpValidationErr, PublicKey, Signature};
use bincode::{Decode, Encode};
use ed25519_dalek::SigningKey;
use std::collections::HashSet;

/// Unsigned transaction body. The TaPoS reference (`ref_block_num`,
/// `ref_block_prefix`) binds the transaction to a recently seen block so
/// it cannot be replayed onto a chain that never contained that block.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Transaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    /// Unix seconds. Must be in the future but within
    /// [`MAX_TIME_UNTIL_EXPIRATION`] of head block time.
    pub expiration: u64,
    pub operations: Vec<Operation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signatures: Vec<(PublicKey, Signature)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxVerifyErr {
    /// No operations
    Empty,

    /// A virtual operation arrived from the wire
    ContainsVirtualOperation,

    /// An operation failed structural validation
    Operation(OpValidationErr),

    /// Expiration is at or before head block time
    Expired,

    /// Expiration too far past head block time
    ExpirationTooFarInFuture,

    /// TaPoS reference does not match the referenced block
    TaposMismatch,

    /// Serialized size exceeds the limit
    Oversized,

    /// A signature fails verification against its claimed key
    InvalidSignature,

    /// The same key signed more than once
    DuplicateSignature,

    /// The named account's authority is not satisfied by the signer set
    MissingAuthority(AccountName),

    /// An operation names a non-existent account
    UnknownAccount(AccountName),

    /// The transaction was already included
    Duplicate,

    /// Encoding failure while computing digests
    Encode,
}

impl From<OpValidationErr> for TxVerifyErr {
    fn from(other: OpValidationErr) -> Self {
        Self::Operation(other)
    }
}

impl From<bincode::error::EncodeError> for TxVerifyErr {
    fn from(_: bincode::error::EncodeError) -> Self {
        Self::Encode
    }
}

impl SignedTransaction {
    /// Transaction id: digest of the unsigned body. Stable across
    /// signature malleation and identical on every node.
    pub fn id(&self) -> Result<Hash256, TxVerifyErr> {
        let bytes = crate::codec::encode_to_vec(&self.transaction)?;
        Ok(Hash256::hash_bytes(bytes))
    }

    /// Digest signed by every signature, domain-separated per network.
    pub fn signing_digest(&self, chain_key: &str) -> Result<Hash256, TxVerifyErr> {
        let bytes = crate::codec::encode_to_vec(&self.transaction)?;
        Ok(Hash256::hash_with_key(bytes, chain_key))
    }

    pub fn sign_with(&mut self, key: &SigningKey, chain_key: &str) -> Result<(), TxVerifyErr> {
        let digest = self.signing_digest(chain_key)?;
        let public = PublicKey::from_signing_key(key);
        let signature = Signature::sign(key, digest.as_bytes());
        self.signatures.push((public, signature));
        Ok(())
    }

    pub fn encoded_size(&self) -> Result<u64, TxVerifyErr> {
        Ok(crate::codec::encoded_size(self)?)
    }

    /// Structural validation: operation presence, per-operation checks,
    /// virtual-operation rejection, size limit.
    pub fn validate(&self) -> Result<(), TxVerifyErr> {
        if self.transaction.operations.is_empty() {
            return Err(TxVerifyErr::Empty);
        }

        for op in &self.transaction.operations {
            if op.is_virtual() {
                return Err(TxVerifyErr::ContainsVirtualOperation);
            }
            op.validate()?;
        }

        if self.encoded_size()? > MAX_TRANSACTION_SIZE {
            return Err(TxVerifyErr::Oversized);
        }

        Ok(())
    }

    /// Verify every signature against the signing digest and return the
    /// set of keys that actually signed. Authority satisfaction is
    /// checked against this set by the pipeline.
    pub fn verify_signatures(&self, chain_key: &str) -> Result<HashSet<PublicKey>, TxVerifyErr> {
        let digest = self.signing_digest(chain_key)?;
        let mut signers = HashSet::with_capacity(self.signatures.len());

        for (public, signature) in &self.signatures {
            if !signers.insert(*public) {
                return Err(TxVerifyErr::DuplicateSignature);
            }
            if !public.verify(digest.as_bytes(), signature) {
                return Err(TxVerifyErr::InvalidSignature);
            }
        }

        Ok(signers)
    }

    /// Union of required active/owner authority account names, for
    /// callers that only need the account list.
    #[must_use]
    pub fn required_authorities(&self) -> (Vec<AccountName>, Vec<AccountName>) {
        let mut active = vec![];
        let mut owner = vec![];
        for op in &self.transaction.operations {
            op.required_active_authorities(&mut active);
            op.required_owner_authorities(&mut owner);
        }
        active.dedup();
        owner.dedup();
        (active, owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{generate_keypair, TransferOperation};

    fn transfer_tx() -> SignedTransaction {
        SignedTransaction {
            transaction: Transaction {
                ref_block_num: 0,
                ref_block_prefix: 0,
                expiration: 1_000,
                operations: vec![Operation::Transfer(TransferOperation {
                    from: "alice".into(),
                    to: "bob".into(),
                    amount: 30,
                    memo: String::new(),
                })],
            },
            signatures: vec![],
        }
    }

    #[test]
    fn id_ignores_signatures() {
        let mut tx = transfer_tx();
        let before = tx.id().unwrap();
        let (sk, _) = generate_keypair();
        tx.sign_with(&sk, "test").unwrap();
        assert_eq!(tx.id().unwrap(), before);
    }

    #[test]
    fn signature_roundtrip_and_domain() {
        let mut tx = transfer_tx();
        let (sk, pk) = generate_keypair();
        tx.sign_with(&sk, "ambercoin.test").unwrap();

        let signers = tx.verify_signatures("ambercoin.test").unwrap();
        assert!(signers.contains(&pk));

        // Same signature does not verify under a different chain key
        assert_eq!(
            tx.verify_signatures("ambercoin.main"),
            Err(TxVerifyErr::InvalidSignature)
        );
    }

    #[test]
    fn duplicate_signer_rejected() {
        let mut tx = transfer_tx();
        let (sk, _) = generate_keypair();
        tx.sign_with(&sk, "test").unwrap();
        tx.sign_with(&sk, "test").unwrap();
        assert_eq!(
            tx.verify_signatures("test"),
            Err(TxVerifyErr::DuplicateSignature)
        );
    }

    #[test]
    fn empty_transaction_rejected() {
        let mut tx = transfer_tx();
        tx.transaction.operations.clear();
        assert_eq!(tx.validate(), Err(TxVerifyErr::Empty));
    }

    #[test]
    fn virtual_operation_rejected() {
        let mut tx = transfer_tx();
        tx.transaction.operations.push(Operation::ProducerReward(
            crate::primitives::ProducerRewardOperation {
                producer: "alice".into(),
                reward: 1,
            },
        ));
        assert_eq!(tx.validate(), Err(TxVerifyErr::ContainsVirtualOperation));
    }
}
