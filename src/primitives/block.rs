// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{
    AccountName, Hash256, PublicKey, Signature, SignedTransaction, TxVerifyErr,
};
use bincode::{Decode, Encode};
use ed25519_dalek::SigningKey;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockHeader {
    pub previous: Hash256,
    pub number: u64,
    /// Unix seconds, always a multiple of the block interval past genesis
    pub timestamp: u64,
    pub witness: AccountName,
    pub transaction_merkle_root: Hash256,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub witness_signature: Signature,
    pub transactions: Vec<SignedTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockVerifyErr {
    /// `previous` does not name the current head block
    InvalidPrevious,

    /// Block number is not head + 1
    InvalidBlockNumber,

    /// Timestamp is not a valid future slot, or is in the future beyond
    /// tolerance
    InvalidTimestamp,

    /// Witness is not the one scheduled for the block's slot
    UnscheduledWitness,

    /// The scheduled witness does not exist or has shut down
    UnknownWitness,

    /// Signature check against the witness signing key failed
    InvalidWitnessSignature,

    /// Merkle root does not match the transactions
    InvalidMerkleRoot,

    /// Encoded size exceeds the voted maximum block size
    Oversized,

    /// A contained transaction failed validation
    Transaction(TxVerifyErr),

    /// Encoding failure while computing digests
    Encode,
}

impl From<TxVerifyErr> for BlockVerifyErr {
    fn from(other: TxVerifyErr) -> Self {
        Self::Transaction(other)
    }
}

impl From<bincode::error::EncodeError> for BlockVerifyErr {
    fn from(_: bincode::error::EncodeError) -> Self {
        Self::Encode
    }
}

impl BlockHeader {
    /// Block id: digest of the header. The header commits to the
    /// transaction set through the merkle root.
    pub fn id(&self) -> Result<Hash256, BlockVerifyErr> {
        let bytes = crate::codec::encode_to_vec(self)?;
        Ok(Hash256::hash_bytes(bytes))
    }

    pub fn signing_digest(&self, chain_key: &str) -> Result<Hash256, BlockVerifyErr> {
        let bytes = crate::codec::encode_to_vec(self)?;
        Ok(Hash256::hash_with_key(bytes, chain_key))
    }
}

/// Merkle root over transaction ids. Odd levels promote the unpaired
/// node; an empty set commits to the zero hash.
pub fn transaction_merkle_root(
    transactions: &[SignedTransaction],
) -> Result<Hash256, BlockVerifyErr> {
    let mut layer: Vec<Hash256> = Vec::with_capacity(transactions.len());
    for tx in transactions {
        layer.push(tx.id()?);
    }

    if layer.is_empty() {
        return Ok(Hash256::zero());
    }

    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2 + 1);
        for pair in layer.chunks(2) {
            if pair.len() == 2 {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(pair[0].as_bytes());
                buf[32..].copy_from_slice(pair[1].as_bytes());
                next.push(Hash256::hash_bytes(buf));
            } else {
                next.push(pair[0]);
            }
        }
        layer = next;
    }

    Ok(layer[0])
}

impl SignedBlock {
    pub fn id(&self) -> Result<Hash256, BlockVerifyErr> {
        self.header.id()
    }

    pub fn sign(&mut self, key: &SigningKey, chain_key: &str) -> Result<(), BlockVerifyErr> {
        let digest = self.header.signing_digest(chain_key)?;
        self.witness_signature = Signature::sign(key, digest.as_bytes());
        Ok(())
    }

    pub fn verify_signature(
        &self,
        signing_key: &PublicKey,
        chain_key: &str,
    ) -> Result<(), BlockVerifyErr> {
        let digest = self.header.signing_digest(chain_key)?;
        if signing_key.verify(digest.as_bytes(), &self.witness_signature) {
            Ok(())
        } else {
            Err(BlockVerifyErr::InvalidWitnessSignature)
        }
    }

    /// Structure-only checks: merkle commitment and per-transaction
    /// validation. Chain-context checks (previous id, slot, schedule)
    /// live in the pipeline.
    pub fn validate_structure(&self) -> Result<(), BlockVerifyErr> {
        if transaction_merkle_root(&self.transactions)? != self.header.transaction_merkle_root {
            return Err(BlockVerifyErr::InvalidMerkleRoot);
        }

        for tx in &self.transactions {
            tx.validate()?;
        }

        Ok(())
    }

    pub fn encoded_size(&self) -> Result<u64, BlockVerifyErr> {
        Ok(crate::codec::encoded_size(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{generate_keypair, Operation, Transaction, TransferOperation};

    fn tx(amount: i64) -> SignedTransaction {
        SignedTransaction {
            transaction: Transaction {
                ref_block_num: 0,
                ref_block_prefix: 0,
                expiration: 1_000,
                operations: vec![Operation::Transfer(TransferOperation {
                    from: "alice".into(),
                    to: "bob".into(),
                    amount,
                    memo: String::new(),
                })],
            },
            signatures: vec![],
        }
    }

    #[test]
    fn merkle_root_shapes() {
        assert_eq!(transaction_merkle_root(&[]).unwrap(), Hash256::zero());

        let single = transaction_merkle_root(&[tx(1)]).unwrap();
        assert_eq!(single, tx(1).id().unwrap());

        let two = transaction_merkle_root(&[tx(1), tx(2)]).unwrap();
        let three = transaction_merkle_root(&[tx(1), tx(2), tx(3)]).unwrap();
        assert_ne!(two, three);
        assert_ne!(two, single);
    }

    #[test]
    fn block_sign_verify() {
        let (sk, pk) = generate_keypair();
        let transactions = vec![tx(1)];
        let mut block = SignedBlock {
            header: BlockHeader {
                previous: Hash256::zero(),
                number: 1,
                timestamp: 3,
                witness: "initminer".into(),
                transaction_merkle_root: transaction_merkle_root(&transactions).unwrap(),
            },
            witness_signature: Signature::zero(),
            transactions,
        };

        block.sign(&sk, "test").unwrap();
        assert!(block.verify_signature(&pk, "test").is_ok());
        assert!(block.validate_structure().is_ok());

        let (_, other) = generate_keypair();
        assert_eq!(
            block.verify_signature(&other, "test"),
            Err(BlockVerifyErr::InvalidWitnessSignature)
        );

        block.header.transaction_merkle_root = Hash256::zero();
        assert_eq!(
            block.validate_structure(),
            Err(BlockVerifyErr::InvalidMerkleRoot)
        );
    }
}
