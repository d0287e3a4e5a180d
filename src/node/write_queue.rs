// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::{Chain, ChainErr, SkipFlags};
use crate::primitives::{AccountName, SignedBlock, SignedTransaction};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use ed25519_dalek::SigningKey;
use log::*;
use parking_lot::RwLock;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use triomphe::Arc;

/// Shared handle to the chain. Readers take the read side; every write
/// goes through the queue below, so at most one mutator touches chain
/// state at a time.
pub type PinnedChain = Arc<RwLock<Chain>>;

enum WriteRequest {
    PushBlock {
        block: SignedBlock,
        skip: SkipFlags,
        reply: Sender<Result<(), ChainErr>>,
    },
    PushTransaction {
        trx: SignedTransaction,
        skip: SkipFlags,
        reply: Sender<Result<(), ChainErr>>,
    },
    GenerateBlock {
        when: u64,
        witness: AccountName,
        signing_key: Box<SigningKey>,
        skip: SkipFlags,
        reply: Sender<Result<SignedBlock, ChainErr>>,
    },
}

/// Serialises all chain mutation onto one writer thread. Requests are
/// processed strictly in submission order; each caller blocks on a
/// reply channel until its request ran to completion, commit or full
/// rollback. There is no mid-flight cancellation.
pub struct WriteQueue {
    sender: Option<Sender<WriteRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl WriteQueue {
    /// Spawn the writer thread. `hold_time` bounds how long the thread
    /// keeps the write lock while draining queued requests before it
    /// yields to readers.
    pub fn spawn(chain: PinnedChain, hold_time: Duration) -> Self {
        let (sender, receiver) = unbounded::<WriteRequest>();

        let worker = std::thread::Builder::new()
            .name("chain-writer".to_string())
            .spawn(move || writer_loop(&chain, &receiver, hold_time))
            .expect("spawning the chain writer thread");

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Inbound boundary for blocks arriving from the network.
    pub fn accept_block(&self, block: SignedBlock, skip: SkipFlags) -> Result<(), ChainErr> {
        let (reply, response) = bounded(1);
        self.submit(WriteRequest::PushBlock { block, skip, reply });
        response.recv().expect("writer thread dropped a reply")
    }

    /// Inbound boundary for transactions arriving from the network or
    /// local RPC.
    pub fn accept_transaction(&self, trx: SignedTransaction) -> Result<(), ChainErr> {
        let (reply, response) = bounded(1);
        self.submit(WriteRequest::PushTransaction {
            trx,
            skip: SkipFlags::empty(),
            reply,
        });
        response.recv().expect("writer thread dropped a reply")
    }

    /// Produce and apply a block for a locally configured witness.
    pub fn generate_block(
        &self,
        when: u64,
        witness: AccountName,
        signing_key: SigningKey,
        skip: SkipFlags,
    ) -> Result<SignedBlock, ChainErr> {
        let (reply, response) = bounded(1);
        self.submit(WriteRequest::GenerateBlock {
            when,
            witness,
            signing_key: Box::new(signing_key),
            skip,
            reply,
        });
        response.recv().expect("writer thread dropped a reply")
    }

    fn submit(&self, request: WriteRequest) {
        self.sender
            .as_ref()
            .expect("write queue already shut down")
            .send(request)
            .expect("writer thread is not running");
    }

    /// Stop accepting requests and wait for the writer to drain what it
    /// already received.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        // Dropping the last sender disconnects the channel and ends the
        // writer loop
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn writer_loop(chain: &PinnedChain, receiver: &Receiver<WriteRequest>, hold_time: Duration) {
    while let Ok(first) = receiver.recv() {
        // Hold the write lock for at most `hold_time`, draining whatever
        // queued up behind the first request, then release it so
        // read-heavy traffic stays responsive.
        let started = Instant::now();
        let mut guard = chain.write();
        process(&mut guard, first);

        while started.elapsed() < hold_time {
            match receiver.try_recv() {
                Ok(request) => process(&mut guard, request),
                Err(_) => break,
            }
        }
    }
    debug!("chain writer loop ended");
}

fn process(chain: &mut Chain, request: WriteRequest) {
    match request {
        WriteRequest::PushBlock { block, skip, reply } => {
            let result = chain.push_block(block, skip);
            if let Err(err) = &result {
                debug!("rejected block: {err:?}");
            }
            let _ = reply.send(result);
        }
        WriteRequest::PushTransaction { trx, skip, reply } => {
            let result = chain.push_transaction(trx, skip);
            if let Err(err) = &result {
                debug!("rejected transaction: {err:?}");
            }
            let _ = reply.send(result);
        }
        WriteRequest::GenerateBlock {
            when,
            witness,
            signing_key,
            skip,
            reply,
        } => {
            let result = chain.generate_block(when, witness, &signing_key, skip);
            let _ = reply.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainConfig;
    use crate::consensus::BLOCK_INTERVAL_SECONDS;
    use crate::primitives::{generate_keypair, PublicKey};

    fn spawn_chain() -> (PinnedChain, WriteQueue, SigningKey, u64) {
        let (sk, pk) = generate_keypair();
        let config = ChainConfig::memory("wqtest", pk);
        let genesis_time = config.genesis.initial_timestamp;
        let chain = Arc::new(RwLock::new(Chain::open(config).unwrap()));
        let queue = WriteQueue::spawn(chain.clone(), Duration::from_millis(50));
        (chain, queue, sk, genesis_time)
    }

    #[test]
    fn serialises_block_generation() {
        let (chain, queue, sk, genesis_time) = spawn_chain();

        for i in 1..=3u64 {
            let when = genesis_time + i * BLOCK_INTERVAL_SECONDS;
            let block = queue
                .generate_block(when, "initminer".into(), sk.clone(), SkipFlags::empty())
                .unwrap();
            assert_eq!(block.header.number, i);
        }

        assert_eq!(chain.read().db.dgp().head_block_number, 3);
        queue.shutdown();
    }

    #[test]
    fn rejects_blocks_from_the_wrong_key() {
        let (_chain, queue, _sk, genesis_time) = spawn_chain();
        let (other_sk, _) = generate_keypair();

        let err = queue
            .generate_block(
                genesis_time + BLOCK_INTERVAL_SECONDS,
                "initminer".into(),
                other_sk,
                SkipFlags::empty(),
            )
            .unwrap_err();
        assert!(matches!(err, ChainErr::Block(_)));
        queue.shutdown();
    }

    #[test]
    fn readers_see_committed_state() {
        let (chain, queue, sk, genesis_time) = spawn_chain();
        queue
            .generate_block(
                genesis_time + BLOCK_INTERVAL_SECONDS,
                "initminer".into(),
                sk,
                SkipFlags::empty(),
            )
            .unwrap();

        let guard = chain.read();
        assert_eq!(guard.db.dgp().head_block_number, 1);
        assert_ne!(
            guard.db.find_witness("initminer").unwrap().signing_key,
            PublicKey::null()
        );
        drop(guard);
        queue.shutdown();
    }
}
