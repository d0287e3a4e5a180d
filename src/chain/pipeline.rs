// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::database::Database;
use crate::chain::economics::EconomicsErr;
use crate::chain::evaluator::{apply_operation, EvalCtx, EvalErr, InterpreterRegistry};
use crate::chain::notifications::{BlockNotification, OperationNotification, Signal};
use crate::chain::objects::FeedHistory;
use crate::chain::store::{Segment, StoreErr};
use crate::chain::ChainConfig;
use crate::consensus::*;
use crate::primitives::*;
use bitflags::bitflags;
use ed25519_dalek::SigningKey;
use log::*;
use std::collections::{BTreeSet, HashSet, VecDeque};

bitflags! {
    /// Validation steps that replay-from-log and test harnesses may
    /// bypass. An escape hatch for bulk replay performance, not a
    /// security boundary for live sync.
    pub struct SkipFlags: u32 {
        const SKIP_WITNESS_SIGNATURE      = 0b0000_0001;
        const SKIP_TRANSACTION_SIGNATURES = 0b0000_0010;
        const SKIP_AUTHORITY_CHECK        = 0b0000_0100;
        const SKIP_TAPOS_CHECK            = 0b0000_1000;
        const SKIP_EXPIRATION_CHECK       = 0b0001_0000;
        const SKIP_BLOCK_SIZE_CHECK       = 0b0010_0000;
        const SKIP_WITNESS_SCHEDULE_CHECK = 0b0100_0000;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainErr {
    Transaction(TxVerifyErr),
    Block(BlockVerifyErr),

    /// An evaluator rejected the operation at this position
    Eval { op_in_trx: u32, err: EvalErr },

    /// Bandwidth accounting could not charge the fee payer
    Bandwidth(EvalErr),

    Economics(EconomicsErr),
    Store(StoreErr),

    /// The pending queue is at capacity
    PendingQueueFull,
}

impl From<TxVerifyErr> for ChainErr {
    fn from(other: TxVerifyErr) -> Self {
        Self::Transaction(other)
    }
}

impl From<BlockVerifyErr> for ChainErr {
    fn from(other: BlockVerifyErr) -> Self {
        Self::Block(other)
    }
}

impl From<StoreErr> for ChainErr {
    fn from(other: StoreErr) -> Self {
        Self::Store(other)
    }
}

impl From<EconomicsErr> for ChainErr {
    fn from(other: EconomicsErr) -> Self {
        Self::Economics(other)
    }
}

/// Synchronous notification points, fired from the writer thread in
/// registration order.
pub struct ChainSignals {
    pub pre_apply_operation: Signal<OperationNotification>,
    pub post_apply_operation: Signal<OperationNotification>,
    pub applied_block: Signal<BlockNotification>,
    pub on_pending_transaction: Signal<SignedTransaction>,
    pub on_pre_apply_transaction: Signal<SignedTransaction>,
    pub on_applied_transaction: Signal<SignedTransaction>,
}

impl Default for ChainSignals {
    fn default() -> Self {
        Self {
            pre_apply_operation: Signal::new("pre_apply_operation"),
            post_apply_operation: Signal::new("post_apply_operation"),
            applied_block: Signal::new("applied_block"),
            on_pending_transaction: Signal::new("on_pending_transaction"),
            on_pre_apply_transaction: Signal::new("on_pre_apply_transaction"),
            on_applied_transaction: Signal::new("on_applied_transaction"),
        }
    }
}

/// The chain state machine: the database plus the block/transaction
/// application pipeline. One writer mutates it at a time (enforced by
/// the node's write queue); readers share the same lock.
pub struct Chain {
    pub db: Database,
    config: ChainConfig,
    chain_key: String,
    segment: Segment,
    pub signals: ChainSignals,
    interpreters: InterpreterRegistry,

    /// Transactions accepted but not yet included in a block, applied
    /// speculatively under the standing pending session
    pending: Vec<SignedTransaction>,
    pending_ids: HashSet<Hash256>,
    pending_session_open: bool,
}

impl Chain {
    /// Open the backing segment and either restore the persisted state
    /// or build genesis.
    pub fn open(config: ChainConfig) -> Result<Self, ChainErr> {
        let (segment, payload) = Segment::open(&config)?;
        let mut db = Database::new();

        match payload {
            Some(bytes) => {
                db.restore_snapshot(&bytes)?;
                info!(
                    "restored chain state at block {} from the backing segment",
                    db.dgp().head_block_number
                );
            }
            None => {
                db.init_genesis(&config)?;
                info!(
                    "initialised genesis state for network {}",
                    config.network_name
                );
            }
        }

        let chain_key = config.chain_key();
        Ok(Self {
            db,
            config,
            chain_key,
            segment,
            signals: ChainSignals::default(),
            interpreters: InterpreterRegistry::default(),
            pending: Vec::new(),
            pending_ids: HashSet::new(),
            pending_session_open: false,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Register a custom payload interpreter for an application id.
    /// Exactly one per id; duplicates abort, as a misconfigured plugin
    /// set must not half-run.
    pub fn set_custom_operation_interpreter(
        &mut self,
        app_id: AppId,
        handler: Box<dyn crate::chain::evaluator::CustomOperationInterpreter>,
    ) {
        self.interpreters
            .set_custom_operation_interpreter(app_id, handler);
    }

    // --- push_transaction ---------------------------------------------

    /// Validate and speculatively apply a transaction, then hold it for
    /// inclusion in a future block. Any failure rolls the state back to
    /// exactly what it was.
    pub fn push_transaction(
        &mut self,
        trx: SignedTransaction,
        skip: SkipFlags,
    ) -> Result<(), ChainErr> {
        let trx_id = trx.id()?;
        if self.pending_ids.contains(&trx_id) {
            return Err(TxVerifyErr::Duplicate.into());
        }
        if self.pending.len() >= self.config.max_pending_transactions {
            return Err(ChainErr::PendingQueueFull);
        }

        self.signals.on_pre_apply_transaction.emit(&trx);

        if !self.pending_session_open {
            self.db.start_undo_session();
            self.pending_session_open = true;
        }

        let block_num = self.db.dgp().head_block_number + 1;
        let now = self.db.dgp().time;
        let trx_in_block = self.pending.len() as u32;

        self.db.start_undo_session();
        match self.apply_transaction_inner(&trx, trx_id, block_num, trx_in_block, now, skip) {
            Ok(()) => {
                self.db.squash_session();
                self.pending_ids.insert(trx_id);
                self.pending.push(trx.clone());
                self.signals.on_pending_transaction.emit(&trx);
                self.signals.on_applied_transaction.emit(&trx);
                Ok(())
            }
            Err(err) => {
                self.db.undo_session();
                Err(err)
            }
        }
    }

    /// The shared transaction application path: structural checks,
    /// signature/authority verification, evaluator loop, history
    /// records, bandwidth accounting. Caller owns the undo session.
    fn apply_transaction_inner(
        &mut self,
        trx: &SignedTransaction,
        trx_id: Hash256,
        block_num: u64,
        trx_in_block: u32,
        now: u64,
        skip: SkipFlags,
    ) -> Result<(), ChainErr> {
        trx.validate()?;

        let head_time = self.db.dgp().time;
        if !skip.contains(SkipFlags::SKIP_EXPIRATION_CHECK) {
            if trx.transaction.expiration <= head_time {
                return Err(TxVerifyErr::Expired.into());
            }
            if trx.transaction.expiration > head_time + MAX_TIME_UNTIL_EXPIRATION {
                return Err(TxVerifyErr::ExpirationTooFarInFuture.into());
            }
        }

        if !skip.contains(SkipFlags::SKIP_TAPOS_CHECK) {
            let t = &trx.transaction;
            // (0, 0) anchors to genesis and is always accepted; anything
            // else must reference the current head block
            if t.ref_block_num != 0 || t.ref_block_prefix != 0 {
                let dgp = self.db.dgp();
                let expected_num = (dgp.head_block_number & 0xffff) as u16;
                let expected_prefix =
                    u32::from_le_bytes(dgp.head_block_id.0[0..4].try_into().unwrap());
                if t.ref_block_num != expected_num || t.ref_block_prefix != expected_prefix {
                    return Err(TxVerifyErr::TaposMismatch.into());
                }
            }
        }

        if !skip.contains(SkipFlags::SKIP_TRANSACTION_SIGNATURES) {
            let signers = trx.verify_signatures(&self.chain_key)?;

            if !skip.contains(SkipFlags::SKIP_AUTHORITY_CHECK) {
                let (active, owner) = trx.required_authorities();
                for name in owner {
                    let account = self
                        .db
                        .find_account(&name)
                        .ok_or(TxVerifyErr::UnknownAccount(name.clone()))?;
                    if !account.owner.is_satisfied_by(&signers) {
                        return Err(TxVerifyErr::MissingAuthority(name).into());
                    }
                }
                for name in active {
                    let account = self
                        .db
                        .find_account(&name)
                        .ok_or(TxVerifyErr::UnknownAccount(name.clone()))?;
                    // The owner authority subsumes active
                    if !account.active.is_satisfied_by(&signers)
                        && !account.owner.is_satisfied_by(&signers)
                    {
                        return Err(TxVerifyErr::MissingAuthority(name).into());
                    }
                }
            }
        }

        // Evaluator loop. Virtual operations synthesized by a handler are
        // recorded right after their parent operation.
        for (op_idx, op) in trx.transaction.operations.iter().enumerate() {
            let op_in_trx = op_idx as u32;
            let note = OperationNotification {
                trx_id,
                block: block_num,
                trx_in_block,
                op_in_trx,
                virtual_op: 0,
                op: op.clone(),
                fee_payer: op.fee_payer().clone(),
            };
            self.signals.pre_apply_operation.emit(&note);

            let virtual_ops = {
                let Self {
                    db,
                    config,
                    interpreters,
                    ..
                } = self;
                let mut ctx = EvalCtx {
                    db,
                    config,
                    interpreters,
                    virtual_ops: vec![],
                };
                apply_operation(&mut ctx, op).map_err(|err| ChainErr::Eval { op_in_trx, err })?;
                ctx.virtual_ops
            };

            self.db
                .push_operation_record(op, trx_id, block_num, trx_in_block, op_in_trx, 0, now)?;
            self.signals.post_apply_operation.emit(&note);

            for (v_idx, vop) in virtual_ops.into_iter().enumerate() {
                self.push_virtual_operation(
                    vop,
                    trx_id,
                    block_num,
                    trx_in_block,
                    op_in_trx,
                    v_idx as u32 + 1,
                    now,
                )?;
            }
        }

        // Bandwidth accounting. The quota is the sender's; only the
        // fallback fee is redirected to a sponsor.
        let sender = trx.transaction.operations[0].fee_payer().clone();
        let size = trx.encoded_size()?;
        match self.db.update_account_bandwidth(&sender, size, block_num)? {
            crate::chain::bandwidth::BandwidthCharge::FeeFree => {}
            crate::chain::bandwidth::BandwidthCharge::Fee(fee) => {
                let payer = self.resolve_fee_payer(&sender)?;
                crate::chain::evaluator::adjust_balance(&mut self.db, &payer, -fee)
                    .map_err(ChainErr::Bandwidth)?;
                self.db.add_fee(fee)?;
            }
        }

        Ok(())
    }

    fn resolve_fee_payer(&self, sender: &AccountName) -> Result<AccountName, ChainErr> {
        match self.db.find_account(sender) {
            Some(account) => Ok(account
                .fee_sponsor
                .clone()
                .filter(|sponsor| self.db.find_account(sponsor).is_some())
                .unwrap_or_else(|| sender.clone())),
            None => Err(ChainErr::Bandwidth(EvalErr::UnknownAccount(sender.clone()))),
        }
    }

    /// Record (and announce) a virtual operation.
    #[allow(clippy::too_many_arguments)]
    fn push_virtual_operation(
        &mut self,
        op: Operation,
        trx_id: Hash256,
        block: u64,
        trx_in_block: u32,
        op_in_trx: u32,
        virtual_op: u32,
        timestamp: u64,
    ) -> Result<(), ChainErr> {
        debug_assert!(op.is_virtual() && virtual_op > 0);
        let note = OperationNotification {
            trx_id,
            block,
            trx_in_block,
            op_in_trx,
            virtual_op,
            op: op.clone(),
            fee_payer: op.fee_payer().clone(),
        };
        self.signals.pre_apply_operation.emit(&note);
        self.db
            .push_operation_record(&op, trx_id, block, trx_in_block, op_in_trx, virtual_op, timestamp)?;
        self.signals.post_apply_operation.emit(&note);
        Ok(())
    }

    // --- push_block ----------------------------------------------------

    /// Validate and apply a block. A failing transaction rejects the
    /// whole block; the state then matches what it was before the call
    /// (with pending transactions re-applied on top).
    pub fn push_block(&mut self, block: SignedBlock, skip: SkipFlags) -> Result<(), ChainErr> {
        let block_id = block.id()?;

        if self.pending_session_open {
            self.db.undo_session();
            self.pending_session_open = false;
        }

        let result = self.apply_block(&block, block_id, skip);
        match result {
            Ok(reward) => {
                // Included transactions leave the pending queue
                let included: HashSet<Hash256> =
                    block.transactions.iter().filter_map(|t| t.id().ok()).collect();
                self.pending
                    .retain(|t| t.id().map(|id| !included.contains(&id)).unwrap_or(false));

                debug!(
                    "applied block {} ({}) with {} transactions",
                    block.header.number,
                    block_id,
                    block.transactions.len()
                );

                self.maybe_flush(block.header.number)?;

                let note = BlockNotification {
                    block: block.clone(),
                    block_id,
                    producer_reward: reward,
                };
                self.signals.applied_block.emit(&note);

                self.reapply_pending();
                Ok(())
            }
            Err(err) => {
                self.reapply_pending();
                Err(err)
            }
        }
    }

    fn apply_block(
        &mut self,
        block: &SignedBlock,
        block_id: Hash256,
        skip: SkipFlags,
    ) -> Result<Share, ChainErr> {
        {
            let dgp = self.db.dgp();
            if block.header.number != dgp.head_block_number + 1 {
                return Err(BlockVerifyErr::InvalidBlockNumber.into());
            }
            if block.header.previous != dgp.head_block_id {
                return Err(BlockVerifyErr::InvalidPrevious.into());
            }
        }

        let slot_num = self.db.get_slot_at_time(block.header.timestamp);
        if slot_num == 0 || self.db.get_slot_time(slot_num) != block.header.timestamp {
            return Err(BlockVerifyErr::InvalidTimestamp.into());
        }

        if !skip.contains(SkipFlags::SKIP_WITNESS_SCHEDULE_CHECK) {
            let scheduled = self.db.get_scheduled_witness(slot_num)?;
            if scheduled != block.header.witness {
                return Err(BlockVerifyErr::UnscheduledWitness.into());
            }
        }

        let signing_key = self
            .db
            .find_witness(&block.header.witness)
            .map(|w| w.signing_key)
            .ok_or(BlockVerifyErr::UnknownWitness)?;
        if signing_key.is_null() {
            return Err(BlockVerifyErr::UnknownWitness.into());
        }
        if !skip.contains(SkipFlags::SKIP_WITNESS_SIGNATURE) {
            block.verify_signature(&signing_key, &self.chain_key)?;
        }

        if !skip.contains(SkipFlags::SKIP_BLOCK_SIZE_CHECK)
            && block.encoded_size()? > u64::from(self.db.dgp().maximum_block_size)
        {
            return Err(BlockVerifyErr::Oversized.into());
        }

        block.validate_structure()?;

        self.db.start_undo_session();
        match self.apply_block_inner(block, block_id, slot_num, skip) {
            Ok(reward) => {
                self.db.commit_session();
                Ok(reward)
            }
            Err(err) => {
                self.db.undo_session();
                Err(err)
            }
        }
    }

    fn apply_block_inner(
        &mut self,
        block: &SignedBlock,
        block_id: Hash256,
        slot_num: u64,
        skip: SkipFlags,
    ) -> Result<Share, ChainErr> {
        let number = block.header.number;
        let when = block.header.timestamp;
        let mut block_vops: u32 = 0;

        // Witnesses of the skipped slots missed their turn
        let shutdowns = self.db.process_missed_slots(slot_num)?;
        for owner in shutdowns {
            self.db.shutdown_witness(&owner)?;
            block_vops += 1;
            self.push_virtual_operation(
                Operation::WitnessShutdown(WitnessShutdownOperation { witness: owner }),
                Hash256::zero(),
                number,
                u32::MAX,
                0,
                block_vops,
                when,
            )?;
        }

        // Transactions, each in its own nested session so a failure
        // unwinds cleanly before the whole block is rejected
        for (idx, trx) in block.transactions.iter().enumerate() {
            let trx_id = trx.id()?;
            self.db.start_undo_session();
            match self.apply_transaction_inner(trx, trx_id, number, idx as u32, when, skip) {
                Ok(()) => {
                    self.db.squash_session();
                    self.signals.on_applied_transaction.emit(trx);
                }
                Err(err) => {
                    self.db.undo_session();
                    return Err(err);
                }
            }
        }

        // Producer reward: the full per-block claim goes to the block's
        // witness
        let withdrawal = self.db.withdraw_mining_reward(number, 1, 1)?;
        if withdrawal.amount > 0 {
            crate::chain::evaluator::adjust_balance(
                &mut self.db,
                &block.header.witness,
                withdrawal.amount,
            )
            .map_err(|err| ChainErr::Eval { op_in_trx: 0, err })?;
        }
        block_vops += 1;
        self.push_virtual_operation(
            Operation::ProducerReward(ProducerRewardOperation {
                producer: block.header.witness.clone(),
                reward: withdrawal.amount,
            }),
            Hash256::zero(),
            number,
            u32::MAX,
            0,
            block_vops,
            when,
        )?;

        // Head state
        let witness_name = block.header.witness.clone();
        self.db.modify_dgp(|dgp| {
            dgp.head_block_number = number;
            dgp.head_block_id = block_id;
            dgp.time = when;
            dgp.current_witness = witness_name;
            dgp.current_aslot += slot_num;
            dgp.recent_slots_filled = if slot_num >= 128 {
                1
            } else {
                (dgp.recent_slots_filled << slot_num) | 1
            };
            dgp.participation_count = dgp.recent_slots_filled.count_ones();
        })?;
        self.db.note_block_produced(&block.header.witness, number)?;

        let circulating = {
            let econ = self.db.econ();
            econ.init_supply + econ.accumulated_supply
        };
        self.db.modify_dgp(|dgp| dgp.current_supply = circulating)?;

        // Per-block maintenance
        let swept = self.db.sweep_expired_escrows(when)?;
        if swept > 0 {
            debug!("refunded {swept} unratified escrows at block {number}");
        }
        if number % FEED_INTERVAL_BLOCKS == 0 {
            self.update_feed_medians()?;
        }
        self.process_hardforks(when, number, &mut block_vops)?;
        self.db.record_block(number, circulating)?;

        if number % WITNESSES_PER_ROUND as u64 == 0 {
            self.db.update_witness_schedule()?;
        }
        self.db.update_last_irreversible_block()?;

        Ok(withdrawal.amount)
    }

    // --- generate_block ------------------------------------------------

    /// Build, sign and apply a block for the given witness and slot
    /// time. Pending transactions that fail to apply are dropped, not
    /// fatal; the returned block has been applied locally.
    pub fn generate_block(
        &mut self,
        when: u64,
        witness: AccountName,
        signing_key: &SigningKey,
        skip: SkipFlags,
    ) -> Result<SignedBlock, ChainErr> {
        let slot_num = self.db.get_slot_at_time(when);
        if slot_num == 0 || self.db.get_slot_time(slot_num) != when {
            return Err(BlockVerifyErr::InvalidTimestamp.into());
        }
        if !skip.contains(SkipFlags::SKIP_WITNESS_SCHEDULE_CHECK) {
            let scheduled = self.db.get_scheduled_witness(slot_num)?;
            if scheduled != witness {
                return Err(BlockVerifyErr::UnscheduledWitness.into());
            }
        }
        let witness_key = self
            .db
            .find_witness(&witness)
            .map(|w| w.signing_key)
            .ok_or(BlockVerifyErr::UnknownWitness)?;
        if witness_key != PublicKey::from_signing_key(signing_key) {
            return Err(BlockVerifyErr::InvalidWitnessSignature.into());
        }

        if self.pending_session_open {
            self.db.undo_session();
            self.pending_session_open = false;
        }

        let (head_num, head_id, now) = {
            let dgp = self.db.dgp();
            (dgp.head_block_number, dgp.head_block_id, dgp.time)
        };
        let number = head_num + 1;
        let max_size = u64::from(self.db.dgp().maximum_block_size);

        // Speculatively apply the pending queue to pick the block's
        // transactions; the state change is discarded, the block is then
        // applied through the normal path.
        let mut included: Vec<SignedTransaction> = vec![];
        let mut dropped: HashSet<Hash256> = HashSet::new();
        let mut total_size: u64 = 512;

        self.db.start_undo_session();
        for trx in self.pending.clone() {
            let Ok(trx_id) = trx.id() else {
                continue;
            };
            let Ok(size) = trx.encoded_size() else {
                dropped.insert(trx_id);
                continue;
            };
            if total_size + size > max_size {
                // Leave it for a later block
                continue;
            }

            self.db.start_undo_session();
            match self.apply_transaction_inner(
                &trx,
                trx_id,
                number,
                included.len() as u32,
                when,
                skip,
            ) {
                Ok(()) => {
                    self.db.squash_session();
                    total_size += size;
                    included.push(trx);
                }
                Err(err) => {
                    self.db.undo_session();
                    debug!("dropping pending transaction {trx_id}: {err:?}");
                    dropped.insert(trx_id);
                }
            }
        }
        self.db.undo_session();

        self.pending
            .retain(|t| t.id().map(|id| !dropped.contains(&id)).unwrap_or(false));
        self.pending_ids
            .retain(|id| !dropped.contains(id));

        let mut block = SignedBlock {
            header: BlockHeader {
                previous: head_id,
                number,
                timestamp: when,
                witness,
                transaction_merkle_root: transaction_merkle_root(&included)?,
            },
            witness_signature: Signature::zero(),
            transactions: included,
        };
        block.sign(signing_key, &self.chain_key)?;

        debug_assert!(now < when);
        self.push_block(block.clone(), skip)?;
        Ok(block)
    }

    // --- pending queue maintenance ------------------------------------

    /// Re-apply the pending queue on top of the new head under a fresh
    /// pending session. Transactions that no longer apply are dropped
    /// silently.
    fn reapply_pending(&mut self) {
        assert!(
            !self.pending_session_open,
            "reapply with a pending session open"
        );

        let queued = std::mem::take(&mut self.pending);
        self.pending_ids.clear();
        if queued.is_empty() {
            return;
        }

        self.db.start_undo_session();
        self.pending_session_open = true;

        let block_num = self.db.dgp().head_block_number + 1;
        let now = self.db.dgp().time;

        for trx in queued {
            let Ok(trx_id) = trx.id() else {
                continue;
            };
            let trx_in_block = self.pending.len() as u32;
            self.db.start_undo_session();
            match self.apply_transaction_inner(&trx, trx_id, block_num, trx_in_block, now, SkipFlags::empty())
            {
                Ok(()) => {
                    self.db.squash_session();
                    self.pending_ids.insert(trx_id);
                    self.pending.push(trx);
                }
                Err(err) => {
                    self.db.undo_session();
                    debug!("pending transaction {trx_id} no longer applies: {err:?}");
                }
            }
        }
    }

    // --- per-block maintenance ----------------------------------------

    /// Fold the active witnesses' reported prices into the feed
    /// histories and refresh the window medians.
    fn update_feed_medians(&mut self) -> Result<(), ChainErr> {
        let active = self.db.schedule().current_shuffled_witnesses.clone();
        let mut symbols: BTreeSet<String> = BTreeSet::new();
        for owner in &active {
            if let Some(witness) = self.db.find_witness(owner) {
                for price in &witness.reported_prices {
                    symbols.insert(price.symbol.clone());
                }
            }
        }

        for symbol in symbols {
            let Some(round_median) = self.db.witness_feed_median(&symbol) else {
                continue;
            };

            let feed_id = match self.db.feeds.indexes.by_symbol.get(&symbol).copied() {
                Some(id) => id,
                None => {
                    let symbol = symbol.clone();
                    self.db
                        .feeds
                        .create(|id| FeedHistory {
                            id,
                            symbol: symbol.clone(),
                            current_median: None,
                            price_history: VecDeque::new(),
                        })?
                        .id
                }
            };

            self.db.feeds.modify(feed_id, |feed| {
                feed.price_history.push_back(round_median.clone());
                while feed.price_history.len() > FEED_HISTORY_WINDOW {
                    feed.price_history.pop_front();
                }
            })?;

            // Window median by quote/base ratio
            let mut rated: Vec<(i128, Price)> = self
                .db
                .feeds
                .get(feed_id)?
                .price_history
                .iter()
                .map(|p| {
                    (
                        i128::from(p.quote) * 1_000_000 / i128::from(p.base),
                        p.clone(),
                    )
                })
                .collect();
            rated.sort_by(|a, b| a.0.cmp(&b.0));
            let current = rated.swap_remove(rated.len() / 2).1;
            self.db
                .feeds
                .modify(feed_id, |feed| feed.current_median = Some(current.clone()))?;
        }

        Ok(())
    }

    /// Apply every hardfork whose activation time has arrived.
    fn process_hardforks(
        &mut self,
        when: u64,
        number: u64,
        block_vops: &mut u32,
    ) -> Result<(), ChainErr> {
        loop {
            let hf = self.db.hardfork_props();
            if hf.next_hardfork_time == 0 || when < hf.next_hardfork_time {
                return Ok(());
            }

            let version = hf.next_hardfork_version;
            let time = hf.next_hardfork_time;
            info!("applying hardfork {version} at block {number}");

            self.db.hardforks.modify(0, |h| {
                h.processed_hardforks.push(time);
                h.current_hardfork_version = version;
                match HARDFORK_TIMES.get(version as usize) {
                    Some(&next_time) => {
                        h.next_hardfork_version = version + 1;
                        h.next_hardfork_time = next_time;
                    }
                    None => {
                        h.next_hardfork_version = version;
                        h.next_hardfork_time = 0;
                    }
                }
            })?;

            *block_vops += 1;
            self.push_virtual_operation(
                Operation::HardforkApplied(HardforkAppliedOperation {
                    version,
                    timestamp: time,
                }),
                Hash256::zero(),
                number,
                u32::MAX,
                0,
                *block_vops,
                when,
            )?;
        }
    }

    /// Snapshot committed state into the backing segment at the
    /// configured interval. Runs only while no session is open, so the
    /// snapshot never contains speculative pending state.
    fn maybe_flush(&mut self, block_num: u64) -> Result<(), ChainErr> {
        if self.config.memory_only || block_num % self.config.flush_interval_blocks != 0 {
            return Ok(());
        }
        assert_eq!(
            self.db.session_depth(),
            0,
            "flush with open undo sessions"
        );

        let payload = self.db.encode_snapshot()?;
        self.segment.write_snapshot(&payload)?;
        debug!("flushed state snapshot at block {block_num}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::bandwidth::BandwidthCharge;
    use std::collections::HashMap;

    struct TestNet {
        chain: Chain,
        keys: HashMap<AccountName, SigningKey>,
    }

    impl TestNet {
        fn new(name: &str) -> Self {
            let (sk, pk) = generate_keypair();
            Self::with_key(name, sk, pk)
        }

        fn with_key(name: &str, sk: SigningKey, pk: PublicKey) -> Self {
            let chain = Chain::open(ChainConfig::memory(name, pk)).unwrap();
            let mut keys = HashMap::new();
            keys.insert("initminer".to_string(), sk);
            Self { chain, keys }
        }

        fn chain_key(&self) -> String {
            self.chain.config().chain_key()
        }

        fn tx(&self, operations: Vec<Operation>, signers: &[&str]) -> SignedTransaction {
            let mut trx = SignedTransaction {
                transaction: Transaction {
                    ref_block_num: 0,
                    ref_block_prefix: 0,
                    expiration: self.chain.db.dgp().time + 60,
                    operations,
                },
                signatures: vec![],
            };
            let chain_key = self.chain_key();
            for signer in signers {
                trx.sign_with(&self.keys[*signer], &chain_key).unwrap();
            }
            trx
        }

        fn push(&mut self, operations: Vec<Operation>, signers: &[&str]) -> Result<(), ChainErr> {
            let trx = self.tx(operations, signers);
            self.chain.push_transaction(trx, SkipFlags::empty())
        }

        /// Produce a block at the next slot assigned to a witness whose
        /// key this harness holds.
        fn produce(&mut self) -> SignedBlock {
            for slot in 1..400 {
                let (when, scheduled) = {
                    let db = &self.chain.db;
                    (
                        db.get_slot_time(slot),
                        db.get_scheduled_witness(slot).unwrap(),
                    )
                };
                let Some(key) = self.keys.get(&scheduled) else {
                    continue;
                };
                if self
                    .chain
                    .db
                    .find_witness(&scheduled)
                    .map(|w| w.signing_key.is_null())
                    .unwrap_or(true)
                {
                    continue;
                }
                let key = key.clone();
                return self
                    .chain
                    .generate_block(when, scheduled, &key, SkipFlags::empty())
                    .unwrap();
            }
            panic!("no producible slot found");
        }

        fn create_account(&mut self, name: &str, balance: Share) {
            let (sk, pk) = generate_keypair();
            self.keys.insert(name.to_string(), sk);

            let mut ops = vec![Operation::AccountCreate(AccountCreateOperation {
                fee: ACCOUNT_CREATION_FEE,
                creator: "initminer".into(),
                new_account_name: name.to_string(),
                owner: Authority::single(pk),
                active: Authority::single(pk),
                memo_key: pk,
                json_metadata: String::new(),
            })];
            if balance > 0 {
                ops.push(Operation::Transfer(TransferOperation {
                    from: "initminer".into(),
                    to: name.to_string(),
                    amount: balance,
                    memo: String::new(),
                }));
            }
            self.push(ops, &["initminer"]).unwrap();
        }

        fn balance(&self, name: &str) -> Share {
            self.chain.db.get_account(name).unwrap().balance
        }

        /// Pools + balances + vesting + escrowed + burned must equal the
        /// total supply at every committed block.
        fn assert_supply_conserved(&self) {
            let (liquid, vesting) = self.chain.db.total_account_holdings();
            let escrowed: Share = self
                .chain
                .db
                .escrows
                .iter()
                .map(|e| e.amount + e.pending_fee)
                .sum();
            let e = self.chain.db.econ();
            assert_eq!(
                liquid
                    + vesting
                    + escrowed
                    + e.mining_pool_from_coinbase
                    + e.mining_pool_from_fees
                    + e.interest_pool_from_coinbase
                    + e.interest_pool_from_fees
                    + e.promotion_pool
                    + e.burned,
                e.total_supply
            );
        }
    }

    #[test]
    fn simple_transfer_scenario() {
        let mut net = TestNet::new("transfer");
        net.create_account("alice", 100);
        net.create_account("bob", 0);
        net.produce();

        let trx = net.tx(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "bob".into(),
                amount: 30,
                memo: String::new(),
            })],
            &["alice"],
        );
        let trx_id = trx.id().unwrap();
        let trx_size = trx.encoded_size().unwrap();
        net.chain.push_transaction(trx, SkipFlags::empty()).unwrap();
        let block = net.produce();

        assert_eq!(net.balance("alice"), 70);
        assert_eq!(net.balance("bob"), 30);

        let bw = net.chain.db.find_bandwidth("alice").unwrap();
        assert_eq!(bw.total_bandwidth, trx_size);
        assert_eq!(bw.total_tx_count, 1);

        let ops = net.chain.db.get_ops_in_block(block.header.number, false);
        let transfer_record = ops
            .iter()
            .find(|o| o.trx_id == trx_id)
            .expect("transfer recorded");
        assert_eq!(transfer_record.trx_in_block, 0);
        assert_eq!(transfer_record.op_in_trx, 0);
        assert_eq!(transfer_record.virtual_op, 0);
        assert_eq!(transfer_record.fee_payer, "alice");

        net.assert_supply_conserved();
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let mut net = TestNet::new("atomicity");
        net.create_account("alice", 100);
        net.produce();

        let digest_before = net.chain.db.state_digest().unwrap();

        // Second operation fails: the whole transaction must unwind,
        // including the first operation's transfer
        let err = net
            .push(
                vec![
                    Operation::Transfer(TransferOperation {
                        from: "alice".into(),
                        to: "initminer".into(),
                        amount: 10,
                        memo: String::new(),
                    }),
                    Operation::Transfer(TransferOperation {
                        from: "alice".into(),
                        to: "initminer".into(),
                        amount: 1_000_000,
                        memo: String::new(),
                    }),
                ],
                &["alice"],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ChainErr::Eval {
                op_in_trx: 1,
                err: EvalErr::InsufficientBalance { .. }
            }
        ));

        assert_eq!(net.chain.db.state_digest().unwrap(), digest_before);
        assert_eq!(net.balance("alice"), 100);
    }

    #[test]
    fn invalid_transaction_rejects_the_whole_block() {
        let mut net = TestNet::new("blockatomic");
        net.create_account("alice", 100);
        net.produce();
        let digest_before = net.chain.db.state_digest().unwrap();

        let good = net.tx(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "initminer".into(),
                amount: 10,
                memo: String::new(),
            })],
            &["alice"],
        );
        let bad = net.tx(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "initminer".into(),
                amount: 1_000_000,
                memo: String::new(),
            })],
            &["alice"],
        );

        let when = net.chain.db.get_slot_time(1);
        let transactions = vec![good, bad];
        let mut block = SignedBlock {
            header: BlockHeader {
                previous: net.chain.db.dgp().head_block_id,
                number: net.chain.db.dgp().head_block_number + 1,
                timestamp: when,
                witness: "initminer".into(),
                transaction_merkle_root: transaction_merkle_root(&transactions).unwrap(),
            },
            witness_signature: Signature::zero(),
            transactions,
        };
        block.sign(&net.keys["initminer"].clone(), &net.chain_key()).unwrap();

        let err = net.chain.push_block(block, SkipFlags::empty()).unwrap_err();
        assert!(matches!(err, ChainErr::Eval { .. }));

        // Not even the good transaction survived
        assert_eq!(net.chain.db.state_digest().unwrap(), digest_before);
        assert_eq!(net.chain.db.dgp().head_block_number, 1);
    }

    #[test]
    fn replay_is_deterministic_across_instances() {
        let (sk, pk) = generate_keypair();
        let mut a = TestNet::with_key("replay", sk, pk);
        let mut b = Chain::open(ChainConfig::memory("replay", pk)).unwrap();

        a.create_account("alice", 5 * COIN);
        a.create_account("bob", 0);
        a.push(
            vec![Operation::TransferToVesting(TransferToVestingOperation {
                from: "alice".into(),
                to: "alice".into(),
                amount: COIN,
            })],
            &["alice"],
        )
        .unwrap();

        let mut blocks = vec![a.produce()];
        a.push(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "bob".into(),
                amount: COIN / 2,
                memo: "pay".into(),
            })],
            &["alice"],
        )
        .unwrap();
        blocks.push(a.produce());
        for _ in 0..25 {
            blocks.push(a.produce());
        }

        for block in blocks {
            b.push_block(block, SkipFlags::empty()).unwrap();
        }

        assert_eq!(
            a.chain.db.dgp().head_block_number,
            b.db.dgp().head_block_number
        );
        assert_eq!(
            a.chain.db.state_digest().unwrap(),
            b.db.state_digest().unwrap()
        );
        assert_eq!(
            a.chain.db.dgp().current_supply,
            b.db.dgp().current_supply
        );
        assert_eq!(a.chain.db.econ(), b.db.econ());
    }

    #[test]
    fn bandwidth_quota_falls_back_to_fees() {
        let mut net = TestNet::new("bwfee");
        net.create_account("alice", 10 * COIN);
        net.produce();

        // Exhaust the fee-free transaction quota directly
        let bw_id = net.chain.db.find_bandwidth("alice").unwrap().id;
        net.chain
            .db
            .bandwidth
            .modify(bw_id, |row| {
                row.act_fee_free_tx_count = FEE_FREE_TXS_PER_WINDOW;
            })
            .unwrap();

        let before = net.balance("alice");
        let fees_before = net.chain.db.econ().mining_pool_from_fees
            + net.chain.db.econ().interest_pool_from_fees;

        net.push(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "initminer".into(),
                amount: 1,
                memo: String::new(),
            })],
            &["alice"],
        )
        .unwrap();

        assert_eq!(net.balance("alice"), before - 1 - BANDWIDTH_FEE);
        let fees_after = net.chain.db.econ().mining_pool_from_fees
            + net.chain.db.econ().interest_pool_from_fees;
        assert_eq!(fees_after - fees_before, BANDWIDTH_FEE);
    }

    #[test]
    fn sponsored_fees_charge_the_sponsor() {
        let mut net = TestNet::new("sponsor");
        net.create_account("alice", COIN);
        net.create_account("patron", 10 * COIN);
        net.produce();

        net.push(
            vec![Operation::SponsorFees(SponsorFeesOperation {
                sponsor: "patron".into(),
                sponsored: "alice".into(),
                is_sponsoring: true,
            })],
            &["patron"],
        )
        .unwrap();
        net.produce();

        let bw_id = net.chain.db.find_bandwidth("alice").unwrap().id;
        net.chain
            .db
            .bandwidth
            .modify(bw_id, |row| {
                row.act_fee_free_tx_count = FEE_FREE_TXS_PER_WINDOW;
            })
            .unwrap();

        let patron_before = net.balance("patron");
        let alice_before = net.balance("alice");

        net.push(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "initminer".into(),
                amount: 1,
                memo: String::new(),
            })],
            &["alice"],
        )
        .unwrap();

        // Alice's quota was consumed, the sponsor paid the fallback fee,
        // and alice only paid the transferred amount
        assert_eq!(net.balance("alice"), alice_before - 1);
        assert_eq!(net.balance("patron"), patron_before - BANDWIDTH_FEE);
    }

    #[test]
    fn escrow_lifecycle_moves_between_index_partitions() {
        let mut net = TestNet::new("escrow");
        net.create_account("alice", 10 * COIN);
        net.create_account("bob", 0);
        net.create_account("agent", 0);
        net.produce();

        let now = net.chain.db.dgp().time;
        net.push(
            vec![Operation::EscrowTransfer(EscrowTransferOperation {
                from: "alice".into(),
                to: "bob".into(),
                agent: "agent".into(),
                escrow_id: 7,
                amount: COIN,
                fee: COIN / 10,
                ratification_deadline: now + 1_000,
                escrow_expiration: now + 2_000,
                json_meta: String::new(),
            })],
            &["alice"],
        )
        .unwrap();

        let escrow = net.chain.db.find_escrow(&"alice".to_string(), 7).unwrap();
        assert!(!escrow.is_approved());
        let escrow_oid = escrow.id;
        assert!(net
            .chain
            .db
            .escrows
            .indexes
            .by_ratification_deadline
            .contains_key(&(false, now + 1_000, escrow_oid)));

        for who in ["bob", "agent"] {
            net.push(
                vec![Operation::EscrowApprove(EscrowApproveOperation {
                    from: "alice".into(),
                    to: "bob".into(),
                    agent: "agent".into(),
                    who: who.into(),
                    escrow_id: 7,
                    approve: true,
                })],
                &[who],
            )
            .unwrap();
        }

        // Fully approved: moved to the approved partition, agent fee paid
        let escrow = net.chain.db.find_escrow(&"alice".to_string(), 7).unwrap();
        assert!(escrow.is_approved());
        assert_eq!(escrow.pending_fee, 0);
        assert!(net
            .chain
            .db
            .escrows
            .indexes
            .by_ratification_deadline
            .contains_key(&(true, now + 1_000, escrow_oid)));
        assert_eq!(net.balance("agent"), COIN / 10);

        net.push(
            vec![Operation::EscrowRelease(EscrowReleaseOperation {
                from: "alice".into(),
                to: "bob".into(),
                agent: "agent".into(),
                who: "alice".into(),
                receiver: "bob".into(),
                escrow_id: 7,
                amount: COIN,
            })],
            &["alice"],
        )
        .unwrap();

        assert!(net.chain.db.find_escrow(&"alice".to_string(), 7).is_none());
        assert!(net.chain.db.escrows.is_empty());
        assert!(net.chain.db.escrows.indexes.by_ratification_deadline.is_empty());
        assert_eq!(net.balance("bob"), COIN);

        net.produce();
        net.assert_supply_conserved();
    }

    #[test]
    fn expired_unratified_escrow_is_refunded() {
        let mut net = TestNet::new("escrowsweep");
        net.create_account("alice", 10 * COIN);
        net.create_account("bob", 0);
        net.create_account("agent", 0);
        net.produce();

        let now = net.chain.db.dgp().time;
        let deadline = now + BLOCK_INTERVAL_SECONDS;
        net.push(
            vec![Operation::EscrowTransfer(EscrowTransferOperation {
                from: "alice".into(),
                to: "bob".into(),
                agent: "agent".into(),
                escrow_id: 1,
                amount: COIN,
                fee: COIN / 10,
                ratification_deadline: deadline,
                escrow_expiration: deadline + 1_000,
                json_meta: String::new(),
            })],
            &["alice"],
        )
        .unwrap();
        let balance_during = net.balance("alice");

        // The next block lands at the deadline; the sweep refunds
        net.produce();
        assert!(net.chain.db.find_escrow(&"alice".to_string(), 1).is_none());
        assert_eq!(net.balance("alice"), balance_during + COIN + COIN / 10);
        net.assert_supply_conserved();
    }

    #[test]
    fn custom_content_pagination() {
        let mut net = TestNet::new("content");
        net.create_account("alice", COIN);
        net.create_account("bob", 0);
        net.produce();

        for i in 1..=3 {
            net.push(
                vec![Operation::CustomJson(CustomJsonOperation {
                    app_id: 7,
                    sender: "alice".into(),
                    recipients: vec!["bob".into()],
                    json: format!(r#"{{"n":{i}}}"#),
                })],
                &["alice"],
            )
            .unwrap();
        }
        net.produce();

        let page = net
            .chain
            .db
            .get_content_by_sender(7, &"alice".to_string(), 3, 2);
        let seqs: Vec<u64> = page.iter().map(|c| c.sender_sequence).collect();
        assert_eq!(seqs, vec![3, 2]);

        let all = net
            .chain
            .db
            .get_content_by_recipient(7, &"bob".to_string(), u64::MAX, 10);
        let seqs: Vec<u64> = all
            .iter()
            .map(|c| c.recipient_sequences[0].1)
            .collect();
        assert_eq!(seqs, vec![3, 2, 1]);
    }

    #[test]
    fn inert_custom_content_and_interpreter_veto() {
        struct Rejecting;
        impl crate::chain::evaluator::CustomOperationInterpreter for Rejecting {
            fn apply_json(&self, op: &CustomJsonOperation) -> Result<(), String> {
                if op.json.contains("bad") {
                    Err("rejected payload".to_string())
                } else {
                    Ok(())
                }
            }
            fn apply_binary(&self, _op: &CustomBinaryOperation) -> Result<(), String> {
                Ok(())
            }
        }

        let mut net = TestNet::new("interp");
        net.create_account("alice", COIN);
        net.produce();
        net.chain
            .set_custom_operation_interpreter(9, Box::new(Rejecting));

        // Unregistered app id: stored inert
        net.push(
            vec![Operation::CustomJson(CustomJsonOperation {
                app_id: 5,
                sender: "alice".into(),
                recipients: vec![],
                json: r#"{"anything":true}"#.into(),
            })],
            &["alice"],
        )
        .unwrap();

        // Registered interpreter accepts
        net.push(
            vec![Operation::CustomJson(CustomJsonOperation {
                app_id: 9,
                sender: "alice".into(),
                recipients: vec![],
                json: r#"{"ok":1}"#.into(),
            })],
            &["alice"],
        )
        .unwrap();

        // Registered interpreter rejects: whole transaction fails and
        // nothing is stored
        let before = net
            .chain
            .db
            .get_content_by_sender(9, &"alice".to_string(), u64::MAX, 10)
            .len();
        let err = net
            .push(
                vec![Operation::CustomJson(CustomJsonOperation {
                    app_id: 9,
                    sender: "alice".into(),
                    recipients: vec![],
                    json: r#"{"bad":1}"#.into(),
                })],
                &["alice"],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ChainErr::Eval {
                err: EvalErr::Interpreter(_),
                ..
            }
        ));
        assert_eq!(
            net.chain
                .db
                .get_content_by_sender(9, &"alice".to_string(), u64::MAX, 10)
                .len(),
            before
        );
    }

    #[test]
    fn vesting_pays_interest_on_touch() {
        let mut net = TestNet::new("interest");
        net.create_account("alice", 2_000_000 * COIN);
        net.produce();

        net.push(
            vec![Operation::TransferToVesting(TransferToVestingOperation {
                from: "alice".into(),
                to: "alice".into(),
                amount: 1_000_000 * COIN,
            })],
            &["alice"],
        )
        .unwrap();
        net.produce();

        // Let time pass on-chain, then touch the vesting balance
        for _ in 0..10 {
            net.produce();
        }

        let balance_before = net.balance("alice");
        net.push(
            vec![Operation::WithdrawVesting(WithdrawVestingOperation {
                account: "alice".into(),
                vesting_shares: COIN,
            })],
            &["alice"],
        )
        .unwrap();
        let block = net.produce();

        let account = net.chain.db.get_account("alice").unwrap();
        let elapsed_interest = net.balance("alice") - balance_before - COIN;
        assert!(elapsed_interest > 0, "interest was paid");
        assert_eq!(account.last_interest_payment, net.chain.db.dgp().time - BLOCK_INTERVAL_SECONDS);

        let virtual_ops = net.chain.db.get_ops_in_block(block.header.number, true);
        assert!(virtual_ops.iter().any(|op| {
            crate::codec::decode::<Operation>(&op.serialized_op)
                .map(|o| matches!(o, Operation::InterestPaid(_)))
                .unwrap_or(false)
        }));

        net.assert_supply_conserved();
    }

    #[test]
    fn producer_reward_is_recorded_and_paid() {
        let mut net = TestNet::new("reward");
        let supply_before = net.chain.db.dgp().current_supply;
        let block = net.produce();

        let reward = net.chain.db.find_account("initminer").unwrap().balance
            - net.chain.config().genesis.init_supply;
        assert!(reward > 0);
        assert_eq!(
            net.chain.db.dgp().current_supply,
            supply_before + reward
        );

        let virtual_ops = net.chain.db.get_ops_in_block(block.header.number, true);
        assert!(virtual_ops.iter().any(|op| {
            crate::codec::decode::<Operation>(&op.serialized_op)
                .map(|o| matches!(o, Operation::ProducerReward(_)))
                .unwrap_or(false)
        }));
        net.assert_supply_conserved();
    }

    #[test]
    fn duplicate_pending_transaction_is_rejected() {
        let mut net = TestNet::new("dup");
        net.create_account("alice", COIN);
        let trx = net.tx(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "initminer".into(),
                amount: 1,
                memo: String::new(),
            })],
            &["alice"],
        );

        net.chain
            .push_transaction(trx.clone(), SkipFlags::empty())
            .unwrap();
        let err = net
            .chain
            .push_transaction(trx, SkipFlags::empty())
            .unwrap_err();
        assert_eq!(err, ChainErr::Transaction(TxVerifyErr::Duplicate));
    }

    #[test]
    fn unsigned_transaction_is_rejected_unless_skipped() {
        let mut net = TestNet::new("sigskip");
        net.create_account("alice", COIN);
        net.produce();

        let mut trx = net.tx(
            vec![Operation::Transfer(TransferOperation {
                from: "alice".into(),
                to: "initminer".into(),
                amount: 1,
                memo: String::new(),
            })],
            &[],
        );
        let err = net
            .chain
            .push_transaction(trx.clone(), SkipFlags::empty())
            .unwrap_err();
        assert_eq!(
            err,
            ChainErr::Transaction(TxVerifyErr::MissingAuthority("alice".to_string()))
        );

        // The replay escape hatch bypasses signature and authority checks
        trx.transaction.expiration += 1;
        net.chain
            .push_transaction(
                trx,
                SkipFlags::SKIP_TRANSACTION_SIGNATURES | SkipFlags::SKIP_AUTHORITY_CHECK,
            )
            .unwrap();
    }

    #[test]
    fn state_survives_a_restart_through_the_segment() {
        let (sk, pk) = generate_keypair();
        let mut config = ChainConfig::new("restart");
        let mut dir = std::env::temp_dir();
        dir.push(format!("ambercoin-restart-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        config.data_dir = dir.clone();
        config.segment_initial_bytes = 8 * 1024 * 1024;
        config.flush_interval_blocks = 1;
        config.genesis.initial_signing_key = pk;

        let digest = {
            let mut net = TestNet {
                chain: Chain::open(config.clone()).unwrap(),
                keys: HashMap::from([("initminer".to_string(), sk)]),
            };
            net.create_account("alice", COIN);
            net.produce();
            net.produce();
            net.chain.db.state_digest().unwrap()
        };

        let reopened = Chain::open(config).unwrap();
        assert_eq!(reopened.db.dgp().head_block_number, 2);
        assert_eq!(reopened.db.state_digest().unwrap(), digest);
        assert!(reopened.db.find_account("alice").is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn witness_registration_and_voting_shapes_schedule() {
        let mut net = TestNet::new("witness");
        net.create_account("carol", 10 * COIN);
        let (wsk, wpk) = generate_keypair();
        net.keys.insert("wally".to_string(), wsk);
        net.create_account("wally", COIN);

        net.push(
            vec![
                Operation::WitnessUpdate(WitnessUpdateOperation {
                    owner: "wally".into(),
                    url: "https://wally.example".into(),
                    block_signing_key: wpk,
                    props: Default::default(),
                }),
                Operation::TransferToVesting(TransferToVestingOperation {
                    from: "carol".into(),
                    to: "carol".into(),
                    amount: 5 * COIN,
                }),
            ],
            &["wally", "carol"],
        )
        .unwrap();
        net.push(
            vec![Operation::AccountWitnessVote(AccountWitnessVoteOperation {
                account: "carol".into(),
                witness: "wally".into(),
                approve: true,
            })],
            &["carol"],
        )
        .unwrap();

        // Cross the next round boundary so the schedule recomputes
        for _ in 0..WITNESSES_PER_ROUND {
            net.produce();
        }

        assert_eq!(
            net.chain.db.find_witness("wally").unwrap().votes,
            5 * COIN
        );
        assert!(net
            .chain
            .db
            .schedule()
            .current_shuffled_witnesses
            .contains(&"wally".to_string()));
    }
}
