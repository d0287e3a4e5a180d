// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::economics::EconomicModel;
use crate::chain::objects::*;
use crate::chain::store::{ObjectId, StoreErr, Table};
use crate::chain::ChainConfig;
use crate::consensus::*;
use crate::primitives::{
    AccountName, AppId, Authority, Hash256, Operation, Price,
};
use bincode::{Decode, Encode};

/// Every typed table of the chain, plus the session bookkeeping that
/// fans undo layers out across them. All mutation of chain state goes
/// through the tables held here, inside a session opened by the
/// pipeline.
pub struct Database {
    pub accounts: Table<Account, AccountIndexes>,
    pub bandwidth: Table<AccountBandwidth, BandwidthIndexes>,
    pub globals: Table<DynamicGlobalProperties, NoIndexes>,
    pub hardforks: Table<HardforkProperties, NoIndexes>,
    pub economics: Table<EconomicModel, NoIndexes>,
    pub escrows: Table<Escrow, EscrowIndexes>,
    pub feeds: Table<FeedHistory, FeedIndexes>,
    pub contents: Table<CustomContent, ContentIndexes>,
    pub operations: Table<OperationObject, OperationIndexes>,
    pub account_history: Table<AccountHistory, AccountHistoryIndexes>,
    pub applications: Table<Application, ApplicationIndexes>,
    pub application_buyings: Table<ApplicationBuying, ApplicationBuyingIndexes>,
    pub witnesses: Table<Witness, WitnessIndexes>,
    pub witness_schedules: Table<WitnessSchedule, NoIndexes>,

    session_depth: usize,
}

/// Applies an expression to every table in a fixed order. The order is
/// part of the state digest and snapshot layout.
macro_rules! each_table {
    ($self:ident, $t:ident => $body:expr) => {{
        {
            let $t = &mut $self.accounts;
            $body;
        }
        {
            let $t = &mut $self.bandwidth;
            $body;
        }
        {
            let $t = &mut $self.globals;
            $body;
        }
        {
            let $t = &mut $self.hardforks;
            $body;
        }
        {
            let $t = &mut $self.economics;
            $body;
        }
        {
            let $t = &mut $self.escrows;
            $body;
        }
        {
            let $t = &mut $self.feeds;
            $body;
        }
        {
            let $t = &mut $self.contents;
            $body;
        }
        {
            let $t = &mut $self.operations;
            $body;
        }
        {
            let $t = &mut $self.account_history;
            $body;
        }
        {
            let $t = &mut $self.applications;
            $body;
        }
        {
            let $t = &mut $self.application_buyings;
            $body;
        }
        {
            let $t = &mut $self.witnesses;
            $body;
        }
        {
            let $t = &mut $self.witness_schedules;
            $body;
        }
    }};
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Table::new(),
            bandwidth: Table::new(),
            globals: Table::new(),
            hardforks: Table::new(),
            economics: Table::new(),
            escrows: Table::new(),
            feeds: Table::new(),
            contents: Table::new(),
            operations: Table::new(),
            account_history: Table::new(),
            applications: Table::new(),
            application_buyings: Table::new(),
            witnesses: Table::new(),
            witness_schedules: Table::new(),
            session_depth: 0,
        }
    }

    // --- sessions ------------------------------------------------------

    /// Open a nested undo session across every table. Sessions nest: a
    /// block-level session contains per-transaction sessions.
    pub fn start_undo_session(&mut self) {
        self.session_depth += 1;
        each_table!(self, t => t.push_layer());
    }

    /// Roll back the innermost open session.
    pub fn undo_session(&mut self) {
        assert!(self.session_depth > 0, "undo without an open session");
        self.session_depth -= 1;
        each_table!(self, t => t.undo_layer());
    }

    /// Merge the innermost session into its parent.
    pub fn squash_session(&mut self) {
        assert!(self.session_depth > 1, "squash requires a parent session");
        self.session_depth -= 1;
        each_table!(self, t => t.squash_layer());
    }

    /// Make the outermost session permanent.
    pub fn commit_session(&mut self) {
        assert!(self.session_depth > 0, "commit without an open session");
        self.session_depth -= 1;
        each_table!(self, t => t.commit_layer());
    }

    #[must_use]
    pub fn session_depth(&self) -> usize {
        self.session_depth
    }

    // --- singletons ----------------------------------------------------

    #[must_use]
    pub fn dgp(&self) -> &DynamicGlobalProperties {
        self.globals
            .find(0)
            .expect("dynamic global properties missing; state is corrupt")
    }

    pub fn modify_dgp(
        &mut self,
        f: impl FnOnce(&mut DynamicGlobalProperties),
    ) -> Result<(), StoreErr> {
        self.globals.modify(0, f)
    }

    #[must_use]
    pub fn econ(&self) -> &EconomicModel {
        self.economics
            .find(0)
            .expect("economic model missing; state is corrupt")
    }

    #[must_use]
    pub fn hardfork_props(&self) -> &HardforkProperties {
        self.hardforks
            .find(0)
            .expect("hardfork properties missing; state is corrupt")
    }

    #[must_use]
    pub fn schedule(&self) -> &WitnessSchedule {
        self.witness_schedules
            .find(0)
            .expect("witness schedule missing; state is corrupt")
    }

    // --- typed lookups -------------------------------------------------

    #[must_use]
    pub fn find_account(&self, name: &str) -> Option<&Account> {
        let id = *self.accounts.indexes.by_name.get(name)?;
        self.accounts.find(id)
    }

    pub fn get_account(&self, name: &str) -> Result<&Account, StoreErr> {
        self.find_account(name)
            .ok_or(StoreErr::NotFound("account"))
    }

    #[must_use]
    pub fn find_witness(&self, owner: &str) -> Option<&Witness> {
        let id = *self.witnesses.indexes.by_name.get(owner)?;
        self.witnesses.find(id)
    }

    pub fn get_witness(&self, owner: &str) -> Result<&Witness, StoreErr> {
        self.find_witness(owner)
            .ok_or(StoreErr::NotFound("witness"))
    }

    #[must_use]
    pub fn find_escrow(&self, from: &AccountName, escrow_id: u32) -> Option<&Escrow> {
        let id = *self
            .escrows
            .indexes
            .by_from_id
            .get(&(from.clone(), escrow_id))?;
        self.escrows.find(id)
    }

    #[must_use]
    pub fn find_bandwidth(&self, account: &str) -> Option<&AccountBandwidth> {
        let id = *self.bandwidth.indexes.by_account.get(account)?;
        self.bandwidth.find(id)
    }

    #[must_use]
    pub fn find_application_by_name(&self, name: &str) -> Option<&Application> {
        let id = *self.applications.indexes.by_name.get(name)?;
        self.applications.find(id)
    }

    #[must_use]
    pub fn find_feed(&self, symbol: &str) -> Option<&FeedHistory> {
        let id = *self.feeds.indexes.by_symbol.get(symbol)?;
        self.feeds.find(id)
    }

    // --- genesis -------------------------------------------------------

    /// Build the genesis state: the singletons, the genesis authority
    /// account holding the initial supply, and its witness row.
    pub fn init_genesis(&mut self, config: &ChainConfig) -> Result<(), StoreErr> {
        assert!(self.accounts.is_empty(), "genesis on a non-empty database");
        let genesis = &config.genesis;

        self.init_economics(genesis.init_supply, genesis.total_supply)
            .map_err(|_| StoreErr::Corruption("invalid genesis supplies"))?;

        let initial_key = Authority::single(genesis.initial_signing_key);
        let witness_name = genesis.initial_witness.clone();

        self.accounts.create(|id| Account {
            id,
            name: witness_name.clone(),
            owner: initial_key.clone(),
            active: initial_key.clone(),
            memo_key: genesis.initial_signing_key,
            json_metadata: String::new(),
            balance: genesis.init_supply,
            vesting_shares: 0,
            last_interest_payment: genesis.initial_timestamp,
            fee_sponsor: None,
            witness_votes: vec![],
            created: genesis.initial_timestamp,
        })?;

        self.bandwidth.create(|id| AccountBandwidth {
            id,
            account: witness_name.clone(),
            total_bandwidth: 0,
            total_tx_count: 0,
            act_fee_free_bandwidth: 0,
            act_fee_free_tx_count: 0,
            last_block_num_reset: 0,
        })?;

        self.witnesses.create(|id| Witness {
            id,
            owner: witness_name.clone(),
            created: genesis.initial_timestamp,
            url: String::new(),
            signing_key: genesis.initial_signing_key,
            votes: 0,
            virtual_scheduled_time: 0,
            total_missed: 0,
            consecutive_missed: 0,
            last_confirmed_block_num: 0,
            props: Default::default(),
            running: true,
            reported_prices: vec![],
        })?;

        self.witness_schedules.create(|id| WitnessSchedule {
            id,
            current_shuffled_witnesses: vec![witness_name.clone()],
            current_virtual_time: 0,
            majority_props: Default::default(),
        })?;

        self.globals.create(|id| DynamicGlobalProperties {
            id,
            head_block_number: 0,
            head_block_id: Hash256::zero(),
            time: genesis.initial_timestamp,
            current_witness: witness_name,
            current_supply: genesis.init_supply,
            total_vesting_shares: 0,
            maximum_block_size: DEFAULT_MAX_BLOCK_SIZE,
            current_aslot: 0,
            recent_slots_filled: u128::MAX,
            participation_count: 128,
            last_irreversible_block_num: 0,
        })?;

        let next_time = HARDFORK_TIMES.first().copied().unwrap_or(0);
        self.hardforks.create(|id| HardforkProperties {
            id,
            processed_hardforks: vec![],
            current_hardfork_version: 0,
            next_hardfork_version: u32::from(next_time != 0),
            next_hardfork_time: next_time,
        })?;

        Ok(())
    }

    // --- query surface -------------------------------------------------

    /// Reverse-chronological account history. `start = u64::MAX` means
    /// newest; entries with `sequence <= start` are returned, most
    /// recent first, up to `limit` (clamped to 1000). Accounts with
    /// fewer entries simply return what exists.
    pub fn get_account_history(
        &self,
        account: &AccountName,
        start: u64,
        limit: u64,
    ) -> Result<Vec<(u64, &OperationObject)>, StoreErr> {
        if limit == 0 {
            return Err(StoreErr::InvalidArgument("history limit must be positive"));
        }
        let limit = limit.min(1_000) as usize;

        let range = (account.clone(), 0)..=(account.clone(), start);
        let mut out = Vec::with_capacity(limit);

        for (&(_, seq), &hist_id) in self.account_history.indexes.by_account.range(range).rev() {
            if out.len() == limit {
                break;
            }
            let entry = self.account_history.get(hist_id)?;
            out.push((seq, self.operations.get(entry.op_id)?));
        }

        Ok(out)
    }

    /// Custom content for (app, sender), descending from `start_seq`
    /// (`u64::MAX` means newest).
    #[must_use]
    pub fn get_content_by_sender(
        &self,
        app_id: AppId,
        sender: &AccountName,
        start_seq: u64,
        count: u64,
    ) -> Vec<&CustomContent> {
        let range = (app_id, sender.clone(), 0)..=(app_id, sender.clone(), start_seq);
        self.contents
            .indexes
            .by_sender
            .range(range)
            .rev()
            .take(count as usize)
            .filter_map(|(_, &id)| self.contents.find(id))
            .collect()
    }

    /// Custom content addressed to (app, recipient), descending.
    #[must_use]
    pub fn get_content_by_recipient(
        &self,
        app_id: AppId,
        recipient: &AccountName,
        start_seq: u64,
        count: u64,
    ) -> Vec<&CustomContent> {
        let range = (app_id, recipient.clone(), 0)..=(app_id, recipient.clone(), start_seq);
        self.contents
            .indexes
            .by_recipient
            .range(range)
            .rev()
            .take(count as usize)
            .filter_map(|(_, &id)| self.contents.find(id))
            .collect()
    }

    /// All operations applied in a block, in application order.
    #[must_use]
    pub fn get_ops_in_block(&self, block: u64, only_virtual: bool) -> Vec<&OperationObject> {
        let range = (block, 0, 0, 0)..(block + 1, 0, 0, 0);
        self.operations
            .indexes
            .by_location
            .range(range)
            .filter_map(|(_, &id)| self.operations.find(id))
            .filter(|op| !only_virtual || op.virtual_op > 0)
            .collect()
    }

    /// Median feed over the reported prices of the active witnesses for
    /// one symbol, if any have reported.
    #[must_use]
    pub fn witness_feed_median(&self, symbol: &str) -> Option<Price> {
        let schedule = self.schedule();
        let mut quotes: Vec<(i128, Price)> = vec![];

        for owner in &schedule.current_shuffled_witnesses {
            let Some(witness) = self.find_witness(owner) else {
                continue;
            };
            for price in &witness.reported_prices {
                if price.symbol == symbol {
                    // Order by quote/base ratio via cross products
                    quotes.push((
                        i128::from(price.quote) * 1_000_000 / i128::from(price.base),
                        price.clone(),
                    ));
                }
            }
        }

        quotes.sort_by(|a, b| a.0.cmp(&b.0));
        if quotes.is_empty() {
            return None;
        }
        let mid = quotes.len() / 2;
        Some(quotes.swap_remove(mid).1)
    }

    // --- snapshot & digest ---------------------------------------------

    pub fn encode_snapshot(&self) -> Result<Vec<u8>, StoreErr> {
        let snapshot = Snapshot {
            accounts: self.accounts.snapshot(),
            bandwidth: self.bandwidth.snapshot(),
            globals: self.globals.snapshot(),
            hardforks: self.hardforks.snapshot(),
            economics: self.economics.snapshot(),
            escrows: self.escrows.snapshot(),
            feeds: self.feeds.snapshot(),
            contents: self.contents.snapshot(),
            operations: self.operations.snapshot(),
            account_history: self.account_history.snapshot(),
            applications: self.applications.snapshot(),
            application_buyings: self.application_buyings.snapshot(),
            witnesses: self.witnesses.snapshot(),
            witness_schedules: self.witness_schedules.snapshot(),
        };
        Ok(crate::codec::encode_to_vec(&snapshot)?)
    }

    pub fn restore_snapshot(&mut self, bytes: &[u8]) -> Result<(), StoreErr> {
        assert_eq!(
            self.session_depth, 0,
            "snapshot restore with open sessions"
        );
        let snapshot: Snapshot = crate::codec::decode(bytes)?;

        self.accounts.restore(snapshot.accounts.0, snapshot.accounts.1)?;
        self.bandwidth.restore(snapshot.bandwidth.0, snapshot.bandwidth.1)?;
        self.globals.restore(snapshot.globals.0, snapshot.globals.1)?;
        self.hardforks.restore(snapshot.hardforks.0, snapshot.hardforks.1)?;
        self.economics.restore(snapshot.economics.0, snapshot.economics.1)?;
        self.escrows.restore(snapshot.escrows.0, snapshot.escrows.1)?;
        self.feeds.restore(snapshot.feeds.0, snapshot.feeds.1)?;
        self.contents.restore(snapshot.contents.0, snapshot.contents.1)?;
        self.operations.restore(snapshot.operations.0, snapshot.operations.1)?;
        self.account_history
            .restore(snapshot.account_history.0, snapshot.account_history.1)?;
        self.applications
            .restore(snapshot.applications.0, snapshot.applications.1)?;
        self.application_buyings
            .restore(snapshot.application_buyings.0, snapshot.application_buyings.1)?;
        self.witnesses.restore(snapshot.witnesses.0, snapshot.witnesses.1)?;
        self.witness_schedules
            .restore(snapshot.witness_schedules.0, snapshot.witness_schedules.1)?;

        Ok(())
    }

    /// Digest of every table's full contents. Two databases that applied
    /// the same blocks digest identically; the atomicity tests compare
    /// digests around failed transactions.
    pub fn state_digest(&self) -> Result<Hash256, StoreErr> {
        let mut hasher = blake3::Hasher::new();
        self.accounts.digest_into(&mut hasher)?;
        self.bandwidth.digest_into(&mut hasher)?;
        self.globals.digest_into(&mut hasher)?;
        self.hardforks.digest_into(&mut hasher)?;
        self.economics.digest_into(&mut hasher)?;
        self.escrows.digest_into(&mut hasher)?;
        self.feeds.digest_into(&mut hasher)?;
        self.contents.digest_into(&mut hasher)?;
        self.operations.digest_into(&mut hasher)?;
        self.account_history.digest_into(&mut hasher)?;
        self.applications.digest_into(&mut hasher)?;
        self.application_buyings.digest_into(&mut hasher)?;
        self.witnesses.digest_into(&mut hasher)?;
        self.witness_schedules.digest_into(&mut hasher)?;
        Ok(Hash256(*hasher.finalize().as_bytes()))
    }

    /// Sum of every liquid and vesting balance. The conservation tests
    /// check this against the pools and `total_supply`.
    #[must_use]
    pub fn total_account_holdings(&self) -> (Share, Share) {
        let mut liquid = 0;
        let mut vesting = 0;
        for account in self.accounts.iter() {
            liquid += account.balance;
            vesting += account.vesting_shares;
        }
        (liquid, vesting)
    }

    /// Record an operation in the history tables. Returns the operation
    /// object id.
    pub fn push_operation_record(
        &mut self,
        op: &Operation,
        trx_id: Hash256,
        block: u64,
        trx_in_block: u32,
        op_in_trx: u32,
        virtual_op: u32,
        timestamp: u64,
    ) -> Result<ObjectId, StoreErr> {
        let serialized = crate::codec::encode_to_vec(op)?;
        let fee_payer = op.fee_payer().clone();

        let op_id = self
            .operations
            .create(|id| OperationObject {
                id,
                trx_id,
                block,
                trx_in_block,
                op_in_trx,
                virtual_op,
                timestamp,
                serialized_op: serialized,
                fee_payer: fee_payer.clone(),
            })?
            .id;

        // One history row per account touched by the operation
        let mut touched = vec![];
        op.required_active_authorities(&mut touched);
        op.required_owner_authorities(&mut touched);
        match op {
            Operation::Transfer(o) => touched.push(o.to.clone()),
            Operation::TransferToVesting(o) => touched.push(o.to.clone()),
            Operation::AccountCreate(o) => touched.push(o.new_account_name.clone()),
            Operation::EscrowTransfer(o) => {
                touched.push(o.to.clone());
                touched.push(o.agent.clone());
            }
            Operation::EscrowRelease(o) => touched.push(o.receiver.clone()),
            Operation::CustomJson(o) => touched.extend(o.recipients.iter().cloned()),
            Operation::CustomBinary(o) => touched.extend(o.recipients.iter().cloned()),
            Operation::SponsorFees(o) => touched.push(o.sponsored.clone()),
            Operation::ProducerReward(o) => touched.push(o.producer.clone()),
            Operation::InterestPaid(o) => touched.push(o.owner.clone()),
            Operation::WitnessShutdown(o) => touched.push(o.witness.clone()),
            Operation::PromotionPoolWithdraw(o) => touched.push(o.to.clone()),
            _ => {}
        }
        touched.sort();
        touched.dedup();
        touched.retain(|name| !name.is_empty());

        for account in touched {
            let sequence = self.account_history.indexes.next_sequence(&account);
            self.account_history.create(|id| AccountHistory {
                id,
                account: account.clone(),
                sequence,
                op_id,
            })?;
        }

        Ok(op_id)
    }
}

#[derive(Encode, Decode)]
struct Snapshot {
    accounts: (ObjectId, Vec<Account>),
    bandwidth: (ObjectId, Vec<AccountBandwidth>),
    globals: (ObjectId, Vec<DynamicGlobalProperties>),
    hardforks: (ObjectId, Vec<HardforkProperties>),
    economics: (ObjectId, Vec<EconomicModel>),
    escrows: (ObjectId, Vec<Escrow>),
    feeds: (ObjectId, Vec<FeedHistory>),
    contents: (ObjectId, Vec<CustomContent>),
    operations: (ObjectId, Vec<OperationObject>),
    account_history: (ObjectId, Vec<AccountHistory>),
    applications: (ObjectId, Vec<Application>),
    application_buyings: (ObjectId, Vec<ApplicationBuying>),
    witnesses: (ObjectId, Vec<Witness>),
    witness_schedules: (ObjectId, Vec<WitnessSchedule>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::TransferOperation;

    fn genesis_db() -> Database {
        let mut db = Database::new();
        db.init_genesis(&ChainConfig::default()).unwrap();
        db
    }

    #[test]
    fn genesis_state_is_consistent() {
        let db = genesis_db();
        let dgp = db.dgp();
        assert_eq!(dgp.head_block_number, 0);
        assert_eq!(dgp.current_supply, INIT_SUPPLY);

        let (liquid, vesting) = db.total_account_holdings();
        let e = db.econ();
        assert_eq!(
            liquid
                + vesting
                + e.mining_pool_from_coinbase
                + e.mining_pool_from_fees
                + e.interest_pool_from_coinbase
                + e.interest_pool_from_fees
                + e.promotion_pool
                + e.burned,
            TOTAL_SUPPLY
        );
    }

    #[test]
    fn session_fanout_covers_every_table() {
        let mut db = genesis_db();
        let before = db.state_digest().unwrap();

        db.start_undo_session();
        db.accounts
            .create(|id| Account {
                id,
                name: "alice".into(),
                owner: Authority::single(Default::default()),
                active: Authority::single(Default::default()),
                memo_key: Default::default(),
                json_metadata: String::new(),
                balance: 0,
                vesting_shares: 0,
                last_interest_payment: 0,
                fee_sponsor: None,
                witness_votes: vec![],
                created: 0,
            })
            .unwrap();
        db.modify_dgp(|dgp| dgp.head_block_number = 7).unwrap();
        db.record_block(1, 42).unwrap();
        db.undo_session();

        assert_eq!(db.state_digest().unwrap(), before);
        assert!(db.find_account("alice").is_none());
    }

    #[test]
    fn snapshot_roundtrip_preserves_digest() {
        let db = genesis_db();
        let bytes = db.encode_snapshot().unwrap();

        let mut restored = Database::new();
        restored.restore_snapshot(&bytes).unwrap();
        assert_eq!(
            restored.state_digest().unwrap(),
            db.state_digest().unwrap()
        );
        assert!(restored.find_account("initminer").is_some());
    }

    #[test]
    fn operation_records_build_account_history() {
        let mut db = genesis_db();
        let op = Operation::Transfer(TransferOperation {
            from: "initminer".into(),
            to: "initminer".into(),
            amount: 1,
            memo: String::new(),
        });

        db.push_operation_record(&op, Hash256::zero(), 1, 0, 0, 0, 10)
            .unwrap();
        db.push_operation_record(&op, Hash256::zero(), 1, 0, 0, 1, 10)
            .unwrap();

        let history = db
            .get_account_history(&"initminer".to_string(), u64::MAX, 10)
            .unwrap();
        assert_eq!(history.len(), 2);
        // Most recent first
        assert_eq!(history[0].0, 2);
        assert_eq!(history[1].0, 1);

        // Fewer entries than the limit is not an error
        assert_eq!(
            db.get_account_history(&"initminer".to_string(), u64::MAX, 1000)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn ops_in_block_filters_virtual() {
        let mut db = genesis_db();
        let op = Operation::Transfer(TransferOperation {
            from: "initminer".into(),
            to: "initminer".into(),
            amount: 1,
            memo: String::new(),
        });
        db.push_operation_record(&op, Hash256::zero(), 3, 0, 0, 0, 10)
            .unwrap();
        db.push_operation_record(&op, Hash256::zero(), 3, 0, 0, 1, 10)
            .unwrap();
        db.push_operation_record(&op, Hash256::zero(), 4, 0, 0, 0, 13)
            .unwrap();

        assert_eq!(db.get_ops_in_block(3, false).len(), 2);
        assert_eq!(db.get_ops_in_block(3, true).len(), 1);
        assert_eq!(db.get_ops_in_block(4, false).len(), 1);
    }
}
