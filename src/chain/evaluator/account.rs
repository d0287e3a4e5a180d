// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::evaluator::{adjust_balance, EvalCtx, EvalErr};
use crate::chain::objects::{Account, AccountBandwidth};
use crate::primitives::*;

pub fn apply_account_create(
    ctx: &mut EvalCtx,
    op: &AccountCreateOperation,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    if db.find_account(&op.new_account_name).is_some() {
        return Err(EvalErr::DuplicateAccount(op.new_account_name.clone()));
    }

    let minimum_fee = db.schedule().majority_props.account_creation_fee;
    if op.fee < minimum_fee {
        return Err(EvalErr::InsufficientBalance {
            required: minimum_fee,
            available: op.fee,
        });
    }

    adjust_balance(db, &op.creator, -op.fee)?;
    db.add_fee(op.fee)?;

    let now = db.dgp().time;
    let head_block = db.dgp().head_block_number;
    db.accounts.create(|id| Account {
        id,
        name: op.new_account_name.clone(),
        owner: op.owner.clone(),
        active: op.active.clone(),
        memo_key: op.memo_key,
        json_metadata: op.json_metadata.clone(),
        balance: 0,
        vesting_shares: 0,
        last_interest_payment: now,
        fee_sponsor: None,
        witness_votes: vec![],
        created: now,
    })?;

    db.bandwidth.create(|id| AccountBandwidth {
        id,
        account: op.new_account_name.clone(),
        total_bandwidth: 0,
        total_tx_count: 0,
        act_fee_free_bandwidth: 0,
        act_fee_free_tx_count: 0,
        last_block_num_reset: head_block,
    })?;

    Ok(())
}

pub fn apply_account_update(
    ctx: &mut EvalCtx,
    op: &AccountUpdateOperation,
) -> Result<(), EvalErr> {
    let account = ctx
        .db
        .find_account(&op.account)
        .ok_or_else(|| EvalErr::UnknownAccount(op.account.clone()))?;
    let id = account.id;

    ctx.db.accounts.modify(id, |a| {
        if let Some(owner) = &op.owner {
            a.owner = owner.clone();
        }
        if let Some(active) = &op.active {
            a.active = active.clone();
        }
        if let Some(memo_key) = &op.memo_key {
            a.memo_key = *memo_key;
        }
        if let Some(meta) = &op.json_metadata {
            a.json_metadata = meta.clone();
        }
    })?;

    Ok(())
}

pub fn apply_account_delete(
    ctx: &mut EvalCtx,
    op: &AccountDeleteOperation,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    if op.account == ctx.config.genesis.initial_witness {
        return Err(EvalErr::NotAuthorized(
            "the genesis account cannot be deleted",
        ));
    }

    let account = db
        .find_account(&op.account)
        .ok_or_else(|| EvalErr::UnknownAccount(op.account.clone()))?;

    if account.balance != 0 || account.vesting_shares != 0 {
        return Err(EvalErr::InvalidState(
            "account still holds a balance",
        ));
    }
    if db.find_witness(&op.account).is_some() {
        return Err(EvalErr::InvalidState(
            "account still has a witness registration",
        ));
    }

    let id = account.id;
    db.accounts.remove(id)?;

    match db.find_bandwidth(&op.account).map(|row| row.id) {
        Some(bw_id) => {
            db.bandwidth.remove(bw_id)?;
        }
        None => {}
    }

    // History rows stay: deleting an account does not rewrite the audit
    // trail.
    Ok(())
}
