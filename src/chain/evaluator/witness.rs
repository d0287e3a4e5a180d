// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::evaluator::{expect_account, EvalCtx, EvalErr};
use crate::chain::objects::Witness;
use crate::consensus::MAX_WITNESS_VOTES_PER_ACCOUNT;
use crate::primitives::*;

/// Registers a new witness or updates an existing one. Re-announcing
/// with a fresh signing key also restarts a stopped witness.
pub fn apply_witness_update(ctx: &mut EvalCtx, op: &WitnessUpdateOperation) -> Result<(), EvalErr> {
    expect_account(ctx.db, &op.owner)?;
    let db = &mut *ctx.db;

    match db.find_witness(&op.owner).map(|w| w.id) {
        Some(id) => {
            db.witnesses.modify(id, |w| {
                w.url = op.url.clone();
                w.signing_key = op.block_signing_key;
                w.props = op.props.clone();
                w.running = !op.block_signing_key.is_null();
            })?;
        }
        None => {
            let now = db.dgp().time;
            let virtual_base = db.schedule().current_virtual_time;
            db.witnesses.create(|id| Witness {
                id,
                owner: op.owner.clone(),
                created: now,
                url: op.url.clone(),
                signing_key: op.block_signing_key,
                votes: 0,
                // Enter the race at the current clock base instead of
                // zero, which would let a brand-new witness jump the
                // whole queue
                virtual_scheduled_time: virtual_base,
                total_missed: 0,
                consecutive_missed: 0,
                last_confirmed_block_num: 0,
                props: op.props.clone(),
                running: !op.block_signing_key.is_null(),
                reported_prices: vec![],
            })?;
        }
    }

    Ok(())
}

pub fn apply_witness_stop(ctx: &mut EvalCtx, op: &WitnessStopOperation) -> Result<(), EvalErr> {
    let witness = ctx
        .db
        .find_witness(&op.owner)
        .ok_or_else(|| EvalErr::UnknownWitness(op.owner.clone()))?;

    if !witness.running && witness.signing_key.is_null() {
        return Err(EvalErr::InvalidState("witness already stopped"));
    }

    let id = witness.id;
    ctx.db.witnesses.modify(id, |w| {
        w.signing_key = PublicKey::null();
        w.running = false;
    })?;

    Ok(())
}

/// Vote weight is the voter's vesting shares at vote time; it is not
/// retroactively adjusted when the vesting balance later changes.
pub fn apply_account_witness_vote(
    ctx: &mut EvalCtx,
    op: &AccountWitnessVoteOperation,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    let account = db
        .find_account(&op.account)
        .ok_or_else(|| EvalErr::UnknownAccount(op.account.clone()))?;
    let account_id = account.id;
    let weight = account.vesting_shares;
    let existing = account
        .witness_votes
        .binary_search_by(|(name, _)| name.cmp(&op.witness));

    let witness = db
        .find_witness(&op.witness)
        .ok_or_else(|| EvalErr::UnknownWitness(op.witness.clone()))?;
    let witness_id = witness.id;

    if op.approve {
        let Err(pos) = existing else {
            return Err(EvalErr::InvalidState("witness already approved"));
        };
        if account.witness_votes.len() >= MAX_WITNESS_VOTES_PER_ACCOUNT {
            return Err(EvalErr::TooManyWitnessVotes);
        }

        db.accounts.modify(account_id, |a| {
            a.witness_votes.insert(pos, (op.witness.clone(), weight));
        })?;
        db.witnesses.modify(witness_id, |w| w.votes += weight)?;
    } else {
        let Ok(pos) = existing else {
            return Err(EvalErr::InvalidState("witness was not approved"));
        };

        let locked_weight = account.witness_votes[pos].1;
        db.accounts.modify(account_id, |a| {
            a.witness_votes.remove(pos);
        })?;
        db.witnesses.modify(witness_id, |w| w.votes -= locked_weight)?;
    }

    Ok(())
}

pub fn apply_feed_publish(ctx: &mut EvalCtx, op: &FeedPublishOperation) -> Result<(), EvalErr> {
    let witness = ctx
        .db
        .find_witness(&op.publisher)
        .ok_or_else(|| EvalErr::UnknownWitness(op.publisher.clone()))?;

    let id = witness.id;
    let rate = op.exchange_rate.clone();
    ctx.db.witnesses.modify(id, |w| {
        match w
            .reported_prices
            .iter_mut()
            .find(|p| p.symbol == rate.symbol)
        {
            Some(existing) => *existing = rate.clone(),
            None => w.reported_prices.push(rate.clone()),
        }
    })?;

    Ok(())
}
