// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::evaluator::{
    adjust_balance, expect_account, settle_vesting_interest, EvalCtx, EvalErr,
};
use crate::primitives::*;

pub fn apply_transfer(ctx: &mut EvalCtx, op: &TransferOperation) -> Result<(), EvalErr> {
    expect_account(ctx.db, &op.to)?;
    adjust_balance(ctx.db, &op.from, -op.amount)?;
    adjust_balance(ctx.db, &op.to, op.amount)?;
    Ok(())
}

pub fn apply_transfer_to_vesting(
    ctx: &mut EvalCtx,
    op: &TransferToVestingOperation,
) -> Result<(), EvalErr> {
    expect_account(ctx.db, &op.to)?;
    adjust_balance(ctx.db, &op.from, -op.amount)?;

    // Interest accrued so far is settled before the holding changes, so
    // the payout stays a pure function of (holding, elapsed period)
    settle_vesting_interest(ctx, &op.to)?;

    let id = ctx.db.get_account(&op.to).map(|a| a.id)?;
    ctx.db
        .accounts
        .modify(id, |a| a.vesting_shares += op.amount)?;
    ctx.db
        .modify_dgp(|dgp| dgp.total_vesting_shares += op.amount)?;

    Ok(())
}

pub fn apply_withdraw_vesting(
    ctx: &mut EvalCtx,
    op: &WithdrawVestingOperation,
) -> Result<(), EvalErr> {
    settle_vesting_interest(ctx, &op.account)?;

    let account = ctx.db.get_account(&op.account)?;
    if account.vesting_shares < op.vesting_shares {
        return Err(EvalErr::InsufficientVesting {
            required: op.vesting_shares,
            available: account.vesting_shares,
        });
    }

    let id = account.id;
    ctx.db.accounts.modify(id, |a| {
        a.vesting_shares -= op.vesting_shares;
        a.balance += op.vesting_shares;
    })?;
    ctx.db
        .modify_dgp(|dgp| dgp.total_vesting_shares -= op.vesting_shares)?;

    Ok(())
}
