// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::evaluator::{adjust_balance, expect_account, EvalCtx, EvalErr};
use crate::primitives::*;

/// Move unlocked promotion-pool funds to an account. Restricted to the
/// genesis authority; the movement is mirrored by a
/// PromotionPoolWithdraw virtual operation for the audit history.
pub fn apply_promotion_pool_transfer(
    ctx: &mut EvalCtx,
    op: &PromotionPoolTransferOperation,
) -> Result<(), EvalErr> {
    if op.requested_by != ctx.config.genesis.initial_witness {
        return Err(EvalErr::NotAuthorized(
            "promotion pool transfers require the genesis authority",
        ));
    }
    expect_account(ctx.db, &op.transfer_to)?;

    let block_num = ctx.db.dgp().head_block_number;
    ctx.db.withdraw_from_promotion_pool(op.amount, block_num)?;
    adjust_balance(ctx.db, &op.transfer_to, op.amount)?;

    ctx.virtual_ops.push(Operation::PromotionPoolWithdraw(
        PromotionPoolWithdrawOperation {
            to: op.transfer_to.clone(),
            amount: op.amount,
        },
    ));

    Ok(())
}

pub fn apply_sponsor_fees(ctx: &mut EvalCtx, op: &SponsorFeesOperation) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;
    expect_account(db, &op.sponsor)?;

    let sponsored = db
        .find_account(&op.sponsored)
        .ok_or_else(|| EvalErr::UnknownAccount(op.sponsored.clone()))?;
    let id = sponsored.id;

    if op.is_sponsoring {
        db.accounts
            .modify(id, |a| a.fee_sponsor = Some(op.sponsor.clone()))?;
    } else {
        if sponsored.fee_sponsor.as_ref() != Some(&op.sponsor) {
            return Err(EvalErr::InvalidState("not the current sponsor"));
        }
        db.accounts.modify(id, |a| a.fee_sponsor = None)?;
    }

    Ok(())
}
