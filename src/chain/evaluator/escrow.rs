// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::database::Database;
use crate::chain::evaluator::{adjust_balance, expect_account, EvalCtx, EvalErr};
use crate::chain::objects::Escrow;
use crate::chain::store::StoreErr;
use crate::primitives::*;
use log::*;

pub fn apply_escrow_transfer(ctx: &mut EvalCtx, op: &EscrowTransferOperation) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    if op.from == op.to || op.from == op.agent || op.to == op.agent {
        return Err(EvalErr::InvalidState(
            "escrow parties must be three distinct accounts",
        ));
    }
    expect_account(db, &op.to)?;
    expect_account(db, &op.agent)?;

    let now = db.dgp().time;
    if op.ratification_deadline <= now {
        return Err(EvalErr::DeadlineExpired("ratification deadline in the past"));
    }

    if db.find_escrow(&op.from, op.escrow_id).is_some() {
        return Err(EvalErr::InvalidState("escrow id already in use"));
    }

    adjust_balance(db, &op.from, -(op.amount + op.fee))?;

    db.escrows.create(|id| Escrow {
        id,
        from: op.from.clone(),
        to: op.to.clone(),
        agent: op.agent.clone(),
        escrow_id: op.escrow_id,
        amount: op.amount,
        pending_fee: op.fee,
        ratification_deadline: op.ratification_deadline,
        escrow_expiration: op.escrow_expiration,
        to_approved: false,
        agent_approved: false,
        disputed: false,
    })?;

    Ok(())
}

pub fn apply_escrow_approve(ctx: &mut EvalCtx, op: &EscrowApproveOperation) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    let escrow = db
        .find_escrow(&op.from, op.escrow_id)
        .ok_or(EvalErr::UnknownEscrow)?;
    if escrow.to != op.to || escrow.agent != op.agent {
        return Err(EvalErr::InvalidState("escrow parties do not match"));
    }
    if escrow.is_approved() {
        return Err(EvalErr::InvalidState("escrow already fully approved"));
    }

    let now = db.dgp().time;
    if now >= escrow.ratification_deadline {
        return Err(EvalErr::DeadlineExpired("ratification deadline passed"));
    }

    let id = escrow.id;

    if !op.approve {
        // A single rejection cancels the escrow and refunds everything
        let refund = escrow.amount + escrow.pending_fee;
        let from = escrow.from.clone();
        db.escrows.remove(id)?;
        adjust_balance(db, &from, refund)?;
        return Ok(());
    }

    let already = if op.who == escrow.to {
        escrow.to_approved
    } else {
        escrow.agent_approved
    };
    if already {
        return Err(EvalErr::InvalidState("party already approved"));
    }

    let who_is_to = op.who == escrow.to;
    db.escrows.modify(id, |e| {
        if who_is_to {
            e.to_approved = true;
        } else {
            e.agent_approved = true;
        }
    })?;

    // Full ratification releases the agent fee
    let escrow = db.escrows.get(id)?;
    if escrow.is_approved() && escrow.pending_fee > 0 {
        let fee = escrow.pending_fee;
        let agent = escrow.agent.clone();
        db.escrows.modify(id, |e| e.pending_fee = 0)?;
        adjust_balance(db, &agent, fee)?;
    }

    Ok(())
}

pub fn apply_escrow_dispute(ctx: &mut EvalCtx, op: &EscrowDisputeOperation) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    let escrow = db
        .find_escrow(&op.from, op.escrow_id)
        .ok_or(EvalErr::UnknownEscrow)?;
    if escrow.to != op.to || escrow.agent != op.agent {
        return Err(EvalErr::InvalidState("escrow parties do not match"));
    }
    if !escrow.is_approved() {
        return Err(EvalErr::InvalidState("escrow is not ratified"));
    }
    if escrow.disputed {
        return Err(EvalErr::InvalidState("escrow already disputed"));
    }

    let now = db.dgp().time;
    if now >= escrow.escrow_expiration {
        return Err(EvalErr::DeadlineExpired("escrow already expired"));
    }

    let id = escrow.id;
    db.escrows.modify(id, |e| e.disputed = true)?;
    Ok(())
}

pub fn apply_escrow_release(ctx: &mut EvalCtx, op: &EscrowReleaseOperation) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    let escrow = db
        .find_escrow(&op.from, op.escrow_id)
        .ok_or(EvalErr::UnknownEscrow)?;
    if escrow.to != op.to || escrow.agent != op.agent {
        return Err(EvalErr::InvalidState("escrow parties do not match"));
    }
    if !escrow.is_approved() {
        return Err(EvalErr::InvalidState("escrow is not ratified"));
    }
    if op.amount > escrow.amount {
        return Err(EvalErr::InsufficientBalance {
            required: op.amount,
            available: escrow.amount,
        });
    }

    let now = db.dgp().time;
    let expired = now >= escrow.escrow_expiration;

    if escrow.disputed {
        // Only the agent may move disputed funds
        if op.who != escrow.agent {
            return Err(EvalErr::NotAuthorized("disputed escrow requires the agent"));
        }
    } else if !expired {
        // Before expiration each party may only release toward the other
        if op.who == escrow.from && op.receiver != escrow.to {
            return Err(EvalErr::NotAuthorized("from may only release to the recipient"));
        }
        if op.who == escrow.to && op.receiver != escrow.from {
            return Err(EvalErr::NotAuthorized("to may only release back to the sender"));
        }
        if op.who == escrow.agent {
            return Err(EvalErr::NotAuthorized(
                "the agent may only release a disputed escrow",
            ));
        }
    } else if op.who != escrow.from && op.who != escrow.to {
        return Err(EvalErr::NotAuthorized(
            "expired escrow is released by its parties",
        ));
    }

    let id = escrow.id;
    let receiver = op.receiver.clone();
    let remaining = escrow.amount - op.amount;

    adjust_balance(db, &receiver, op.amount)?;
    if remaining == 0 {
        db.escrows.remove(id)?;
    } else {
        db.escrows.modify(id, |e| e.amount = remaining)?;
    }

    Ok(())
}

impl Database {
    /// Refund escrows whose ratification deadline passed without both
    /// approvals. Walks the unapproved partition of the deadline index;
    /// called once per applied block.
    pub fn sweep_expired_escrows(&mut self, now: u64) -> Result<u32, StoreErr> {
        let mut expired = vec![];
        for (&(approved, deadline, _), &id) in &self.escrows.indexes.by_ratification_deadline {
            if approved || deadline > now {
                break;
            }
            expired.push(id);
        }

        let count = expired.len() as u32;
        for id in expired {
            let escrow = self.escrows.remove(id)?;
            let refund = escrow.amount + escrow.pending_fee;
            debug!(
                "escrow ({}, {}) not ratified by {}; refunding {}",
                escrow.from, escrow.escrow_id, escrow.ratification_deadline, refund
            );
            let from_id = self
                .find_account(&escrow.from)
                .map(|a| a.id)
                .ok_or(StoreErr::NotFound("account"))?;
            self.accounts.modify(from_id, |a| a.balance += refund)?;
        }

        Ok(count)
    }
}
