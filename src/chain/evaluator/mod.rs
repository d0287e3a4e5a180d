// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

mod account;
mod application;
mod custom;
mod escrow;
mod funds;
mod transfer;
mod witness;

pub use custom::{CustomOperationInterpreter, InterpreterRegistry};

use crate::chain::database::Database;
use crate::chain::economics::EconomicsErr;
use crate::chain::store::StoreErr;
use crate::chain::ChainConfig;
use crate::consensus::Share;
use crate::primitives::{AccountName, Operation, OpValidationErr};

/// Everything a handler may touch: the store (through `db`), the chain
/// configuration, the interpreter registry for custom payloads, and a
/// sink for virtual operations synthesized as side effects (interest
/// payouts, promotion withdrawals). Handlers perform no I/O and emit no
/// notifications; the pipeline does both.
pub struct EvalCtx<'a> {
    pub db: &'a mut Database,
    pub config: &'a ChainConfig,
    pub interpreters: &'a InterpreterRegistry,
    pub virtual_ops: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalErr {
    /// Operation references an account that does not exist
    UnknownAccount(AccountName),

    /// Account name already taken
    DuplicateAccount(AccountName),

    /// Balance too low for the attempted debit
    InsufficientBalance { required: Share, available: Share },

    /// Vesting balance too low
    InsufficientVesting { required: Share, available: Share },

    /// No witness registered under this name
    UnknownWitness(AccountName),

    /// No escrow under (from, escrow_id)
    UnknownEscrow,

    /// No application under this name/id
    UnknownApplication,

    /// Application name already registered
    DuplicateApplication,

    /// (application, buyer) purchase already recorded
    DuplicatePurchase,

    /// Actor is not allowed to perform this mutation
    NotAuthorized(&'static str),

    /// A chain-state deadline has passed
    DeadlineExpired(&'static str),

    /// Operation is valid but the object is in the wrong state for it
    InvalidState(&'static str),

    /// Account at the witness-vote cap
    TooManyWitnessVotes,

    /// A registered custom interpreter rejected the payload
    Interpreter(String),

    /// Economic model rejected the movement
    Economics(EconomicsErr),

    /// Structural validation failure (handlers re-check what they rely on)
    Validation(OpValidationErr),

    Store(StoreErr),
}

impl From<StoreErr> for EvalErr {
    fn from(other: StoreErr) -> Self {
        Self::Store(other)
    }
}

impl From<EconomicsErr> for EvalErr {
    fn from(other: EconomicsErr) -> Self {
        Self::Economics(other)
    }
}

impl From<OpValidationErr> for EvalErr {
    fn from(other: OpValidationErr) -> Self {
        Self::Validation(other)
    }
}

/// Total dispatch: exactly one handler per operation kind. Virtual
/// variants are synthesized and recorded by the pipeline; their effects
/// are applied where they are synthesized, so routing one here is a
/// pipeline bug.
pub fn apply_operation(ctx: &mut EvalCtx, op: &Operation) -> Result<(), EvalErr> {
    match op {
        Operation::AccountCreate(op) => account::apply_account_create(ctx, op),
        Operation::AccountUpdate(op) => account::apply_account_update(ctx, op),
        Operation::AccountDelete(op) => account::apply_account_delete(ctx, op),
        Operation::Transfer(op) => transfer::apply_transfer(ctx, op),
        Operation::TransferToVesting(op) => transfer::apply_transfer_to_vesting(ctx, op),
        Operation::WithdrawVesting(op) => transfer::apply_withdraw_vesting(ctx, op),
        Operation::WitnessUpdate(op) => witness::apply_witness_update(ctx, op),
        Operation::WitnessStop(op) => witness::apply_witness_stop(ctx, op),
        Operation::AccountWitnessVote(op) => witness::apply_account_witness_vote(ctx, op),
        Operation::FeedPublish(op) => witness::apply_feed_publish(ctx, op),
        Operation::EscrowTransfer(op) => escrow::apply_escrow_transfer(ctx, op),
        Operation::EscrowApprove(op) => escrow::apply_escrow_approve(ctx, op),
        Operation::EscrowDispute(op) => escrow::apply_escrow_dispute(ctx, op),
        Operation::EscrowRelease(op) => escrow::apply_escrow_release(ctx, op),
        Operation::CustomJson(op) => custom::apply_custom_json(ctx, op),
        Operation::CustomBinary(op) => custom::apply_custom_binary(ctx, op),
        Operation::ApplicationCreate(op) => application::apply_application_create(ctx, op),
        Operation::ApplicationUpdate(op) => application::apply_application_update(ctx, op),
        Operation::ApplicationDelete(op) => application::apply_application_delete(ctx, op),
        Operation::ApplicationBuy(op) => application::apply_application_buy(ctx, op),
        Operation::ApplicationBuyingCancel(op) => {
            application::apply_application_buying_cancel(ctx, op)
        }
        Operation::PromotionPoolTransfer(op) => funds::apply_promotion_pool_transfer(ctx, op),
        Operation::SponsorFees(op) => funds::apply_sponsor_fees(ctx, op),
        Operation::ProducerReward(_)
        | Operation::InterestPaid(_)
        | Operation::WitnessShutdown(_)
        | Operation::PromotionPoolWithdraw(_)
        | Operation::HardforkApplied(_) => {
            panic!("virtual operation routed through evaluator dispatch")
        }
    }
}

// --- helpers shared across handlers ------------------------------------

pub(crate) fn expect_account(db: &Database, name: &AccountName) -> Result<(), EvalErr> {
    if db.find_account(name).is_some() {
        Ok(())
    } else {
        Err(EvalErr::UnknownAccount(name.clone()))
    }
}

/// Credit or debit a liquid balance. Debits below zero are rejected
/// without touching the row.
pub(crate) fn adjust_balance(
    db: &mut Database,
    name: &AccountName,
    delta: Share,
) -> Result<(), EvalErr> {
    let account = db
        .find_account(name)
        .ok_or_else(|| EvalErr::UnknownAccount(name.clone()))?;

    if delta < 0 && account.balance + delta < 0 {
        return Err(EvalErr::InsufficientBalance {
            required: -delta,
            available: account.balance,
        });
    }

    let id = account.id;
    db.accounts.modify(id, |a| a.balance += delta)?;
    Ok(())
}

/// Settle accrued interest on an account's vesting balance before the
/// balance changes. Pays into the liquid balance and emits an
/// InterestPaid virtual operation; always advances the accrual point.
pub(crate) fn settle_vesting_interest(ctx: &mut EvalCtx, name: &AccountName) -> Result<(), EvalErr> {
    let now = ctx.db.dgp().time;
    let account = ctx
        .db
        .find_account(name)
        .ok_or_else(|| EvalErr::UnknownAccount(name.clone()))?;

    let id = account.id;
    let holding = account.vesting_shares;
    let elapsed = now.saturating_sub(account.last_interest_payment);

    if holding > 0 && elapsed > 0 {
        let paid = ctx.db.withdraw_interests(holding, elapsed)?;
        if paid > 0 {
            ctx.db.accounts.modify(id, |a| a.balance += paid)?;
            ctx.virtual_ops.push(Operation::InterestPaid(
                crate::primitives::InterestPaidOperation {
                    owner: name.clone(),
                    interest: paid,
                },
            ));
        }
    }

    ctx.db
        .accounts
        .modify(id, |a| a.last_interest_payment = now)?;
    Ok(())
}
