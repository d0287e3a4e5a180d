// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::evaluator::{expect_account, EvalCtx, EvalErr};
use crate::chain::objects::CustomContent;
use crate::primitives::*;
use std::collections::HashMap;

/// Plugin-supplied interpreter for custom payloads of one application
/// id. Invoked synchronously during evaluation; an error fails the whole
/// enclosing transaction.
pub trait CustomOperationInterpreter: Send + Sync {
    fn apply_json(&self, op: &CustomJsonOperation) -> Result<(), String>;
    fn apply_binary(&self, op: &CustomBinaryOperation) -> Result<(), String>;
}

/// Interpreter registry keyed by application id. Exactly one handler per
/// id: a duplicate registration is a configuration error and aborts.
#[derive(Default)]
pub struct InterpreterRegistry {
    handlers: HashMap<AppId, Box<dyn CustomOperationInterpreter>>,
}

impl InterpreterRegistry {
    pub fn set_custom_operation_interpreter(
        &mut self,
        app_id: AppId,
        handler: Box<dyn CustomOperationInterpreter>,
    ) {
        assert!(
            !self.handlers.contains_key(&app_id),
            "duplicate custom operation interpreter for app id {app_id}"
        );
        self.handlers.insert(app_id, handler);
    }

    #[must_use]
    pub fn find(&self, app_id: AppId) -> Option<&dyn CustomOperationInterpreter> {
        self.handlers.get(&app_id).map(AsRef::as_ref)
    }
}

/// Store the content row. An unregistered app id stores the payload
/// inert; a registered interpreter runs afterwards and may veto the
/// transaction.
fn store_content(
    ctx: &mut EvalCtx,
    app_id: AppId,
    sender: &AccountName,
    recipients: &[AccountName],
    binary: bool,
    payload: Vec<u8>,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;
    expect_account(db, sender)?;
    for recipient in recipients {
        expect_account(db, recipient)?;
    }

    let sender_sequence = db.contents.indexes.next_sender_sequence(app_id, sender);
    let recipient_sequences: Vec<(AccountName, u64)> = recipients
        .iter()
        .map(|r| (r.clone(), db.contents.indexes.next_recipient_sequence(app_id, r)))
        .collect();

    let now = db.dgp().time;
    let sender = sender.clone();
    let recipients = recipients.to_vec();
    db.contents.create(|id| CustomContent {
        id,
        app_id,
        sender: sender.clone(),
        recipients: recipients.clone(),
        sender_sequence,
        recipient_sequences: recipient_sequences.clone(),
        binary,
        payload: payload.clone(),
        timestamp: now,
    })?;

    Ok(())
}

pub fn apply_custom_json(ctx: &mut EvalCtx, op: &CustomJsonOperation) -> Result<(), EvalErr> {
    store_content(
        ctx,
        op.app_id,
        &op.sender,
        &op.recipients,
        false,
        op.json.clone().into_bytes(),
    )?;

    if let Some(interpreter) = ctx.interpreters.find(op.app_id) {
        interpreter.apply_json(op).map_err(EvalErr::Interpreter)?;
    }

    Ok(())
}

pub fn apply_custom_binary(ctx: &mut EvalCtx, op: &CustomBinaryOperation) -> Result<(), EvalErr> {
    store_content(
        ctx,
        op.app_id,
        &op.sender,
        &op.recipients,
        true,
        op.data.clone(),
    )?;

    if let Some(interpreter) = ctx.interpreters.find(op.app_id) {
        interpreter.apply_binary(op).map_err(EvalErr::Interpreter)?;
    }

    Ok(())
}
