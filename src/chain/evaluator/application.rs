// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::evaluator::{adjust_balance, expect_account, EvalCtx, EvalErr};
use crate::chain::objects::{Application, ApplicationBuying};
use crate::primitives::*;

pub fn apply_application_create(
    ctx: &mut EvalCtx,
    op: &ApplicationCreateOperation,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;
    expect_account(db, &op.author)?;

    if db.find_application_by_name(&op.name).is_some() {
        return Err(EvalErr::DuplicateApplication);
    }

    let now = db.dgp().time;
    db.applications.create(|id| Application {
        id,
        name: op.name.clone(),
        author: op.author.clone(),
        url: op.url.clone(),
        metadata: op.metadata.clone(),
        price_param: op.price_param.clone(),
        created: now,
    })?;

    Ok(())
}

pub fn apply_application_update(
    ctx: &mut EvalCtx,
    op: &ApplicationUpdateOperation,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    let app = db
        .find_application_by_name(&op.name)
        .ok_or(EvalErr::UnknownApplication)?;
    if app.author != op.author {
        return Err(EvalErr::NotAuthorized("only the author may update"));
    }
    if let Some(new_author) = &op.new_author {
        expect_account(db, new_author)?;
    }

    let id = app.id;
    db.applications.modify(id, |a| {
        if let Some(new_author) = &op.new_author {
            a.author = new_author.clone();
        }
        if let Some(url) = &op.url {
            a.url = url.clone();
        }
        if let Some(metadata) = &op.metadata {
            a.metadata = metadata.clone();
        }
        if let Some(price) = &op.price_param {
            a.price_param = price.clone();
        }
    })?;

    Ok(())
}

pub fn apply_application_delete(
    ctx: &mut EvalCtx,
    op: &ApplicationDeleteOperation,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    let app = db
        .find_application_by_name(&op.name)
        .ok_or(EvalErr::UnknownApplication)?;
    if app.author != op.author {
        return Err(EvalErr::NotAuthorized("only the author may delete"));
    }

    let app_id = app.id;

    // Purchases of a deleted application go with it
    let buying_ids: Vec<_> = db
        .application_buyings
        .indexes
        .by_app_buyer
        .range((app_id, String::new())..(app_id + 1, String::new()))
        .map(|(_, &id)| id)
        .collect();
    for id in buying_ids {
        db.application_buyings.remove(id)?;
    }

    db.applications.remove(app_id)?;
    Ok(())
}

pub fn apply_application_buy(ctx: &mut EvalCtx, op: &ApplicationBuyOperation) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;
    expect_account(db, &op.buyer)?;

    let app = db
        .applications
        .find(op.app_id)
        .ok_or(EvalErr::UnknownApplication)?;
    if app.author == op.buyer {
        return Err(EvalErr::InvalidState("authors do not buy their own application"));
    }
    if db
        .application_buyings
        .indexes
        .by_app_buyer
        .contains_key(&(op.app_id, op.buyer.clone()))
    {
        return Err(EvalErr::DuplicatePurchase);
    }

    let author = app.author.clone();
    if let ApplicationPrice::OneTimeFee(fee) = app.price_param {
        adjust_balance(db, &op.buyer, -fee)?;
        adjust_balance(db, &author, fee)?;
    }

    let now = db.dgp().time;
    let app_id = op.app_id;
    let buyer = op.buyer.clone();
    db.application_buyings.create(|id| ApplicationBuying {
        id,
        app_id,
        buyer: buyer.clone(),
        created: now,
    })?;

    Ok(())
}

pub fn apply_application_buying_cancel(
    ctx: &mut EvalCtx,
    op: &ApplicationBuyingCancelOperation,
) -> Result<(), EvalErr> {
    let db = &mut *ctx.db;

    let app = db
        .applications
        .find(op.app_id)
        .ok_or(EvalErr::UnknownApplication)?;
    if app.author != op.author {
        return Err(EvalErr::NotAuthorized("only the author may cancel a purchase"));
    }

    let buying_id = *db
        .application_buyings
        .indexes
        .by_app_buyer
        .get(&(op.app_id, op.buyer.clone()))
        .ok_or(EvalErr::UnknownApplication)?;

    db.application_buyings.remove(buying_id)?;
    Ok(())
}
