// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::*;
use crate::primitives::{Authority, PublicKey};
use bincode::{Decode, Encode};

pub type AccountName = String;
pub type AppId = u64;

/// Account names are 3 to 16 characters of `[a-z0-9-]`, starting with a
/// letter and not ending with a dash.
#[must_use]
pub fn is_valid_account_name(name: &str) -> bool {
    let len = name.len();
    if !(MIN_ACCOUNT_NAME_LENGTH..=MAX_ACCOUNT_NAME_LENGTH).contains(&len) {
        return false;
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_lowercase() {
        return false;
    }

    if name.ends_with('-') {
        return false;
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Quoted price of one asset in terms of the core coin. `base` is in core
/// shares, `quote` in units of the quoted symbol.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Price {
    pub base: Share,
    pub quote: Share,
    pub symbol: String,
}

impl Price {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.base > 0
            && self.quote > 0
            && !self.symbol.is_empty()
            && self.symbol.len() <= 8
            && self.symbol.chars().all(|c| c.is_ascii_uppercase())
    }
}

/// Witness-voted chain parameters, medianised per round.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ChainProperties {
    pub account_creation_fee: Share,
    pub maximum_block_size: u32,
}

impl Default for ChainProperties {
    fn default() -> Self {
        Self {
            account_creation_fee: ACCOUNT_CREATION_FEE,
            maximum_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

/// Price attached to an application. A one-time fee is transferred from
/// buyer to author when the purchase is recorded.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum ApplicationPrice {
    Free,
    OneTimeFee(Share),
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct AccountCreateOperation {
    pub fee: Share,
    pub creator: AccountName,
    pub new_account_name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct AccountUpdateOperation {
    pub account: AccountName,
    pub owner: Option<Authority>,
    pub active: Option<Authority>,
    pub memo_key: Option<PublicKey>,
    pub json_metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct AccountDeleteOperation {
    pub account: AccountName,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct TransferOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Share,
    pub memo: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct TransferToVestingOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Share,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct WithdrawVestingOperation {
    pub account: AccountName,
    pub vesting_shares: Share,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct WitnessUpdateOperation {
    pub owner: AccountName,
    pub url: String,
    pub block_signing_key: PublicKey,
    pub props: ChainProperties,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct WitnessStopOperation {
    pub owner: AccountName,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct AccountWitnessVoteOperation {
    pub account: AccountName,
    pub witness: AccountName,
    pub approve: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct FeedPublishOperation {
    pub publisher: AccountName,
    pub exchange_rate: Price,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EscrowTransferOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub escrow_id: u32,
    pub amount: Share,
    pub fee: Share,
    pub ratification_deadline: u64,
    pub escrow_expiration: u64,
    pub json_meta: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EscrowApproveOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    /// `to` or `agent`
    pub who: AccountName,
    pub escrow_id: u32,
    pub approve: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EscrowDisputeOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    /// `from` or `to`
    pub who: AccountName,
    pub escrow_id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EscrowReleaseOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    /// The party releasing funds: `from`, `to`, or the agent if disputed
    pub who: AccountName,
    /// `from` or `to`
    pub receiver: AccountName,
    pub escrow_id: u32,
    pub amount: Share,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CustomJsonOperation {
    pub app_id: AppId,
    pub sender: AccountName,
    pub recipients: Vec<AccountName>,
    pub json: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CustomBinaryOperation {
    pub app_id: AppId,
    pub sender: AccountName,
    pub recipients: Vec<AccountName>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ApplicationCreateOperation {
    pub author: AccountName,
    pub name: String,
    pub url: String,
    pub metadata: String,
    pub price_param: ApplicationPrice,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ApplicationUpdateOperation {
    pub author: AccountName,
    pub name: String,
    pub new_author: Option<AccountName>,
    pub url: Option<String>,
    pub metadata: Option<String>,
    pub price_param: Option<ApplicationPrice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ApplicationDeleteOperation {
    pub author: AccountName,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ApplicationBuyOperation {
    pub buyer: AccountName,
    pub app_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ApplicationBuyingCancelOperation {
    pub author: AccountName,
    pub buyer: AccountName,
    pub app_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct PromotionPoolTransferOperation {
    /// Must be the genesis authority account
    pub requested_by: AccountName,
    pub transfer_to: AccountName,
    pub amount: Share,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct SponsorFeesOperation {
    pub sponsor: AccountName,
    pub sponsored: AccountName,
    pub is_sponsoring: bool,
}

// Virtual operations. Synthesized by the block application pipeline and
// recorded in operation history; never accepted from the wire.

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ProducerRewardOperation {
    pub producer: AccountName,
    pub reward: Share,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct InterestPaidOperation {
    pub owner: AccountName,
    pub interest: Share,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct WitnessShutdownOperation {
    pub witness: AccountName,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct PromotionPoolWithdrawOperation {
    pub to: AccountName,
    pub amount: Share,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct HardforkAppliedOperation {
    pub version: u32,
    pub timestamp: u64,
}

/// The closed set of chain operations. Every variant has exactly one
/// evaluator; adding a variant without a handler fails to compile the
/// dispatch match.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Operation {
    AccountCreate(AccountCreateOperation),
    AccountUpdate(AccountUpdateOperation),
    AccountDelete(AccountDeleteOperation),
    Transfer(TransferOperation),
    TransferToVesting(TransferToVestingOperation),
    WithdrawVesting(WithdrawVestingOperation),
    WitnessUpdate(WitnessUpdateOperation),
    WitnessStop(WitnessStopOperation),
    AccountWitnessVote(AccountWitnessVoteOperation),
    FeedPublish(FeedPublishOperation),
    EscrowTransfer(EscrowTransferOperation),
    EscrowApprove(EscrowApproveOperation),
    EscrowDispute(EscrowDisputeOperation),
    EscrowRelease(EscrowReleaseOperation),
    CustomJson(CustomJsonOperation),
    CustomBinary(CustomBinaryOperation),
    ApplicationCreate(ApplicationCreateOperation),
    ApplicationUpdate(ApplicationUpdateOperation),
    ApplicationDelete(ApplicationDeleteOperation),
    ApplicationBuy(ApplicationBuyOperation),
    ApplicationBuyingCancel(ApplicationBuyingCancelOperation),
    PromotionPoolTransfer(PromotionPoolTransferOperation),
    SponsorFees(SponsorFeesOperation),
    ProducerReward(ProducerRewardOperation),
    InterestPaid(InterestPaidOperation),
    WitnessShutdown(WitnessShutdownOperation),
    PromotionPoolWithdraw(PromotionPoolWithdrawOperation),
    HardforkApplied(HardforkAppliedOperation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpValidationErr {
    /// A virtual operation arrived in a signed transaction
    VirtualOperation,

    /// Malformed account name
    InvalidAccountName(AccountName),

    /// Amount must be strictly positive
    NonPositiveAmount,

    /// Fee below the allowed minimum or negative
    InvalidFee,

    /// Authority fails its structural checks
    InvalidAuthority,

    /// Memo exceeds the size limit
    MemoTooLarge,

    /// Payload is not valid JSON or exceeds the size limit
    InvalidJson,

    /// Binary payload exceeds the size limit
    DataTooLarge,

    /// Too many or duplicate recipients
    InvalidRecipients,

    /// Escrow expiration precedes the ratification deadline
    DeadlineOrdering,

    /// Party field does not name a participant of the escrow
    InvalidParty,

    /// Malformed price quote
    InvalidPrice,

    /// Empty or oversized name/url/metadata field
    InvalidField(&'static str),
}

fn check_name(name: &str) -> Result<(), OpValidationErr> {
    if is_valid_account_name(name) {
        Ok(())
    } else {
        Err(OpValidationErr::InvalidAccountName(name.to_string()))
    }
}

fn check_json(json: &str) -> Result<(), OpValidationErr> {
    if json.len() > MAX_CUSTOM_DATA_SIZE {
        return Err(OpValidationErr::InvalidJson);
    }
    if json.is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(json)
        .map(|_| ())
        .map_err(|_| OpValidationErr::InvalidJson)
}

fn check_amount(amount: Share) -> Result<(), OpValidationErr> {
    if amount > 0 {
        Ok(())
    } else {
        Err(OpValidationErr::NonPositiveAmount)
    }
}

fn check_recipients(recipients: &[AccountName]) -> Result<(), OpValidationErr> {
    if recipients.len() > MAX_CUSTOM_RECIPIENTS {
        return Err(OpValidationErr::InvalidRecipients);
    }
    for (i, r) in recipients.iter().enumerate() {
        check_name(r)?;
        if recipients[..i].contains(r) {
            return Err(OpValidationErr::InvalidRecipients);
        }
    }
    Ok(())
}

impl Operation {
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            Operation::ProducerReward(_)
                | Operation::InterestPaid(_)
                | Operation::WitnessShutdown(_)
                | Operation::PromotionPoolWithdraw(_)
                | Operation::HardforkApplied(_)
        )
    }

    /// Authority-independent structural validation. Chain-state checks
    /// (balances, existence, deadlines against head time) belong to the
    /// evaluators.
    pub fn validate(&self) -> Result<(), OpValidationErr> {
        match self {
            Operation::AccountCreate(op) => {
                check_name(&op.creator)?;
                check_name(&op.new_account_name)?;
                if op.fee < 0 {
                    return Err(OpValidationErr::InvalidFee);
                }
                if !op.owner.is_valid() || !op.active.is_valid() {
                    return Err(OpValidationErr::InvalidAuthority);
                }
                check_json(&op.json_metadata)
            }
            Operation::AccountUpdate(op) => {
                check_name(&op.account)?;
                for auth in [&op.owner, &op.active].into_iter().flatten() {
                    if !auth.is_valid() {
                        return Err(OpValidationErr::InvalidAuthority);
                    }
                }
                if let Some(meta) = &op.json_metadata {
                    check_json(meta)?;
                }
                Ok(())
            }
            Operation::AccountDelete(op) => check_name(&op.account),
            Operation::Transfer(op) => {
                check_name(&op.from)?;
                check_name(&op.to)?;
                check_amount(op.amount)?;
                if op.memo.len() > MAX_MEMO_SIZE {
                    return Err(OpValidationErr::MemoTooLarge);
                }
                Ok(())
            }
            Operation::TransferToVesting(op) => {
                check_name(&op.from)?;
                check_name(&op.to)?;
                check_amount(op.amount)
            }
            Operation::WithdrawVesting(op) => {
                check_name(&op.account)?;
                check_amount(op.vesting_shares)
            }
            Operation::WitnessUpdate(op) => {
                check_name(&op.owner)?;
                if op.url.is_empty() || op.url.len() > 512 {
                    return Err(OpValidationErr::InvalidField("url"));
                }
                if op.props.account_creation_fee < 0
                    || op.props.maximum_block_size < MIN_BLOCK_SIZE_LIMIT
                {
                    return Err(OpValidationErr::InvalidField("props"));
                }
                Ok(())
            }
            Operation::WitnessStop(op) => check_name(&op.owner),
            Operation::AccountWitnessVote(op) => {
                check_name(&op.account)?;
                check_name(&op.witness)
            }
            Operation::FeedPublish(op) => {
                check_name(&op.publisher)?;
                if op.exchange_rate.is_valid() {
                    Ok(())
                } else {
                    Err(OpValidationErr::InvalidPrice)
                }
            }
            Operation::EscrowTransfer(op) => {
                check_name(&op.from)?;
                check_name(&op.to)?;
                check_name(&op.agent)?;
                check_amount(op.amount)?;
                if op.fee < 0 {
                    return Err(OpValidationErr::InvalidFee);
                }
                if op.escrow_expiration <= op.ratification_deadline {
                    return Err(OpValidationErr::DeadlineOrdering);
                }
                check_json(&op.json_meta)
            }
            Operation::EscrowApprove(op) => {
                check_name(&op.from)?;
                check_name(&op.to)?;
                check_name(&op.agent)?;
                check_name(&op.who)?;
                if op.who != op.to && op.who != op.agent {
                    return Err(OpValidationErr::InvalidParty);
                }
                Ok(())
            }
            Operation::EscrowDispute(op) => {
                check_name(&op.from)?;
                check_name(&op.to)?;
                check_name(&op.agent)?;
                check_name(&op.who)?;
                if op.who != op.from && op.who != op.to {
                    return Err(OpValidationErr::InvalidParty);
                }
                Ok(())
            }
            Operation::EscrowRelease(op) => {
                check_name(&op.from)?;
                check_name(&op.to)?;
                check_name(&op.agent)?;
                check_name(&op.who)?;
                check_name(&op.receiver)?;
                check_amount(op.amount)?;
                if op.who != op.from && op.who != op.to && op.who != op.agent {
                    return Err(OpValidationErr::InvalidParty);
                }
                if op.receiver != op.from && op.receiver != op.to {
                    return Err(OpValidationErr::InvalidParty);
                }
                Ok(())
            }
            Operation::CustomJson(op) => {
                check_name(&op.sender)?;
                check_recipients(&op.recipients)?;
                check_json(&op.json)
            }
            Operation::CustomBinary(op) => {
                check_name(&op.sender)?;
                check_recipients(&op.recipients)?;
                if op.data.is_empty() || op.data.len() > MAX_CUSTOM_DATA_SIZE {
                    return Err(OpValidationErr::DataTooLarge);
                }
                Ok(())
            }
            Operation::ApplicationCreate(op) => {
                check_name(&op.author)?;
                if op.name.is_empty() || op.name.len() > 64 {
                    return Err(OpValidationErr::InvalidField("name"));
                }
                if op.url.len() > 512 {
                    return Err(OpValidationErr::InvalidField("url"));
                }
                if let ApplicationPrice::OneTimeFee(fee) = op.price_param {
                    if fee <= 0 {
                        return Err(OpValidationErr::InvalidFee);
                    }
                }
                check_json(&op.metadata)
            }
            Operation::ApplicationUpdate(op) => {
                check_name(&op.author)?;
                if op.name.is_empty() || op.name.len() > 64 {
                    return Err(OpValidationErr::InvalidField("name"));
                }
                if let Some(author) = &op.new_author {
                    check_name(author)?;
                }
                if let Some(url) = &op.url {
                    if url.len() > 512 {
                        return Err(OpValidationErr::InvalidField("url"));
                    }
                }
                if let Some(meta) = &op.metadata {
                    check_json(meta)?;
                }
                if let Some(ApplicationPrice::OneTimeFee(fee)) = op.price_param {
                    if fee <= 0 {
                        return Err(OpValidationErr::InvalidFee);
                    }
                }
                Ok(())
            }
            Operation::ApplicationDelete(op) => {
                check_name(&op.author)?;
                if op.name.is_empty() || op.name.len() > 64 {
                    return Err(OpValidationErr::InvalidField("name"));
                }
                Ok(())
            }
            Operation::ApplicationBuy(op) => check_name(&op.buyer),
            Operation::ApplicationBuyingCancel(op) => {
                check_name(&op.author)?;
                check_name(&op.buyer)
            }
            Operation::PromotionPoolTransfer(op) => {
                check_name(&op.requested_by)?;
                check_name(&op.transfer_to)?;
                check_amount(op.amount)
            }
            Operation::SponsorFees(op) => {
                check_name(&op.sponsor)?;
                check_name(&op.sponsored)?;
                if op.sponsor == op.sponsored {
                    return Err(OpValidationErr::InvalidParty);
                }
                Ok(())
            }
            Operation::ProducerReward(_)
            | Operation::InterestPaid(_)
            | Operation::WitnessShutdown(_)
            | Operation::PromotionPoolWithdraw(_)
            | Operation::HardforkApplied(_) => Err(OpValidationErr::VirtualOperation),
        }
    }

    /// Accounts whose active authority must sign a transaction carrying
    /// this operation.
    pub fn required_active_authorities(&self, out: &mut Vec<AccountName>) {
        match self {
            Operation::AccountCreate(op) => out.push(op.creator.clone()),
            Operation::AccountUpdate(op) => {
                // Changing the owner authority requires the owner key
                if op.owner.is_none() {
                    out.push(op.account.clone());
                }
            }
            Operation::AccountDelete(_) => {}
            Operation::Transfer(op) => out.push(op.from.clone()),
            Operation::TransferToVesting(op) => out.push(op.from.clone()),
            Operation::WithdrawVesting(op) => out.push(op.account.clone()),
            Operation::WitnessUpdate(op) => out.push(op.owner.clone()),
            Operation::WitnessStop(op) => out.push(op.owner.clone()),
            Operation::AccountWitnessVote(op) => out.push(op.account.clone()),
            Operation::FeedPublish(op) => out.push(op.publisher.clone()),
            Operation::EscrowTransfer(op) => out.push(op.from.clone()),
            Operation::EscrowApprove(op) => out.push(op.who.clone()),
            Operation::EscrowDispute(op) => out.push(op.who.clone()),
            Operation::EscrowRelease(op) => out.push(op.who.clone()),
            Operation::CustomJson(op) => out.push(op.sender.clone()),
            Operation::CustomBinary(op) => out.push(op.sender.clone()),
            Operation::ApplicationCreate(op) => out.push(op.author.clone()),
            Operation::ApplicationUpdate(op) => out.push(op.author.clone()),
            Operation::ApplicationDelete(op) => out.push(op.author.clone()),
            Operation::ApplicationBuy(op) => out.push(op.buyer.clone()),
            Operation::ApplicationBuyingCancel(op) => out.push(op.author.clone()),
            Operation::PromotionPoolTransfer(op) => out.push(op.requested_by.clone()),
            Operation::SponsorFees(op) => out.push(op.sponsor.clone()),
            Operation::ProducerReward(_)
            | Operation::InterestPaid(_)
            | Operation::WitnessShutdown(_)
            | Operation::PromotionPoolWithdraw(_)
            | Operation::HardforkApplied(_) => {}
        }
    }

    /// Accounts whose owner authority must sign.
    pub fn required_owner_authorities(&self, out: &mut Vec<AccountName>) {
        match self {
            Operation::AccountUpdate(op) => {
                if op.owner.is_some() {
                    out.push(op.account.clone());
                }
            }
            Operation::AccountDelete(op) => out.push(op.account.clone()),
            _ => {}
        }
    }

    /// The account charged bandwidth and any fallback fee for a
    /// transaction carrying this operation. Sponsorship redirection is
    /// resolved against chain state by the pipeline.
    #[must_use]
    pub fn fee_payer(&self) -> &AccountName {
        match self {
            Operation::AccountCreate(op) => &op.creator,
            Operation::AccountUpdate(op) => &op.account,
            Operation::AccountDelete(op) => &op.account,
            Operation::Transfer(op) => &op.from,
            Operation::TransferToVesting(op) => &op.from,
            Operation::WithdrawVesting(op) => &op.account,
            Operation::WitnessUpdate(op) => &op.owner,
            Operation::WitnessStop(op) => &op.owner,
            Operation::AccountWitnessVote(op) => &op.account,
            Operation::FeedPublish(op) => &op.publisher,
            Operation::EscrowTransfer(op) => &op.from,
            Operation::EscrowApprove(op) => &op.who,
            Operation::EscrowDispute(op) => &op.who,
            Operation::EscrowRelease(op) => &op.who,
            Operation::CustomJson(op) => &op.sender,
            Operation::CustomBinary(op) => &op.sender,
            Operation::ApplicationCreate(op) => &op.author,
            Operation::ApplicationUpdate(op) => &op.author,
            Operation::ApplicationDelete(op) => &op.author,
            Operation::ApplicationBuy(op) => &op.buyer,
            Operation::ApplicationBuyingCancel(op) => &op.author,
            Operation::PromotionPoolTransfer(op) => &op.requested_by,
            Operation::SponsorFees(op) => &op.sponsor,
            Operation::ProducerReward(op) => &op.producer,
            Operation::InterestPaid(op) => &op.owner,
            Operation::WitnessShutdown(op) => &op.witness,
            Operation::PromotionPoolWithdraw(op) => &op.to,
            Operation::HardforkApplied(_) => {
                static GENESIS: AccountName = String::new();
                &GENESIS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_name_rules() {
        assert!(is_valid_account_name("alice"));
        assert!(is_valid_account_name("bob-2"));
        assert!(is_valid_account_name("abc"));
        assert!(!is_valid_account_name("ab"));
        assert!(!is_valid_account_name("Alice"));
        assert!(!is_valid_account_name("3lice"));
        assert!(!is_valid_account_name("alice-"));
        assert!(!is_valid_account_name("a-very-long-account-name"));
        assert!(!is_valid_account_name("al_ce"));
    }

    #[test]
    fn transfer_validation() {
        let mut op = TransferOperation {
            from: "alice".into(),
            to: "bob".into(),
            amount: 30,
            memo: String::new(),
        };
        assert!(Operation::Transfer(op.clone()).validate().is_ok());

        op.amount = 0;
        assert_eq!(
            Operation::Transfer(op.clone()).validate(),
            Err(OpValidationErr::NonPositiveAmount)
        );

        op.amount = 1;
        op.memo = "m".repeat(MAX_MEMO_SIZE + 1);
        assert_eq!(
            Operation::Transfer(op).validate(),
            Err(OpValidationErr::MemoTooLarge)
        );
    }

    #[test]
    fn escrow_deadline_ordering() {
        let op = EscrowTransferOperation {
            from: "alice".into(),
            to: "bob".into(),
            agent: "carol".into(),
            escrow_id: 1,
            amount: 10,
            fee: 1,
            ratification_deadline: 100,
            escrow_expiration: 100,
            json_meta: String::new(),
        };
        assert_eq!(
            Operation::EscrowTransfer(op).validate(),
            Err(OpValidationErr::DeadlineOrdering)
        );
    }

    #[test]
    fn virtual_ops_rejected_from_wire() {
        let op = Operation::ProducerReward(ProducerRewardOperation {
            producer: "alice".into(),
            reward: 1,
        });
        assert!(op.is_virtual());
        assert_eq!(op.validate(), Err(OpValidationErr::VirtualOperation));
    }

    #[test]
    fn custom_json_checks_payload() {
        let mut op = CustomJsonOperation {
            app_id: 7,
            sender: "alice".into(),
            recipients: vec!["bob".into()],
            json: r#"{"k":1}"#.into(),
        };
        assert!(Operation::CustomJson(op.clone()).validate().is_ok());

        op.json = "not json".into();
        assert_eq!(
            Operation::CustomJson(op.clone()).validate(),
            Err(OpValidationErr::InvalidJson)
        );

        op.json = "{}".into();
        op.recipients = vec!["bob".into(), "bob".into()];
        assert_eq!(
            Operation::CustomJson(op).validate(),
            Err(OpValidationErr::InvalidRecipients)
        );
    }

    #[test]
    fn update_owner_requires_owner_authority() {
        let op = Operation::AccountUpdate(AccountUpdateOperation {
            account: "alice".into(),
            owner: Some(Authority::single(PublicKey::null())),
            active: None,
            memo_key: None,
            json_metadata: None,
        });
        let mut owner = vec![];
        let mut active = vec![];
        op.required_owner_authorities(&mut owner);
        op.required_active_authorities(&mut active);
        assert_eq!(owner, vec!["alice".to_string()]);
        assert!(active.is_empty());
    }
}
