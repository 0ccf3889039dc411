//! Time-windowed notification rules.
//!
//! Every rule is evaluated against one campaign at a time and may produce a
//! message for the brand. `Once` rules are suppressed for good as soon as
//! their id is in the campaign's memo ledger; `Repeatable` rules fire whenever
//! their condition holds, unless they guard themselves with their own memo
//! keys (see [`Rule::CpmPayment`]).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::campaign::Campaign;
use crate::chat::{self, ChatMessage, ChatPlatform};
use crate::creator::Creator;
use crate::database::Database;
use crate::error::Error;
use crate::memo::MemoLedger;

pub mod engine;
mod lifecycle;
mod payment;
mod review;

pub use engine::{evaluate_rules, Evaluation, FiredRule};

/// How many recent messages are scanned per channel for brand activity.
const RECENT_MESSAGES: usize = 50;

pub const PAYMENT_PORTAL: &str = "https://warm.hotslicer.com/dashboard/payment";
pub const CONTACT_EMAIL: &str = "contact@hotslicer.com";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Once,
    Repeatable,
}

/// What a rule produced for this tick: the text for the brand and any memo
/// keys that must be recorded once it is delivered.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub body: String,
    pub memos: MemoLedger,
}

impl Message {
    pub fn text(body: impl Into<String>) -> Message {
        Message {
            body: body.into(),
            memos: MemoLedger::new(),
        }
    }
}

/// Collaborators and the clock shared by every rule in a tick.
pub struct RuleContext<'a> {
    pub db: &'a dyn Database,
    pub chat: &'a dyn ChatPlatform,
    pub now: DateTime<Utc>,
}

impl RuleContext<'_> {
    pub fn hours_since(&self, at: DateTime<Utc>) -> f64 {
        (self.now - at).num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn days_since(&self, at: DateTime<Utc>) -> f64 {
        self.hours_since(at) / 24.0
    }

    /// When the brand last posted into the creator's channel, if ever.
    pub async fn last_brand_activity(&self, creator: &Creator) -> Result<Option<DateTime<Utc>>, Error> {
        let endpoint = match &creator.chat {
            Some(endpoint) => endpoint,
            None => return Ok(None),
        };

        let messages: Vec<ChatMessage> = self
            .chat
            .fetch_recent_messages(&endpoint.channel_id, RECENT_MESSAGES)
            .await?;

        Ok(chat::last_brand_activity(&messages))
    }
}

/// The closed set of rules, in evaluation order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    ReviewCreators,
    AccountCreation,
    ContractNotSigned,
    DraftReview,
    FlatRatePayment,
    CpmPayment,
    ClientAbandonment,
}

impl Rule {
    pub const ALL: [Rule; 7] = [
        Rule::ReviewCreators,
        Rule::AccountCreation,
        Rule::ContractNotSigned,
        Rule::DraftReview,
        Rule::FlatRatePayment,
        Rule::CpmPayment,
        Rule::ClientAbandonment,
    ];

    /// Base memo key.
    pub fn id(self) -> &'static str {
        match self {
            Rule::ReviewCreators => "reviewCreatorsNudge",
            Rule::AccountCreation => "accountCreationNudge",
            Rule::ContractNotSigned => "contractNotSignedNudge",
            Rule::DraftReview => "draftSubmissionReminderNudge",
            Rule::FlatRatePayment => "flatRatePaymentNudge",
            Rule::CpmPayment => "cpmPaymentNudges",
            Rule::ClientAbandonment => "clientAbandonmentWarning",
        }
    }

    pub fn policy(self) -> Policy {
        match self {
            Rule::ReviewCreators => Policy::Once,
            Rule::AccountCreation => Policy::Repeatable,
            Rule::ContractNotSigned => Policy::Once,
            Rule::DraftReview => Policy::Once,
            Rule::FlatRatePayment => Policy::Repeatable,
            Rule::CpmPayment => Policy::Repeatable,
            Rule::ClientAbandonment => Policy::Once,
        }
    }

    /// May modify `campaign` when the rule has side effects on it.
    pub async fn evaluate(
        self,
        ctx: &RuleContext<'_>,
        campaign: &mut Campaign,
        memos: &MemoLedger,
    ) -> Result<Option<Message>, Error> {
        match self {
            Rule::ReviewCreators => lifecycle::review_creators(ctx, campaign).await,
            Rule::AccountCreation => Ok(lifecycle::account_creation(ctx, campaign)),
            Rule::ContractNotSigned => Ok(lifecycle::contract_not_signed(ctx, campaign)),
            Rule::DraftReview => review::draft_review(ctx, campaign).await,
            Rule::FlatRatePayment => payment::flat_rate_payment(ctx, campaign).await,
            Rule::CpmPayment => payment::cpm_payment(ctx, campaign, memos).await,
            Rule::ClientAbandonment => lifecycle::client_abandonment(ctx, campaign).await,
        }
    }
}
