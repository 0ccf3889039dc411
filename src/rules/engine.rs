use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::campaign::Campaign;
use crate::memo::MemoLedger;

use super::{Message, Policy, Rule, RuleContext};

#[derive(Clone, Debug, PartialEq)]
pub struct FiredRule {
    pub rule: Rule,
    pub message: Message,
}

/// Everything the rules produced for one campaign in one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub fired: Vec<FiredRule>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }

    /// The fired messages in rule order, joined by `separator`.
    pub fn payload(&self, separator: &str) -> String {
        self.fired
            .iter()
            .map(|fired| fired.message.body.trim())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Memo entries to commit once the payload has been delivered: the id of
    /// every `Once` rule that fired plus any keys the rules asked for.
    pub fn memo_patch(&self, at: DateTime<Utc>) -> MemoLedger {
        let mut patch = MemoLedger::new();
        for fired in &self.fired {
            if fired.rule.policy() == Policy::Once {
                patch.record(fired.rule.id(), at);
            }
            patch.merge(&fired.message.memos);
        }
        patch
    }
}

/// Runs every rule in order against `campaign`. `Once` rules already in
/// `memos` are skipped. A failing rule is logged and treated as silent.
#[tracing::instrument(skip_all, fields(campaign_id = %campaign.id))]
pub async fn evaluate_rules(
    ctx: &RuleContext<'_>,
    campaign: &mut Campaign,
    memos: &MemoLedger,
) -> Evaluation {
    let mut evaluation = Evaluation::default();

    for rule in Rule::ALL {
        if rule.policy() == Policy::Once && memos.contains(rule.id()) {
            continue;
        }

        match rule.evaluate(ctx, campaign, memos).await {
            Ok(Some(message)) => {
                debug!(rule = rule.id(), "rule fired");
                evaluation.fired.push(FiredRule { rule, message });
            }
            Ok(None) => {}
            Err(err) => warn!(rule = rule.id(), %err, "rule evaluation failed"),
        }
    }

    evaluation
}
