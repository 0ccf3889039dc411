use chrono::Duration;

use crate::campaign::Campaign;
use crate::creator::CreatorFilter;
use crate::error::Error;
use crate::memo::MemoLedger;

use super::{Message, Rule, RuleContext, CONTACT_EMAIL, PAYMENT_PORTAL};

/// Days after going live at which each CPM reminder is sent, in check order.
const CPM_STAGES: [(i64, &str); 4] = [(14, "14day"), (27, "27day"), (30, "dueDate"), (32, "overdue")];
const CPM_DUE_AFTER_DAYS: i64 = 30;

pub fn cpm_memo_key(stage: &str, channel_url: &str) -> String {
    format!("{}_{}_{}", Rule::CpmPayment.id(), stage, channel_url)
}

/// Creators whose final content is in but whose flat fee is unpaid.
pub(super) async fn flat_rate_payment(
    ctx: &RuleContext<'_>,
    campaign: &Campaign,
) -> Result<Option<Message>, Error> {
    let filter = CreatorFilter {
        flat_paid: Some(false),
        ..Default::default()
    };
    let unpaid: Vec<String> = ctx
        .db
        .creators()
        .fetch_creators_by_campaign(campaign.id, filter)
        .await?
        .iter()
        .filter(|creator| creator.content.has_final())
        .map(|creator| creator.short_name())
        .collect();

    if unpaid.is_empty() {
        return Ok(None);
    }

    let posted = if unpaid.len() > 1 {
        "Their videos have"
    } else {
        "Their video has"
    };

    Ok(Some(Message::text(format!(
        "Hey {}!\n\n\
         Quick check-in about {}. {} been posted but we see an invoice has not been initiated \
         yet. Please visit your WARM portal payment page and send the invoice to your financial \
         team to make sure everything goes smoothly: {}\n\n\
         Delayed payments slow down the campaign and can result in influencers not being \
         interested in future campaigns.\n\n\
         If net30, net60 etc. payment terms have not yet been communicated directly with the \
         WARM team, please do so ASAP.\n\n\
         Concerns or using a custom payment solution? Message our staff directly on your WARM \
         messaging panel or reach out via email at {}",
        campaign.greeting_name(),
        unpaid.join(", "),
        posted,
        PAYMENT_PORTAL,
        CONTACT_EMAIL,
    ))))
}

/// Staged CPM reminders. Stages match on the exact number of whole days since
/// the content went live, so a day without a tick misses that stage. Returns
/// on the first creator and stage that has not been sent yet, with that
/// stage's memo key in the message.
pub(super) async fn cpm_payment(
    ctx: &RuleContext<'_>,
    campaign: &Campaign,
    memos: &MemoLedger,
) -> Result<Option<Message>, Error> {
    let filter = CreatorFilter {
        cpm_paid: Some(false),
        ..Default::default()
    };
    let creators = ctx
        .db
        .creators()
        .fetch_creators_by_campaign(campaign.id, filter)
        .await?;

    for creator in &creators {
        let channel_url = match creator.channel_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => continue,
        };
        let live_at = match creator.content.live_submitted_at {
            Some(live_at) => live_at,
            None => continue,
        };
        let days_since_live = (ctx.now - live_at).num_days();

        for (days, stage) in CPM_STAGES {
            if days_since_live != days {
                continue;
            }

            let key = cpm_memo_key(stage, channel_url);
            if memos.contains(&key) {
                continue;
            }

            let due_date = (live_at + Duration::days(CPM_DUE_AFTER_DAYS))
                .format("%B %-d")
                .to_string();
            let body = cpm_message(campaign, stage, &creator.short_name(), &due_date);

            let mut patch = MemoLedger::new();
            patch.record(key, ctx.now);
            return Ok(Some(Message {
                body,
                memos: patch,
            }));
        }
    }

    Ok(None)
}

fn cpm_message(campaign: &Campaign, stage: &str, short_name: &str, due_date: &str) -> String {
    let greeting = campaign.greeting_name();
    match stage {
        "14day" => format!(
            "Hey {}!\n\n\
             Just a reminder that {}’s CPM payment will be due on {}. To ensure everything goes \
             smoothly, make sure your financial team is ready.\n\n\
             WARM automatically tracks the views. We will remind you 3 days before this is due \
             along with a payment estimate.\n\n\
             Have a custom financial process? Message our staff directly on your WARM messaging \
             panel or reach out via email at {}",
            greeting, short_name, due_date, CONTACT_EMAIL,
        ),
        "27day" => format!(
            "Hey {}!\n\n\
             Friendly reminder that {}’s CPM payment will be due on {}. To ensure everything goes \
             smoothly, make sure your financial team is ready.\n\n\
             {}’s estimated payment will be available in 3 days. We will remind you again on the \
             due date with final numbers.\n\n\
             Have a custom financial process? Message our staff directly on your WARM messaging \
             panel or reach out via email at {}",
            greeting, short_name, due_date, short_name, CONTACT_EMAIL,
        ),
        "dueDate" => format!(
            "Hey {}!\n\n\
             Your CPM payment is now due! {}’s CPM payment is due! Login to your payment portal \
             here: {}\n\n\
             Have a custom financial process? Message our staff directly on your WARM messaging \
             panel or reach out via email at {}",
            greeting, short_name, PAYMENT_PORTAL, CONTACT_EMAIL,
        ),
        _ => format!(
            "Hey {}!\n\n\
             Just a heads-up: Your CPM payment is overdue! {}’s CPM payment was due two days \
             ago. Please visit your payment portal here: {} to make sure everything’s on \
             track.\n\n\
             Delayed payments may affect influencer interest in future campaigns.\n\n\
             Questions? Message our staff directly on your WARM messaging panel or reach out via \
             email at {}",
            greeting, short_name, PAYMENT_PORTAL, CONTACT_EMAIL,
        ),
    }
}
