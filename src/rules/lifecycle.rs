use tracing::warn;

use crate::campaign::{Campaign, CampaignStatus};
use crate::creator::CreatorFilter;
use crate::error::Error;

use super::{Message, RuleContext, CONTACT_EMAIL};

const REVIEW_AFTER_HOURS: f64 = 72.0;
const CONTRACT_AFTER_HOURS: f64 = 72.0;
const ABANDONED_AFTER_HOURS: f64 = 48.0;

pub(super) async fn review_creators(
    ctx: &RuleContext<'_>,
    campaign: &Campaign,
) -> Result<Option<Message>, Error> {
    if campaign.status != CampaignStatus::BriefSubmitted
        || ctx.hours_since(campaign.updated_at) < REVIEW_AFTER_HOURS
    {
        return Ok(None);
    }

    let applicants = ctx
        .db
        .creators()
        .fetch_creators_by_campaign(campaign.id, CreatorFilter::default())
        .await?
        .len();
    let interested = if applicants == 1 {
        "1 influencer is".to_string()
    } else {
        format!("{} influencers are", applicants)
    };

    Ok(Some(Message::text(format!(
        "Hey {}, congrats! You reached out and {} already interested 😎\n\n\
         Review channels now in your WARM portal!\n\n\
         Waiting longer may surface more niche or high-performance creators, but early \
         confirmation helps secure current talent before they book other deals.",
        campaign.greeting_name(),
        interested,
    ))))
}

/// Draft campaigns are nudged between 48 and 72 hours after creation and
/// again between 30 and 31 days. Both windows are inclusive.
pub(super) fn account_creation(ctx: &RuleContext<'_>, campaign: &Campaign) -> Option<Message> {
    if campaign.status != CampaignStatus::Draft {
        return None;
    }

    let hours = ctx.hours_since(campaign.created_at);
    let days = ctx.days_since(campaign.created_at);
    if !(48.0..=72.0).contains(&hours) && !(30.0..=31.0).contains(&days) {
        return None;
    }

    Some(Message::text(format!(
        "Hey {}, thank you so much for making an account on WARM. It seems like you have a \
         pending campaign draft.\n\n\
         If you have 3 minutes, make sure to finish submitting a campaign brief and get a list \
         of committed influencers in under 24 hours, ready to work!",
        campaign.greeting_name(),
    )))
}

pub(super) fn contract_not_signed(ctx: &RuleContext<'_>, campaign: &Campaign) -> Option<Message> {
    if campaign.status != CampaignStatus::CreatorsSelected
        || ctx.hours_since(campaign.updated_at) < CONTRACT_AFTER_HOURS
    {
        return None;
    }

    Some(Message::text(format!(
        "Hey {}, looks like you've chosen your influencers and are happy with your upcoming \
         campaign lineup 🎉\n\n\
         The next step is to finalize things and sign your contract. This ensures influencers \
         can start working on their content without delays.\n\n\
         Have questions or want to discuss details? Chat directly with us in your WARM \
         messaging panel or email us at {}",
        campaign.greeting_name(),
        CONTACT_EMAIL,
    )))
}

/// Warns a signed brand that has gone quiet. Firing moves the campaign's
/// `updated_at` to now so the inactivity window restarts, whether or not the
/// warning is delivered.
pub(super) async fn client_abandonment(
    ctx: &RuleContext<'_>,
    campaign: &mut Campaign,
) -> Result<Option<Message>, Error> {
    if campaign.status != CampaignStatus::ContractSigned {
        return Ok(None);
    }

    let creators = ctx
        .db
        .creators()
        .fetch_creators_by_campaign(campaign.id, CreatorFilter::default())
        .await?;

    let mut last_activity = None;
    for creator in &creators {
        match ctx.last_brand_activity(creator).await {
            Ok(activity) => last_activity = last_activity.max(activity),
            Err(err) => {
                warn!(creator_id = %creator.id, %err, "skipping channel when looking for brand activity")
            }
        }
    }

    let last_action = last_activity.unwrap_or(campaign.updated_at);
    if ctx.hours_since(last_action) < ABANDONED_AFTER_HOURS {
        return Ok(None);
    }

    let name = if campaign.name.trim().is_empty() {
        "campaign"
    } else {
        campaign.name.as_str()
    };
    let body = format!(
        "Hey {}, important reminder: your campaign {} has been launched but we've seen no \
         action from your side.\n\n\
         Under WARM terms, you are now contractually obligated to oversee and fund this \
         campaign.\n\n\
         If your plans have changed, you MUST book a call with us immediately to clarify next \
         steps and avoid any misalignment: https://warm.hotslicer.com/dashboard/welcome\n\n\
         Want a little load off your plate? There is still time! We offer full-service campaign \
         management for an additional 15% per influencer. Let us know ASAP if you'd like to \
         upgrade!",
        campaign.greeting_name(),
        name,
    );

    *campaign = ctx
        .db
        .campaigns()
        .touch_campaign(campaign.clone(), ctx.now)
        .await?;

    Ok(Some(Message::text(body)))
}
