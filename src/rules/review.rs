use tracing::warn;

use crate::campaign::Campaign;
use crate::creator::CreatorFilter;
use crate::error::Error;

use super::{Message, RuleContext};

const DRAFT_FALLBACK_URL: &str = "https://warm.hotslicer.com/dashboard/campaigns";

struct PendingDraft {
    name: String,
    url: String,
}

/// Drafts submitted 48 to 72 hours ago that the brand has not answered in the
/// creator's channel since.
pub(super) async fn draft_review(
    ctx: &RuleContext<'_>,
    campaign: &Campaign,
) -> Result<Option<Message>, Error> {
    let creators = ctx
        .db
        .creators()
        .fetch_creators_by_campaign(campaign.id, CreatorFilter::default())
        .await?;

    let mut pending = vec![];
    for creator in &creators {
        let submitted_at = match creator.content.draft_submitted_at {
            Some(submitted_at) => submitted_at,
            None => continue,
        };
        if !(48.0..=72.0).contains(&ctx.hours_since(submitted_at)) {
            continue;
        }

        let answered = match ctx.last_brand_activity(creator).await {
            Ok(activity) => activity.map_or(false, |at| at > submitted_at),
            Err(err) => {
                warn!(creator_id = %creator.id, %err, "skipping draft whose channel could not be read");
                continue;
            }
        };

        if !answered {
            pending.push(PendingDraft {
                name: creator.display_name.clone(),
                url: creator
                    .content
                    .draft_url
                    .clone()
                    .unwrap_or_else(|| DRAFT_FALLBACK_URL.to_string()),
            });
        }
    }

    let campaign_name = if campaign.name.trim().is_empty() {
        "your campaign"
    } else {
        campaign.name.as_str()
    };

    let body = match pending.as_slice() {
        [] => return Ok(None),
        [draft] => format!(
            "Hi {}, {} submitted their draft for {}!\n\n\
             It's been 48 hours since submission. Reviewing drafts promptly ensures campaign \
             timelines stay smooth.\n\n\
             View the draft here: {}",
            campaign.greeting_name(),
            draft.name,
            campaign_name,
            draft.url,
        ),
        drafts => {
            let list: Vec<String> = drafts
                .iter()
                .map(|draft| format!("- {}: {}", draft.name, draft.url))
                .collect();
            format!(
                "Hi {}, multiple creators have submitted drafts for {} that need review!\n\n\
                 The following drafts have been waiting for 48+ hours:\n{}\n\n\
                 Reviewing drafts promptly ensures campaign timelines stay smooth.",
                campaign.greeting_name(),
                campaign_name,
                list.join("\n"),
            )
        }
    };

    Ok(Some(Message::text(body)))
}
