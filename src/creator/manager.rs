use tracing::info;

use crate::campaign::manager::require_feature;
use crate::campaign::{Campaign, CampaignId, CampaignStatus, Feature};
use crate::chat::{ChatPlatform, MemberId};
use crate::database::{self, Database};
use crate::error::Error;
use crate::provisioning;

use super::{ContentKind, Creator, CreatorFilter, CreatorId, Payment};

async fn assert_creator_in_campaign(
    db: &dyn Database,
    campaign_id: CampaignId,
    creator_id: CreatorId,
) -> Result<Creator, Error> {
    db.creators()
        .fetch_creator_by_campaign_and_id(campaign_id, creator_id)
        .await?
        .ok_or(Error::CreatorNotFoundInCampaign {
            campaign_id,
            creator_id,
        })
}

/// Adds an applicant to the campaign. Applicants join unselected, so their
/// private channel is opened right away only while the campaign has a home
/// and creators are not yet finalized. Later joiners get one when selected.
#[tracing::instrument(skip(db, chat))]
pub async fn join_campaign(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign_id: CampaignId,
    display_name: String,
    member_id: MemberId,
    channel_url: Option<String>,
) -> Result<Creator, Error> {
    let campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;

    let now = database::timestamp();
    let creator = Creator {
        id: CreatorId::new(),
        campaign_id,
        display_name,
        member_id,
        channel_url,
        selected: false,
        chat: None,
        content: Default::default(),
        payment: Default::default(),
        created_at: now,
        updated_at: now,
    };

    db.creators().insert_creator(&creator).await?;
    info!(%campaign_id, creator_id = %creator.id, "creator joined campaign");

    if campaign.resources.category_id.is_some() && !is_finalized(&campaign) {
        return provisioning::provision_creator_channel(db, chat, &campaign, creator).await;
    }

    Ok(creator)
}

#[tracing::instrument(skip(db))]
pub async fn get_creators_in_campaign(
    db: &dyn Database,
    campaign_id: CampaignId,
) -> Result<Vec<Creator>, Error> {
    let campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;
    require_feature(&campaign, Feature::CreatorVisibility)?;

    db.creators()
        .fetch_creators_by_campaign(campaign_id, CreatorFilter::default())
        .await
}

fn is_finalized(campaign: &Campaign) -> bool {
    campaign.status >= CampaignStatus::CreatorsSelected
}

/// Selects or unselects a creator. Once creators are finalized, unselecting
/// removes the creator's channel and selecting opens one.
#[tracing::instrument(skip(db, chat))]
pub async fn set_selection(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign_id: CampaignId,
    creator_id: CreatorId,
    selected: bool,
) -> Result<Creator, Error> {
    let campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;
    let creator = assert_creator_in_campaign(db, campaign_id, creator_id).await?;

    let creator = if creator.selected == selected {
        creator
    } else {
        db.creators()
            .update_creator_selection(creator, selected)
            .await?
    };

    if !is_finalized(&campaign) {
        return Ok(creator);
    }

    if selected {
        provisioning::provision_creator_channel(db, chat, &campaign, creator).await
    } else {
        provisioning::remove_creator_channel(db, chat, &campaign, creator).await
    }
}

/// Records a content reference. Draft and live submissions are timestamped.
#[tracing::instrument(skip(db))]
pub async fn submit_content(
    db: &dyn Database,
    campaign_id: CampaignId,
    creator_id: CreatorId,
    kind: ContentKind,
    url: String,
) -> Result<Creator, Error> {
    let creator = assert_creator_in_campaign(db, campaign_id, creator_id).await?;

    let now = database::timestamp();
    let mut content = creator.content.clone();
    match kind {
        ContentKind::Draft => {
            content.draft_url = Some(url);
            content.draft_submitted_at = Some(now);
        }
        ContentKind::Final => content.final_url = Some(url),
        ContentKind::Live => {
            content.live_url = Some(url);
            content.live_submitted_at = Some(now);
        }
    }

    db.creators().update_creator_content(creator, content).await
}

/// Flips payment flags; flags left as `None` keep their value.
#[tracing::instrument(skip(db))]
pub async fn mark_payment(
    db: &dyn Database,
    campaign_id: CampaignId,
    creator_id: CreatorId,
    flat_paid: Option<bool>,
    cpm_paid: Option<bool>,
) -> Result<Creator, Error> {
    let campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;
    require_feature(&campaign, Feature::Payments)?;

    let creator = assert_creator_in_campaign(db, campaign_id, creator_id).await?;
    let payment = Payment {
        flat_paid: flat_paid.unwrap_or(creator.payment.flat_paid),
        cpm_paid: cpm_paid.unwrap_or(creator.payment.cpm_paid),
    };

    db.creators().update_creator_payment(creator, payment).await
}
