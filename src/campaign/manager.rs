use tracing::{info, warn};

use crate::chat::ChatPlatform;
use crate::database::{self, Database};
use crate::error::Error;
use crate::notify::Destination;
use crate::provisioning;

use super::status::{self, SideEffect};
use super::{Campaign, CampaignId, CampaignStatus, Feature};

#[tracing::instrument(skip(db))]
pub async fn create_campaign(
    db: &dyn Database,
    name: String,
    rep_name: Option<String>,
) -> Result<Campaign, Error> {
    let campaign = Campaign::new(name, rep_name, database::timestamp());

    db.campaigns().insert_campaign(&campaign).await?;

    Ok(campaign)
}

#[tracing::instrument(skip(db))]
pub async fn get_campaign_by_id(
    db: &dyn Database,
    campaign_id: CampaignId,
) -> Result<Campaign, Error> {
    db.campaigns().assert_campaign_exists(campaign_id).await
}

pub fn require_feature(campaign: &Campaign, feature: Feature) -> Result<(), Error> {
    if campaign.is_unlocked(feature) {
        Ok(())
    } else {
        Err(Error::FeatureLocked {
            campaign_id: campaign.id,
            feature,
            status: campaign.status,
        })
    }
}

/// Sets or clears where the campaign's updates are delivered. A value that is
/// neither an email address nor a webhook url is rejected.
#[tracing::instrument(skip(db))]
pub async fn set_destination(
    db: &dyn Database,
    campaign_id: CampaignId,
    destination: Option<String>,
) -> Result<Campaign, Error> {
    let destination = match destination {
        Some(raw) if !raw.trim().is_empty() => {
            Destination::parse(&raw)?;
            Some(raw.trim().to_string())
        }
        _ => None,
    };

    let campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;
    let campaign = db
        .campaigns()
        .update_campaign_destination(campaign, destination)
        .await?;

    Ok(campaign)
}

/// Runs the provisioning registered for the step to `target` and then moves
/// the campaign there. Only the immediate successor is accepted. If
/// provisioning fails the status is left where it was, and since every
/// provisioning step skips resources that already exist the same advance
/// can simply be retried.
#[tracing::instrument(skip(db, chat))]
pub async fn advance_campaign(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign_id: CampaignId,
    target: CampaignStatus,
) -> Result<Campaign, Error> {
    let mut campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;
    let from = campaign.status;

    if !status::can_advance(from, target) {
        return Err(Error::InvalidTransition {
            campaign_id,
            from,
            to: target,
        });
    }

    for effect in status::side_effects(from, target) {
        campaign = match effect {
            SideEffect::ProvisionCampaignHome => {
                provisioning::provision_campaign_home(db, chat, campaign).await?
            }
            SideEffect::TeardownUnselected => {
                let report = provisioning::teardown_unselected(db, chat, &campaign).await?;
                if !report.is_clean() {
                    warn!(%campaign_id, failed = report.failed.len(), "some unselected channels could not be deleted");
                }
                campaign
            }
            SideEffect::ProvisionGroupChannel => {
                provisioning::provision_group_channel(db, chat, campaign).await?
            }
        };
    }

    let campaign = db
        .campaigns()
        .update_campaign_status(campaign, target)
        .await?;
    info!(%campaign_id, from = from.as_str(), to = target.as_str(), "advanced campaign");

    Ok(campaign)
}

/// Administrative reset: tears every chat resource down and puts the campaign
/// back into draft.
#[tracing::instrument(skip(db, chat))]
pub async fn reset_campaign(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign_id: CampaignId,
) -> Result<Campaign, Error> {
    let campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;

    let (campaign, report) = provisioning::teardown_all(db, chat, campaign).await?;
    if !report.is_clean() {
        warn!(%campaign_id, failed = report.failed.len(), "some campaign resources could not be deleted");
    }

    if campaign.status == CampaignStatus::Draft {
        return Ok(campaign);
    }

    let campaign = db
        .campaigns()
        .update_campaign_status(campaign, CampaignStatus::Draft)
        .await?;
    info!(%campaign_id, "reset campaign to draft");

    Ok(campaign)
}

/// Posts into the group channel through its relay endpoint, as the brand.
#[tracing::instrument(skip(db, chat))]
pub async fn post_group_message(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign_id: CampaignId,
    text: String,
) -> Result<(), Error> {
    let campaign = db.campaigns().assert_campaign_exists(campaign_id).await?;
    require_feature(&campaign, Feature::Messaging)?;

    let group = campaign
        .resources
        .group_channel
        .as_ref()
        .ok_or(Error::MissingGroupChannel { campaign_id })?;

    chat.send_via_relay(&group.relay_url, &text).await
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::chat::test::MockChatPlatform;
    use crate::chat::MemberId;
    use crate::creator::db::CreatorStore;
    use crate::creator::Creator;
    use crate::database::test::MockDatabase;

    async fn advance_to(
        db: &MockDatabase,
        chat: &MockChatPlatform,
        campaign_id: CampaignId,
        target: CampaignStatus,
    ) -> Campaign {
        let mut campaign = get_campaign_by_id(db, campaign_id).await.unwrap();
        while campaign.status < target {
            let next = campaign.status.successor().unwrap();
            campaign = advance_campaign(db, chat, campaign_id, next).await.unwrap();
        }
        campaign
    }

    async fn join(db: &MockDatabase, campaign_id: CampaignId, name: &str, selected: bool) -> Creator {
        let now = Utc::now();
        let creator = Creator {
            id: Default::default(),
            campaign_id,
            display_name: name.into(),
            member_id: MemberId(name.into()),
            channel_url: None,
            selected,
            chat: None,
            content: Default::default(),
            payment: Default::default(),
            created_at: now,
            updated_at: now,
        };
        db.creators.insert_creator(&creator).await.unwrap();
        creator
    }

    #[tokio::test]
    async fn can_create_campaign() {
        let db = MockDatabase::new();

        let campaign = create_campaign(&db, "Blue Man Group".into(), Some("Rae".into()))
            .await
            .unwrap();

        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.created_at, campaign.updated_at);
        assert_eq!(db.campaigns.get(campaign.id).unwrap().name, "Blue Man Group");
    }

    #[tokio::test]
    async fn get_campaign_by_id_returns_error_if_doesnt_exist() {
        let db = MockDatabase::new();
        let campaign_id = CampaignId::new();

        let result = get_campaign_by_id(&db, campaign_id).await;

        assert_eq!(result.unwrap_err(), Error::CampaignNotFound { campaign_id });
    }

    #[tokio::test]
    async fn advancing_past_the_successor_is_rejected_without_side_effects() {
        let db = MockDatabase::new();
        let chat = MockChatPlatform::new();
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();

        let result =
            advance_campaign(&db, &chat, campaign.id, CampaignStatus::CreatorsSelected).await;

        assert_eq!(
            result.unwrap_err(),
            Error::InvalidTransition {
                campaign_id: campaign.id,
                from: CampaignStatus::Draft,
                to: CampaignStatus::CreatorsSelected,
            }
        );
        let stored = db.campaigns.get(campaign.id).unwrap();
        assert_eq!(stored.status, CampaignStatus::Draft);
        assert_eq!(stored.updated_at, campaign.updated_at);
        assert!(chat.with_state(|state| state.containers.is_empty()));
    }

    #[tokio::test]
    async fn submitting_the_brief_provisions_the_campaign_home() {
        let db = MockDatabase::new();
        let chat = MockChatPlatform::new();
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();

        let advanced =
            advance_campaign(&db, &chat, campaign.id, CampaignStatus::BriefSubmitted)
                .await
                .unwrap();

        assert_eq!(advanced.status, CampaignStatus::BriefSubmitted);
        assert!(advanced.updated_at > campaign.updated_at);
        assert!(advanced.resources.category_id.is_some());
        assert!(advanced.resources.staff_channel.is_some());
    }

    #[tokio::test]
    async fn provisioning_failure_leaves_status_unchanged_and_can_be_retried() {
        let db = MockDatabase::new();
        let chat = MockChatPlatform::new();
        chat.with_state(|state| state.fail_creates = true);
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();

        let result = advance_campaign(&db, &chat, campaign.id, CampaignStatus::BriefSubmitted).await;

        assert!(matches!(result, Err(Error::ExternalServiceFailed { .. })));
        let stored = db.campaigns.get(campaign.id).unwrap();
        assert_eq!(stored.status, CampaignStatus::Draft);
        assert!(stored.resources.is_empty());

        chat.with_state(|state| state.fail_creates = false);
        let advanced = advance_campaign(&db, &chat, campaign.id, CampaignStatus::BriefSubmitted)
            .await
            .unwrap();

        assert_eq!(advanced.status, CampaignStatus::BriefSubmitted);
        assert!(advanced.resources.staff_channel.is_some());
        let stored = db.campaigns.get(campaign.id).unwrap();
        assert_eq!(stored.status, CampaignStatus::BriefSubmitted);
        assert_eq!(stored.updated_at, advanced.updated_at);
    }

    #[tokio::test]
    async fn failed_finalization_keeps_the_campaign_at_brief_submitted() {
        let db = MockDatabase::new();
        let chat = MockChatPlatform::new();
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();
        advance_to(&db, &chat, campaign.id, CampaignStatus::BriefSubmitted).await;
        join(&db, campaign.id, "picked", true).await;
        chat.with_state(|state| state.fail_creates = true);

        let result =
            advance_campaign(&db, &chat, campaign.id, CampaignStatus::CreatorsSelected).await;

        assert!(matches!(result, Err(Error::ExternalServiceFailed { .. })));
        assert_eq!(
            db.campaigns.get(campaign.id).unwrap().status,
            CampaignStatus::BriefSubmitted
        );

        chat.with_state(|state| state.fail_creates = false);
        let campaign =
            advance_campaign(&db, &chat, campaign.id, CampaignStatus::CreatorsSelected)
                .await
                .unwrap();

        assert_eq!(campaign.status, CampaignStatus::CreatorsSelected);
        assert!(campaign.resources.category_id.is_some());
        assert!(campaign.resources.group_channel.is_some());
    }

    #[tokio::test]
    async fn finalizing_creators_tears_down_unselected_and_opens_group_channel() {
        let db = MockDatabase::new();
        let chat = MockChatPlatform::new();
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();
        let campaign = advance_to(&db, &chat, campaign.id, CampaignStatus::BriefSubmitted).await;
        let picked = join(&db, campaign.id, "picked", true).await;
        let passed = join(&db, campaign.id, "passed", false).await;
        provisioning::provision_creator_channel(&db, &chat, &campaign, passed.clone())
            .await
            .unwrap();

        let campaign =
            advance_campaign(&db, &chat, campaign.id, CampaignStatus::CreatorsSelected)
                .await
                .unwrap();

        assert!(campaign.resources.group_channel.is_some());
        assert!(db.creators.get(passed.id).unwrap().chat.is_none());
        assert!(db.creators.get(picked.id).unwrap().chat.is_some());
        assert_eq!(chat.deleted().len(), 1);
    }

    #[tokio::test]
    async fn reset_returns_campaign_to_draft_without_resources() {
        let db = MockDatabase::new();
        let chat = MockChatPlatform::new();
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();
        join(&db, campaign.id, "picked", true).await;
        advance_to(&db, &chat, campaign.id, CampaignStatus::CreatorsSelected).await;

        let campaign = reset_campaign(&db, &chat, campaign.id).await.unwrap();

        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert!(campaign.resources.is_empty());
        assert_eq!(chat.live_channel_count(), 0);
    }

    #[tokio::test]
    async fn destination_is_validated_and_trimmed() {
        let db = MockDatabase::new();
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();

        let invalid = set_destination(&db, campaign.id, Some("nope".into())).await;
        let valid = set_destination(&db, campaign.id, Some(" brand@example.com ".into()))
            .await
            .unwrap();

        assert_eq!(
            invalid.unwrap_err(),
            Error::InvalidDestination {
                destination: "nope".into()
            }
        );
        assert_eq!(valid.updates_destination.as_deref(), Some("brand@example.com"));
    }

    #[tokio::test]
    async fn group_messages_require_messaging_to_be_unlocked() {
        let db = MockDatabase::new();
        let chat = MockChatPlatform::new();
        let campaign = create_campaign(&db, "Acme".into(), None).await.unwrap();
        advance_to(&db, &chat, campaign.id, CampaignStatus::BriefSubmitted).await;

        let locked = post_group_message(&db, &chat, campaign.id, "hello".into()).await;
        advance_to(&db, &chat, campaign.id, CampaignStatus::CreatorsSelected).await;
        post_group_message(&db, &chat, campaign.id, "hello".into())
            .await
            .unwrap();

        assert_eq!(
            locked.unwrap_err(),
            Error::FeatureLocked {
                campaign_id: campaign.id,
                feature: Feature::Messaging,
                status: CampaignStatus::BriefSubmitted,
            }
        );
        assert_eq!(chat.with_state(|state| state.relayed.len()), 1);
    }
}
