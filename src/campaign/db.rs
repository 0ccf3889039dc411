use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson;

use crate::database::{self, MongoCampaignStore};
use crate::error::Error;

use super::{Campaign, CampaignId, CampaignResources, CampaignStatus};

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error>;

    async fn fetch_campaign_by_id(&self, campaign_id: CampaignId)
        -> Result<Option<Campaign>, Error>;

    async fn assert_campaign_exists(&self, campaign_id: CampaignId) -> Result<Campaign, Error> {
        self.fetch_campaign_by_id(campaign_id)
            .await?
            .ok_or(Error::CampaignNotFound { campaign_id })
    }

    /// Campaigns with a notification destination set, valid or not.
    async fn fetch_campaigns_with_destination(&self) -> Result<Vec<Campaign>, Error>;

    async fn update_campaign_status(
        &self,
        campaign: Campaign,
        status: CampaignStatus,
    ) -> Result<Campaign, Error>;

    async fn update_campaign_resources(
        &self,
        campaign: Campaign,
        resources: CampaignResources,
    ) -> Result<Campaign, Error>;

    async fn update_campaign_destination(
        &self,
        campaign: Campaign,
        destination: Option<String>,
    ) -> Result<Campaign, Error>;

    /// Moves `updated_at` to `at` without changing anything else.
    async fn touch_campaign(&self, campaign: Campaign, at: DateTime<Utc>)
        -> Result<Campaign, Error>;
}

async fn set_fields(
    db: &MongoCampaignStore,
    campaign: &Campaign,
    mut fields: bson::Document,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let old_updated_at = bson::DateTime::from_chrono(campaign.updated_at);
    fields.insert("updated_at", bson::DateTime::from_chrono(now));

    let result = db
        .update_one(
            bson::doc! { "_id": campaign.id, "updated_at": old_updated_at },
            bson::doc! { "$set": fields },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(Error::ConcurrentModificationDetected);
    }

    Ok(())
}

#[async_trait]
impl CampaignStore for MongoCampaignStore {
    #[tracing::instrument(skip(self))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        self.insert_one(campaign, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        let campaign: Option<Campaign> =
            self.find_one(bson::doc! { "_id": campaign_id }, None).await?;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaigns_with_destination(&self) -> Result<Vec<Campaign>, Error> {
        let campaigns: Vec<Campaign> = self
            .find(bson::doc! { "updates_destination": { "$ne": null } }, None)
            .await?
            .try_collect()
            .await?;

        Ok(campaigns)
    }

    #[tracing::instrument(skip(self))]
    async fn update_campaign_status(
        &self,
        mut campaign: Campaign,
        status: CampaignStatus,
    ) -> Result<Campaign, Error> {
        let now = database::next_timestamp(campaign.updated_at);
        let new_status = bson::to_bson(&status)?;

        set_fields(self, &campaign, bson::doc! { "status": new_status }, now)
            .await?;

        campaign.updated_at = now;
        campaign.status = status;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn update_campaign_resources(
        &self,
        mut campaign: Campaign,
        resources: CampaignResources,
    ) -> Result<Campaign, Error> {
        let now = database::next_timestamp(campaign.updated_at);
        let new_resources = bson::to_bson(&resources)?;

        set_fields(self, &campaign, bson::doc! { "resources": new_resources }, now)
            .await?;

        campaign.updated_at = now;
        campaign.resources = resources;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn update_campaign_destination(
        &self,
        mut campaign: Campaign,
        destination: Option<String>,
    ) -> Result<Campaign, Error> {
        let now = database::next_timestamp(campaign.updated_at);
        let new_destination = bson::to_bson(&destination)?;

        set_fields(
            self,
            &campaign,
            bson::doc! { "updates_destination": new_destination },
            now,
        )
        .await?;

        campaign.updated_at = now;
        campaign.updates_destination = destination;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn touch_campaign(
        &self,
        mut campaign: Campaign,
        at: DateTime<Utc>,
    ) -> Result<Campaign, Error> {
        let at = database::truncate(at);

        set_fields(self, &campaign, bson::Document::new(), at).await?;

        campaign.updated_at = at;

        Ok(campaign)
    }
}
