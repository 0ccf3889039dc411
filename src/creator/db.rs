use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson;

use crate::campaign::CampaignId;
use crate::chat::ChatEndpoint;
use crate::database::{self, MongoCreatorStore};
use crate::error::Error;

use super::{Content, Creator, CreatorFilter, CreatorId, Payment};

#[async_trait]
pub trait CreatorStore: Send + Sync {
    async fn insert_creator(&self, creator: &Creator) -> Result<(), Error>;

    async fn fetch_creator_by_campaign_and_id(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> Result<Option<Creator>, Error>;

    async fn fetch_creators_by_campaign(
        &self,
        campaign_id: CampaignId,
        filter: CreatorFilter,
    ) -> Result<Vec<Creator>, Error>;

    async fn update_creator_selection(
        &self,
        creator: Creator,
        selected: bool,
    ) -> Result<Creator, Error>;

    async fn update_creator_chat(
        &self,
        creator: Creator,
        chat: Option<ChatEndpoint>,
    ) -> Result<Creator, Error>;

    async fn update_creator_content(
        &self,
        creator: Creator,
        content: Content,
    ) -> Result<Creator, Error>;

    async fn update_creator_payment(
        &self,
        creator: Creator,
        payment: Payment,
    ) -> Result<Creator, Error>;
}

fn filter_document(campaign_id: CampaignId, filter: CreatorFilter) -> bson::Document {
    let mut document = bson::doc! { "campaign_id": campaign_id };
    if let Some(selected) = filter.selected {
        document.insert("selected", selected);
    }
    if let Some(flat_paid) = filter.flat_paid {
        document.insert("payment.flat_paid", flat_paid);
    }
    if let Some(cpm_paid) = filter.cpm_paid {
        document.insert("payment.cpm_paid", cpm_paid);
    }
    document
}

async fn set_fields(
    db: &MongoCreatorStore,
    creator: &Creator,
    mut fields: bson::Document,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let old_updated_at = bson::DateTime::from_chrono(creator.updated_at);
    fields.insert("updated_at", bson::DateTime::from_chrono(now));

    let result = db
        .update_one(
            bson::doc! { "_id": creator.id, "updated_at": old_updated_at },
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
impl CreatorStore for MongoCreatorStore {
    #[tracing::instrument(skip(self))]
    async fn insert_creator(&self, creator: &Creator) -> Result<(), Error> {
        self.insert_one(creator, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_creator_by_campaign_and_id(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> Result<Option<Creator>, Error> {
        let creator: Option<Creator> = self
            .find_one(
                bson::doc! { "_id": creator_id, "campaign_id": campaign_id },
                None,
            )
            .await?;

        Ok(creator)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_creators_by_campaign(
        &self,
        campaign_id: CampaignId,
        filter: CreatorFilter,
    ) -> Result<Vec<Creator>, Error> {
        let creators: Vec<Creator> = self
            .find(filter_document(campaign_id, filter), None)
            .await?
            .try_collect()
            .await?;

        Ok(creators)
    }

    #[tracing::instrument(skip(self))]
    async fn update_creator_selection(
        &self,
        mut creator: Creator,
        selected: bool,
    ) -> Result<Creator, Error> {
        let now = database::next_timestamp(creator.updated_at);

        set_fields(self, &creator, bson::doc! { "selected": selected }, now).await?;

        creator.updated_at = now;
        creator.selected = selected;

        Ok(creator)
    }

    #[tracing::instrument(skip(self))]
    async fn update_creator_chat(
        &self,
        mut creator: Creator,
        chat: Option<ChatEndpoint>,
    ) -> Result<Creator, Error> {
        let now = database::next_timestamp(creator.updated_at);
        let new_chat = bson::to_bson(&chat)?;

        set_fields(self, &creator, bson::doc! { "chat": new_chat }, now).await?;

        creator.updated_at = now;
        creator.chat = chat;

        Ok(creator)
    }

    #[tracing::instrument(skip(self))]
    async fn update_creator_content(
        &self,
        mut creator: Creator,
        content: Content,
    ) -> Result<Creator, Error> {
        let now = database::next_timestamp(creator.updated_at);
        let new_content = bson::to_bson(&content)?;

        set_fields(self, &creator, bson::doc! { "content": new_content }, now).await?;

        creator.updated_at = now;
        creator.content = content;

        Ok(creator)
    }

    #[tracing::instrument(skip(self))]
    async fn update_creator_payment(
        &self,
        mut creator: Creator,
        payment: Payment,
    ) -> Result<Creator, Error> {
        let now = database::next_timestamp(creator.updated_at);
        let new_payment = bson::to_bson(&payment)?;

        set_fields(self, &creator, bson::doc! { "payment": new_payment }, now).await?;

        creator.updated_at = now;
        creator.payment = payment;

        Ok(creator)
    }
}
