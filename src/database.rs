use chrono::{DateTime, Duration, DurationRound, Utc};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};

use crate::campaign::db::CampaignStore;
use crate::campaign::Campaign;
use crate::creator::db::CreatorStore;
use crate::creator::Creator;
use crate::error::Error;
use crate::memo::db::{MemoDocument, MemoStore};

pub type MongoCampaignStore = Collection<Campaign>;
pub type MongoCreatorStore = Collection<Creator>;
pub type MongoMemoStore = Collection<MemoDocument>;

pub trait Database: Send + Sync {
    fn campaigns(&self) -> &dyn CampaignStore;
    fn creators(&self) -> &dyn CreatorStore;
    fn memos(&self) -> &dyn MemoStore;
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    campaigns: Collection<Campaign>,
    creators: Collection<Creator>,
    memos: Collection<MemoDocument>,
}

impl MongoDatabase {
    pub fn new(db: mongodb::Database) -> MongoDatabase {
        MongoDatabase {
            campaigns: db.collection("campaigns"),
            creators: db.collection("campaign_creators"),
            memos: db.collection("campaign_notification_memos"),
        }
    }

    #[tracing::instrument(skip(db))]
    pub async fn initialize(db: mongodb::Database) -> Result<MongoDatabase, Error> {
        let db = MongoDatabase::new(db);

        db.creators
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "campaign_id": 1, "selected": 1 })
                    .options(IndexOptions::builder().name("by_campaign".to_string()).build())
                    .build(),
                None,
            )
            .await?;

        Ok(db)
    }
}

impl Database for MongoDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }

    fn creators(&self) -> &dyn CreatorStore {
        &self.creators
    }

    fn memos(&self) -> &dyn MemoStore {
        &self.memos
    }
}

/// Current time at the precision the database stores.
pub fn timestamp() -> DateTime<Utc> {
    truncate(Utc::now())
}

pub fn truncate(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::milliseconds(1)).unwrap_or(at)
}

/// A fresh `updated_at` that is strictly later than `previous`.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = timestamp();
    if now > previous {
        now
    } else {
        truncate(previous) + Duration::milliseconds(1)
    }
}

/// Serde adapter for optional datetimes stored as BSON dates.
pub mod optional_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(bson::DateTime::from_chrono)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(value.map(bson::DateTime::to_chrono))
    }
}

#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::campaign::{CampaignId, CampaignResources, CampaignStatus};
    use crate::chat::ChatEndpoint;
    use crate::creator::{Content, CreatorFilter, CreatorId, Payment};
    use crate::memo::MemoLedger;

    fn unavailable() -> Error {
        let reason = std::io::Error::new(std::io::ErrorKind::Other, "mock database unavailable");
        Error::FailedDatabaseCall(reason.into())
    }

    /// In-memory stores that mirror the optimistic update checks of the real
    /// ones. Set `fail` to make every call to that store fail.
    #[derive(Default)]
    pub struct MockDatabase {
        pub campaigns: MockCampaignStore,
        pub creators: MockCreatorStore,
        pub memos: MockMemoStore,
    }

    impl MockDatabase {
        pub fn new() -> MockDatabase {
            MockDatabase::default()
        }
    }

    impl Database for MockDatabase {
        fn campaigns(&self) -> &dyn CampaignStore {
            &self.campaigns
        }

        fn creators(&self) -> &dyn CreatorStore {
            &self.creators
        }

        fn memos(&self) -> &dyn MemoStore {
            &self.memos
        }
    }

    #[derive(Default)]
    pub struct MockCampaignStore {
        pub rows: Mutex<HashMap<CampaignId, Campaign>>,
        pub fail: Mutex<bool>,
    }

    impl MockCampaignStore {
        pub fn get(&self, campaign_id: CampaignId) -> Option<Campaign> {
            self.rows.lock().unwrap().get(&campaign_id).cloned()
        }

        fn update(
            &self,
            mut campaign: Campaign,
            at: DateTime<Utc>,
            apply: impl FnOnce(&mut Campaign),
        ) -> Result<Campaign, Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&campaign.id) {
                Some(stored) if stored.updated_at == campaign.updated_at => {}
                _ => return Err(Error::ConcurrentModificationDetected),
            }
            apply(&mut campaign);
            campaign.updated_at = at;
            rows.insert(campaign.id, campaign.clone());
            Ok(campaign)
        }
    }

    #[async_trait]
    impl CampaignStore for MockCampaignStore {
        async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            self.rows
                .lock()
                .unwrap()
                .insert(campaign.id, campaign.clone());
            Ok(())
        }

        async fn fetch_campaign_by_id(
            &self,
            campaign_id: CampaignId,
        ) -> Result<Option<Campaign>, Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            Ok(self.get(campaign_id))
        }

        async fn fetch_campaigns_with_destination(&self) -> Result<Vec<Campaign>, Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            let mut campaigns: Vec<Campaign> = self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|campaign| campaign.updates_destination.is_some())
                .cloned()
                .collect();
            campaigns.sort_by_key(|campaign| campaign.created_at);
            Ok(campaigns)
        }

        async fn update_campaign_status(
            &self,
            campaign: Campaign,
            status: CampaignStatus,
        ) -> Result<Campaign, Error> {
            let at = next_timestamp(campaign.updated_at);
            self.update(campaign, at, |campaign| campaign.status = status)
        }

        async fn update_campaign_resources(
            &self,
            campaign: Campaign,
            resources: CampaignResources,
        ) -> Result<Campaign, Error> {
            let at = next_timestamp(campaign.updated_at);
            self.update(campaign, at, |campaign| campaign.resources = resources)
        }

        async fn update_campaign_destination(
            &self,
            campaign: Campaign,
            destination: Option<String>,
        ) -> Result<Campaign, Error> {
            let at = next_timestamp(campaign.updated_at);
            self.update(campaign, at, |campaign| {
                campaign.updates_destination = destination
            })
        }

        async fn touch_campaign(
            &self,
            campaign: Campaign,
            at: DateTime<Utc>,
        ) -> Result<Campaign, Error> {
            self.update(campaign, truncate(at), |_| {})
        }
    }

    #[derive(Default)]
    pub struct MockCreatorStore {
        pub rows: Mutex<HashMap<CreatorId, Creator>>,
        pub fail: Mutex<bool>,
    }

    impl MockCreatorStore {
        pub fn get(&self, creator_id: CreatorId) -> Option<Creator> {
            self.rows.lock().unwrap().get(&creator_id).cloned()
        }

        fn update(
            &self,
            mut creator: Creator,
            apply: impl FnOnce(&mut Creator),
        ) -> Result<Creator, Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&creator.id) {
                Some(stored) if stored.updated_at == creator.updated_at => {}
                _ => return Err(Error::ConcurrentModificationDetected),
            }
            apply(&mut creator);
            creator.updated_at = next_timestamp(creator.updated_at);
            rows.insert(creator.id, creator.clone());
            Ok(creator)
        }
    }

    #[async_trait]
    impl CreatorStore for MockCreatorStore {
        async fn insert_creator(&self, creator: &Creator) -> Result<(), Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            self.rows.lock().unwrap().insert(creator.id, creator.clone());
            Ok(())
        }

        async fn fetch_creator_by_campaign_and_id(
            &self,
            campaign_id: CampaignId,
            creator_id: CreatorId,
        ) -> Result<Option<Creator>, Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            Ok(self
                .get(creator_id)
                .filter(|creator| creator.campaign_id == campaign_id))
        }

        async fn fetch_creators_by_campaign(
            &self,
            campaign_id: CampaignId,
            filter: CreatorFilter,
        ) -> Result<Vec<Creator>, Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            let mut creators: Vec<Creator> = self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|creator| creator.campaign_id == campaign_id && filter.matches(creator))
                .cloned()
                .collect();
            creators.sort_by_key(|creator| creator.created_at);
            Ok(creators)
        }

        async fn update_creator_selection(
            &self,
            creator: Creator,
            selected: bool,
        ) -> Result<Creator, Error> {
            self.update(creator, |creator| creator.selected = selected)
        }

        async fn update_creator_chat(
            &self,
            creator: Creator,
            chat: Option<ChatEndpoint>,
        ) -> Result<Creator, Error> {
            self.update(creator, |creator| creator.chat = chat)
        }

        async fn update_creator_content(
            &self,
            creator: Creator,
            content: Content,
        ) -> Result<Creator, Error> {
            self.update(creator, |creator| creator.content = content)
        }

        async fn update_creator_payment(
            &self,
            creator: Creator,
            payment: Payment,
        ) -> Result<Creator, Error> {
            self.update(creator, |creator| creator.payment = payment)
        }
    }

    #[derive(Default)]
    pub struct MockMemoStore {
        pub rows: Mutex<HashMap<CampaignId, MemoLedger>>,
        pub fail: Mutex<bool>,
        pub fail_writes: Mutex<bool>,
    }

    impl MockMemoStore {
        pub fn get(&self, campaign_id: CampaignId) -> MemoLedger {
            self.rows
                .lock()
                .unwrap()
                .get(&campaign_id)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl MemoStore for MockMemoStore {
        async fn fetch_or_create_memos(
            &self,
            campaign_id: CampaignId,
        ) -> Result<MemoLedger, Error> {
            if *self.fail.lock().unwrap() {
                return Err(unavailable());
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .entry(campaign_id)
                .or_default()
                .clone())
        }

        async fn replace_memos(
            &self,
            campaign_id: CampaignId,
            memos: &MemoLedger,
        ) -> Result<(), Error> {
            if *self.fail.lock().unwrap() || *self.fail_writes.lock().unwrap() {
                return Err(unavailable());
            }
            self.rows.lock().unwrap().insert(campaign_id, memos.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn next_timestamp_always_advances() {
        let future = Utc::now() + Duration::hours(1);

        let next = next_timestamp(future);

        assert!(next > future);
        assert_eq!(next, truncate(future) + Duration::milliseconds(1));
    }

    #[test]
    fn truncate_drops_sub_millisecond_precision() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();

        assert_eq!(truncate(at), Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap());
    }
}
