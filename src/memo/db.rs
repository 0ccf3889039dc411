use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::options::UpdateOptions;
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::database::MongoMemoStore;
use crate::error::Error;

use super::MemoLedger;

#[async_trait]
pub trait MemoStore: Send + Sync {
    /// Loads the campaign's ledger, creating an empty one on first use.
    async fn fetch_or_create_memos(&self, campaign_id: CampaignId) -> Result<MemoLedger, Error>;

    /// Overwrites the whole ledger.
    async fn replace_memos(&self, campaign_id: CampaignId, memos: &MemoLedger)
        -> Result<(), Error>;
}

/// Stored shape of a ledger. Keys can embed urls, so entries are kept as an
/// array rather than as document fields.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MemoDocument {
    #[serde(rename = "_id")]
    pub campaign_id: CampaignId,
    pub entries: Vec<MemoEntry>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MemoEntry {
    pub key: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub fired_at: DateTime<Utc>,
}

impl MemoDocument {
    pub fn from_ledger(campaign_id: CampaignId, memos: &MemoLedger) -> MemoDocument {
        MemoDocument {
            campaign_id,
            entries: memos
                .iter()
                .map(|(key, fired_at)| MemoEntry {
                    key: key.clone(),
                    fired_at: *fired_at,
                })
                .collect(),
        }
    }

    pub fn into_ledger(self) -> MemoLedger {
        self.entries
            .into_iter()
            .map(|entry| (entry.key, entry.fired_at))
            .collect()
    }
}

#[async_trait]
impl MemoStore for MongoMemoStore {
    #[tracing::instrument(skip(self))]
    async fn fetch_or_create_memos(&self, campaign_id: CampaignId) -> Result<MemoLedger, Error> {
        let existing: Option<MemoDocument> =
            self.find_one(bson::doc! { "_id": campaign_id }, None).await?;

        match existing {
            Some(document) => Ok(document.into_ledger()),
            None => {
                let document = MemoDocument::from_ledger(campaign_id, &MemoLedger::new());
                self.insert_one(&document, None).await?;
                Ok(MemoLedger::new())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn replace_memos(
        &self,
        campaign_id: CampaignId,
        memos: &MemoLedger,
    ) -> Result<(), Error> {
        let document = MemoDocument::from_ledger(campaign_id, memos);
        let entries = bson::to_bson(&document.entries)?;
        let options = UpdateOptions::builder().upsert(true).build();

        self.update_one(
            bson::doc! { "_id": campaign_id },
            bson::doc! { "$set": { "entries": entries } },
            options,
        )
        .await?;

        Ok(())
    }
}
