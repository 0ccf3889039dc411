use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{ChannelId, ChatEndpoint};
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub mod status;
pub use endpoints::*;
pub use status::{CampaignStatus, Feature};

pub type CampaignId = TypedId<Campaign>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: CampaignId,
    pub name: String,
    pub rep_name: Option<String>,
    pub status: CampaignStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    pub updates_destination: Option<String>,
    #[serde(default)]
    pub resources: CampaignResources,
}

impl Campaign {
    pub fn new(name: String, rep_name: Option<String>, now: DateTime<Utc>) -> Campaign {
        Campaign {
            id: CampaignId::new(),
            name,
            rep_name,
            status: CampaignStatus::Draft,
            created_at: now,
            updated_at: now,
            updates_destination: None,
            resources: CampaignResources::default(),
        }
    }

    /// How the brand representative is greeted in outbound messages.
    pub fn greeting_name(&self) -> &str {
        match self.rep_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => "there",
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Draft Campaign"
        } else {
            &self.name
        }
    }

    pub fn is_unlocked(&self, feature: Feature) -> bool {
        status::status_at_least(self.status, feature.required_status())
    }
}

impl TypedIdMarker for Campaign {
    fn tag() -> &'static str {
        "CPN"
    }
}

/// References to the chat resources provisioned for a campaign. Each channel
/// is stored together with its relay endpoint so one is never persisted
/// without the other.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct CampaignResources {
    pub category_id: Option<ChannelId>,
    pub staff_channel: Option<ChatEndpoint>,
    pub group_channel: Option<ChatEndpoint>,
}

impl CampaignResources {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none() && self.staff_channel.is_none() && self.group_channel.is_none()
    }
}
