use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::chat::{ChatEndpoint, MemberId};
use crate::database::optional_datetime;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type CreatorId = TypedId<Creator>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Creator {
    #[serde(rename = "_id")]
    pub id: CreatorId,
    pub campaign_id: CampaignId,
    pub display_name: String,
    pub member_id: MemberId,
    pub channel_url: Option<String>,
    pub selected: bool,
    pub chat: Option<ChatEndpoint>,
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub payment: Payment,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl TypedIdMarker for Creator {
    fn tag() -> &'static str {
        "CRT"
    }
}

impl Creator {
    /// `@handle` from the creator's channel url, or the url itself.
    pub fn short_name(&self) -> String {
        match &self.channel_url {
            Some(url) if !url.trim().is_empty() => short_name(url),
            _ => "[unknown channel]".to_string(),
        }
    }

    pub fn days_since_live(&self, now: DateTime<Utc>) -> Option<i64> {
        self.content
            .live_submitted_at
            .map(|live| (now - live).num_days())
    }
}

pub fn short_name(url: &str) -> String {
    static HANDLE: OnceLock<Regex> = OnceLock::new();
    let handle = HANDLE.get_or_init(|| Regex::new(r"@[\w.-]+").expect("handle pattern is valid"));

    handle
        .find(url)
        .map(|found| found.as_str().to_string())
        .unwrap_or_else(|| url.to_string())
}

/// Content references a creator submits as the campaign runs.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Content {
    pub draft_url: Option<String>,
    #[serde(default, with = "optional_datetime")]
    pub draft_submitted_at: Option<DateTime<Utc>>,
    pub final_url: Option<String>,
    pub live_url: Option<String>,
    #[serde(default, with = "optional_datetime")]
    pub live_submitted_at: Option<DateTime<Utc>>,
}

impl Content {
    pub fn has_final(&self) -> bool {
        self.final_url
            .as_deref()
            .map_or(false, |url| !url.trim().is_empty())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Draft,
    Final,
    Live,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Payment {
    pub flat_paid: bool,
    pub cpm_paid: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CreatorFilter {
    pub selected: Option<bool>,
    pub flat_paid: Option<bool>,
    pub cpm_paid: Option<bool>,
}

impl CreatorFilter {
    pub fn selected(selected: bool) -> CreatorFilter {
        CreatorFilter {
            selected: Some(selected),
            ..Default::default()
        }
    }

    pub fn matches(&self, creator: &Creator) -> bool {
        self.selected.map_or(true, |s| creator.selected == s)
            && self.flat_paid.map_or(true, |p| creator.payment.flat_paid == p)
            && self.cpm_paid.map_or(true, |p| creator.payment.cpm_paid == p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_extracts_the_handle() {
        assert_eq!(
            short_name("https://www.youtube.com/@some.creator-01/videos"),
            "@some.creator-01"
        );
    }

    #[test]
    fn short_name_falls_back_to_the_url() {
        assert_eq!(
            short_name("https://www.youtube.com/channel/UC123"),
            "https://www.youtube.com/channel/UC123"
        );
    }
}
