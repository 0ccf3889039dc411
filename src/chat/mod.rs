use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub mod discord;

/// Messages starting with this marker are staff-only and never count as brand
/// activity.
pub const HIDDEN_MARKER: &str = "[hidden from clients]";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A member's identity on the chat platform.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl Display for MemberId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A provisioned channel together with the relay endpoint bound to it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatEndpoint {
    pub channel_id: ChannelId,
    pub relay_url: String,
}

/// Who besides the operating account may see a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    StaffOnly,
    Members(Vec<MemberId>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub content: String,
    pub via_relay: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn is_hidden(&self) -> bool {
        self.content
            .get(..HIDDEN_MARKER.len())
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case(HIDDEN_MARKER))
    }

    /// Brand messages reach creator channels through the relay endpoint.
    pub fn is_brand_activity(&self) -> bool {
        self.via_relay && !self.is_hidden()
    }
}

/// Latest time the brand posted into any of the given messages.
pub fn last_brand_activity<'a, I>(messages: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a ChatMessage>,
{
    messages
        .into_iter()
        .filter(|message| message.is_brand_activity())
        .map(|message| message.created_at)
        .max()
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn create_container(&self, name: &str) -> Result<ChannelId, Error>;

    async fn create_channel(
        &self,
        container: &ChannelId,
        name: &str,
        visibility: &Visibility,
    ) -> Result<ChannelId, Error>;

    /// Returns the url that posts into `channel`.
    async fn create_relay_endpoint(&self, channel: &ChannelId, label: &str)
        -> Result<String, Error>;

    async fn grant_channel_access(&self, channel: &ChannelId, member: &MemberId)
        -> Result<(), Error>;

    async fn revoke_channel_access(
        &self,
        channel: &ChannelId,
        member: &MemberId,
    ) -> Result<(), Error>;

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), Error>;

    async fn delete_container(&self, container: &ChannelId) -> Result<(), Error>;

    /// Most recent messages first.
    async fn fetch_recent_messages(
        &self,
        channel: &ChannelId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, Error>;

    async fn send_via_relay(&self, relay_url: &str, text: &str) -> Result<(), Error>;

    async fn send_via_channel(&self, channel: &ChannelId, text: &str) -> Result<(), Error>;
}
