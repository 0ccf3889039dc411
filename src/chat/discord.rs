//! Discord REST implementation of [`ChatPlatform`].
//!
//! Categories act as containers, text channels as channels and channel
//! webhooks as relay endpoints. Private channels deny `VIEW_CHANNEL` to the
//! guild's `@everyone` role and allow it per member.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use crate::error::Error;

use super::{ChannelId, ChatMessage, ChatPlatform, MemberId, Visibility};

const API_BASE: &str = "https://discord.com/api/v10";
const SERVICE: &str = "discord";

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_CATEGORY: u8 = 4;
const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;
const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;

#[derive(Clone, Debug)]
pub struct DiscordClient {
    http: Client,
    token: String,
    guild_id: String,
    bot_user_id: MemberId,
}

#[derive(Debug, Deserialize)]
struct CreatedChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedWebhook {
    id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    content: String,
    webhook_id: Option<String>,
    timestamp: String,
}

impl DiscordClient {
    pub fn new(token: String, guild_id: String, bot_user_id: MemberId) -> Result<DiscordClient, Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| Error::external(SERVICE, err))?;

        Ok(DiscordClient {
            http,
            token,
            guild_id,
            bot_user_id,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, Error> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| Error::external(SERVICE, err))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::external(SERVICE, format!("{} {}", status, body)))
        }
    }

    fn member_overwrite(&self, member: &MemberId) -> serde_json::Value {
        json!({
            "id": member.0,
            "type": OVERWRITE_MEMBER,
            "allow": (VIEW_CHANNEL | SEND_MESSAGES).to_string(),
        })
    }

    fn overwrites(&self, visibility: &Visibility) -> Vec<serde_json::Value> {
        let mut overwrites = vec![json!({
            "id": self.guild_id,
            "type": OVERWRITE_ROLE,
            "deny": VIEW_CHANNEL.to_string(),
        })];

        if let Visibility::Members(members) = visibility {
            overwrites.extend(members.iter().map(|member| self.member_overwrite(member)));
        }

        overwrites.push(self.member_overwrite(&self.bot_user_id));
        overwrites
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    #[tracing::instrument(skip(self))]
    async fn create_container(&self, name: &str) -> Result<ChannelId, Error> {
        let url = format!("{}/guilds/{}/channels", API_BASE, self.guild_id);
        let created: CreatedChannel = self
            .send(self.http.post(url).json(&json!({
                "name": name,
                "type": CHANNEL_TYPE_CATEGORY,
            })))
            .await?
            .json()
            .await
            .map_err(|err| Error::external(SERVICE, err))?;

        Ok(ChannelId(created.id))
    }

    #[tracing::instrument(skip(self))]
    async fn create_channel(
        &self,
        container: &ChannelId,
        name: &str,
        visibility: &Visibility,
    ) -> Result<ChannelId, Error> {
        let url = format!("{}/guilds/{}/channels", API_BASE, self.guild_id);
        let created: CreatedChannel = self
            .send(self.http.post(url).json(&json!({
                "name": name,
                "type": CHANNEL_TYPE_TEXT,
                "parent_id": container.0,
                "permission_overwrites": self.overwrites(visibility),
            })))
            .await?
            .json()
            .await
            .map_err(|err| Error::external(SERVICE, err))?;

        Ok(ChannelId(created.id))
    }

    #[tracing::instrument(skip(self))]
    async fn create_relay_endpoint(
        &self,
        channel: &ChannelId,
        label: &str,
    ) -> Result<String, Error> {
        let url = format!("{}/channels/{}/webhooks", API_BASE, channel);
        let created: CreatedWebhook = self
            .send(self.http.post(url).json(&json!({ "name": label })))
            .await?
            .json()
            .await
            .map_err(|err| Error::external(SERVICE, err))?;

        Ok(format!("{}/webhooks/{}/{}", API_BASE, created.id, created.token))
    }

    #[tracing::instrument(skip(self))]
    async fn grant_channel_access(
        &self,
        channel: &ChannelId,
        member: &MemberId,
    ) -> Result<(), Error> {
        let url = format!("{}/channels/{}/permissions/{}", API_BASE, channel, member);
        self.send(self.http.put(url).json(&json!({
            "type": OVERWRITE_MEMBER,
            "allow": (VIEW_CHANNEL | SEND_MESSAGES).to_string(),
        })))
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn revoke_channel_access(
        &self,
        channel: &ChannelId,
        member: &MemberId,
    ) -> Result<(), Error> {
        let url = format!("{}/channels/{}/permissions/{}", API_BASE, channel, member);
        self.send(self.http.delete(url)).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), Error> {
        let url = format!("{}/channels/{}", API_BASE, channel);
        self.send(self.http.delete(url)).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_container(&self, container: &ChannelId) -> Result<(), Error> {
        // categories are channels as far as the api is concerned
        self.delete_channel(container).await
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_recent_messages(
        &self,
        channel: &ChannelId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, Error> {
        let url = format!("{}/channels/{}/messages", API_BASE, channel);
        let raw: Vec<RawMessage> = self
            .send(self.http.get(url).query(&[("limit", limit.min(100))]))
            .await?
            .json()
            .await
            .map_err(|err| Error::external(SERVICE, err))?;

        raw.into_iter()
            .map(|message| {
                let created_at = DateTime::parse_from_rfc3339(&message.timestamp)
                    .map_err(|err| Error::external(SERVICE, err))?
                    .with_timezone(&Utc);

                Ok(ChatMessage {
                    content: message.content,
                    via_relay: message.webhook_id.is_some(),
                    created_at,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self, text))]
    async fn send_via_relay(&self, relay_url: &str, text: &str) -> Result<(), Error> {
        // webhook urls carry their own token
        let response = self
            .http
            .post(relay_url)
            .json(&json!({ "content": text }))
            .send()
            .await
            .map_err(|err| Error::external(SERVICE, err))?;

        if !response.status().is_success() {
            return Err(Error::external(
                SERVICE,
                format!("relay responded {}", response.status()),
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, text))]
    async fn send_via_channel(&self, channel: &ChannelId, text: &str) -> Result<(), Error> {
        let url = format!("{}/channels/{}/messages", API_BASE, channel);
        self.send(self.http.post(url).json(&json!({ "content": text })))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DiscordClient {
        DiscordClient::new(
            "token".into(),
            "1000".into(),
            MemberId("2000".into()),
        )
        .unwrap()
    }

    #[test]
    fn staff_channels_only_admit_the_operating_account() {
        let overwrites = client().overwrites(&Visibility::StaffOnly);

        assert_eq!(overwrites.len(), 2);
        assert_eq!(overwrites[0]["id"], "1000");
        assert_eq!(overwrites[0]["deny"], VIEW_CHANNEL.to_string());
        assert_eq!(overwrites[1]["id"], "2000");
    }

    #[test]
    fn member_channels_admit_each_member_and_the_operating_account() {
        let overwrites = client().overwrites(&Visibility::Members(vec![
            MemberId("3000".into()),
            MemberId("4000".into()),
        ]));

        let ids: Vec<_> = overwrites.iter().map(|o| o["id"].clone()).collect();
        assert_eq!(ids, vec!["1000", "3000", "4000", "2000"]);
        assert_eq!(overwrites[1]["allow"], (VIEW_CHANNEL | SEND_MESSAGES).to_string());
    }
}
