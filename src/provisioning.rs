//! Keeps chat platform resources in step with campaign and creator state.
//!
//! Creation is all-or-nothing: if any platform call fails, whatever was
//! already created is discarded and nothing is persisted. Teardown is
//! best-effort per resource and reports what it could not delete.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::campaign::{Campaign, CampaignResources};
use crate::chat::{ChannelId, ChatEndpoint, ChatPlatform, Visibility};
use crate::creator::{Creator, CreatorFilter};
use crate::database::Database;
use crate::error::Error;

const MAX_CHANNEL_NAME: usize = 100;

/// Outcome of a best-effort teardown.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub deleted: Vec<ChannelId>,
    pub failed: Vec<(ChannelId, Error)>,
}

impl TeardownReport {
    fn record(&mut self, channel: ChannelId, result: Result<(), Error>) {
        match result {
            Ok(()) => self.deleted.push(channel),
            Err(err) => {
                warn!(%channel, %err, "failed to delete chat resource");
                self.failed.push((channel, err));
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Lowercased `campaign--creator` name. Within each part every run of
/// characters outside `[a-z0-9]` becomes a single dash, so `--` only ever
/// separates the two parts.
pub fn channel_slug(campaign_name: &str, creator_name: &str) -> String {
    static ILLEGAL: OnceLock<Regex> = OnceLock::new();
    let illegal = ILLEGAL.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

    let parts: Vec<String> = [campaign_name, creator_name]
        .iter()
        .map(|part| {
            let part = part.to_lowercase();
            illegal.replace_all(&part, "-").trim_matches('-').to_string()
        })
        .filter(|part| !part.is_empty())
        .collect();

    let slug: String = parts.join("--").chars().take(MAX_CHANNEL_NAME).collect();
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        "creator".to_string()
    } else {
        slug.to_string()
    }
}

fn relay_label(campaign: &Campaign) -> String {
    format!(
        "{} | {}",
        campaign.rep_name.as_deref().unwrap_or_default(),
        campaign.name
    )
}

async fn discard(chat: &dyn ChatPlatform, channel: &ChannelId) {
    if let Err(err) = chat.delete_channel(channel).await {
        warn!(%channel, %err, "failed to discard partially provisioned channel");
    }
}

/// Creates a channel and its relay endpoint, or neither.
async fn create_endpoint(
    chat: &dyn ChatPlatform,
    container: &ChannelId,
    name: &str,
    visibility: &Visibility,
    label: &str,
) -> Result<ChatEndpoint, Error> {
    let channel_id = chat.create_channel(container, name, visibility).await?;

    match chat.create_relay_endpoint(&channel_id, label).await {
        Ok(relay_url) => Ok(ChatEndpoint {
            channel_id,
            relay_url,
        }),
        Err(err) => {
            discard(chat, &channel_id).await;
            Err(err)
        }
    }
}

/// Creates the campaign's category, its staff-only channel and the staff relay
/// endpoint. A campaign that already has a category is returned unchanged.
#[tracing::instrument(skip(db, chat))]
pub async fn provision_campaign_home(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign: Campaign,
) -> Result<Campaign, Error> {
    if campaign.resources.category_id.is_some() {
        return Ok(campaign);
    }

    let category_id = chat.create_container(campaign.display_name()).await?;

    let staff_name = format!("{} - Staff", campaign.display_name());
    let staff_channel = match create_endpoint(
        chat,
        &category_id,
        &staff_name,
        &Visibility::StaffOnly,
        &relay_label(&campaign),
    )
    .await
    {
        Ok(endpoint) => endpoint,
        Err(err) => {
            if let Err(err) = chat.delete_container(&category_id).await {
                warn!(%category_id, %err, "failed to discard partially provisioned category");
            }
            return Err(err);
        }
    };

    let resources = CampaignResources {
        category_id: Some(category_id.clone()),
        staff_channel: Some(staff_channel.clone()),
        group_channel: campaign.resources.group_channel.clone(),
    };

    match db.campaigns().update_campaign_resources(campaign, resources).await {
        Ok(campaign) => {
            info!(campaign_id = %campaign.id, %category_id, "provisioned campaign home");
            Ok(campaign)
        }
        Err(err) => {
            discard(chat, &staff_channel.channel_id).await;
            if let Err(err) = chat.delete_container(&category_id).await {
                warn!(%category_id, %err, "failed to discard unpersisted category");
            }
            Err(err)
        }
    }
}

/// Creates the creator's private channel under the campaign's category and,
/// when the creator is selected, lets them into the group channel if there
/// already is one. A creator that already has a channel is returned unchanged.
#[tracing::instrument(skip(db, chat))]
pub async fn provision_creator_channel(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign: &Campaign,
    creator: Creator,
) -> Result<Creator, Error> {
    if creator.chat.is_some() {
        return Ok(creator);
    }

    let category_id = campaign
        .resources
        .category_id
        .as_ref()
        .ok_or(Error::MissingCampaignHome {
            campaign_id: campaign.id,
        })?;

    let name = channel_slug(campaign.display_name(), &creator.display_name);
    let visibility = Visibility::Members(vec![creator.member_id.clone()]);
    let endpoint = create_endpoint(
        chat,
        category_id,
        &name,
        &visibility,
        &relay_label(campaign),
    )
    .await?;

    if let Some(group) = campaign.resources.group_channel.as_ref().filter(|_| creator.selected) {
        if let Err(err) = chat
            .grant_channel_access(&group.channel_id, &creator.member_id)
            .await
        {
            discard(chat, &endpoint.channel_id).await;
            return Err(err);
        }
    }

    let channel_id = endpoint.channel_id.clone();
    match db
        .creators()
        .update_creator_chat(creator, Some(endpoint))
        .await
    {
        Ok(creator) => {
            info!(creator_id = %creator.id, %channel_id, "provisioned creator channel");
            Ok(creator)
        }
        Err(err) => {
            discard(chat, &channel_id).await;
            Err(err)
        }
    }
}

/// Creates the channel shared by every selected creator. Selected creators
/// without a private channel get one first. A campaign that already has a
/// group channel is returned unchanged.
#[tracing::instrument(skip(db, chat))]
pub async fn provision_group_channel(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign: Campaign,
) -> Result<Campaign, Error> {
    if campaign.resources.group_channel.is_some() {
        return Ok(campaign);
    }

    let category_id = campaign
        .resources
        .category_id
        .clone()
        .ok_or(Error::MissingCampaignHome {
            campaign_id: campaign.id,
        })?;

    let selected = db
        .creators()
        .fetch_creators_by_campaign(campaign.id, CreatorFilter::selected(true))
        .await?;

    let mut members = Vec::with_capacity(selected.len());
    for creator in selected {
        members.push(creator.member_id.clone());
        provision_creator_channel(db, chat, &campaign, creator).await?;
    }

    let name = format!("{} - Group Chat", campaign.display_name());
    let endpoint = create_endpoint(
        chat,
        &category_id,
        &name,
        &Visibility::Members(members),
        &relay_label(&campaign),
    )
    .await?;

    let mut resources = campaign.resources.clone();
    resources.group_channel = Some(endpoint.clone());

    match db.campaigns().update_campaign_resources(campaign, resources).await {
        Ok(campaign) => {
            info!(campaign_id = %campaign.id, channel_id = %endpoint.channel_id, "provisioned group channel");
            Ok(campaign)
        }
        Err(err) => {
            discard(chat, &endpoint.channel_id).await;
            Err(err)
        }
    }
}

/// Deletes the private channel of every unselected creator and clears their
/// references. Creators without a channel are skipped, so repeated calls are
/// no-ops.
#[tracing::instrument(skip(db, chat))]
pub async fn teardown_unselected(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign: &Campaign,
) -> Result<TeardownReport, Error> {
    let unselected = db
        .creators()
        .fetch_creators_by_campaign(campaign.id, CreatorFilter::selected(false))
        .await?;

    let mut report = TeardownReport::default();
    for creator in unselected {
        if creator.chat.is_some() {
            clear_creator_channel(db, chat, creator, &mut report).await;
        }
    }

    info!(
        campaign_id = %campaign.id,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "tore down unselected creator channels"
    );

    Ok(report)
}

/// Deletes every creator channel, the group and staff channels and the
/// category, then clears all references.
#[tracing::instrument(skip(db, chat))]
pub async fn teardown_all(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign: Campaign,
) -> Result<(Campaign, TeardownReport), Error> {
    let creators = db
        .creators()
        .fetch_creators_by_campaign(campaign.id, CreatorFilter::default())
        .await?;

    let mut report = TeardownReport::default();
    for creator in creators {
        if creator.chat.is_some() {
            clear_creator_channel(db, chat, creator, &mut report).await;
        }
    }

    let resources = &campaign.resources;
    for endpoint in [&resources.group_channel, &resources.staff_channel]
        .into_iter()
        .flatten()
    {
        let result = chat.delete_channel(&endpoint.channel_id).await;
        report.record(endpoint.channel_id.clone(), result);
    }
    if let Some(category_id) = &resources.category_id {
        let result = chat.delete_container(category_id).await;
        report.record(category_id.clone(), result);
    }

    let campaign = if campaign.resources.is_empty() {
        campaign
    } else {
        db.campaigns()
            .update_campaign_resources(campaign, CampaignResources::default())
            .await?
    };

    info!(
        campaign_id = %campaign.id,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "tore down campaign resources"
    );

    Ok((campaign, report))
}

/// Deletes one creator's private channel, revokes their group channel access
/// and clears their references. Platform failures are logged only.
#[tracing::instrument(skip(db, chat))]
pub async fn remove_creator_channel(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    campaign: &Campaign,
    creator: Creator,
) -> Result<Creator, Error> {
    let endpoint = match &creator.chat {
        Some(endpoint) => endpoint.clone(),
        None => return Ok(creator),
    };

    if let Err(err) = chat.delete_channel(&endpoint.channel_id).await {
        warn!(channel = %endpoint.channel_id, %err, "failed to delete creator channel");
    }

    if let Some(group) = &campaign.resources.group_channel {
        if let Err(err) = chat
            .revoke_channel_access(&group.channel_id, &creator.member_id)
            .await
        {
            warn!(channel = %group.channel_id, %err, "failed to revoke group channel access");
        }
    }

    db.creators().update_creator_chat(creator, None).await
}

async fn clear_creator_channel(
    db: &dyn Database,
    chat: &dyn ChatPlatform,
    creator: Creator,
    report: &mut TeardownReport,
) {
    let channel_id = match &creator.chat {
        Some(endpoint) => endpoint.channel_id.clone(),
        None => return,
    };

    let result = chat.delete_channel(&channel_id).await;
    report.record(channel_id.clone(), result);

    if let Err(err) = db.creators().update_creator_chat(creator, None).await {
        warn!(%channel_id, %err, "failed to clear creator channel reference");
        report.failed.push((channel_id, err));
    }
}
