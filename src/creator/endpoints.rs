use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, put};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::chat::{ChatPlatform, MemberId};
use crate::database::Database;
use crate::error::Error;

use super::{manager, Content, ContentKind, Creator, CreatorId, Payment};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JoinCampaignBody {
    pub display_name: String,
    pub member_id: String,
    pub channel_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SelectionBody {
    pub selected: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SubmitContentBody {
    pub kind: ContentKind,
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PaymentBody {
    pub flat_paid: Option<bool>,
    pub cpm_paid: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContentBody {
    pub draft_url: Option<String>,
    pub draft_submitted_at: Option<DateTime<Utc>>,
    pub final_url: Option<String>,
    pub live_url: Option<String>,
    pub live_submitted_at: Option<DateTime<Utc>>,
}

impl ContentBody {
    pub fn render(content: Content) -> ContentBody {
        ContentBody {
            draft_url: content.draft_url,
            draft_submitted_at: content.draft_submitted_at,
            final_url: content.final_url,
            live_url: content.live_url,
            live_submitted_at: content.live_submitted_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreatorBody {
    pub id: CreatorId,
    pub campaign_id: CampaignId,
    pub display_name: String,
    pub channel_url: Option<String>,
    pub selected: bool,
    pub has_channel: bool,
    pub content: ContentBody,
    pub payment: Payment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreatorBody {
    pub fn render(creator: Creator) -> CreatorBody {
        CreatorBody {
            id: creator.id,
            campaign_id: creator.campaign_id,
            display_name: creator.display_name,
            channel_url: creator.channel_url,
            selected: creator.selected,
            has_channel: creator.chat.is_some(),
            content: ContentBody::render(creator.content),
            payment: creator.payment,
            created_at: creator.created_at,
            updated_at: creator.updated_at,
        }
    }
}

#[post("/campaigns/{campaign_id}/creators")]
#[tracing::instrument(skip(db, chat))]
pub async fn join_campaign(
    db: Data<dyn Database>,
    chat: Data<dyn ChatPlatform>,
    params: Path<CampaignId>,
    body: Json<JoinCampaignBody>,
) -> Result<Json<CreatorBody>, Error> {
    let campaign_id = params.into_inner();
    let body = body.into_inner();

    let creator = manager::join_campaign(
        db.get_ref(),
        chat.get_ref(),
        campaign_id,
        body.display_name,
        MemberId(body.member_id),
        body.channel_url,
    )
    .await?;

    Ok(Json(CreatorBody::render(creator)))
}

#[get("/campaigns/{campaign_id}/creators")]
#[tracing::instrument(skip(db))]
pub async fn get_creators_in_campaign(
    db: Data<dyn Database>,
    params: Path<CampaignId>,
) -> Result<Json<Vec<CreatorBody>>, Error> {
    let campaign_id = params.into_inner();

    let creators = manager::get_creators_in_campaign(db.get_ref(), campaign_id).await?;

    let body = creators.into_iter().map(CreatorBody::render).collect();

    Ok(Json(body))
}

#[put("/campaigns/{campaign_id}/creators/{creator_id}/selection")]
#[tracing::instrument(skip(db, chat))]
pub async fn set_creator_selection(
    db: Data<dyn Database>,
    chat: Data<dyn ChatPlatform>,
    params: Path<(CampaignId, CreatorId)>,
    body: Json<SelectionBody>,
) -> Result<Json<CreatorBody>, Error> {
    let (campaign_id, creator_id) = params.into_inner();
    let body = body.into_inner();

    let creator = manager::set_selection(
        db.get_ref(),
        chat.get_ref(),
        campaign_id,
        creator_id,
        body.selected,
    )
    .await?;

    Ok(Json(CreatorBody::render(creator)))
}

#[post("/campaigns/{campaign_id}/creators/{creator_id}/content")]
#[tracing::instrument(skip(db))]
pub async fn submit_creator_content(
    db: Data<dyn Database>,
    params: Path<(CampaignId, CreatorId)>,
    body: Json<SubmitContentBody>,
) -> Result<Json<CreatorBody>, Error> {
    let (campaign_id, creator_id) = params.into_inner();
    let body = body.into_inner();

    let creator =
        manager::submit_content(db.get_ref(), campaign_id, creator_id, body.kind, body.url).await?;

    Ok(Json(CreatorBody::render(creator)))
}

#[post("/campaigns/{campaign_id}/creators/{creator_id}/payment")]
#[tracing::instrument(skip(db))]
pub async fn mark_creator_payment(
    db: Data<dyn Database>,
    params: Path<(CampaignId, CreatorId)>,
    body: Json<PaymentBody>,
) -> Result<Json<CreatorBody>, Error> {
    let (campaign_id, creator_id) = params.into_inner();
    let body = body.into_inner();

    let creator = manager::mark_payment(
        db.get_ref(),
        campaign_id,
        creator_id,
        body.flat_paid,
        body.cpm_paid,
    )
    .await?;

    Ok(Json(CreatorBody::render(creator)))
}
