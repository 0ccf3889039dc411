use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, put, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatPlatform;
use crate::database::{self, Database};
use crate::error::Error;
use crate::scheduler::{CampaignOutcome, Scheduler};

use super::{manager, Campaign, CampaignId, CampaignResources, CampaignStatus};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreateCampaignBody {
    pub name: String,
    pub rep_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AdvanceCampaignBody {
    pub status: CampaignStatus,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DestinationBody {
    pub destination: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GroupMessageBody {
    pub text: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CampaignBody {
    pub id: CampaignId,
    pub name: String,
    pub rep_name: Option<String>,
    pub status: CampaignStatus,
    pub updates_destination: Option<String>,
    pub resources: CampaignResources,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignBody {
    pub fn render(campaign: Campaign) -> CampaignBody {
        CampaignBody {
            id: campaign.id,
            name: campaign.name,
            rep_name: campaign.rep_name,
            status: campaign.status,
            updates_destination: campaign.updates_destination,
            resources: campaign.resources,
            created_at: campaign.created_at,
            updated_at: campaign.updated_at,
        }
    }
}

#[post("/campaigns")]
#[tracing::instrument(skip(db))]
pub async fn create_campaign(
    db: Data<dyn Database>,
    body: Json<CreateCampaignBody>,
) -> Result<Json<CampaignBody>, Error> {
    let body = body.into_inner();

    let campaign = manager::create_campaign(db.get_ref(), body.name, body.rep_name).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[get("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_campaign_by_id(
    db: Data<dyn Database>,
    params: Path<CampaignId>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let campaign = manager::get_campaign_by_id(db.get_ref(), campaign_id).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[post("/campaigns/{campaign_id}/status")]
#[tracing::instrument(skip(db, chat))]
pub async fn advance_campaign(
    db: Data<dyn Database>,
    chat: Data<dyn ChatPlatform>,
    params: Path<CampaignId>,
    body: Json<AdvanceCampaignBody>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();
    let body = body.into_inner();

    let campaign =
        manager::advance_campaign(db.get_ref(), chat.get_ref(), campaign_id, body.status).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[post("/campaigns/{campaign_id}/reset")]
#[tracing::instrument(skip(db, chat))]
pub async fn reset_campaign(
    db: Data<dyn Database>,
    chat: Data<dyn ChatPlatform>,
    params: Path<CampaignId>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let campaign = manager::reset_campaign(db.get_ref(), chat.get_ref(), campaign_id).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[put("/campaigns/{campaign_id}/destination")]
#[tracing::instrument(skip(db))]
pub async fn set_campaign_destination(
    db: Data<dyn Database>,
    params: Path<CampaignId>,
    body: Json<DestinationBody>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();
    let body = body.into_inner();

    let campaign = manager::set_destination(db.get_ref(), campaign_id, body.destination).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[post("/campaigns/{campaign_id}/messages")]
#[tracing::instrument(skip(db, chat, body))]
pub async fn post_group_message(
    db: Data<dyn Database>,
    chat: Data<dyn ChatPlatform>,
    params: Path<CampaignId>,
    body: Json<GroupMessageBody>,
) -> Result<HttpResponse, Error> {
    let campaign_id = params.into_inner();
    let body = body.into_inner();

    manager::post_group_message(db.get_ref(), chat.get_ref(), campaign_id, body.text).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[post("/campaigns/{campaign_id}/notifications/run")]
#[tracing::instrument(skip(scheduler))]
pub async fn run_campaign_notifications(
    scheduler: Data<Scheduler>,
    params: Path<CampaignId>,
) -> Result<Json<CampaignOutcome>, Error> {
    let campaign_id = params.into_inner();

    let outcome = scheduler
        .run_campaign(campaign_id, database::timestamp())
        .await?;

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, App};

    use super::*;
    use crate::chat::test::MockChatPlatform;
    use crate::database::test::MockDatabase;
    use crate::notify::test::MockNotifier;

    struct Services {
        db: Arc<MockDatabase>,
        chat: Arc<MockChatPlatform>,
        scheduler: Arc<Scheduler>,
    }

    fn services() -> Services {
        let db = Arc::new(MockDatabase::new());
        let chat = Arc::new(MockChatPlatform::new());
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = Arc::new(Scheduler::new(db.clone(), chat.clone(), notifier));
        Services {
            db,
            chat,
            scheduler,
        }
    }

    macro_rules! app {
        ($services:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::from($services.db.clone() as Arc<dyn Database>))
                    .app_data(Data::from($services.chat.clone() as Arc<dyn ChatPlatform>))
                    .app_data(Data::from($services.scheduler.clone()))
                    .service(create_campaign)
                    .service(get_campaign_by_id)
                    .service(advance_campaign)
                    .service(reset_campaign)
                    .service(set_campaign_destination)
                    .service(post_group_message)
                    .service(run_campaign_notifications),
            )
            .await
        };
    }

    async fn created(services: &Services) -> Campaign {
        manager::create_campaign(services.db.as_ref(), "Acme".into(), Some("Dana".into()))
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn create_then_fetch_campaign() {
        let services = services();
        let app = app!(services);

        let request = test::TestRequest::post()
            .uri("/campaigns")
            .set_json(CreateCampaignBody {
                name: "Acme".into(),
                rep_name: None,
            })
            .to_request();
        let campaign: CampaignBody = test::call_and_read_body_json(&app, request).await;

        let request = test::TestRequest::get()
            .uri(&format!("/campaigns/{}", campaign.id))
            .to_request();
        let fetched: CampaignBody = test::call_and_read_body_json(&app, request).await;

        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(fetched.id, campaign.id);
        assert_eq!(fetched.name, "Acme");
    }

    #[actix_web::test]
    async fn skipping_a_status_is_a_conflict() {
        let services = services();
        let campaign = created(&services).await;
        let app = app!(services);

        let request = test::TestRequest::post()
            .uri(&format!("/campaigns/{}/status", campaign.id))
            .set_json(AdvanceCampaignBody {
                status: CampaignStatus::ContractSigned,
            })
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 409);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["error_code"], "E4091001");
    }

    #[actix_web::test]
    async fn provisioning_failure_is_a_bad_gateway() {
        let services = services();
        let campaign = created(&services).await;
        services.chat.with_state(|state| state.fail_creates = true);
        let app = app!(services);

        let request = test::TestRequest::post()
            .uri(&format!("/campaigns/{}/status", campaign.id))
            .set_json(AdvanceCampaignBody {
                status: CampaignStatus::BriefSubmitted,
            })
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 502);
        assert_eq!(
            services.db.campaigns.get(campaign.id).unwrap().status,
            CampaignStatus::Draft
        );
    }

    #[actix_web::test]
    async fn invalid_destination_is_a_bad_request() {
        let services = services();
        let campaign = created(&services).await;
        let app = app!(services);

        let request = test::TestRequest::put()
            .uri(&format!("/campaigns/{}/destination", campaign.id))
            .set_json(DestinationBody {
                destination: Some("not-an-address".into()),
            })
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 400);
        assert_eq!(services.db.campaigns.get(campaign.id).unwrap().updates_destination, None);
    }

    #[actix_web::test]
    async fn manual_run_reports_quiet_campaign() {
        let services = services();
        let campaign = created(&services).await;
        manager::set_destination(services.db.as_ref(), campaign.id, Some("brand@example.com".into()))
            .await
            .unwrap();
        let app = app!(services);

        let request = test::TestRequest::post()
            .uri(&format!("/campaigns/{}/notifications/run", campaign.id))
            .to_request();
        let outcome: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(outcome["outcome"], "quiet");
    }

    #[actix_web::test]
    async fn unknown_campaign_is_not_found() {
        let services = services();
        let app = app!(services);

        let request = test::TestRequest::post()
            .uri(&format!("/campaigns/{}/reset", CampaignId::new()))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 404);
    }
}
