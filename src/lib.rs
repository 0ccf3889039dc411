use std::sync::Arc;

use actix_web::web::{self, Data, JsonConfig, PathConfig, QueryConfig};
use actix_web::{App, HttpServer, ResponseError};
use mongodb::{bson, Client};
use tracing::info;
use tracing_actix_web::TracingLogger;

pub mod campaign;
pub mod chat;
pub mod config;
pub mod creator;
pub mod database;
pub mod error;
pub mod memo;
pub mod notify;
pub mod provisioning;
pub mod rules;
pub mod scheduler;
pub mod typedid;

pub use campaign::{CampaignBody, CampaignStatus, CreateCampaignBody};
pub use config::Config;
pub use creator::{CreatorBody, JoinCampaignBody};
pub use error::Error;
pub use memo::MemoLedger;

use crate::chat::discord::DiscordClient;
use crate::chat::{ChatPlatform, MemberId};
use crate::database::{Database, MongoDatabase};
use crate::notify::{Dispatcher, Notifier};
use crate::scheduler::Scheduler;

/// Connects every collaborator, starts the notification scheduler and serves
/// the http api until shutdown.
pub async fn run(config: Config) -> Result<(), Error> {
    info!("connecting to db: {}", config.mongodb_uri);
    let client = Client::with_uri_str(&config.mongodb_uri).await?;
    let db = client.database(&config.database_name);

    // ping the database to ensure connection is established
    db.run_command(bson::doc! { "ping": 1 }, None).await?;

    let db: Arc<dyn Database> = Arc::new(MongoDatabase::initialize(db).await?);
    let chat: Arc<dyn ChatPlatform> = Arc::new(DiscordClient::new(
        config.discord.token.clone(),
        config.discord.guild_id.clone(),
        MemberId(config.discord.bot_user_id.clone()),
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(Dispatcher::new(&config.smtp)?);

    let scheduler = Arc::new(Scheduler::new(db.clone(), chat.clone(), notifier));
    scheduler.clone().spawn(config.notify_interval);

    info!("listening on {}", config.bind_address);
    HttpServer::new(move || {
        App::new()
            .app_data(JsonConfig::default().error_handler(|err, _req| {
                // format json errors with custom format
                Error::InvalidJson(err).into()
            }))
            .app_data(PathConfig::default().error_handler(|err, _req| {
                // format path errors with custom format
                Error::InvalidPath(err).into()
            }))
            .app_data(QueryConfig::default().error_handler(|err, _req| {
                // format query errors with custom format
                Error::InvalidQuery(err).into()
            }))
            .app_data(Data::from(db.clone()))
            .app_data(Data::from(chat.clone()))
            .app_data(Data::from(scheduler.clone()))
            .wrap(TracingLogger::default())
            .service(campaign::endpoints::create_campaign)
            .service(campaign::endpoints::get_campaign_by_id)
            .service(campaign::endpoints::advance_campaign)
            .service(campaign::endpoints::reset_campaign)
            .service(campaign::endpoints::set_campaign_destination)
            .service(campaign::endpoints::post_group_message)
            .service(campaign::endpoints::run_campaign_notifications)
            .service(creator::endpoints::join_campaign)
            .service(creator::endpoints::get_creators_in_campaign)
            .service(creator::endpoints::set_creator_selection)
            .service(creator::endpoints::submit_creator_content)
            .service(creator::endpoints::mark_creator_payment)
            .default_service(web::to(|| async { Error::PathNotFound.error_response() }))
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}
