use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use campaign_coordinator::{Config, Error};

#[actix_web::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_span_events(FmtSpan::NEW)
        .compact()
        .init();

    let config = Config::from_env()?;

    campaign_coordinator::run(config).await
}
