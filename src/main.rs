//! The CampusConnect admin console API

use anyhow::Context;
use campus_connect::config::Config;
use campus_connect::graphql::build_schema;
use campus_connect::server::router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to read configuration")?;
    init_tracing(config.log_json);

    let store = config
        .connect_store()
        .await
        .context("failed to open the document store")?;
    let app = router(build_schema(store), &config)?;

    tracing::info!("Listening on {}", config.bind_address);
    axum::Server::bind(&config.bind_address)
        .serve(app.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
