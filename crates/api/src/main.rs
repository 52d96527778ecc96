use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use gatehouse_api::{app::build_app, config::Settings};
use gatehouse_infra::{InMemoryDirectory, PgDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    gatehouse_observability::init();

    // Misconfiguration is fatal before anything is bound.
    let settings = Settings::from_env()
        .inspect_err(|e| error!(error = %e, "invalid configuration; refusing to start"))?;
    settings.log_summary();

    let app = match &settings.database_url {
        Some(url) => build_app(&settings, Arc::new(PgDirectory::connect_lazy(url)?)),
        None => {
            warn!("DATABASE_URL not set; using an empty in-memory directory");
            build_app(&settings, Arc::new(InMemoryDirectory::new()))
        }
    };

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
