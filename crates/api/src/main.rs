use std::sync::Arc;

use anyhow::Context;

use kudimall_infra::MarketplaceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kudimall_observability::init();

    let config = MarketplaceConfig::load().context("failed to load configuration")?;
    let services = kudimall_api::app::services::build_services(&config).await?;
    let app = kudimall_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
