use anyhow::Context;

use grouppool_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    grouppool_observability::init();

    let config = ApiConfig::from_env();
    let app = grouppool_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        default_duration_secs = config.default_duration_secs,
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
