use anyhow::Context;

use tradeflow_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tradeflow_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr;

    let app = tradeflow_api::app::build_app(config)
        .await
        .context("failed to build application")?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
