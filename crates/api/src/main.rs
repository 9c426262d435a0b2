use anyhow::Context;

use quizgate_infra::{AuthConfig, workers::SessionJanitor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quizgate_observability::init();

    let config = AuthConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    let services = quizgate_api::app::build_services(&config).await?;
    let janitor = SessionJanitor::new(services.tokens.clone(), config.janitor_interval).start();

    let app = quizgate_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    janitor.shutdown().await;
    Ok(())
}
