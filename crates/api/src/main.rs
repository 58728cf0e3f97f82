use anyhow::Context;

use tally_infra::BillingConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tally_observability::init();

    let config = BillingConfig::from_env();
    let app = tally_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        mailbox_capacity = config.mailbox_capacity,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
