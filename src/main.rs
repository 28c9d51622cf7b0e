use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::{net::TcpListener, signal};

use lexdocs::{config::AppConfig, db, init_tracing, routes, state::AppState, storage::S3Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        max_upload_bytes = config.max_upload_bytes,
        presigned_url_ttl_seconds = config.presigned_url_ttl_seconds,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to get migration connection: {err}"))?;
        let applied = db::run_migrations(&mut conn)?;
        tracing::info!(applied, "database migrations up to date");
    }

    let storage = Arc::new(S3Storage::connect(&config).await?);
    let address = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, storage);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(%address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
        })
        .await
        .context("server error")?;

    Ok(())
}
