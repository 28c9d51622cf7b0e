use std::env;

use anyhow::{anyhow, Result};

use lexdocs::{
    config::AppConfig,
    db, init_tracing, reconcile,
    storage::S3Storage,
};

const USAGE: &str = "Usage: maintenance <reset-database|sweep-orphans>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("reset-database") => reset_database()?,
        Some("sweep-orphans") => sweep_orphans().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        s3_bucket = %config.s3_bucket,
        "loaded configuration"
    );
    Ok(config)
}

fn reset_database() -> Result<()> {
    let config = load_config()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool
        .get()
        .map_err(|err| anyhow!("failed to get database connection: {err}"))?;

    println!("Dropping and recreating all tables…");
    let applied = db::reset_schema(&mut conn)?;
    println!("Database reset successfully ({applied} migrations applied).");
    Ok(())
}

async fn sweep_orphans() -> Result<()> {
    let config = load_config()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let storage = S3Storage::connect(&config).await?;
    let mut conn = pool
        .get()
        .map_err(|err| anyhow!("failed to get database connection: {err}"))?;

    let report = reconcile::sweep_orphans(&mut conn, &storage)
        .await
        .map_err(|err| anyhow!("sweep failed: {err}"))?;

    println!(
        "Orphan sweep finished: {} removed, {} still pending.",
        report.resolved, report.failed
    );
    Ok(())
}
