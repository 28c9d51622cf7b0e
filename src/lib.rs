pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod validation;

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
