mod config;
mod db;
mod docs;
mod entities;
mod error;
mod models;
mod omdb;
mod routes;
mod seed;
mod store;

use std::sync::Arc;

use crate::{config::Config, omdb::OmdbClient, store::FilmStore};

pub struct AppState {
    pub store: FilmStore,
    pub omdb: Arc<OmdbClient>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,filmshelf=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("filmshelf/0.1")
        .timeout(config.omdb_timeout)
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = FilmStore::new(db);

    let omdb = Arc::new(OmdbClient::new(
        http,
        config.omdb_api_key.clone(),
        config.omdb_base_url.clone(),
        config.omdb_rps,
    ));

    {
        let store = store.clone();
        let omdb = omdb.clone();
        let seed = config.seed.clone();
        tokio::spawn(async move {
            if let Err(err) = seed::seed_if_sparse(&store, &omdb, &seed).await {
                tracing::warn!(error = %err, "startup seeding failed");
            }
        });
    }

    let state = Arc::new(AppState { store, omdb });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
