use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

pub const DEFAULT_OMDB_BASE_URL: &str = "https://www.omdbapi.com/";

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub omdb_api_key: String,
    pub omdb_base_url: String,
    pub omdb_timeout: Duration,
    pub omdb_rps: u32,
    pub seed: SeedConfig,
}

/// Startup seeding from an OMDb keyword search. Disabled when `query` is unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedConfig {
    pub query: Option<String>,
    pub min_films: u64,
    pub concurrency: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = var("PORT").unwrap_or_else(|| "3000".to_string()).parse().context("PORT")?;

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://films.db?mode=rwc".to_string());

        let omdb_api_key = var("OMDB_API_KEY").unwrap_or_default();
        let omdb_base_url =
            var("OMDB_BASE_URL").unwrap_or_else(|| DEFAULT_OMDB_BASE_URL.to_string());

        let omdb_timeout_secs: u64 =
            var("OMDB_TIMEOUT_SECS").and_then(|s| s.parse().ok()).unwrap_or(10);

        let omdb_rps: u32 = var("OMDB_RPS").and_then(|s| s.parse().ok()).unwrap_or(4);

        let seed = SeedConfig {
            query: var("SEED_QUERY").map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            min_films: var("SEED_MIN_FILMS").and_then(|s| s.parse().ok()).unwrap_or(10),
            concurrency: var("SEED_CONCURRENCY").and_then(|s| s.parse().ok()).unwrap_or(4),
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            omdb_api_key,
            omdb_base_url,
            omdb_timeout: Duration::from_secs(omdb_timeout_secs),
            omdb_rps,
            seed,
        })
    }
}
