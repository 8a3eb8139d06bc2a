use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::NewFilm,
};

pub struct OmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl OmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, rps: u32) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("OMDb enrichment disabled - no OMDB_API_KEY provided");
        }

        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, api_key: api_key.trim().to_string(), base_url, limiter }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Looks a film up by title, optionally narrowed to a release year.
    pub async fn fetch_by_title(&self, title: &str, year: Option<i32>) -> AppResult<NewFilm> {
        let mut params = vec![("t", title.to_string()), ("type", "movie".to_string())];
        if let Some(year) = year {
            params.push(("y", year.to_string()));
        }

        let resp: TitleResponse = self.get(&params).await?;
        let film = resp.into_film(|| format!("no OMDb match for {title:?}"))?;
        debug!(title = %title, omdb_id = ?film.omdb_id, "fetched film from OMDb");
        Ok(film)
    }

    pub async fn fetch_by_id(&self, omdb_id: &str) -> AppResult<NewFilm> {
        let resp: TitleResponse = self.get(&[("i", omdb_id.to_string())]).await?;
        let film = resp.into_film(|| format!("no OMDb match for id {omdb_id}"))?;
        debug!(omdb_id = %omdb_id, title = %film.title, "fetched film from OMDb");
        Ok(film)
    }

    /// Titles matching a keyword search, at most `limit` of them.
    pub async fn search_titles(&self, query: &str, limit: usize) -> AppResult<Vec<String>> {
        let resp: SearchResponse =
            self.get(&[("s", query.to_string()), ("type", "movie".to_string())]).await?;

        if !resp.response.eq_ignore_ascii_case("true") {
            return match classify(resp.error, || String::new()) {
                AppError::NotFound(_) => Ok(Vec::new()),
                err => Err(err),
            };
        }

        let titles: Vec<String> = resp
            .search
            .into_iter()
            .filter_map(|item| not_available(item.title))
            .take(limit)
            .collect();
        debug!(query = %query, found = titles.len(), "searched OMDb");
        Ok(titles)
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> AppResult<T> {
        if !self.is_configured() {
            return Err(AppError::ProviderUnavailable);
        }

        self.limiter.until_ready().await;

        let resp = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", &self.api_key)])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| format!("unexpected status {status}"));
            return Err(AppError::Provider(message));
        }

        serde_json::from_str(&body)
            .map_err(|err| AppError::Provider(format!("invalid response body: {err}")))
    }
}

fn classify(error: Option<String>, not_found: impl FnOnce() -> String) -> AppError {
    match error {
        Some(msg) if msg.to_ascii_lowercase().contains("not found") => {
            AppError::NotFound(not_found())
        },
        Some(msg) => AppError::Provider(msg),
        None => AppError::Provider("request was not successful".to_string()),
    }
}

/// OMDb sends the literal `N/A` for missing values.
fn not_available(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let s = s.trim();
        (!s.is_empty() && s != "N/A").then(|| s.to_string())
    })
}

/// First four digits of `Year`; series report ranges such as `2010–2012`.
fn parse_year(value: &str) -> Option<i32> {
    let digits: String = value.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TitleResponse {
    response: String,
    error: Option<String>,
    title: Option<String>,
    year: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    plot: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
}

impl TitleResponse {
    fn into_film(self, not_found: impl FnOnce() -> String) -> AppResult<NewFilm> {
        if !self.response.eq_ignore_ascii_case("true") {
            return Err(classify(self.error, not_found));
        }

        let Some(title) = not_available(self.title) else {
            return Err(AppError::Provider("response without a title".to_string()));
        };

        Ok(NewFilm {
            title,
            year: self.year.as_deref().and_then(parse_year),
            genre: not_available(self.genre),
            director: not_available(self.director),
            rating: not_available(self.imdb_rating).and_then(|r| r.parse().ok()),
            omdb_id: not_available(self.imdb_id),
            description: not_available(self.plot),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResponse {
    response: String,
    error: Option<String>,
    #[serde(default)]
    search: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchItem {
    title: Option<String>,
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn client(api_key: &str) -> OmdbClient {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();
        OmdbClient::new(http, api_key.to_string(), fake::spawn().await, 50)
    }

    #[tokio::test]
    async fn maps_title_lookup_onto_film() {
        let film = client(fake::API_KEY).await.fetch_by_title("Inception", None).await.unwrap();
        assert_eq!(film.title, "Inception");
        assert_eq!(film.year, Some(2010));
        assert_eq!(film.director.as_deref(), Some("Christopher Nolan"));
        assert_eq!(film.rating, Some(8.8));
        assert_eq!(film.omdb_id.as_deref(), Some("tt1375666"));
        assert!(film.description.is_some());
    }

    #[tokio::test]
    async fn not_available_values_become_absent() {
        let film = client(fake::API_KEY).await.fetch_by_title("The Monitor", None).await.unwrap();
        assert_eq!(film.year, Some(2019));
        assert_eq!(film.genre, None);
        assert_eq!(film.rating, None);
        assert_eq!(film.description, None);
    }

    #[tokio::test]
    async fn unknown_title_is_not_found() {
        let res = client(fake::API_KEY).await.fetch_by_title("Nope Nope Nope", None).await;
        assert!(matches!(res, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn other_errors_are_provider_errors() {
        let res = client(fake::API_KEY).await.fetch_by_title("broken", None).await;
        assert!(matches!(res, Err(AppError::Provider(msg)) if msg == "Something went wrong."));
    }

    #[tokio::test]
    async fn rejected_key_is_provider_error() {
        let res = client("wrong").await.fetch_by_title("Inception", None).await;
        assert!(matches!(res, Err(AppError::Provider(msg)) if msg == "Invalid API key!"));
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let omdb = client("").await;
        assert!(!omdb.is_configured());
        assert!(matches!(omdb.fetch_by_id("tt1375666").await, Err(AppError::ProviderUnavailable)));
    }

    #[tokio::test]
    async fn fetches_by_id() {
        let film = client(fake::API_KEY).await.fetch_by_id("tt1375666").await.unwrap();
        assert_eq!(film.title, "Inception");
    }

    #[tokio::test]
    async fn search_skips_placeholder_titles_and_honors_limit() {
        let omdb = client(fake::API_KEY).await;
        assert_eq!(omdb.search_titles("monitor", 10).await.unwrap(), ["The Monitor", "Inception"]);
        assert_eq!(omdb.search_titles("monitor", 1).await.unwrap(), ["The Monitor"]);
        assert!(omdb.search_titles("zzzz", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_provider_is_provider_error() {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(2)).build().unwrap();
        let omdb = OmdbClient::new(http, fake::API_KEY.into(), "http://127.0.0.1:9/".into(), 50);
        assert!(matches!(omdb.fetch_by_title("Inception", None).await, Err(AppError::Provider(_))));
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_provider_error() {
        let app = axum::Router::new().route(
            "/",
            axum::routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let http = reqwest::Client::builder().timeout(Duration::from_millis(300)).build().unwrap();
        let omdb = OmdbClient::new(http, fake::API_KEY.into(), format!("http://{addr}/"), 50);
        let result = omdb.fetch_by_title("Inception", None).await;
        assert!(
            matches!(&result, Err(AppError::Provider(msg)) if msg == "request timed out"),
            "{result:?}"
        );
        assert_eq!(result.unwrap_err().status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn parses_years() {
        assert_eq!(parse_year("2010"), Some(2010));
        assert_eq!(parse_year("2010–2012"), Some(2010));
        assert_eq!(parse_year("N/A"), None);
        assert_eq!(parse_year("99"), None);
    }
}
