use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::{
    AppState, docs,
    error::{AppError, AppResult, ErrorBody},
    models::{FetchQuery, Film, FilmPatch, FilmQuery, NewFilm},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/films", get(list_films).post(create_film))
        .route("/films/fetch", get(fetch_film))
        .route("/films/{id}", get(get_film).put(update_film).delete(delete_film))
        .route("/films/{id}/refresh", post(refresh_film))
        .route("/health", get(health))
        .route("/docs", get(swagger_ui))
        .route(docs::OPENAPI_PATH, get(openapi))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[utoipa::path(
    get,
    path = "/films",
    tag = "films",
    params(FilmQuery),
    responses(
        (status = 200, description = "Films matching the filter", body = [Film]),
        (status = 422, description = "Invalid query", body = ErrorBody),
    )
)]
pub async fn list_films(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FilmQuery>, QueryRejection>,
) -> AppResult<Json<Vec<Film>>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    Ok(Json(state.store.list(&filter).await?))
}

/// Missing `year` or `description` are looked up on OMDb when it is configured.
#[utoipa::path(
    post,
    path = "/films",
    tag = "films",
    request_body = NewFilm,
    responses(
        (status = 201, description = "Film created", body = Film),
        (status = 422, description = "Invalid film", body = ErrorBody),
    )
)]
pub async fn create_film(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewFilm>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Film>)> {
    let Json(payload) = payload?;
    let mut film = payload.normalized();
    film.check()?;

    if film.needs_enrichment() && state.omdb.is_configured() {
        match state.omdb.fetch_by_title(&film.title, film.year).await {
            Ok(draft) => film.fill_missing_from(draft),
            Err(err) => warn!(title = %film.title, error = %err, "OMDb auto-fill skipped"),
        }
    }

    let created = state.store.create(film.validate()?).await?;
    info!(id = created.id, title = %created.title, "film added");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/films/{id}",
    tag = "films",
    params(("id" = i32, Path, description = "Film id")),
    responses(
        (status = 200, description = "The film", body = Film),
        (status = 404, description = "No such film", body = ErrorBody),
    )
)]
pub async fn get_film(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Film>> {
    let Path(id) = id?;
    Ok(Json(state.store.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/films/{id}",
    tag = "films",
    params(("id" = i32, Path, description = "Film id")),
    request_body = FilmPatch,
    responses(
        (status = 200, description = "Updated film", body = Film),
        (status = 404, description = "No such film", body = ErrorBody),
        (status = 422, description = "Invalid fields", body = ErrorBody),
    )
)]
pub async fn update_film(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<FilmPatch>, JsonRejection>,
) -> AppResult<Json<Film>> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let updated = state.store.update(id, patch.validate()?).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/films/{id}",
    tag = "films",
    params(("id" = i32, Path, description = "Film id")),
    responses(
        (status = 204, description = "Film deleted"),
        (status = 404, description = "No such film", body = ErrorBody),
    )
)]
pub async fn delete_film(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    state.store.delete(id).await?;
    info!(id = id, "film deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the OMDb data for a title, or saves it as a new film with `persist=true`.
#[utoipa::path(
    get,
    path = "/films/fetch",
    tag = "enrichment",
    params(FetchQuery),
    responses(
        (status = 200, description = "Unsaved OMDb data", body = NewFilm),
        (status = 201, description = "OMDb data saved as a film", body = Film),
        (status = 404, description = "OMDb has no match", body = ErrorBody),
        (status = 502, description = "OMDb failed", body = ErrorBody),
        (status = 503, description = "OMDb not configured", body = ErrorBody),
    )
)]
pub async fn fetch_film(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FetchQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let title = query.title.trim();
    if title.is_empty() {
        return Err(AppError::invalid("title", "must not be empty"));
    }

    let draft = state.omdb.fetch_by_title(title, query.year).await?;
    if !query.persist {
        return Ok(Json(draft).into_response());
    }

    let created = state.store.create(draft.normalized().validate()?).await?;
    info!(id = created.id, title = %created.title, "film imported from OMDb");
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// Re-fetches OMDb data by `omdb_id`, or by title and year when the film has none.
#[utoipa::path(
    post,
    path = "/films/{id}/refresh",
    tag = "enrichment",
    params(("id" = i32, Path, description = "Film id")),
    responses(
        (status = 200, description = "Refreshed film", body = Film),
        (status = 404, description = "No such film or no OMDb match", body = ErrorBody),
        (status = 502, description = "OMDb failed", body = ErrorBody),
        (status = 503, description = "OMDb not configured", body = ErrorBody),
    )
)]
pub async fn refresh_film(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Film>> {
    let Path(id) = id?;
    let film = state.store.get(id).await?;

    let draft = match &film.omdb_id {
        Some(omdb_id) => state.omdb.fetch_by_id(omdb_id).await?,
        None => state.omdb.fetch_by_title(&film.title, Some(film.year)).await?,
    };

    let refreshed = state.store.apply_enrichment(id, draft.normalized()).await?;
    info!(id = id, omdb_id = ?refreshed.omdb_id, "film refreshed from OMDb");
    Ok(Json(refreshed))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "meta",
    responses((status = 200, description = "Service and database are reachable"))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    state.store.db().ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn swagger_ui() -> Html<String> {
    Html(docs::swagger_page(docs::OPENAPI_PATH))
}

pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(docs::ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Method, Request, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        db,
        omdb::{OmdbClient, fake},
        store::FilmStore,
    };

    async fn app_with_key(api_key: &str) -> Router {
        let db = db::connect_and_migrate("sqlite::memory:").await.unwrap();
        let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();
        let omdb = OmdbClient::new(http, api_key.to_string(), fake::spawn().await, 50);
        router(Arc::new(AppState { store: FilmStore::new(db), omdb: Arc::new(omdb) }))
    }

    async fn app() -> Router {
        app_with_key(fake::API_KEY).await
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    #[tokio::test]
    async fn create_get_delete_round_trip() {
        let app = app().await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/films",
            Some(json!({"title": "Inception", "year": 2010, "description": "Dreams."})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, fetched) = send(&app, Method::GET, &format!("/films/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Inception");
        assert_eq!(fetched, created);

        let (status, _) = send(&app, Method::DELETE, &format!("/films/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::GET, &format!("/films/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = send(&app, Method::DELETE, &format!("/films/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_fills_missing_fields_from_omdb() {
        let app = app().await;
        let (status, film) = send(&app, Method::POST, "/films", Some(json!({"title": "Inception"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(film["year"], 2010);
        assert_eq!(film["director"], "Christopher Nolan");
        assert_eq!(film["omdb_id"], "tt1375666");
    }

    #[tokio::test]
    async fn create_without_year_and_without_match_is_rejected() {
        let app = app().await;
        let (status, body) = send(&app, Method::POST, "/films", Some(json!({"title": "Unknown Film"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"][0]["field"], "year");
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/films",
            Some(json!({"title": "", "year": 20100, "rating": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let fields: Vec<_> = body["fields"].as_array().unwrap().iter().map(|f| f["field"].clone()).collect();
        assert_eq!(fields, [json!("title"), json!("year"), json!("rating")]);
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let app = app().await;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/films")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"title\": "))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn non_numeric_id_is_a_validation_error() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/films/abc", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"][0]["field"], "path");
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let app = app().await;
        let (_, film) = send(
            &app,
            Method::POST,
            "/films",
            Some(json!({"title": "Heat", "year": 1995, "director": "Michael Mann", "description": "LA crime saga."})),
        )
        .await;
        let id = film["id"].as_i64().unwrap();

        let (status, updated) =
            send(&app, Method::PUT, &format!("/films/{id}"), Some(json!({"rating": 8.3}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["rating"], 8.3);
        assert_eq!(updated["title"], "Heat");
        assert_eq!(updated["year"], 1995);
        assert_eq!(updated["director"], "Michael Mann");
        assert_eq!(updated["description"], "LA crime saga.");

        let (status, _) = send(&app, Method::PUT, "/films/999", Some(json!({"rating": 1.0}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, Method::PUT, &format!("/films/{id}"), Some(json!({"title": null}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"][0]["field"], "title");
        let (_, film) = send(&app, Method::GET, &format!("/films/{id}"), None).await;
        assert_eq!(film["title"], "Heat");
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let app = app().await;
        for (title, year, genre) in [
            ("Heat", 1995, "Crime, Drama"),
            ("Airplane!", 1980, "Comedy"),
            ("Thief", 1981, "Crime"),
            ("Collateral", 2004, "Crime, Thriller"),
        ] {
            let body = json!({"title": title, "year": year, "genre": genre, "description": "-"});
            send(&app, Method::POST, "/films", Some(body)).await;
        }

        let (status, films) = send(&app, Method::GET, "/films?genre=Crime&sort_by=year&order=desc", None).await;
        assert_eq!(status, StatusCode::OK);
        let films = films.as_array().unwrap();
        assert_eq!(films.len(), 3);
        assert!(films.iter().all(|f| f["genre"].as_str().unwrap().contains("Crime")));
        let years: Vec<_> = films.iter().map(|f| f["year"].as_i64().unwrap()).collect();
        assert_eq!(years, [2004, 1995, 1981]);

        let (status, _) = send(&app, Method::GET, "/films?limit=500", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, Method::GET, "/films?sort_by=budget", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, films) = send(&app, Method::GET, "/films?title=%25", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(films, json!([]));
    }

    #[tokio::test]
    async fn fetch_previews_without_saving() {
        let app = app().await;
        let (status, draft) = send(&app, Method::GET, "/films/fetch?title=Inception", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(draft["title"], "Inception");
        assert_eq!(draft["year"], 2010);
        assert!(draft.get("id").is_none());

        let (_, films) = send(&app, Method::GET, "/films", None).await;
        assert!(films.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_with_persist_creates_film() {
        let app = app().await;
        let (status, film) =
            send(&app, Method::GET, "/films/fetch?title=Inception&persist=true", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = film["id"].as_i64().unwrap();

        let (status, stored) = send(&app, Method::GET, &format!("/films/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["omdb_id"], "tt1375666");
    }

    #[tokio::test]
    async fn fetch_unknown_title_is_not_found() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/films/fetch?title=Nope%20Nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn fetch_without_api_key_is_unavailable() {
        let app = app_with_key("").await;
        let (status, body) = send(&app, Method::GET, "/films/fetch?title=Inception", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "provider");

        // Creation still works, just without auto-fill.
        let (status, _) =
            send(&app, Method::POST, "/films", Some(json!({"title": "Inception", "year": 2010}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn fetch_provider_failure_is_bad_gateway() {
        let app = app_with_key("wrong-key").await;
        let (status, body) = send(&app, Method::GET, "/films/fetch?title=Inception", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "OMDb request failed: Invalid API key!");
    }

    #[tokio::test]
    async fn refresh_overwrites_enrichment_fields() {
        let app = app().await;
        let (_, film) = send(
            &app,
            Method::POST,
            "/films",
            Some(json!({"title": "Inception", "year": 2010, "description": "old", "rating": 1.0})),
        )
        .await;
        let id = film["id"].as_i64().unwrap();

        let (status, refreshed) = send(&app, Method::POST, &format!("/films/{id}/refresh"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refreshed["rating"], 8.8);
        assert_eq!(refreshed["omdb_id"], "tt1375666");
        assert_ne!(refreshed["description"], "old");
        assert_eq!(refreshed["title"], "Inception");

        let (status, _) = send(&app, Method::POST, "/films/999/refresh", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_and_docs() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, doc) = send(&app, Method::GET, docs::OPENAPI_PATH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"].get("/films/{id}").is_some());

        let resp = app
            .oneshot(Request::builder().uri("/docs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
