use maud::{DOCTYPE, PreEscaped, html};
use utoipa::OpenApi;

use crate::{
    error::{ErrorBody, FieldError},
    models::{Film, FilmPatch, NewFilm, SortField, SortOrder},
    routes,
};

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

const SWAGGER_UI_CDN: &str = "https://cdn.jsdelivr.net/npm/swagger-ui-dist@5";

#[derive(OpenApi)]
#[openapi(
    info(title = "filmshelf", description = "Film catalog with OMDb enrichment"),
    paths(
        routes::list_films,
        routes::create_film,
        routes::get_film,
        routes::update_film,
        routes::delete_film,
        routes::fetch_film,
        routes::refresh_film,
        routes::health,
    ),
    components(schemas(Film, NewFilm, FilmPatch, SortField, SortOrder, ErrorBody, FieldError)),
    tags(
        (name = "films", description = "Film catalog"),
        (name = "enrichment", description = "OMDb lookups"),
        (name = "meta", description = "Service status"),
    )
)]
pub struct ApiDoc;

/// Swagger UI page reading the generated document from `spec_url`.
pub fn swagger_page(spec_url: &str) -> String {
    let init = format!(
        "window.ui = SwaggerUIBundle({{ url: {}, dom_id: '#swagger-ui' }});",
        serde_json::Value::from(spec_url)
    );

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "filmshelf API" }
                link rel="stylesheet" href=(format!("{SWAGGER_UI_CDN}/swagger-ui.css"));
            }
            body {
                div id="swagger-ui" {}
                script src=(format!("{SWAGGER_UI_CDN}/swagger-ui-bundle.js")) {}
                script { (PreEscaped(init)) }
            }
        }
    }
    .into_string()
}
