use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::{
    config::SeedConfig,
    error::AppResult,
    models::FilmFields,
    omdb::OmdbClient,
    store::FilmStore,
};

/// Tops up a sparse catalog with OMDb search results.
///
/// Returns how many films were ensured; existing title+year matches are reused.
pub async fn seed_if_sparse(
    store: &FilmStore,
    omdb: &OmdbClient,
    seed: &SeedConfig,
) -> AppResult<usize> {
    let Some(query) = seed.query.as_deref() else {
        debug!("seeding disabled");
        return Ok(0);
    };
    if !omdb.is_configured() {
        debug!("seeding skipped, OMDb not configured");
        return Ok(0);
    }

    let current = store.count().await?;
    if current >= seed.min_films {
        debug!(current = current, min_films = seed.min_films, "catalog large enough, not seeding");
        return Ok(0);
    }

    let titles = omdb.search_titles(query, seed.min_films as usize).await?;
    debug!(query = %query, titles = titles.len(), "seeding catalog");

    let drafts: Vec<Option<FilmFields>> = stream::iter(titles)
        .map(|title| async move {
            let result: AppResult<FilmFields> = async {
                omdb.fetch_by_title(&title, None).await?.normalized().validate()
            }
            .await;

            match result {
                Ok(fields) => Some(fields),
                Err(err) => {
                    warn!(title = %title, error = %err, "skipping seed title");
                    None
                },
            }
        })
        .buffer_unordered(seed.concurrency.max(1))
        .collect()
        .await;

    let mut ensured = 0;
    for fields in drafts.into_iter().flatten() {
        store.ensure(fields).await?;
        ensured += 1;
    }

    info!(query = %query, ensured = ensured, "catalog seeded from OMDb");
    Ok(ensured)
}
