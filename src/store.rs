use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, LikeExpr, SimpleExpr},
};
use tracing::debug;

use crate::{
    entities::film,
    error::{AppError, AppResult},
    models::{Film, FilmFields, FilmFilter, FilmPatch, NewFilm, SortField, SortOrder},
};

#[derive(Clone)]
pub struct FilmStore {
    db: DatabaseConnection,
}

impl FilmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn list(&self, filter: &FilmFilter) -> AppResult<Vec<Film>> {
        let mut query = film::Entity::find();

        if let Some(title) = &filter.title {
            query = query.filter(contains_literal(film::Column::Title, title));
        }
        if let Some(genre) = &filter.genre {
            query = query.filter(contains_literal(film::Column::Genre, genre));
        }
        if let Some(director) = &filter.director {
            query = query.filter(contains_literal(film::Column::Director, director));
        }
        if let Some(year) = filter.year {
            query = query.filter(film::Column::Year.eq(year));
        }

        let order = match filter.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        let column = match filter.sort_by {
            SortField::Id => film::Column::Id,
            SortField::Title => film::Column::Title,
            SortField::Year => film::Column::Year,
            SortField::Rating => film::Column::Rating,
        };
        query = query.order_by(column, order);
        if filter.sort_by != SortField::Id {
            query = query.order_by_asc(film::Column::Id);
        }

        let rows = query.offset(filter.skip).limit(filter.limit).all(&self.db).await?;
        debug!(count = rows.len(), skip = filter.skip, limit = filter.limit, "listed films");
        Ok(rows.into_iter().map(Film::from).collect())
    }

    pub async fn get(&self, id: i32) -> AppResult<Film> {
        self.find_model(id).await.map(Film::from)
    }

    pub async fn create(&self, fields: FilmFields) -> AppResult<Film> {
        let now = now_sec();
        let model = film::ActiveModel {
            id: Default::default(),
            title: Set(fields.title),
            year: Set(fields.year),
            genre: Set(fields.genre),
            director: Set(fields.director),
            rating: Set(fields.rating),
            omdb_id: Set(fields.omdb_id),
            description: Set(fields.description),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&self.db).await?;
        debug!(id = created.id, title = %created.title, "created film");
        Ok(created.into())
    }

    pub async fn update(&self, id: i32, patch: FilmPatch) -> AppResult<Film> {
        let mut model = self.find_model(id).await?.into_active_model();

        // A null title or year is rejected by `FilmPatch::validate`.
        if let Some(Some(title)) = patch.title {
            model.title = Set(title);
        }
        if let Some(Some(year)) = patch.year {
            model.year = Set(year);
        }
        if let Some(genre) = patch.genre {
            model.genre = Set(genre);
        }
        if let Some(director) = patch.director {
            model.director = Set(director);
        }
        if let Some(rating) = patch.rating {
            model.rating = Set(rating);
        }
        if let Some(omdb_id) = patch.omdb_id {
            model.omdb_id = Set(omdb_id);
        }
        if let Some(description) = patch.description {
            model.description = Set(description);
        }
        model.updated_at = Set(now_sec());

        let updated = model.update(&self.db).await?;
        debug!(id = updated.id, "updated film");
        Ok(updated.into())
    }

    /// Overwrites the provider-sourced fields with a fresh OMDb lookup.
    /// Title and year stay as stored.
    pub async fn apply_enrichment(&self, id: i32, draft: NewFilm) -> AppResult<Film> {
        let patch = FilmPatch {
            genre: Some(draft.genre),
            director: Some(draft.director),
            rating: Some(draft.rating),
            omdb_id: Some(draft.omdb_id),
            description: Some(draft.description),
            ..Default::default()
        };
        self.update(id, patch).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let res = film::Entity::delete_by_id(id).exec(&self.db).await?;
        if res.rows_affected == 0 {
            return Err(AppError::film_not_found(id));
        }
        debug!(id = id, "deleted film");
        Ok(())
    }

    pub async fn count(&self) -> AppResult<u64> {
        Ok(film::Entity::find().count(&self.db).await?)
    }

    pub async fn find_by_title_year(&self, title: &str, year: i32) -> AppResult<Option<Film>> {
        let film = film::Entity::find()
            .filter(film::Column::Title.eq(title))
            .filter(film::Column::Year.eq(year))
            .order_by_asc(film::Column::Id)
            .one(&self.db)
            .await?;
        Ok(film.map(Film::from))
    }

    /// Returns the film stored under the same title and year, inserting it first if needed.
    pub async fn ensure(&self, fields: FilmFields) -> AppResult<Film> {
        if let Some(existing) = self.find_by_title_year(&fields.title, fields.year).await? {
            debug!(id = existing.id, title = %existing.title, "film already stored");
            return Ok(existing);
        }
        self.create(fields).await
    }

    async fn find_model(&self, id: i32) -> AppResult<film::Model> {
        film::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| AppError::film_not_found(id))
    }
}

/// `LIKE '%needle%'` with `%`, `_` and `\` in the needle matched literally.
/// SQLite compares ASCII letters case-insensitively.
fn contains_literal(column: film::Column, needle: &str) -> SimpleExpr {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    Expr::col((film::Entity, column)).like(LikeExpr::new(format!("%{escaped}%")).escape('\\'))
}

fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
