use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    entities::film,
    error::{AppError, AppResult, FieldError},
};

pub const MAX_TITLE_LEN: usize = 255;
pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 100;

/// A stored film as returned by the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Film {
    pub id: i32,
    pub title: String,
    pub year: i32,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub rating: Option<f64>,
    pub omdb_id: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

impl From<film::Model> for Film {
    fn from(m: film::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            year: m.year,
            genre: m.genre,
            director: m.director,
            rating: m.rating,
            omdb_id: m.omdb_id,
            description: m.description,
            created_at: Timestamp::from_second(m.created_at).unwrap_or(Timestamp::UNIX_EPOCH),
            updated_at: Timestamp::from_second(m.updated_at).unwrap_or(Timestamp::UNIX_EPOCH),
        }
    }
}

/// Create payload. Also the shape of an OMDb lookup that has not been saved yet.
///
/// `year` may be left out on create when OMDb can supply it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewFilm {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub omdb_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Film fields that passed validation and are ready to be inserted.
#[derive(Clone, Debug, PartialEq)]
pub struct FilmFields {
    pub title: String,
    pub year: i32,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub rating: Option<f64>,
    pub omdb_id: Option<String>,
    pub description: Option<String>,
}

impl NewFilm {
    /// Trims text fields; blank optional text becomes absent.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            year: self.year,
            genre: clean(self.genre),
            director: clean(self.director),
            rating: self.rating,
            omdb_id: clean(self.omdb_id),
            description: clean(self.description),
        }
    }

    pub fn needs_enrichment(&self) -> bool {
        self.year.is_none() || self.description.is_none()
    }

    /// Copies provider data into the fields the caller left empty.
    pub fn fill_missing_from(&mut self, draft: NewFilm) {
        self.year = self.year.or(draft.year);
        self.genre = self.genre.take().or(draft.genre);
        self.director = self.director.take().or(draft.director);
        self.rating = self.rating.or(draft.rating);
        self.omdb_id = self.omdb_id.take().or(draft.omdb_id);
        self.description = self.description.take().or(draft.description);
    }

    /// Field checks that do not depend on enrichment.
    pub fn check(&self) -> AppResult<()> {
        let errors = self.field_errors();
        if errors.is_empty() { Ok(()) } else { Err(AppError::Validation(errors)) }
    }

    pub fn validate(self) -> AppResult<FilmFields> {
        let mut errors = self.field_errors();
        if self.year.is_none() {
            errors.push(FieldError::new("year", "is required"));
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(FilmFields {
            title: self.title,
            year: self.year.unwrap_or_default(),
            genre: self.genre,
            director: self.director,
            rating: self.rating,
            omdb_id: self.omdb_id,
            description: self.description,
        })
    }

    fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_title(&self.title, &mut errors);
        if let Some(year) = self.year {
            check_year(year, &mut errors);
        }
        if let Some(rating) = self.rating {
            check_rating(rating, &mut errors);
        }
        errors
    }
}

/// Partial update. Absent fields are left alone; optional fields can be
/// cleared with an explicit `null`. `title` and `year` cannot be null.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, ToSchema)]
pub struct FilmPatch {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub year: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub genre: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub director: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub rating: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub omdb_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

impl FilmPatch {
    pub fn validate(self) -> AppResult<Self> {
        let mut errors = Vec::new();
        let title = self.title.map(|t| t.map(|t| t.trim().to_string()));
        match &title {
            Some(Some(title)) => check_title(title, &mut errors),
            Some(None) => errors.push(FieldError::new("title", "must not be null")),
            None => {},
        }
        match self.year {
            Some(Some(year)) => check_year(year, &mut errors),
            Some(None) => errors.push(FieldError::new("year", "must not be null")),
            None => {},
        }
        if let Some(Some(rating)) = self.rating {
            check_rating(rating, &mut errors);
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(Self {
            title,
            year: self.year,
            genre: self.genre.map(clean),
            director: self.director.map(clean),
            rating: self.rating,
            omdb_id: self.omdb_id.map(clean),
            description: self.description.map(clean),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Id,
    Title,
    Year,
    Rating,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FilmQuery {
    /// Substring of the title.
    pub title: Option<String>,
    /// Substring of the genre list.
    pub genre: Option<String>,
    /// Substring of the director name.
    pub director: Option<String>,
    /// Exact release year.
    pub year: Option<i32>,
    pub sort_by: Option<SortField>,
    pub order: Option<SortOrder>,
    /// Rows to skip.
    pub skip: Option<u64>,
    /// Page size, at most 100.
    pub limit: Option<u64>,
}

/// Normalized list parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilmFilter {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub year: Option<i32>,
    pub sort_by: SortField,
    pub order: SortOrder,
    pub skip: u64,
    pub limit: u64,
}

impl FilmQuery {
    pub fn into_filter(self) -> AppResult<FilmFilter> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(AppError::invalid("limit", format!("must be between 1 and {MAX_PAGE_SIZE}")));
        }

        Ok(FilmFilter {
            title: clean(self.title),
            genre: clean(self.genre),
            director: clean(self.director),
            year: self.year,
            sort_by: self.sort_by.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            skip: self.skip.unwrap_or(0),
            limit,
        })
    }
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FetchQuery {
    /// Title to look up on OMDb.
    pub title: String,
    /// Narrows the lookup to a release year.
    pub year: Option<i32>,
    /// Save the result as a new film.
    #[serde(default)]
    pub persist: bool,
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    if title.trim().is_empty() {
        errors.push(FieldError::new("title", "must not be empty"));
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(FieldError::new("title", format!("must be at most {MAX_TITLE_LEN} characters")));
    }
}

fn check_year(year: i32, errors: &mut Vec<FieldError>) {
    if !(1000..=9999).contains(&year) {
        errors.push(FieldError::new("year", "must be a four-digit year"));
    }
}

fn check_rating(rating: f64, errors: &mut Vec<FieldError>) {
    if !(0.0..=10.0).contains(&rating) {
        errors.push(FieldError::new("rating", "must be between 0 and 10"));
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    })
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
