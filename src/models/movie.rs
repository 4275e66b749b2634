use std::cmp::Ordering;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

/// A movie genre (reference data seeded from the metadata source)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

/// A genre with the number of the caller's watchlisted movies in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreCount {
    pub id: i32,
    pub name: String,
    pub movie_count: i64,
}

/// A catalog movie as stored
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A movie together with its genres and popularity proxy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub movie: Movie,
    pub genres: Vec<Genre>,
    /// Number of watchlist entries referencing the movie
    pub watchlist_count: i64,
}

/// Movie to insert while seeding the catalog
#[derive(Debug, Clone)]
pub struct NewMovie {
    pub tmdb_id: Option<i32>,
    pub title: String,
    pub overview: Option<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub genre_ids: Vec<i32>,
}

/// Conditions a movie must satisfy to be part of a catalog query.
///
/// Text conditions are case-insensitive substring matches. Empty id lists
/// impose no restriction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieFilter {
    /// Substring of the title
    pub title: Option<String>,
    /// Substring of the title or the overview
    pub text: Option<String>,
    /// Substring of any genre name
    pub genre: Option<String>,
    /// Movie must have at least one of these genres
    pub genre_ids: Vec<i32>,
    pub year: Option<i32>,
    pub exclude_ids: Vec<i32>,
    /// Only movies present in at least one watchlist
    pub watchlisted_only: bool,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl MovieFilter {
    pub fn matches(&self, details: &MovieDetails) -> bool {
        let movie = &details.movie;

        if let Some(title) = &self.title {
            if !contains_ci(&movie.title, title) {
                return false;
            }
        }

        if let Some(text) = &self.text {
            let in_overview = movie
                .overview
                .as_deref()
                .is_some_and(|overview| contains_ci(overview, text));
            if !contains_ci(&movie.title, text) && !in_overview {
                return false;
            }
        }

        if let Some(genre) = &self.genre {
            if !details.genres.iter().any(|g| contains_ci(&g.name, genre)) {
                return false;
            }
        }

        if !self.genre_ids.is_empty()
            && !details.genres.iter().any(|g| self.genre_ids.contains(&g.id))
        {
            return false;
        }

        if let Some(year) = self.year {
            if movie.release_date.map(|d| d.year()) != Some(year) {
                return false;
            }
        }

        if self.exclude_ids.contains(&movie.id) {
            return false;
        }

        !(self.watchlisted_only && details.watchlist_count == 0)
    }
}

/// Sort order for catalog queries. Every order ends with an id tie-breaker so
/// pages are stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MovieSort {
    /// Most recently added first
    #[default]
    Newest,
    /// Title A to Z
    Title,
    /// Most recent release first, undated movies last
    ReleaseDate,
    /// Most watchlisted first, then newest
    Popularity,
    /// Most watchlisted first, then title A to Z
    Relevance,
}

impl MovieSort {
    /// Parses the `sort` query parameter; unknown values use the default order
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some("title") => MovieSort::Title,
            Some("release_date") => MovieSort::ReleaseDate,
            Some("popularity") => MovieSort::Popularity,
            _ => MovieSort::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovieSort::Newest => "created_at",
            MovieSort::Title => "title",
            MovieSort::ReleaseDate => "release_date",
            MovieSort::Popularity => "popularity",
            MovieSort::Relevance => "relevance",
        }
    }

    pub fn compare(&self, a: &MovieDetails, b: &MovieDetails) -> Ordering {
        let (ma, mb) = (&a.movie, &b.movie);
        match self {
            MovieSort::Newest => mb
                .created_at
                .cmp(&ma.created_at)
                .then(mb.id.cmp(&ma.id)),
            MovieSort::Title => ma.title.cmp(&mb.title).then(ma.id.cmp(&mb.id)),
            MovieSort::ReleaseDate => {
                let by_date = match (ma.release_date, mb.release_date) {
                    (Some(da), Some(db)) => db.cmp(&da),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                by_date.then(mb.id.cmp(&ma.id))
            }
            MovieSort::Popularity => b
                .watchlist_count
                .cmp(&a.watchlist_count)
                .then(mb.created_at.cmp(&ma.created_at))
                .then(mb.id.cmp(&ma.id)),
            MovieSort::Relevance => b
                .watchlist_count
                .cmp(&a.watchlist_count)
                .then(ma.title.cmp(&mb.title))
                .then(ma.id.cmp(&mb.id)),
        }
    }
}
