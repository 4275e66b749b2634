use std::collections::HashMap;

use crate::{
    db::{GenreRepo, MovieRepo, Repository},
    error::AppResult,
    models::NewMovie,
    services::providers::{MetadataSource, SourceMovie},
};

pub const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Outcome of a seeding run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub genres: usize,
    pub inserted: usize,
    /// Movies already present from an earlier run
    pub existing: usize,
    /// Movies missing a title, overview, poster, release date or genre
    pub skipped: usize,
}

/// Converts a source movie into an insertable one, mapping source genre ids
/// to local ids. Incomplete movies yield `None`.
fn to_new_movie(movie: SourceMovie, genre_map: &HashMap<i32, i32>) -> Option<NewMovie> {
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let title = non_blank(movie.title)?;
    let overview = non_blank(movie.overview)?;
    let poster_path = non_blank(movie.poster_path)?;
    let release_date = movie.release_date?;

    let mut genre_ids: Vec<i32> = movie
        .genre_ids
        .iter()
        .filter_map(|id| genre_map.get(id).copied())
        .collect();
    genre_ids.sort_unstable();
    genre_ids.dedup();
    if genre_ids.is_empty() {
        return None;
    }

    Some(NewMovie {
        tmdb_id: Some(movie.id),
        title,
        overview: Some(overview),
        cover_url: Some(format!("{}{}", POSTER_BASE_URL, poster_path)),
        release_date: Some(release_date),
        genre_ids,
    })
}

/// Imports the source's genres and `pages` pages of popular movies.
///
/// Safe to rerun: genres are matched by name and movies by source id.
pub async fn seed_catalog(
    source: &dyn MetadataSource,
    repo: &dyn Repository,
    pages: u32,
) -> AppResult<SeedReport> {
    let mut report = SeedReport::default();

    let mut genre_map = HashMap::new();
    for genre in source.genres().await? {
        let local = repo.upsert_genre(genre.name.trim()).await?;
        genre_map.insert(genre.id, local.id);
    }
    report.genres = genre_map.len();
    tracing::info!(genres = report.genres, "Seeded genres");

    for page in 1..=pages {
        let movies = source.popular_movies(page).await?;

        for movie in movies {
            let source_id = movie.id;
            let Some(new_movie) = to_new_movie(movie, &genre_map) else {
                tracing::debug!(source_id, "Skipping incomplete movie");
                report.skipped += 1;
                continue;
            };

            match repo.insert_movie(new_movie).await? {
                Some(_) => report.inserted += 1,
                None => report.existing += 1,
            }
        }

        tracing::info!(page, pages, inserted = report.inserted, "Seeded page of popular movies");
    }

    Ok(report)
}
