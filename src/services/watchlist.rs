use serde::{Deserialize, Serialize};

use crate::{
    db::{MovieRepo, Repository, WatchlistRepo},
    error::{AppError, AppResult},
    models::{
        pagination::DEFAULT_LIMIT, NewWatchlistEntry, PageRequest, Pagination, WatchlistEntry,
        WatchlistItem, WatchlistStats, WatchlistStatus,
    },
};

/// Number of genres reported by the watchlist statistics
pub const TOP_GENRES: i64 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct WatchlistQuery {
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddToWatchlistRequest {
    #[serde(alias = "movieId")]
    pub movie_id: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateWatchlistRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchlistFilters {
    pub status: Option<WatchlistStatus>,
}

#[derive(Debug, Serialize)]
pub struct WatchlistPage {
    pub watchlist: Vec<WatchlistItem>,
    pub pagination: Pagination,
    pub filters: WatchlistFilters,
}

#[derive(Debug, Serialize)]
pub struct WatchlistCheck {
    pub in_watchlist: bool,
    pub entry: Option<WatchlistEntry>,
}

fn parse_status(raw: Option<String>) -> AppResult<Option<WatchlistStatus>> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<WatchlistStatus>())
        .transpose()
}

fn parse_entry_id(raw: &str) -> AppResult<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| AppError::NotFound("Watchlist entry not found".to_string()))
}

fn entry_not_found() -> AppError {
    AppError::NotFound("Watchlist entry not found".to_string())
}

pub async fn list(
    repo: &dyn Repository,
    user_id: i32,
    query: WatchlistQuery,
) -> AppResult<WatchlistPage> {
    let status = parse_status(query.status)?;
    let page = PageRequest::from_params(query.page.as_deref(), query.limit.as_deref(), DEFAULT_LIMIT);

    let (watchlist, total) = repo.list_watchlist(user_id, status, page).await?;

    Ok(WatchlistPage {
        watchlist,
        pagination: Pagination::new(page, total),
        filters: WatchlistFilters { status },
    })
}

/// Entries with one status; the status comes from the path and must be valid
pub async fn by_status(
    repo: &dyn Repository,
    user_id: i32,
    raw_status: &str,
    page: PageRequest,
) -> AppResult<WatchlistPage> {
    let status = raw_status.trim().parse::<WatchlistStatus>()?;
    let (watchlist, total) = repo.list_watchlist(user_id, Some(status), page).await?;

    Ok(WatchlistPage {
        watchlist,
        pagination: Pagination::new(page, total),
        filters: WatchlistFilters {
            status: Some(status),
        },
    })
}

pub async fn add(
    repo: &dyn Repository,
    user_id: i32,
    request: AddToWatchlistRequest,
) -> AppResult<WatchlistItem> {
    let movie_id = request
        .movie_id
        .ok_or_else(|| AppError::InvalidInput("Movie ID is required".to_string()))?;
    let status = parse_status(request.status)?.unwrap_or_default();

    if repo.get_movie(movie_id).await?.is_none() {
        return Err(AppError::NotFound("Movie not found".to_string()));
    }

    if repo.find_entry_for_movie(user_id, movie_id).await?.is_some() {
        return Err(AppError::Conflict(
            "Movie is already in your watchlist".to_string(),
        ));
    }

    let entry = repo
        .create_entry(NewWatchlistEntry {
            user_id,
            movie_id,
            status,
        })
        .await?;

    tracing::info!(user_id, movie_id, entry_id = entry.id, status = %status, "Added movie to watchlist");

    repo.get_entry(user_id, entry.id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Watchlist entry {} vanished after insert", entry.id)))
}

pub async fn update(
    repo: &dyn Repository,
    user_id: i32,
    raw_entry_id: &str,
    request: UpdateWatchlistRequest,
) -> AppResult<WatchlistItem> {
    let status = parse_status(request.status)?
        .ok_or_else(|| AppError::InvalidInput("Status is required".to_string()))?;
    let entry_id = parse_entry_id(raw_entry_id)?;

    repo.update_entry_status(user_id, entry_id, status)
        .await?
        .ok_or_else(entry_not_found)?;

    repo.get_entry(user_id, entry_id)
        .await?
        .ok_or_else(entry_not_found)
}

/// Deletes an entry and returns the title of the movie it referenced
pub async fn remove(repo: &dyn Repository, user_id: i32, raw_entry_id: &str) -> AppResult<String> {
    let entry_id = parse_entry_id(raw_entry_id)?;
    let item = repo
        .get_entry(user_id, entry_id)
        .await?
        .ok_or_else(entry_not_found)?;

    repo.delete_entry(user_id, entry_id)
        .await?
        .ok_or_else(entry_not_found)?;

    tracing::info!(user_id, entry_id, movie_id = item.entry.movie_id, "Removed movie from watchlist");

    Ok(item.movie.movie.title)
}

pub async fn stats(repo: &dyn Repository, user_id: i32) -> AppResult<WatchlistStats> {
    repo.watchlist_stats(user_id, TOP_GENRES).await
}

pub async fn check(repo: &dyn Repository, user_id: i32, raw_movie_id: &str) -> AppResult<WatchlistCheck> {
    let movie_id = raw_movie_id
        .trim()
        .parse::<i32>()
        .map_err(|_| AppError::NotFound("Movie not found".to_string()))?;
    let entry = repo.find_entry_for_movie(user_id, movie_id).await?;

    Ok(WatchlistCheck {
        in_watchlist: entry.is_some(),
        entry,
    })
}
