use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{pagination::DEFAULT_LIMIT, ApiResponse, WatchlistItem, WatchlistStats},
    routes::{
        extract::{AppJson, AppQuery},
        AppState,
    },
    services::{
        catalog::PageQuery,
        watchlist::{
            self, AddToWatchlistRequest, UpdateWatchlistRequest, WatchlistCheck, WatchlistPage,
            WatchlistQuery,
        },
    },
};

#[derive(Debug, Serialize)]
pub struct EntryData {
    pub watchlist_entry: WatchlistItem,
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppQuery(query): AppQuery<WatchlistQuery>,
) -> AppResult<Json<ApiResponse<WatchlistPage>>> {
    let page = watchlist::list(state.repo.as_ref(), user.id, query).await?;
    Ok(Json(ApiResponse::ok("Watchlist retrieved successfully", page)))
}

pub async fn add(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(request): AppJson<AddToWatchlistRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<EntryData>>)> {
    let item = watchlist::add(state.repo.as_ref(), user.id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Movie added to watchlist successfully",
            EntryData {
                watchlist_entry: item,
            },
        )),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateWatchlistRequest>,
) -> AppResult<Json<ApiResponse<EntryData>>> {
    let item = watchlist::update(state.repo.as_ref(), user.id, &id, request).await?;
    Ok(Json(ApiResponse::ok(
        "Watchlist entry updated successfully",
        EntryData {
            watchlist_entry: item,
        },
    )))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let title = watchlist::remove(state.repo.as_ref(), user.id, &id).await?;
    Ok(Json(ApiResponse::message(format!(
        "\"{}\" removed from watchlist successfully",
        title
    ))))
}

pub async fn by_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(status): Path<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<ApiResponse<WatchlistPage>>> {
    let page = watchlist::by_status(
        state.repo.as_ref(),
        user.id,
        &status,
        query.page_request(DEFAULT_LIMIT),
    )
    .await?;
    let message = format!("{} movies retrieved successfully", status.trim());
    Ok(Json(ApiResponse::ok(message, page)))
}

pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ApiResponse<WatchlistStats>>> {
    let stats = watchlist::stats(state.repo.as_ref(), user.id).await?;
    Ok(Json(ApiResponse::ok(
        "Watchlist statistics retrieved successfully",
        stats,
    )))
}

pub async fn check(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(movie_id): Path<String>,
) -> AppResult<Json<ApiResponse<WatchlistCheck>>> {
    let check = watchlist::check(state.repo.as_ref(), user.id, &movie_id).await?;
    Ok(Json(ApiResponse::ok(
        "Watchlist status checked successfully",
        check,
    )))
}
