use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{pagination::DEFAULT_LIMIT, ApiResponse, Genre, MovieDetails},
    routes::{extract::AppQuery, AppState},
    services::{
        catalog::{
            self, MovieList, MoviePage, MovieListQuery, PageQuery, PersonalizedRecommendations,
            SearchQuery, SearchResults,
        },
        recommendations::{self, AiRecommendations},
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenreList {
    pub genres: Vec<Genre>,
}

#[derive(Debug, Serialize)]
pub struct MovieData {
    pub movie: MovieDetails,
}

#[derive(Debug, Serialize)]
pub struct SimilarMovies {
    pub movies: Vec<MovieDetails>,
}

pub async fn list_movies(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MovieListQuery>,
) -> AppResult<Json<ApiResponse<MovieList>>> {
    let list = catalog::list_movies(state.repo.as_ref(), query).await?;
    Ok(Json(ApiResponse::ok("Movies retrieved successfully", list)))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<MovieData>>> {
    let movie = catalog::get_movie(state.repo.as_ref(), &id).await?;
    Ok(Json(ApiResponse::ok(
        "Movie retrieved successfully",
        MovieData { movie },
    )))
}

pub async fn list_genres(State(state): State<AppState>) -> AppResult<Json<ApiResponse<GenreList>>> {
    let genres = catalog::list_genres(state.repo.as_ref()).await?;
    Ok(Json(ApiResponse::ok(
        "Genres retrieved successfully",
        GenreList { genres },
    )))
}

pub async fn popular_movies(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<ApiResponse<MoviePage>>> {
    let page = catalog::popular_movies(state.repo.as_ref(), query.page_request(DEFAULT_LIMIT)).await?;
    Ok(Json(ApiResponse::ok("Popular movies retrieved successfully", page)))
}

pub async fn search_movies(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchResults>>> {
    let results = catalog::search_movies(state.repo.as_ref(), query).await?;
    let message = format!("Search results for \"{}\"", results.query);
    Ok(Json(ApiResponse::ok(message, results)))
}

pub async fn similar_movies(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppQuery(query): AppQuery<LimitQuery>,
) -> AppResult<Json<ApiResponse<SimilarMovies>>> {
    let movies = catalog::similar_movies(state.repo.as_ref(), &id, query.limit.as_deref()).await?;
    let message = if movies.is_empty() {
        "No similar movies found"
    } else {
        "Similar movies retrieved successfully"
    };
    Ok(Json(ApiResponse::ok(message, SimilarMovies { movies })))
}

pub async fn personalized_recommendations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppQuery(query): AppQuery<LimitQuery>,
) -> AppResult<Json<ApiResponse<PersonalizedRecommendations>>> {
    let recs = catalog::recommend_for_user(state.repo.as_ref(), &user, query.limit.as_deref()).await?;
    Ok(Json(ApiResponse::ok(
        "Personalized recommendations retrieved successfully",
        recs,
    )))
}

pub async fn ai_recommendations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ApiResponse<AiRecommendations>>> {
    let recs =
        recommendations::recommend_with_ai(state.repo.as_ref(), state.completion.as_ref(), &user)
            .await?;
    Ok(Json(ApiResponse::ok(
        "AI movie recommendations generated successfully",
        recs,
    )))
}
