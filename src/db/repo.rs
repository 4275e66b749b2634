use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    Genre, Movie, MovieDetails, MovieFilter, MovieSort, NewMovie, NewUser, NewWatchlistEntry,
    PageRequest, User, UserChanges, WatchlistEntry, WatchlistItem, WatchlistStats,
    WatchlistStatus,
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Inserts a user; a duplicate email or username yields `AppError::Conflict`
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn get_user(&self, id: i32) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    /// Applies a partial update; a taken username yields `AppError::Conflict`
    async fn update_user(&self, id: i32, changes: UserChanges) -> AppResult<Option<User>>;
}

#[async_trait]
pub trait GenreRepo: Send + Sync {
    async fn list_genres(&self) -> AppResult<Vec<Genre>>;
    async fn get_genres(&self, ids: &[i32]) -> AppResult<Vec<Genre>>;
    async fn upsert_genre(&self, name: &str) -> AppResult<Genre>;
}

#[async_trait]
pub trait MovieRepo: Send + Sync {
    /// Returns one page of matching movies and the total number of matches
    async fn query_movies(
        &self,
        filter: &MovieFilter,
        sort: MovieSort,
        page: PageRequest,
    ) -> AppResult<(Vec<MovieDetails>, i64)>;
    async fn get_movie(&self, id: i32) -> AppResult<Option<MovieDetails>>;
    async fn list_all_movies(&self) -> AppResult<Vec<Movie>>;
    /// Inserts a movie with its genre links. Returns `None` when a movie with
    /// the same TMDB id already exists.
    async fn insert_movie(&self, movie: NewMovie) -> AppResult<Option<Movie>>;
}

/// Watchlist storage. Every operation is scoped to the owning user.
#[async_trait]
pub trait WatchlistRepo: Send + Sync {
    async fn list_watchlist(
        &self,
        user_id: i32,
        status: Option<WatchlistStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<WatchlistItem>, i64)>;
    async fn watchlist_movie_ids(&self, user_id: i32) -> AppResult<Vec<i32>>;
    /// Distinct genre ids across the movies on the user's watchlist
    async fn watchlist_genre_ids(&self, user_id: i32) -> AppResult<Vec<i32>>;
    async fn find_entry_for_movie(
        &self,
        user_id: i32,
        movie_id: i32,
    ) -> AppResult<Option<WatchlistEntry>>;
    async fn get_entry(&self, user_id: i32, entry_id: i32) -> AppResult<Option<WatchlistItem>>;
    /// Inserts an entry; a duplicate (user, movie) pair yields `AppError::Conflict`
    async fn create_entry(&self, entry: NewWatchlistEntry) -> AppResult<WatchlistEntry>;
    async fn update_entry_status(
        &self,
        user_id: i32,
        entry_id: i32,
        status: WatchlistStatus,
    ) -> AppResult<Option<WatchlistEntry>>;
    async fn delete_entry(&self, user_id: i32, entry_id: i32) -> AppResult<Option<WatchlistEntry>>;
    async fn watchlist_stats(&self, user_id: i32, top_genres: i64) -> AppResult<WatchlistStats>;
}

pub trait Repository: UserRepo + GenreRepo + MovieRepo + WatchlistRepo + Send + Sync {}

impl<T> Repository for T where T: UserRepo + GenreRepo + MovieRepo + WatchlistRepo + Send + Sync {}
