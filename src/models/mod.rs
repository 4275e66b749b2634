use serde::Serialize;

pub mod movie;
pub mod pagination;
pub mod user;
pub mod watchlist;

pub use movie::{Genre, GenreCount, Movie, MovieDetails, MovieFilter, MovieSort, NewMovie};
pub use pagination::{PageRequest, Pagination};
pub use user::{NewUser, User, UserChanges};
pub use watchlist::{NewWatchlistEntry, StatusCounts, WatchlistEntry, WatchlistItem, WatchlistStats, WatchlistStatus};

/// JSON envelope shared by every API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}
