use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GenreCount, MovieDetails};
use crate::error::AppError;

/// A user's intent or status toward a movie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchlistStatus {
    #[default]
    Want,
    Watched,
    Favorite,
}

impl WatchlistStatus {
    pub const ALL: [WatchlistStatus; 3] = [
        WatchlistStatus::Want,
        WatchlistStatus::Watched,
        WatchlistStatus::Favorite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchlistStatus::Want => "want",
            WatchlistStatus::Watched => "watched",
            WatchlistStatus::Favorite => "favorite",
        }
    }
}

impl Display for WatchlistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchlistStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WatchlistStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let allowed = WatchlistStatus::ALL.map(|status| status.as_str()).join(", ");
                AppError::InvalidInput(format!("Invalid status. Must be one of: {}", allowed))
            })
    }
}

/// One row of a user's watchlist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistEntry {
    pub id: i32,
    pub user_id: i32,
    pub movie_id: i32,
    pub status: WatchlistStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A watchlist entry with the movie it points at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistItem {
    #[serde(flatten)]
    pub entry: WatchlistEntry,
    pub movie: MovieDetails,
}

#[derive(Debug, Clone)]
pub struct NewWatchlistEntry {
    pub user_id: i32,
    pub movie_id: i32,
    pub status: WatchlistStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub want: i64,
    pub watched: i64,
    pub favorite: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: WatchlistStatus, count: i64) {
        match status {
            WatchlistStatus::Want => self.want += count,
            WatchlistStatus::Watched => self.watched += count,
            WatchlistStatus::Favorite => self.favorite += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.want + self.watched + self.favorite
    }
}

/// Summary of a user's watchlist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistStats {
    pub total_movies: i64,
    pub by_status: StatusCounts,
    pub top_genres: Vec<GenreCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("want".parse::<WatchlistStatus>().unwrap(), WatchlistStatus::Want);
        assert_eq!("watched".parse::<WatchlistStatus>().unwrap(), WatchlistStatus::Watched);
        assert_eq!("favorite".parse::<WatchlistStatus>().unwrap(), WatchlistStatus::Favorite);
        match "want_to_watch".parse::<WatchlistStatus>() {
            Err(AppError::InvalidInput(msg)) => {
                assert_eq!(msg, "Invalid status. Must be one of: want, watched, favorite")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&WatchlistStatus::Favorite).unwrap();
        assert_eq!(json, "\"favorite\"");
        assert_eq!(WatchlistStatus::default(), WatchlistStatus::Want);
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.add(WatchlistStatus::Want, 2);
        counts.add(WatchlistStatus::Favorite, 1);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.watched, 0);
    }
}
