use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::repo::{GenreRepo, MovieRepo, UserRepo, WatchlistRepo};
use crate::error::{AppError, AppResult};
use crate::models::{
    Genre, GenreCount, Movie, MovieDetails, MovieFilter, MovieSort, NewMovie, NewUser,
    NewWatchlistEntry, PageRequest, StatusCounts, User, UserChanges, WatchlistEntry,
    WatchlistItem, WatchlistStats, WatchlistStatus,
};

/// In-process repository holding every table behind one lock.
///
/// Enforces the same uniqueness rules as the SQL schema. Used for local runs
/// without PostgreSQL and by the HTTP integration tests.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    genres: BTreeMap<i32, Genre>,
    movies: BTreeMap<i32, StoredMovie>,
    /// (movie id, genre id)
    movie_genres: BTreeSet<(i32, i32)>,
    watchlist: BTreeMap<i32, WatchlistEntry>,
    /// Per-table id sequences, like SERIAL columns
    sequences: HashMap<&'static str, i32>,
}

struct StoredMovie {
    tmdb_id: Option<i32>,
    movie: Movie,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i32 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn details(&self, movie: &Movie) -> MovieDetails {
        let mut genres: Vec<Genre> = self
            .movie_genres
            .range((movie.id, i32::MIN)..=(movie.id, i32::MAX))
            .filter_map(|(_, genre_id)| self.genres.get(genre_id).cloned())
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));

        let watchlist_count = self
            .watchlist
            .values()
            .filter(|e| e.movie_id == movie.id)
            .count() as i64;

        MovieDetails {
            movie: movie.clone(),
            genres,
            watchlist_count,
        }
    }

    fn item(&self, entry: &WatchlistEntry) -> Option<WatchlistItem> {
        self.movies.get(&entry.movie_id).map(|stored| WatchlistItem {
            entry: entry.clone(),
            movie: self.details(&stored.movie),
        })
    }

    fn owned_entry_mut(&mut self, user_id: i32, entry_id: i32) -> Option<&mut WatchlistEntry> {
        self.watchlist
            .get_mut(&entry_id)
            .filter(|entry| entry.user_id == user_id)
    }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.inner.write().await;

        if tables
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(AppError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let created = User {
            id: tables.next_id("users"),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            favorite_genres: user.favorite_genres,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> AppResult<Option<User>> {
        let mut tables = self.inner.write().await;

        if let Some(username) = &changes.username {
            if tables
                .users
                .values()
                .any(|u| u.id != id && &u.username == username)
            {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(favorite_genres) = changes.favorite_genres {
            user.favorite_genres = favorite_genres;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl GenreRepo for MemoryRepository {
    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let tables = self.inner.read().await;
        let mut genres: Vec<Genre> = tables.genres.values().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn get_genres(&self, ids: &[i32]) -> AppResult<Vec<Genre>> {
        let tables = self.inner.read().await;
        let mut genres: Vec<Genre> = ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| tables.genres.get(id).cloned())
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn upsert_genre(&self, name: &str) -> AppResult<Genre> {
        let mut tables = self.inner.write().await;

        if let Some(existing) = tables.genres.values().find(|g| g.name == name) {
            return Ok(existing.clone());
        }

        let genre = Genre {
            id: tables.next_id("genres"),
            name: name.to_string(),
        };
        tables.genres.insert(genre.id, genre.clone());
        Ok(genre)
    }
}

#[async_trait]
impl MovieRepo for MemoryRepository {
    async fn query_movies(
        &self,
        filter: &MovieFilter,
        sort: MovieSort,
        page: PageRequest,
    ) -> AppResult<(Vec<MovieDetails>, i64)> {
        let tables = self.inner.read().await;

        let mut matches: Vec<MovieDetails> = tables
            .movies
            .values()
            .map(|stored| tables.details(&stored.movie))
            .filter(|details| filter.matches(details))
            .collect();
        matches.sort_by(|a, b| sort.compare(a, b));

        let total = matches.len() as i64;
        Ok((paginate(matches, page), total))
    }

    async fn get_movie(&self, id: i32) -> AppResult<Option<MovieDetails>> {
        let tables = self.inner.read().await;
        Ok(tables
            .movies
            .get(&id)
            .map(|stored| tables.details(&stored.movie)))
    }

    async fn list_all_movies(&self) -> AppResult<Vec<Movie>> {
        let tables = self.inner.read().await;
        Ok(tables.movies.values().map(|s| s.movie.clone()).collect())
    }

    async fn insert_movie(&self, movie: NewMovie) -> AppResult<Option<Movie>> {
        let mut tables = self.inner.write().await;

        if movie.tmdb_id.is_some()
            && tables.movies.values().any(|s| s.tmdb_id == movie.tmdb_id)
        {
            return Ok(None);
        }

        let created = Movie {
            id: tables.next_id("movies"),
            title: movie.title,
            overview: movie.overview,
            cover_url: movie.cover_url,
            release_date: movie.release_date,
            created_at: Utc::now(),
        };

        for genre_id in movie.genre_ids {
            if tables.genres.contains_key(&genre_id) {
                tables.movie_genres.insert((created.id, genre_id));
            }
        }
        tables.movies.insert(
            created.id,
            StoredMovie {
                tmdb_id: movie.tmdb_id,
                movie: created.clone(),
            },
        );

        Ok(Some(created))
    }
}

#[async_trait]
impl WatchlistRepo for MemoryRepository {
    async fn list_watchlist(
        &self,
        user_id: i32,
        status: Option<WatchlistStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<WatchlistItem>, i64)> {
        let tables = self.inner.read().await;

        let mut entries: Vec<&WatchlistEntry> = tables
            .watchlist
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = entries.len() as i64;
        let items = paginate(entries, page)
            .into_iter()
            .filter_map(|entry| tables.item(entry))
            .collect();

        Ok((items, total))
    }

    async fn watchlist_movie_ids(&self, user_id: i32) -> AppResult<Vec<i32>> {
        let tables = self.inner.read().await;
        Ok(tables
            .watchlist
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.movie_id)
            .collect())
    }

    async fn watchlist_genre_ids(&self, user_id: i32) -> AppResult<Vec<i32>> {
        let tables = self.inner.read().await;
        let movie_ids: BTreeSet<i32> = tables
            .watchlist
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.movie_id)
            .collect();

        let genre_ids: BTreeSet<i32> = tables
            .movie_genres
            .iter()
            .filter(|(movie_id, _)| movie_ids.contains(movie_id))
            .map(|(_, genre_id)| *genre_id)
            .collect();

        Ok(genre_ids.into_iter().collect())
    }

    async fn find_entry_for_movie(
        &self,
        user_id: i32,
        movie_id: i32,
    ) -> AppResult<Option<WatchlistEntry>> {
        let tables = self.inner.read().await;
        Ok(tables
            .watchlist
            .values()
            .find(|e| e.user_id == user_id && e.movie_id == movie_id)
            .cloned())
    }

    async fn get_entry(&self, user_id: i32, entry_id: i32) -> AppResult<Option<WatchlistItem>> {
        let tables = self.inner.read().await;
        Ok(tables
            .watchlist
            .get(&entry_id)
            .filter(|e| e.user_id == user_id)
            .and_then(|e| tables.item(e)))
    }

    async fn create_entry(&self, entry: NewWatchlistEntry) -> AppResult<WatchlistEntry> {
        let mut tables = self.inner.write().await;

        if tables
            .watchlist
            .values()
            .any(|e| e.user_id == entry.user_id && e.movie_id == entry.movie_id)
        {
            return Err(AppError::Conflict(
                "Movie is already in your watchlist".to_string(),
            ));
        }
        if !tables.movies.contains_key(&entry.movie_id) {
            return Err(AppError::NotFound("Movie not found".to_string()));
        }

        let now = Utc::now();
        let created = WatchlistEntry {
            id: tables.next_id("watchlists"),
            user_id: entry.user_id,
            movie_id: entry.movie_id,
            status: entry.status,
            created_at: now,
            updated_at: now,
        };
        tables.watchlist.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_entry_status(
        &self,
        user_id: i32,
        entry_id: i32,
        status: WatchlistStatus,
    ) -> AppResult<Option<WatchlistEntry>> {
        let mut tables = self.inner.write().await;

        Ok(tables.owned_entry_mut(user_id, entry_id).map(|entry| {
            entry.status = status;
            entry.updated_at = Utc::now();
            entry.clone()
        }))
    }

    async fn delete_entry(&self, user_id: i32, entry_id: i32) -> AppResult<Option<WatchlistEntry>> {
        let mut tables = self.inner.write().await;

        if tables.owned_entry_mut(user_id, entry_id).is_none() {
            return Ok(None);
        }
        Ok(tables.watchlist.remove(&entry_id))
    }

    async fn watchlist_stats(&self, user_id: i32, top_genres: i64) -> AppResult<WatchlistStats> {
        let tables = self.inner.read().await;

        let mut by_status = StatusCounts::default();
        let mut genre_counts: HashMap<i32, i64> = HashMap::new();

        for entry in tables.watchlist.values().filter(|e| e.user_id == user_id) {
            by_status.add(entry.status, 1);
            for (_, genre_id) in tables
                .movie_genres
                .range((entry.movie_id, i32::MIN)..=(entry.movie_id, i32::MAX))
            {
                *genre_counts.entry(*genre_id).or_default() += 1;
            }
        }

        let mut top: Vec<GenreCount> = genre_counts
            .into_iter()
            .filter_map(|(id, movie_count)| {
                tables.genres.get(&id).map(|genre| GenreCount {
                    id,
                    name: genre.name.clone(),
                    movie_count,
                })
            })
            .collect();
        top.sort_by(|a, b| b.movie_count.cmp(&a.movie_count).then(a.name.cmp(&b.name)));
        top.truncate(top_genres.max(0) as usize);

        Ok(WatchlistStats {
            total_movies: by_status.total(),
            by_status,
            top_genres: top,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn seeded() -> (MemoryRepository, Genre, Movie) {
        let repo = MemoryRepository::new();
        let genre = repo.upsert_genre("Action").await.unwrap();
        let movie = repo
            .insert_movie(NewMovie {
                tmdb_id: Some(603),
                title: "The Matrix".to_string(),
                overview: Some("A hacker learns the truth".to_string()),
                cover_url: None,
                release_date: NaiveDate::from_ymd_opt(1999, 3, 31),
                genre_ids: vec![genre.id],
            })
            .await
            .unwrap()
            .unwrap();
        (repo, genre, movie)
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
            favorite_genres: vec![],
        }
    }

    #[tokio::test]
    async fn test_duplicate_user_is_conflict() {
        let repo = MemoryRepository::new();
        repo.create_user(new_user("trinity")).await.unwrap();
        let err = repo.create_user(new_user("trinity")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_insert_movie_is_idempotent_by_tmdb_id() {
        let (repo, genre, _) = seeded().await;
        let again = repo
            .insert_movie(NewMovie {
                tmdb_id: Some(603),
                title: "The Matrix".to_string(),
                overview: None,
                cover_url: None,
                release_date: None,
                genre_ids: vec![genre.id],
            })
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(repo.list_all_movies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_watchlist_entries_are_owner_scoped() {
        let (repo, _, movie) = seeded().await;
        let owner = repo.create_user(new_user("morpheus")).await.unwrap();
        let other = repo.create_user(new_user("smith")).await.unwrap();

        let entry = repo
            .create_entry(NewWatchlistEntry {
                user_id: owner.id,
                movie_id: movie.id,
                status: WatchlistStatus::Want,
            })
            .await
            .unwrap();

        assert!(repo
            .update_entry_status(other.id, entry.id, WatchlistStatus::Watched)
            .await
            .unwrap()
            .is_none());
        assert!(repo.delete_entry(other.id, entry.id).await.unwrap().is_none());
        assert!(repo.get_entry(owner.id, entry.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats_count_statuses_and_genres() {
        let (repo, genre, movie) = seeded().await;
        let user = repo.create_user(new_user("niobe")).await.unwrap();
        repo.create_entry(NewWatchlistEntry {
            user_id: user.id,
            movie_id: movie.id,
            status: WatchlistStatus::Favorite,
        })
        .await
        .unwrap();

        let stats = repo.watchlist_stats(user.id, 5).await.unwrap();
        assert_eq!(stats.total_movies, 1);
        assert_eq!(stats.by_status.favorite, 1);
        assert_eq!(stats.top_genres.len(), 1);
        assert_eq!(stats.top_genres[0].id, genre.id);

        let details = repo.get_movie(movie.id).await.unwrap().unwrap();
        assert_eq!(details.watchlist_count, 1);
    }

    #[tokio::test]
    async fn test_watchlist_genre_ids_are_distinct_and_owner_scoped() {
        let (repo, action, matrix) = seeded().await;
        let drama = repo.upsert_genre("Drama").await.unwrap();
        let reloaded = repo
            .insert_movie(NewMovie {
                tmdb_id: Some(604),
                title: "The Matrix Reloaded".to_string(),
                overview: None,
                cover_url: None,
                release_date: None,
                genre_ids: vec![action.id, drama.id],
            })
            .await
            .unwrap()
            .unwrap();

        let user = repo.create_user(new_user("tank")).await.unwrap();
        let other = repo.create_user(new_user("dozer")).await.unwrap();
        for movie_id in [matrix.id, reloaded.id] {
            repo.create_entry(NewWatchlistEntry {
                user_id: user.id,
                movie_id,
                status: WatchlistStatus::Want,
            })
            .await
            .unwrap();
        }

        assert_eq!(
            repo.watchlist_genre_ids(user.id).await.unwrap(),
            vec![action.id, drama.id]
        );
        assert!(repo.watchlist_genre_ids(other.id).await.unwrap().is_empty());
    }
}
