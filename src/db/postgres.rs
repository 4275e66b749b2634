use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use super::repo::{GenreRepo, MovieRepo, UserRepo, WatchlistRepo};
use crate::error::{AppError, AppResult};
use crate::models::{
    Genre, GenreCount, Movie, MovieDetails, MovieFilter, MovieSort, NewMovie, NewUser,
    NewWatchlistEntry, PageRequest, StatusCounts, User, UserChanges, WatchlistEntry,
    WatchlistItem, WatchlistStats, WatchlistStatus,
};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, favorite_genres, created_at, updated_at";

const MOVIE_COLUMNS: &str = "m.id, m.title, m.overview, m.cover_url, m.release_date, m.created_at, \
     (SELECT COUNT(*) FROM watchlists w WHERE w.movie_id = m.id) AS watchlist_count";

const WATCHLIST_COLUMNS: &str = "id, user_id, movie_id, status, created_at, updated_at";

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the SQL migrations bundled under `migrations/`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    #[sqlx(flatten)]
    movie: Movie,
    watchlist_count: i64,
}

#[derive(sqlx::FromRow)]
struct WatchlistRow {
    id: i32,
    user_id: i32,
    movie_id: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WatchlistRow> for WatchlistEntry {
    type Error = AppError;

    fn try_from(row: WatchlistRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<WatchlistStatus>().map_err(|_| {
            AppError::Internal(format!("Unknown watchlist status in database: {}", row.status))
        })?;

        Ok(WatchlistEntry {
            id: row.id,
            user_id: row.user_id,
            movie_id: row.movie_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Appends the `AND ...` conditions for a movie filter. The query must alias
/// the movies table as `m`.
fn push_movie_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &MovieFilter) {
    if let Some(title) = &filter.title {
        query
            .push(" AND m.title ILIKE ")
            .push_bind(format!("%{}%", title));
    }

    if let Some(text) = &filter.text {
        let pattern = format!("%{}%", text);
        query
            .push(" AND (m.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR m.overview ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(genre) = &filter.genre {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM movie_genres mg JOIN genres g ON g.id = mg.genre_id \
                 WHERE mg.movie_id = m.id AND g.name ILIKE ",
            )
            .push_bind(format!("%{}%", genre))
            .push(")");
    }

    if !filter.genre_ids.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM movie_genres mg \
                 WHERE mg.movie_id = m.id AND mg.genre_id = ANY(",
            )
            .push_bind(filter.genre_ids.clone())
            .push("))");
    }

    if let Some(year) = filter.year {
        query
            .push(" AND EXTRACT(YEAR FROM m.release_date)::int = ")
            .push_bind(year);
    }

    if !filter.exclude_ids.is_empty() {
        query
            .push(" AND NOT (m.id = ANY(")
            .push_bind(filter.exclude_ids.clone())
            .push("))");
    }

    if filter.watchlisted_only {
        query.push(" AND EXISTS (SELECT 1 FROM watchlists w WHERE w.movie_id = m.id)");
    }
}

fn order_clause(sort: MovieSort) -> &'static str {
    match sort {
        MovieSort::Newest => "m.created_at DESC, m.id DESC",
        MovieSort::Title => "m.title ASC, m.id ASC",
        MovieSort::ReleaseDate => "m.release_date DESC NULLS LAST, m.id DESC",
        MovieSort::Popularity => "watchlist_count DESC, m.created_at DESC, m.id DESC",
        MovieSort::Relevance => "watchlist_count DESC, m.title ASC, m.id ASC",
    }
}

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the genres of the given movies, keyed by movie id
    async fn genres_for(&self, movie_ids: &[i32]) -> AppResult<HashMap<i32, Vec<Genre>>> {
        if movie_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i32, i32, String)> = sqlx::query_as(
            r#"
            SELECT mg.movie_id, g.id, g.name
            FROM movie_genres mg
            JOIN genres g ON g.id = mg.genre_id
            WHERE mg.movie_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(movie_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i32, Vec<Genre>> = HashMap::new();
        for (movie_id, id, name) in rows {
            genres.entry(movie_id).or_default().push(Genre { id, name });
        }

        Ok(genres)
    }

    async fn with_genres(&self, rows: Vec<MovieRow>) -> AppResult<Vec<MovieDetails>> {
        let ids: Vec<i32> = rows.iter().map(|row| row.movie.id).collect();
        let mut genres = self.genres_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| MovieDetails {
                genres: genres.remove(&row.movie.id).unwrap_or_default(),
                watchlist_count: row.watchlist_count,
                movie: row.movie,
            })
            .collect())
    }

    async fn movies_by_ids(&self, ids: &[i32]) -> AppResult<HashMap<i32, MovieDetails>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies m WHERE m.id = ANY($1)",
            MOVIE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(self
            .with_genres(rows)
            .await?
            .into_iter()
            .map(|details| (details.movie.id, details))
            .collect())
    }

    async fn attach_movies(&self, entries: Vec<WatchlistEntry>) -> AppResult<Vec<WatchlistItem>> {
        let ids: Vec<i32> = entries.iter().map(|e| e.movie_id).collect();
        let movies = self.movies_by_ids(&ids).await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                movies.get(&entry.movie_id).cloned().map(|movie| WatchlistItem { entry, movie })
            })
            .collect())
    }
}

#[async_trait]
impl UserRepo for PgRepository {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, favorite_genres) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.favorite_genres)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, "User with this email or username already exists")
        })
    }

    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                favorite_genres = COALESCE($3, favorite_genres), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.favorite_genres)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "Username already exists"))
    }
}

#[async_trait]
impl GenreRepo for PgRepository {
    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(genres)
    }

    async fn get_genres(&self, ids: &[i32]) -> AppResult<Vec<Genre>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let genres = sqlx::query_as::<_, Genre>(
            "SELECT id, name FROM genres WHERE id = ANY($1) ORDER BY name ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    async fn upsert_genre(&self, name: &str) -> AppResult<Genre> {
        let genre = sqlx::query_as::<_, Genre>(
            r#"
            INSERT INTO genres (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET updated_at = NOW()
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(genre)
    }
}

#[async_trait]
impl MovieRepo for PgRepository {
    async fn query_movies(
        &self,
        filter: &MovieFilter,
        sort: MovieSort,
        page: PageRequest,
    ) -> AppResult<(Vec<MovieDetails>, i64)> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM movies m WHERE TRUE");
        push_movie_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM movies m WHERE TRUE",
            MOVIE_COLUMNS
        ));
        push_movie_filter(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(order_clause(sort))
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<MovieRow> = query.build_query_as::<MovieRow>().fetch_all(&self.pool).await?;

        tracing::debug!(
            total,
            returned = rows.len(),
            sort = sort.as_str(),
            "Movie query executed"
        );

        Ok((self.with_genres(rows).await?, total))
    }

    async fn get_movie(&self, id: i32) -> AppResult<Option<MovieDetails>> {
        let row: Option<MovieRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movies m WHERE m.id = $1",
            MOVIE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_genres(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_all_movies(&self) -> AppResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            "SELECT id, title, overview, cover_url, release_date, created_at FROM movies ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(movies)
    }

    async fn insert_movie(&self, movie: NewMovie) -> AppResult<Option<Movie>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (tmdb_id, title, overview, cover_url, release_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tmdb_id) DO NOTHING
            RETURNING id, title, overview, cover_url, release_date, created_at
            "#,
        )
        .bind(movie.tmdb_id)
        .bind(&movie.title)
        .bind(&movie.overview)
        .bind(&movie.cover_url)
        .bind(movie.release_date)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(inserted) = inserted else {
            tx.rollback().await?;
            return Ok(None);
        };

        if !movie.genre_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO movie_genres (movie_id, genre_id)
                SELECT $1, UNNEST($2::int[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(inserted.id)
            .bind(&movie.genre_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(inserted))
    }
}

#[async_trait]
impl WatchlistRepo for PgRepository {
    async fn list_watchlist(
        &self,
        user_id: i32,
        status: Option<WatchlistStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<WatchlistItem>, i64)> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM watchlists WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<WatchlistRow> = sqlx::query_as(&format!(
            "SELECT {} FROM watchlists \
             WHERE user_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            WATCHLIST_COLUMNS
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(WatchlistEntry::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((self.attach_movies(entries).await?, total))
    }

    async fn watchlist_movie_ids(&self, user_id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar("SELECT movie_id FROM watchlists WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn watchlist_genre_ids(&self, user_id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT DISTINCT mg.genre_id
            FROM watchlists w
            JOIN movie_genres mg ON mg.movie_id = w.movie_id
            WHERE w.user_id = $1
            ORDER BY mg.genre_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn find_entry_for_movie(
        &self,
        user_id: i32,
        movie_id: i32,
    ) -> AppResult<Option<WatchlistEntry>> {
        let row: Option<WatchlistRow> = sqlx::query_as(&format!(
            "SELECT {} FROM watchlists WHERE user_id = $1 AND movie_id = $2",
            WATCHLIST_COLUMNS
        ))
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WatchlistEntry::try_from).transpose()
    }

    async fn get_entry(&self, user_id: i32, entry_id: i32) -> AppResult<Option<WatchlistItem>> {
        let row: Option<WatchlistRow> = sqlx::query_as(&format!(
            "SELECT {} FROM watchlists WHERE id = $1 AND user_id = $2",
            WATCHLIST_COLUMNS
        ))
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entry = WatchlistEntry::try_from(row)?;
        Ok(self.attach_movies(vec![entry]).await?.pop())
    }

    async fn create_entry(&self, entry: NewWatchlistEntry) -> AppResult<WatchlistEntry> {
        let row: WatchlistRow = sqlx::query_as(&format!(
            "INSERT INTO watchlists (user_id, movie_id, status) VALUES ($1, $2, $3) RETURNING {}",
            WATCHLIST_COLUMNS
        ))
        .bind(entry.user_id)
        .bind(entry.movie_id)
        .bind(entry.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "Movie is already in your watchlist"))?;

        WatchlistEntry::try_from(row)
    }

    async fn update_entry_status(
        &self,
        user_id: i32,
        entry_id: i32,
        status: WatchlistStatus,
    ) -> AppResult<Option<WatchlistEntry>> {
        let row: Option<WatchlistRow> = sqlx::query_as(&format!(
            "UPDATE watchlists SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            WATCHLIST_COLUMNS
        ))
        .bind(entry_id)
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WatchlistEntry::try_from).transpose()
    }

    async fn delete_entry(&self, user_id: i32, entry_id: i32) -> AppResult<Option<WatchlistEntry>> {
        let row: Option<WatchlistRow> = sqlx::query_as(&format!(
            "DELETE FROM watchlists WHERE id = $1 AND user_id = $2 RETURNING {}",
            WATCHLIST_COLUMNS
        ))
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WatchlistEntry::try_from).transpose()
    }

    async fn watchlist_stats(&self, user_id: i32, top_genres: i64) -> AppResult<WatchlistStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM watchlists WHERE user_id = $1 GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_status = StatusCounts::default();
        for (status, count) in rows {
            match status.parse::<WatchlistStatus>() {
                Ok(status) => by_status.add(status, count),
                Err(_) => tracing::warn!(status = %status, "Skipping unknown watchlist status"),
            }
        }

        let genres: Vec<(i32, String, i64)> = sqlx::query_as(
            r#"
            SELECT g.id, g.name, COUNT(*) AS movie_count
            FROM watchlists w
            JOIN movie_genres mg ON mg.movie_id = w.movie_id
            JOIN genres g ON g.id = mg.genre_id
            WHERE w.user_id = $1
            GROUP BY g.id, g.name
            ORDER BY movie_count DESC, g.name ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(top_genres)
        .fetch_all(&self.pool)
        .await?;

        Ok(WatchlistStats {
            total_movies: by_status.total(),
            by_status,
            top_genres: genres
                .into_iter()
                .map(|(id, name, movie_count)| GenreCount {
                    id,
                    name,
                    movie_count,
                })
                .collect(),
        })
    }
}
