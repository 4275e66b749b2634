use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    db::{GenreRepo, MovieRepo, Repository, WatchlistRepo},
    error::{AppError, AppResult},
    models::{
        pagination::DEFAULT_LIMIT, Genre, MovieDetails, MovieFilter, MovieSort, PageRequest,
        Pagination, User,
    },
};

/// Default number of movies returned by `/movies/:id/similar`
pub const SIMILAR_LIMIT: u32 = 10;

/// Raw query string of `GET /movies`; values are validated here rather than by serde
#[derive(Debug, Default, Deserialize)]
pub struct MovieListQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn page_request(&self, default_limit: u32) -> PageRequest {
        PageRequest::from_params(self.page.as_deref(), self.limit.as_deref(), default_limit)
    }
}

/// Filters echoed back with a movie listing
#[derive(Debug, Serialize)]
pub struct AppliedFilters {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub sort: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MovieList {
    pub movies: Vec<MovieDetails>,
    pub pagination: Pagination,
    pub filters: AppliedFilters,
}

#[derive(Debug, Serialize)]
pub struct MoviePage {
    pub movies: Vec<MovieDetails>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub movies: Vec<MovieDetails>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserPreferences {
    pub favorite_genres: Vec<i32>,
    pub watched_count: usize,
}

#[derive(Debug, Serialize)]
pub struct PersonalizedRecommendations {
    pub movies: Vec<MovieDetails>,
    pub user_preferences: UserPreferences,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Path ids that are not numbers cannot name a movie
pub fn parse_movie_id(raw: &str) -> AppResult<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| AppError::NotFound("Movie not found".to_string()))
}

fn parse_year(raw: Option<String>) -> AppResult<Option<i32>> {
    match non_blank(raw) {
        None => Ok(None),
        Some(year) => year
            .parse::<i32>()
            .map(Some)
            .map_err(|_| AppError::InvalidInput("Year must be a number".to_string())),
    }
}

pub async fn list_movies(repo: &dyn Repository, query: MovieListQuery) -> AppResult<MovieList> {
    let page = PageRequest::from_params(query.page.as_deref(), query.limit.as_deref(), DEFAULT_LIMIT);
    let sort = MovieSort::from_param(query.sort.as_deref());
    let year = parse_year(query.year)?;
    let search = non_blank(query.search);
    let genre = non_blank(query.genre);

    let filter = MovieFilter {
        title: search.clone(),
        genre: genre.clone(),
        year,
        ..Default::default()
    };

    let (movies, total) = repo.query_movies(&filter, sort, page).await?;

    tracing::debug!(
        total,
        page = page.page,
        limit = page.limit,
        sort = sort.as_str(),
        "Listed movies"
    );

    Ok(MovieList {
        movies,
        pagination: Pagination::new(page, total),
        filters: AppliedFilters {
            search,
            genre,
            year,
            sort: sort.as_str(),
        },
    })
}

pub async fn get_movie(repo: &dyn Repository, raw_id: &str) -> AppResult<MovieDetails> {
    let id = parse_movie_id(raw_id)?;
    repo.get_movie(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))
}

pub async fn list_genres(repo: &dyn Repository) -> AppResult<Vec<Genre>> {
    repo.list_genres().await
}

/// Movies present in at least one watchlist, most watchlisted first
pub async fn popular_movies(repo: &dyn Repository, page: PageRequest) -> AppResult<MoviePage> {
    let filter = MovieFilter {
        watchlisted_only: true,
        ..Default::default()
    };
    let (movies, total) = repo.query_movies(&filter, MovieSort::Popularity, page).await?;

    Ok(MoviePage {
        movies,
        pagination: Pagination::new(page, total),
    })
}

/// Matches `q` against title or overview
pub async fn search_movies(repo: &dyn Repository, query: SearchQuery) -> AppResult<SearchResults> {
    let text = non_blank(query.q)
        .ok_or_else(|| AppError::InvalidInput("Search query is required".to_string()))?;
    let page = PageRequest::from_params(query.page.as_deref(), query.limit.as_deref(), DEFAULT_LIMIT);

    let filter = MovieFilter {
        text: Some(text.clone()),
        ..Default::default()
    };
    let (movies, total) = repo.query_movies(&filter, MovieSort::Relevance, page).await?;

    Ok(SearchResults {
        query: text,
        movies,
        pagination: Pagination::new(page, total),
    })
}

/// Movies sharing at least one genre with the target, most popular first
pub async fn similar_movies(
    repo: &dyn Repository,
    raw_id: &str,
    limit: Option<&str>,
) -> AppResult<Vec<MovieDetails>> {
    let target = get_movie(repo, raw_id).await?;
    if target.genres.is_empty() {
        return Ok(Vec::new());
    }

    let filter = MovieFilter {
        genre_ids: target.genres.iter().map(|g| g.id).collect(),
        exclude_ids: vec![target.movie.id],
        ..Default::default()
    };
    let page = PageRequest::from_params(None, limit, SIMILAR_LIMIT);
    let (movies, _) = repo.query_movies(&filter, MovieSort::Popularity, page).await?;

    Ok(movies)
}

/// Recommends unwatched movies in the user's favorite genres and in the
/// genres of movies already on their watchlist
pub async fn recommend_for_user(
    repo: &dyn Repository,
    user: &User,
    limit: Option<&str>,
) -> AppResult<PersonalizedRecommendations> {
    let watchlisted = repo.watchlist_movie_ids(user.id).await?;

    let mut preferred: BTreeSet<i32> = user.favorite_genres.iter().copied().collect();
    preferred.extend(repo.watchlist_genre_ids(user.id).await?);

    let filter = MovieFilter {
        genre_ids: preferred.iter().copied().collect(),
        exclude_ids: watchlisted.clone(),
        ..Default::default()
    };
    let page = PageRequest::from_params(None, limit, DEFAULT_LIMIT);
    let (movies, _) = repo.query_movies(&filter, MovieSort::Popularity, page).await?;

    tracing::debug!(
        user_id = user.id,
        preferred_genres = preferred.len(),
        count = movies.len(),
        "Built personalized recommendations"
    );

    Ok(PersonalizedRecommendations {
        movies,
        user_preferences: UserPreferences {
            favorite_genres: preferred.into_iter().collect(),
            watched_count: watchlisted.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{GenreRepo, MemoryRepository, MovieRepo, UserRepo, WatchlistRepo};
    use crate::models::{NewMovie, NewUser, NewWatchlistEntry, WatchlistStatus};
    use chrono::NaiveDate;

    struct Fixture {
        repo: MemoryRepository,
        matrix: i32,
        heat: i32,
        amelie: i32,
        action: i32,
        romance: i32,
    }

    async fn movie(repo: &MemoryRepository, tmdb: i32, title: &str, year: i32, genres: Vec<i32>) -> i32 {
        repo.insert_movie(NewMovie {
            tmdb_id: Some(tmdb),
            title: title.to_string(),
            overview: Some(format!("{} overview", title)),
            cover_url: None,
            release_date: NaiveDate::from_ymd_opt(year, 1, 1),
            genre_ids: genres,
        })
        .await
        .unwrap()
        .unwrap()
        .id
    }

    async fn fixture() -> Fixture {
        let repo = MemoryRepository::new();
        let action = repo.upsert_genre("Action").await.unwrap().id;
        let romance = repo.upsert_genre("Romance").await.unwrap().id;
        let matrix = movie(&repo, 1, "The Matrix", 1999, vec![action]).await;
        let heat = movie(&repo, 2, "Heat", 1995, vec![action]).await;
        let amelie = movie(&repo, 3, "Amelie", 2001, vec![romance]).await;
        Fixture { repo, matrix, heat, amelie, action, romance }
    }

    async fn user_with(repo: &MemoryRepository, favorite_genres: Vec<i32>) -> User {
        repo.create_user(NewUser {
            username: "viewer".to_string(),
            email: "viewer@example.com".to_string(),
            password_hash: "hash".to_string(),
            favorite_genres,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_movies_with_filters() {
        let f = fixture().await;
        let list = list_movies(
            &f.repo,
            MovieListQuery {
                genre: Some("act".to_string()),
                sort: Some("title".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let titles: Vec<&str> = list.movies.iter().map(|m| m.movie.title.as_str()).collect();
        assert_eq!(titles, vec!["Heat", "The Matrix"]);
        assert_eq!(list.pagination.total_items, 2);
        assert_eq!(list.filters.sort, "title");
    }

    #[tokio::test]
    async fn test_list_movies_rejects_bad_year() {
        let f = fixture().await;
        let err = list_movies(
            &f.repo,
            MovieListQuery {
                year: Some("nineteen".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_get_movie_non_numeric_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            get_movie(&f.repo, "abc").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(get_movie(&f.repo, &f.amelie.to_string()).await.unwrap().movie.title, "Amelie");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let f = fixture().await;
        let err = search_movies(&f.repo, SearchQuery::default()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let results = search_movies(
            &f.repo,
            SearchQuery {
                q: Some("overview".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(results.pagination.total_items, 3);
    }

    #[tokio::test]
    async fn test_similar_movies_share_genre() {
        let f = fixture().await;
        let similar = similar_movies(&f.repo, &f.matrix.to_string(), None).await.unwrap();
        let ids: Vec<i32> = similar.iter().map(|m| m.movie.id).collect();
        assert_eq!(ids, vec![f.heat]);
    }

    #[tokio::test]
    async fn test_recommendations_exclude_watchlist() {
        let f = fixture().await;
        let user = user_with(&f.repo, vec![f.romance]).await;
        f.repo
            .create_entry(NewWatchlistEntry {
                user_id: user.id,
                movie_id: f.matrix,
                status: WatchlistStatus::Watched,
            })
            .await
            .unwrap();

        let recs = recommend_for_user(&f.repo, &user, None).await.unwrap();
        let mut ids: Vec<i32> = recs.movies.iter().map(|m| m.movie.id).collect();
        ids.sort();
        let mut expected = vec![f.heat, f.amelie];
        expected.sort();

        assert_eq!(ids, expected);
        assert_eq!(recs.user_preferences.watched_count, 1);
        assert!(recs.user_preferences.favorite_genres.contains(&f.action));
        assert!(recs.user_preferences.favorite_genres.contains(&f.romance));
    }

    #[tokio::test]
    async fn test_popular_only_lists_watchlisted() {
        let f = fixture().await;
        let user = user_with(&f.repo, vec![]).await;
        f.repo
            .create_entry(NewWatchlistEntry {
                user_id: user.id,
                movie_id: f.amelie,
                status: WatchlistStatus::Want,
            })
            .await
            .unwrap();

        let popular = popular_movies(&f.repo, PageRequest::default()).await.unwrap();
        assert_eq!(popular.movies.len(), 1);
        assert_eq!(popular.movies[0].movie.id, f.amelie);
        assert_eq!(popular.movies[0].watchlist_count, 1);
    }
}
