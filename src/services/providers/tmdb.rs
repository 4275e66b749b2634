/// TMDB metadata source
///
/// Supplies the genre list and pages of popular movies used to seed the
/// catalog. Authenticates with a v4 read access token sent as a bearer header.
use chrono::NaiveDate;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Deserializer};

use crate::{
    error::{AppError, AppResult},
    services::providers::{MetadataSource, SourceGenre, SourceMovie},
};

#[derive(Clone)]
pub struct TmdbSource {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct GenreListResponse {
    #[serde(default)]
    genres: Vec<SourceGenre>,
}

#[derive(Debug, Deserialize)]
struct MoviePageResponse {
    #[serde(default)]
    results: Vec<SourceMovie>,
}

/// TMDB sends `""` for unknown release dates
pub fn deserialize_release_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()))
}

impl TmdbSource {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url.trim_end_matches('/'), path);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDB API returned status {} for {}: {}",
                status, path, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl MetadataSource for TmdbSource {
    async fn genres(&self) -> AppResult<Vec<SourceGenre>> {
        let response: GenreListResponse = self
            .get("/genre/movie/list", &[("language", "en".to_string())])
            .await?;

        tracing::debug!(count = response.genres.len(), "Fetched TMDB genres");
        Ok(response.genres)
    }

    async fn popular_movies(&self, page: u32) -> AppResult<Vec<SourceMovie>> {
        let response: MoviePageResponse = self
            .get(
                "/movie/popular",
                &[
                    ("language", "en-US".to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        tracing::debug!(page, count = response.results.len(), "Fetched TMDB popular movies");
        Ok(response.results)
    }
}
