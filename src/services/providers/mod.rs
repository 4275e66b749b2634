/// External service abstractions
///
/// Each outside collaborator (text generation, identity, movie metadata) sits
/// behind a trait so handlers and services can be exercised with stubs.
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppResult;

pub mod gemini;
pub mod google;
pub mod tmdb;

pub use gemini::GeminiProvider;
pub use google::GoogleIdentityVerifier;
pub use tmdb::TmdbSource;

/// Trait for generative text completion providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Submits a prompt and returns the raw text of the first candidate
    async fn complete(&self, prompt: &str) -> AppResult<String>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Identity asserted by a federated login provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: Option<String>,
}

/// Trait for verifying identity tokens issued by an OAuth provider
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Validates the token and returns the identity it asserts.
    ///
    /// Rejected tokens yield `AppError::Unauthorized`.
    async fn verify(&self, id_token: &str) -> AppResult<ExternalIdentity>;
}

/// A genre as described by the metadata source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceGenre {
    pub id: i32,
    pub name: String,
}

/// A movie as described by the metadata source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceMovie {
    pub id: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "tmdb::deserialize_release_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
}

/// Trait for third-party movie metadata used to seed the catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn genres(&self) -> AppResult<Vec<SourceGenre>>;

    /// One page (1-based) of currently popular movies
    async fn popular_movies(&self, page: u32) -> AppResult<Vec<SourceMovie>>;
}
