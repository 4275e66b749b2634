use std::sync::Arc;

use chrono::Duration;

use crate::{
    config::Config,
    db::Repository,
    services::{
        providers::{CompletionProvider, GeminiProvider, GoogleIdentityVerifier, IdentityVerifier},
        TokenService,
    },
};

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub tokens: TokenService,
    pub completion: Arc<dyn CompletionProvider>,
    pub identity: Arc<dyn IdentityVerifier>,
    /// bcrypt cost for new password hashes
    pub password_cost: u32,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        tokens: TokenService,
        completion: Arc<dyn CompletionProvider>,
        identity: Arc<dyn IdentityVerifier>,
        password_cost: u32,
    ) -> Self {
        Self {
            repo,
            tokens,
            completion,
            identity,
            password_cost,
        }
    }

    /// Wires the production providers around an already opened repository
    pub fn from_config(config: &Config, repo: Arc<dyn Repository>) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, Duration::hours(config.jwt_ttl_hours));

        let completion = GeminiProvider::new(
            config.gemini_api_key.clone(),
            config.gemini_api_url.clone(),
            config.gemini_model.clone(),
        );

        let identity = GoogleIdentityVerifier::new(
            config.google_tokeninfo_url.clone(),
            config.google_client_id.clone(),
        );

        if config.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set; AI recommendations will fail");
        }
        if config.google_client_id.is_none() {
            tracing::warn!("GOOGLE_CLIENT_ID is not set; Google token audience is not checked");
        }

        Self::new(
            repo,
            tokens,
            Arc::new(completion),
            Arc::new(identity),
            config.bcrypt_cost,
        )
    }
}
