/// Google identity token verification
///
/// Uses the `tokeninfo` endpoint, which validates the signature and expiry of
/// an id token and returns its claims. The audience is then checked against
/// the configured OAuth client id.
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    services::providers::{ExternalIdentity, IdentityVerifier},
};

fn verification_failed() -> AppError {
    AppError::ExternalApi("Failed to verify Google token".to_string())
}

#[derive(Clone)]
pub struct GoogleIdentityVerifier {
    http_client: HttpClient,
    tokeninfo_url: String,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl GoogleIdentityVerifier {
    pub fn new(tokeninfo_url: String, client_id: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            tokeninfo_url,
            client_id,
        }
    }

    fn identity_from(&self, info: TokenInfo) -> AppResult<ExternalIdentity> {
        if let Some(client_id) = &self.client_id {
            if &info.aud != client_id {
                tracing::warn!(audience = %info.aud, "Google token issued for another client");
                return Err(AppError::Unauthorized("Invalid Google token".to_string()));
            }
        }

        let email = info
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Unauthorized("Google token carries no email".to_string()))?;

        Ok(ExternalIdentity {
            email,
            name: info.name,
        })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<ExternalIdentity> {
        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if response.status().is_client_error() {
            return Err(AppError::Unauthorized("Invalid Google token".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Google tokeninfo request failed");
            return Err(verification_failed());
        }

        let info: TokenInfo = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed Google tokeninfo response");
            verification_failed()
        })?;
        self.identity_from(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(client_id: Option<&str>) -> GoogleIdentityVerifier {
        GoogleIdentityVerifier::new(
            "http://test.local/tokeninfo".to_string(),
            client_id.map(str::to_string),
        )
    }

    fn info(aud: &str, email: Option<&str>) -> TokenInfo {
        TokenInfo {
            aud: aud.to_string(),
            email: email.map(str::to_string),
            name: Some("Ellen Ripley".to_string()),
        }
    }

    #[test]
    fn test_matching_audience() {
        let identity = verifier(Some("client-1"))
            .identity_from(info("client-1", Some("ripley@example.com")))
            .unwrap();
        assert_eq!(identity.email, "ripley@example.com");
        assert_eq!(identity.name.as_deref(), Some("Ellen Ripley"));
    }

    #[test]
    fn test_foreign_audience_rejected() {
        let err = verifier(Some("client-1"))
            .identity_from(info("client-2", Some("ripley@example.com")))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_missing_email_rejected() {
        let err = verifier(None).identity_from(info("any", None)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_tokeninfo_deserialization() {
        let json = r#"{
            "iss": "https://accounts.google.com",
            "aud": "client-1",
            "email": "ripley@example.com",
            "email_verified": "true",
            "name": "Ellen Ripley"
        }"#;
        let info: TokenInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.aud, "client-1");
        assert_eq!(info.email.as_deref(), Some("ripley@example.com"));
    }
}
