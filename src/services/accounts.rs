use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{GenreRepo, Repository, UserRepo},
    error::{AppError, AppResult},
    models::{NewUser, User, UserChanges},
    services::{
        passwords::{hash_password, verify_password},
        providers::IdentityVerifier,
        tokens::TokenService,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub favorite_genres: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub favorite_genres: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleLoginRequest {
    pub id_token: Option<String>,
}

/// A user together with a freshly issued bearer token
#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Result of a Google login; `created` is set when the account was new
#[derive(Debug)]
pub struct GoogleLogin {
    pub session: AuthSession,
    pub created: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates a `favorite_genres` payload.
///
/// `None` and JSON `null` mean "not supplied". Anything else must be an array
/// of positive integers naming existing genres. Duplicates are dropped.
pub async fn parse_favorite_genres(
    repo: &dyn Repository,
    raw: Option<&Value>,
) -> AppResult<Option<Vec<i32>>> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AppError::InvalidInput(
                "favorite_genres must be an array of genre ids".to_string(),
            ))
        }
    };

    let mut ids: Vec<i32> = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .as_i64()
            .filter(|id| *id > 0)
            .and_then(|id| i32::try_from(id).ok())
            .ok_or_else(|| {
                AppError::InvalidInput(
                    "favorite_genres must contain positive integer ids".to_string(),
                )
            })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if !ids.is_empty() {
        let known = repo.get_genres(&ids).await?;
        let missing: Vec<i32> = ids
            .iter()
            .copied()
            .filter(|id| !known.iter().any(|g| g.id == *id))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Unknown genre ids: {:?}",
                missing
            )));
        }
    }

    Ok(Some(ids))
}

pub async fn register(
    repo: &dyn Repository,
    tokens: &TokenService,
    password_cost: u32,
    request: RegisterRequest,
) -> AppResult<AuthSession> {
    let (Some(username), Some(email), Some(password)) = (
        non_blank(request.username),
        non_blank(request.email),
        request.password.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err(AppError::InvalidInput(
            "Username, email, and password are required".to_string(),
        ));
    };

    let favorite_genres = parse_favorite_genres(repo, request.favorite_genres.as_ref())
        .await?
        .unwrap_or_default();

    if repo.find_user_by_email(&email).await?.is_some()
        || repo.find_user_by_username(&username).await?.is_some()
    {
        return Err(AppError::Conflict(
            "User with this email or username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(password, password_cost).await?;
    let user = repo
        .create_user(NewUser {
            username,
            email,
            password_hash,
            favorite_genres,
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    let token = tokens.issue(&user)?;
    Ok(AuthSession { user, token })
}

pub async fn login(
    repo: &dyn Repository,
    tokens: &TokenService,
    request: LoginRequest,
) -> AppResult<AuthSession> {
    let (Some(email), Some(password)) = (
        non_blank(request.email),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    };

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = repo.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !verify_password(password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = user.id, "Rejected login with wrong password");
        return Err(invalid());
    }

    let token = tokens.issue(&user)?;
    Ok(AuthSession { user, token })
}

pub async fn update_profile(
    repo: &dyn Repository,
    user: &User,
    request: UpdateProfileRequest,
) -> AppResult<User> {
    let changes = UserChanges {
        username: non_blank(request.username),
        favorite_genres: parse_favorite_genres(repo, request.favorite_genres.as_ref()).await?,
    };

    if changes.is_empty() {
        return Err(AppError::InvalidInput("No valid fields to update".to_string()));
    }

    if let Some(username) = &changes.username {
        if let Some(owner) = repo.find_user_by_username(username).await? {
            if owner.id != user.id {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
        }
    }

    repo.update_user(user.id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Picks an unused username, starting from the Google display name
async fn unique_username(repo: &dyn Repository, name: Option<&str>, email: &str) -> AppResult<String> {
    let base = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| email.split('@').next().filter(|local| !local.is_empty()))
        .unwrap_or("user")
        .to_string();

    if repo.find_user_by_username(&base).await?.is_none() {
        return Ok(base);
    }

    loop {
        let suffix = Uuid::new_v4().simple().to_string();
        let candidate = format!("{}_{}", base, &suffix[..8]);
        if repo.find_user_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
}

pub async fn google_login(
    repo: &dyn Repository,
    tokens: &TokenService,
    identity: &dyn IdentityVerifier,
    password_cost: u32,
    request: GoogleLoginRequest,
) -> AppResult<GoogleLogin> {
    let id_token = non_blank(request.id_token)
        .ok_or_else(|| AppError::InvalidInput("Google ID token is required".to_string()))?;

    let verified = identity.verify(&id_token).await?;

    if let Some(user) = repo.find_user_by_email(&verified.email).await? {
        let token = tokens.issue(&user)?;
        return Ok(GoogleLogin {
            session: AuthSession { user, token },
            created: false,
        });
    }

    let username = unique_username(repo, verified.name.as_deref(), &verified.email).await?;
    let password_hash = hash_password(Uuid::new_v4().to_string(), password_cost).await?;
    let user = repo
        .create_user(NewUser {
            username,
            email: verified.email,
            password_hash,
            favorite_genres: Vec::new(),
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User created from Google login");

    let token = tokens.issue(&user)?;
    Ok(GoogleLogin {
        session: AuthSession { user, token },
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryRepository,
        services::providers::{ExternalIdentity, MockIdentityVerifier},
    };
    use chrono::Duration;
    use serde_json::json;

    const COST: u32 = 4;

    fn tokens() -> TokenService {
        TokenService::new("test-secret", Duration::hours(1))
    }

    async fn repo_with_genres() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.upsert_genre("Action").await.unwrap();
        repo.upsert_genre("Drama").await.unwrap();
        repo
    }

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some("password123".to_string()),
            favorite_genres: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let repo = repo_with_genres().await;
        let mut request = registration("neo", "neo@example.com");
        request.favorite_genres = Some(json!([1, 2, 2]));

        let session = register(&repo, &tokens(), COST, request).await.unwrap();
        assert_eq!(session.user.favorite_genres, vec![1, 2]);
        assert!(!session.token.is_empty());

        let login_request = LoginRequest {
            email: Some("neo@example.com".to_string()),
            password: Some("password123".to_string()),
        };
        let session = login(&repo, &tokens(), login_request).await.unwrap();
        assert_eq!(session.user.username, "neo");
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let repo = MemoryRepository::new();
        let mut request = registration("neo", "neo@example.com");
        request.password = Some("   ".to_string());

        match register(&repo, &tokens(), COST, request).await {
            Err(AppError::InvalidInput(msg)) => {
                assert_eq!(msg, "Username, email, and password are required")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let repo = MemoryRepository::new();
        register(&repo, &tokens(), COST, registration("neo", "neo@example.com"))
            .await
            .unwrap();

        let err = register(&repo, &tokens(), COST, registration("neo", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_favorite_genres_validation() {
        let repo = repo_with_genres().await;

        assert_eq!(parse_favorite_genres(&repo, None).await.unwrap(), None);
        assert_eq!(
            parse_favorite_genres(&repo, Some(&Value::Null)).await.unwrap(),
            None
        );
        assert_eq!(
            parse_favorite_genres(&repo, Some(&json!([]))).await.unwrap(),
            Some(vec![])
        );

        for bad in [json!("action"), json!([0]), json!([1, "2"]), json!([1.5]), json!([99])] {
            let err = parse_favorite_genres(&repo, Some(&bad)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "accepted {}", bad);
        }
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let repo = MemoryRepository::new();
        register(&repo, &tokens(), COST, registration("neo", "neo@example.com"))
            .await
            .unwrap();

        let request = LoginRequest {
            email: Some("neo@example.com".to_string()),
            password: Some("nope".to_string()),
        };
        match login(&repo, &tokens(), request).await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Invalid email or password"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_profile_rules() {
        let repo = repo_with_genres().await;
        let neo = register(&repo, &tokens(), COST, registration("neo", "neo@example.com"))
            .await
            .unwrap()
            .user;
        register(&repo, &tokens(), COST, registration("trinity", "trinity@example.com"))
            .await
            .unwrap();

        let err = update_profile(&repo, &neo, UpdateProfileRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let taken = UpdateProfileRequest {
            username: Some("trinity".to_string()),
            ..Default::default()
        };
        match update_profile(&repo, &neo, taken).await {
            Err(AppError::Conflict(msg)) => assert_eq!(msg, "Username already exists"),
            other => panic!("unexpected result: {:?}", other),
        }

        let rename = UpdateProfileRequest {
            username: Some("the_one".to_string()),
            favorite_genres: Some(json!([2])),
        };
        let updated = update_profile(&repo, &neo, rename).await.unwrap();
        assert_eq!(updated.username, "the_one");
        assert_eq!(updated.favorite_genres, vec![2]);
    }

    #[tokio::test]
    async fn test_google_login_creates_then_reuses_account() {
        let repo = MemoryRepository::new();
        register(&repo, &tokens(), COST, registration("Ellen Ripley", "someone@example.com"))
            .await
            .unwrap();

        let mut identity = MockIdentityVerifier::new();
        identity.expect_verify().times(2).returning(|_| {
            Ok(ExternalIdentity {
                email: "ripley@example.com".to_string(),
                name: Some("Ellen Ripley".to_string()),
            })
        });

        let request = || GoogleLoginRequest {
            id_token: Some("google-token".to_string()),
        };

        let first = google_login(&repo, &tokens(), &identity, COST, request())
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.session.user.email, "ripley@example.com");
        assert!(first.session.user.username.starts_with("Ellen Ripley_"));

        let second = google_login(&repo, &tokens(), &identity, COST, request())
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.session.user.id, first.session.user.id);
    }

    #[tokio::test]
    async fn test_google_login_requires_token() {
        let repo = MemoryRepository::new();
        let identity = MockIdentityVerifier::new();
        let err = google_login(&repo, &tokens(), &identity, COST, GoogleLoginRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
