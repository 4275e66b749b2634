use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{ApiResponse, User},
    routes::{extract::AppJson, AppState},
    services::accounts::{
        self, AuthSession, GoogleLoginRequest, LoginRequest, RegisterRequest,
        UpdateProfileRequest,
    },
};

#[derive(Debug, Serialize)]
pub struct ProfileData {
    pub user: User,
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthSession>>)> {
    let session =
        accounts::register(state.repo.as_ref(), &state.tokens, state.password_cost, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User registered successfully", session)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthSession>>> {
    let session = accounts::login(state.repo.as_ref(), &state.tokens, request).await?;
    Ok(Json(ApiResponse::ok("Login successful", session)))
}

pub async fn google_login(
    State(state): State<AppState>,
    AppJson(request): AppJson<GoogleLoginRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthSession>>)> {
    let login = accounts::google_login(
        state.repo.as_ref(),
        &state.tokens,
        state.identity.as_ref(),
        state.password_cost,
        request,
    )
    .await?;

    let status = if login.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ApiResponse::ok("Google login successful", login.session))))
}

pub async fn get_profile(AuthUser(user): AuthUser) -> Json<ApiResponse<ProfileData>> {
    Json(ApiResponse::ok(
        "Profile retrieved successfully",
        ProfileData { user },
    ))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(request): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<ProfileData>>> {
    let user = accounts::update_profile(state.repo.as_ref(), &user, request).await?;
    tracing::info!(user_id = user.id, "Profile updated");
    Ok(Json(ApiResponse::ok(
        "Profile updated successfully",
        ProfileData { user },
    )))
}
