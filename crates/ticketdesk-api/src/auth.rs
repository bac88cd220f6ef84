use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use ticketdesk_types::api::{AuthResponse, LoginRequest, SignupRequest};
use ticketdesk_types::models::User;

use crate::accounts::Credential;
use crate::error::{ApiError, ApiJson, blocking};
use crate::middleware::BearerToken;
use crate::state::AppState;

fn auth_response(user: User, credential: Credential) -> AuthResponse {
    AuthResponse {
        user,
        token: credential.token,
        expires_at: credential.expires_at,
    }
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts.clone();
    let (user, credential) = blocking(move || {
        accounts.signup(&req.email, &req.password, req.confirm_password.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(auth_response(user, credential))))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts.clone();
    let (user, credential) = blocking(move || accounts.login(&req.email, &req.password)).await?;

    Ok(Json(auth_response(user, credential)))
}

/// GET /api/auth/session: who the bearer token belongs to.
pub async fn current_user(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<StatusCode, ApiError> {
    let accounts = state.accounts.clone();
    blocking(move || accounts.logout(&token)).await?;
    Ok(StatusCode::NO_CONTENT)
}
