use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use ticketdesk_types::models::User;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

/// The bearer token that authenticated this request, kept so logout can
/// revoke it.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Extract and validate the bearer token from the Authorization header, then
/// expose the caller as an `Extension<User>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(ApiError::unauthorized)?
        .to_string();

    let accounts = state.accounts.clone();
    let lookup = token.clone();
    let user: User = blocking(move || accounts.validate_credential(&lookup))
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    req.extensions_mut().insert(user);
    req.extensions_mut().insert(BearerToken(token));
    Ok(next.run(req).await)
}
