use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use ticketdesk_types::api::MutationResponse;
use ticketdesk_types::error::{AuthFailure, DeskError};

/// HTTP-facing error. Always renders as `{"success": false, "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        DeskError::Auth(AuthFailure::Unauthenticated).into()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        let status = match &err {
            DeskError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DeskError::NotFound { .. } => StatusCode::NOT_FOUND,
            DeskError::Duplicate(_) => StatusCode::CONFLICT,
            DeskError::Auth(AuthFailure::InvalidCsrfToken) => StatusCode::FORBIDDEN,
            DeskError::Auth(_) => StatusCode::UNAUTHORIZED,
            DeskError::Internal(e) => {
                error!("Internal error: {:#}", e);
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong. Please try again.");
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let message = match rejection {
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON.".to_string(),
            JsonRejection::MissingJsonContentType(_) => "Expected an application/json body.".to_string(),
            other => other.body_text(),
        };
        Self::new(status, message)
    }
}

/// `Json` whose rejections render like every other API error.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(MutationResponse::failed(self.message))).into_response()
    }
}

/// Run store work off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DeskError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong. Please try again.")
        })?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (DeskError::validation("Title is required."), StatusCode::UNPROCESSABLE_ENTITY),
            (DeskError::ticket_not_found("x"), StatusCode::NOT_FOUND),
            (DeskError::Duplicate("taken".into()), StatusCode::CONFLICT),
            (DeskError::Auth(AuthFailure::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (DeskError::Auth(AuthFailure::InvalidCsrfToken), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn json_rejections_keep_the_error_envelope() {
        use axum::body::Body;
        use axum::http::{Request, header};
        use http_body_util::BodyExt;
        use ticketdesk_types::api::CreateTicketRequest;

        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let rejection = ApiJson::<CreateTicketRequest>::from_request(req, &()).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejection.message(), "Request body is not valid JSON.");

        let resp = rejection.into_response();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Request body is not valid JSON.");
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ApiError::from(DeskError::Internal(anyhow::anyhow!("disk /var/data full")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("/var/data"));
    }
}
