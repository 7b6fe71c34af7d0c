//! HTTP rendering of domain failures.
//!
//! Every failure leaves the service as
//! `{"success": false, "error": <message>, "code": <slug>, "errors": [...]}`.
//! Internal failures are logged and rendered with a generic message; the
//! detail rides along as a response extension that [`reveal_internal_details`]
//! surfaces in development only.

use crate::domain::{BondsError, FieldError};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

pub const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Failure rendered at the HTTP boundary
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub errors: Vec<FieldError>,
    /// Seconds for the `Retry-After` header
    pub retry_after: Option<u64>,
    /// Echoed on unknown routes
    pub path: Option<String>,
    detail: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "no_errors")]
    errors: &'a [FieldError],
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
}

fn no_errors(errors: &&[FieldError]) -> bool {
    errors.is_empty()
}

/// Carried on 500 responses so development builds can show the cause.
#[derive(Debug, Clone)]
struct InternalDetail(String);

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            errors: Vec::new(),
            retry_after: None,
            path: None,
            detail: None,
        }
    }

    pub fn route_not_found(path: &str) -> Self {
        let mut err = Self::new(StatusCode::NOT_FOUND, "route_not_found", "Route not found");
        err.path = Some(path.to_string());
        err
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many requests, please try again later",
        );
        err.retry_after = Some(retry_after_secs);
        err
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        let mut err = Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            INTERNAL_MESSAGE,
        );
        err.detail = Some(detail.into());
        err
    }
}

/// Status for each domain failure.
pub fn status_for(err: &BondsError) -> StatusCode {
    use BondsError::*;
    match err {
        MissingToken | TokenInvalid | TempTokenInvalid | InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        AccountDisabled | EmailNotVerified => StatusCode::FORBIDDEN,
        UserNotFound | NotFound(_) => StatusCode::NOT_FOUND,
        DuplicateAccount | DuplicateTransaction | NotCancellable | InvalidTransition => {
            StatusCode::CONFLICT
        }
        Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Validation(_) | CodeInvalid | CodeExpired | CodeMismatch | TwoFactorNotEnabled
        | TwoFactorAlreadyEnabled | NoPendingSetup | KycAlreadyVerified | BelowMinimum { .. }
        | InsufficientSupply => StatusCode::BAD_REQUEST,
    }
}

impl From<BondsError> for ApiError {
    fn from(err: BondsError) -> Self {
        match err {
            BondsError::Internal(detail) => ApiError::internal(detail),
            BondsError::Validation(errors) => {
                let mut api = ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "validation_failed",
                    "Invalid input",
                );
                api.errors = errors;
                api
            }
            other => ApiError::new(status_for(&other), other.code(), other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(detail) = &self.detail {
            error!(code = self.code, detail = %detail, "Request failed with internal error");
        }
        let body = ErrorBody {
            success: false,
            error: &self.message,
            code: self.code,
            errors: &self.errors,
            message: None,
            path: self.path.as_deref(),
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if let Some(detail) = self.detail {
            response.extensions_mut().insert(InternalDetail(detail));
        }
        response
    }
}

/// Response mapper installed in development: re-renders 500s with the cause.
pub async fn reveal_internal_details(mut response: Response) -> Response {
    let Some(InternalDetail(detail)) = response.extensions_mut().remove::<InternalDetail>() else {
        return response;
    };
    let body = ErrorBody {
        success: false,
        error: INTERNAL_MESSAGE,
        code: "internal_error",
        errors: &[],
        message: Some(&detail),
        path: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&BondsError::TooManyAttempts), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for(&BondsError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&BondsError::EmailNotVerified), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&BondsError::NotFound("bond")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&BondsError::NotCancellable), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&BondsError::BelowMinimum {
                minimum: "65000 XOF".into()
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let api: ApiError = BondsError::internal("lock poisoned").into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, INTERNAL_MESSAGE);
        assert_eq!(api.code, "internal_error");
    }

    #[test]
    fn test_validation_keeps_field_errors() {
        let api: ApiError = BondsError::invalid_field("email", "invalid email").into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.errors.len(), 1);
        assert_eq!(api.errors[0].field, "email");
    }

    #[tokio::test]
    async fn test_reveal_internal_details() {
        let response = ApiError::internal("disk full").into_response();
        let revealed = reveal_internal_details(response).await;
        assert_eq!(revealed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(revealed.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"], "disk full");
        assert_eq!(json["error"], INTERNAL_MESSAGE);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(9).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "9");
    }
}
