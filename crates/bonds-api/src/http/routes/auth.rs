//! `/api/auth` routes.
//!
//! Password hashing is CPU-bound, so flows that hash or verify a password run
//! on the blocking pool.

use crate::auth::service::{Registered, TwoFactorSetup};
use crate::auth::{
    ConfirmTwoFactorRequest, ForgotPasswordRequest, LoginOutcome, LoginRequest, RegisterRequest,
    ResetPasswordRequest, SessionGrant, SessionUser, VerifyEmailRequest, VerifyTwoFactorRequest,
};
use crate::domain::BondsResult;
use crate::http::{ApiError, ApiResult, AppState, AuthenticatedUser, Envelope, JsonBody};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Router};
use serde::Serialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/login", post(login))
        .route("/setup-2fa", post(setup_two_factor))
        .route("/verify-2fa-setup", post(confirm_two_factor_setup))
        .route("/verify-2fa", post(verify_two_factor))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> BondsResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("auth worker failed: {e}")))?
        .map_err(ApiError::from)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    two_factor_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<SessionUser>,
}

impl From<LoginOutcome> for LoginBody {
    fn from(outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Session(SessionGrant { token, user }) => Self {
                two_factor_required: false,
                temp_token: None,
                token: Some(token),
                user: Some(user),
            },
            LoginOutcome::TwoFactorRequired { temp_token } => Self {
                two_factor_required: true,
                temp_token: Some(temp_token),
                token: None,
                user: None,
            },
        }
    }
}

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let auth = state.auth.clone();
    let registered: Registered = blocking(move || auth.register(&req)).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::data(registered)
            .with_message("Account created. Check your email for the verification code."),
    ))
}

async fn verify_email(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyEmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let verified = state.auth.verify_email(&req)?;
    Ok(Envelope::data(verified).with_message("Email verified"))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let auth = state.auth.clone();
    let outcome = blocking(move || auth.login(&req)).await?;
    let message = match &outcome {
        LoginOutcome::Session(_) => "Login successful",
        LoginOutcome::TwoFactorRequired { .. } => "Two-factor code required",
    };
    Ok(Envelope::data(LoginBody::from(outcome)).with_message(message))
}

async fn setup_two_factor(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Envelope<TwoFactorSetup>> {
    Ok(Envelope::data(state.auth.setup_two_factor(user.id)?))
}

async fn confirm_two_factor_setup(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(req): JsonBody<ConfirmTwoFactorRequest>,
) -> ApiResult<impl IntoResponse> {
    let enabled = state.auth.confirm_two_factor_setup(user.id, &req)?;
    Ok(Envelope::data(enabled).with_message("Two-factor authentication enabled"))
}

async fn verify_two_factor(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyTwoFactorRequest>,
) -> ApiResult<impl IntoResponse> {
    let grant = state.auth.verify_two_factor(&req)?;
    Ok(Envelope::data(LoginBody::from(LoginOutcome::Session(grant))).with_message("Login successful"))
}

async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<Envelope<()>> {
    state.auth.forgot_password(&req)?;
    Ok(Envelope::message(
        "If an account exists for this email, a reset code has been sent",
    ))
}

async fn reset_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> ApiResult<Envelope<()>> {
    let auth = state.auth.clone();
    blocking(move || auth.reset_password(&req)).await?;
    Ok(Envelope::message("Password has been reset"))
}
