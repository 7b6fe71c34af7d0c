//! `/api/users` routes. All require a session.

use crate::accounts::{KycOverview, KycReceipt, KycSubmission, Portfolio, Profile, ProfilePatch};
use crate::domain::user::{NotificationPatch, NotificationPreferences};
use crate::http::{ApiResult, AppState, AuthenticatedUser, Envelope, JsonBody};
use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/portfolio", get(portfolio))
        .route("/kyc/submit", post(submit_kyc))
        .route("/kyc/status", get(kyc_status))
        .route("/notifications", put(update_notifications))
}

async fn profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Envelope<Profile> {
    Envelope::data(state.accounts.profile(&user))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(patch): JsonBody<ProfilePatch>,
) -> ApiResult<Envelope<Profile>> {
    let profile = state.accounts.update_profile(user.id, &patch)?;
    Ok(Envelope::data(profile).with_message("Profile updated"))
}

async fn portfolio(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Envelope<Portfolio>> {
    Ok(Envelope::data(state.accounts.portfolio(&user)?))
}

async fn submit_kyc(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(submission): JsonBody<KycSubmission>,
) -> ApiResult<Envelope<KycReceipt>> {
    let receipt = state.accounts.submit_kyc(user.id, &submission)?;
    Ok(Envelope::data(receipt).with_message("KYC documents submitted"))
}

async fn kyc_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Envelope<KycOverview> {
    Envelope::data(state.accounts.kyc_status(&user))
}

async fn update_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(patch): JsonBody<NotificationPatch>,
) -> ApiResult<Envelope<NotificationPreferences>> {
    let prefs = state.accounts.update_notifications(user.id, patch)?;
    Ok(Envelope::data(prefs).with_message("Notification preferences updated"))
}
