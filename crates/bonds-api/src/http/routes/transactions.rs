//! `/api/transactions` routes. All require a session.

use crate::domain::{Transaction, TransactionId};
use crate::http::{ApiResult, AppState, AuthenticatedUser, Envelope, JsonBody, PathParam, QueryParams};
use crate::ledger::{
    Quote, RecordRequest, SimulateRequest, TransactionDetail, TransactionPage, TransactionQuery,
    TransactionSummary,
};
use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transactions))
        .route("/stats/summary", get(summary))
        .route("/simulate", post(simulate))
        .route("/create", post(record))
        .route("/:id", get(get_transaction))
        .route("/:id/cancel", put(cancel))
}

async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    QueryParams(query): QueryParams<TransactionQuery>,
) -> ApiResult<Envelope<TransactionPage>> {
    Ok(Envelope::data(state.ledger.list(&user, &query)?))
}

async fn summary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Envelope<TransactionSummary>> {
    Ok(Envelope::data(state.ledger.summary(&user)?))
}

async fn get_transaction(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<TransactionId>,
) -> ApiResult<Envelope<TransactionDetail>> {
    Ok(Envelope::data(state.ledger.get(&user, id)?))
}

async fn simulate(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    JsonBody(req): JsonBody<SimulateRequest>,
) -> ApiResult<Envelope<Quote>> {
    Ok(Envelope::data(state.ledger.simulate(&req)?))
}

async fn record(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(req): JsonBody<RecordRequest>,
) -> ApiResult<Envelope<Transaction>> {
    let tx = state.ledger.record(&user, &req)?;
    Ok(Envelope::data(tx).with_message("Transaction recorded"))
}

async fn cancel(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<TransactionId>,
) -> ApiResult<Envelope<Transaction>> {
    let tx = state.ledger.cancel(&user, id)?;
    Ok(Envelope::data(tx).with_message("Transaction cancelled"))
}
