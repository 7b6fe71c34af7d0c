//! `/api/settlement` routes, called by the settlement collaborator.

use crate::domain::{Transaction, TransactionId};
use crate::http::{ApiResult, AppState, Envelope, JsonBody, PathParam};
use crate::ledger::ConfirmRequest;
use crate::middleware::SettlementKeyLayer;
use axum::{extract::State, routing::post, Router};

pub fn router(api_key: Option<&str>) -> Router<AppState> {
    Router::new()
        .route("/transactions/:id/confirm", post(confirm))
        .layer(SettlementKeyLayer::new(api_key))
}

/// Body is optional; an empty request confirms without a block number.
async fn confirm(
    State(state): State<AppState>,
    PathParam(id): PathParam<TransactionId>,
    body: Option<JsonBody<ConfirmRequest>>,
) -> ApiResult<Envelope<Transaction>> {
    let req = body.map(|JsonBody(req)| req).unwrap_or_default();
    let tx = state.ledger.confirm(id, &req)?;
    Ok(Envelope::data(tx).with_message("Transaction confirmed"))
}
