//! `/api/bonds` routes.

use crate::catalog::{BondDetail, BondFilter, BondListing, MarketOverview};
use crate::domain::BondId;
use crate::http::{ApiResult, AppState, AuthenticatedUser, Envelope, JsonBody, PathParam, QueryParams};
use crate::ledger::{InvestRequest, Investment};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bonds))
        .route("/stats/overview", get(overview))
        .route("/:id", get(get_bond))
        .route("/:id/invest", post(invest))
}

async fn list_bonds(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<BondFilter>,
) -> ApiResult<Envelope<Vec<BondListing>>> {
    let bonds = state.catalog.list(&filter)?;
    let count = bonds.len();
    Ok(Envelope::data(bonds).with_count(count))
}

async fn overview(State(state): State<AppState>) -> ApiResult<Envelope<MarketOverview>> {
    Ok(Envelope::data(state.catalog.overview()?))
}

async fn get_bond(
    State(state): State<AppState>,
    PathParam(id): PathParam<BondId>,
) -> ApiResult<Envelope<BondDetail>> {
    Ok(Envelope::data(state.catalog.get(id)?))
}

async fn invest(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<BondId>,
    JsonBody(req): JsonBody<InvestRequest>,
) -> ApiResult<Envelope<Investment>> {
    let investment = state.ledger.invest(&user, id, &req)?;
    Ok(Envelope::data(investment).with_message("Investment placed, awaiting settlement"))
}
