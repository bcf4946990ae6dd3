use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use perkly_core::{Offer, OfferRequest};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/offers", post(upsert_offer))
}

/// Creates the offer or wholly replaces the one with the same id.
async fn upsert_offer(
    State(state): State<AppState>,
    payload: Result<Json<OfferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    let Json(request) = payload?;
    let offer = state.service.create_or_update_offer(request).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}
