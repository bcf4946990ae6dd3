use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use perkly_core::timestamp::parse_rfc3339;
use perkly_core::EligibilityResponse;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EligibilityQuery {
    /// RFC3339 evaluation instant; the current time when absent.
    pub now: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/users/{user_id}/eligible-offers", get(eligible_offers))
}

async fn eligible_offers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<EligibilityResponse>, AppError> {
    let now = match query.now.as_deref() {
        Some(raw) => parse_rfc3339(raw, "now")?,
        None => Utc::now(),
    };

    let response = state.service.get_eligible_offers(&user_id, now).await?;
    Ok(Json(response))
}
