use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use perkly_core::TransactionRequest;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub transactions: Vec<TransactionRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub inserted: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/transactions", post(ingest_transactions))
}

async fn ingest_transactions(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let Json(request) = payload?;
    let inserted = state.service.ingest_transactions(request.transactions).await?;
    Ok((StatusCode::CREATED, Json(IngestResponse { inserted })))
}
