use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;

use crate::news::MAX_NEWS_ITEMS;
use crate::search::MAX_SEARCH_RESULTS;

use super::AppState;
use super::models::{PredictionRequest, PredictionResponse, dedup_sources};

pub const QUERY_GENERATION_FAILED: &str = "Не удалось сгенерировать поисковый запрос.";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The only client-visible validation failure: no search query could
    /// be produced from the question.
    #[error("{0}")]
    BadRequest(String),
    /// Anything unexpected. The body never carries internal detail.
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    tracing::info!("processing prediction request with id: {}", request.id);

    let Some(search_query) = state.query_gen.generate(&request.query).await else {
        tracing::error!(
            "validation error for request {}: {}",
            request.id,
            QUERY_GENERATION_FAILED
        );
        return Err(ApiError::BadRequest(QUERY_GENERATION_FAILED.to_string()));
    };
    tracing::info!("generated search query: {search_query}");

    let search_results = state.search.search(&search_query, MAX_SEARCH_RESULTS).await;
    tracing::info!("search returned {} results", search_results.len());

    let news = state.news.latest(MAX_NEWS_ITEMS).await;
    tracing::info!("news feed returned {} items", news.len());

    let synthesized = state
        .synthesizer
        .synthesize(&request.query, &search_results, &news)
        .await;

    let sources = dedup_sources(synthesized.sources);

    tracing::info!("successfully processed request {}", request.id);
    Ok(Json(PredictionResponse {
        id: request.id,
        answer: synthesized.answer,
        reasoning: synthesized.reasoning,
        sources,
    }))
}
