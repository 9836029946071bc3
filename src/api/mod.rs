use axum::response::IntoResponse;
use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
};

use crate::news::NewsProvider;
use crate::query_gen::QueryGenerator;
use crate::search::SearchProvider;
use crate::synthesizer::Synthesizer;

pub mod handlers;
pub mod models;

/// Everything a request needs, wired once at startup.
pub struct AppState {
    pub query_gen: QueryGenerator,
    pub search: SearchProvider,
    pub news: NewsProvider,
    pub synthesizer: Synthesizer,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/request", post(handlers::predict_handler))
        .with_state(state)
        .layer(cors)
        // Anything unexpected becomes an opaque 500; nothing internal leaks.
        .layer(CatchPanicLayer::custom(|_: Box<dyn std::any::Any + Send>| {
            handlers::ApiError::Internal.into_response()
        }))
}
