use std::sync::Arc;

use itmo_qa::api::{self, AppState};
use itmo_qa::config::Config;
use itmo_qa::llm::{CompletionModel, YandexGpt};
use itmo_qa::news::NewsProvider;
use itmo_qa::query_gen::QueryGenerator;
use itmo_qa::search::SearchProvider;
use itmo_qa::synthesizer::Synthesizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .init();

    let config = Config::from_env()?;
    let http = reqwest::Client::new();

    let model: Arc<dyn CompletionModel> = Arc::new(YandexGpt::new(
        http.clone(),
        &config.folder_id,
        &config.api_key,
        &config.completion_model,
        config.completion_temperature,
    ));

    let state = Arc::new(AppState {
        query_gen: QueryGenerator::new(model.clone()),
        search: SearchProvider::new(
            http.clone(),
            model.clone(),
            config.folder_id.clone(),
            config.search_api_key.clone(),
        ),
        news: NewsProvider::new(http, config.rss_url.clone()),
        synthesizer: Synthesizer::new(model),
    });

    let router = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;

    Ok(())
}
