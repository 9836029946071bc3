use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub folder_id: String,
    pub api_key: String,
    pub search_api_key: String,
    pub rss_url: String,
    pub bind_addr: String,
    pub completion_model: String,
    pub completion_temperature: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            folder_id: std::env::var("YC_FOLDER_ID").context("YC_FOLDER_ID must be set")?,
            api_key: std::env::var("YC_API_KEY").context("YC_API_KEY must be set")?,
            search_api_key: std::env::var("YANDEX_SEARCH_API_KEY")
                .context("YANDEX_SEARCH_API_KEY must be set")?,
            rss_url: std::env::var("RSS_URL")
                .unwrap_or_else(|_| "https://news.itmo.ru/ru/news/rss/".into()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            completion_model: std::env::var("COMPLETION_MODEL")
                .unwrap_or_else(|_| "yandexgpt".into()),
            completion_temperature: std::env::var("COMPLETION_TEMPERATURE")
                .unwrap_or_else(|_| "0.5".into())
                .parse()
                .context("COMPLETION_TEMPERATURE must be a number")?,
        })
    }
}
