use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const MAX_SOURCES: usize = 3;

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub id: i64,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub id: i64,
    pub answer: Option<i64>,
    pub reasoning: String,
    pub sources: Vec<String>,
}

/// First occurrence wins, order preserved, at most `MAX_SOURCES` survive.
pub fn dedup_sources(sources: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|source| seen.insert(source.clone()))
        .take(MAX_SOURCES)
        .collect()
}
