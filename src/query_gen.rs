use std::sync::Arc;

use crate::llm::CompletionModel;
use crate::sanitize::sanitize;

const INSTRUCTIONS: &str = "Ты помощник, который преобразует пользовательские вопросы в наиболее релевантные поисковые запросы для поисковых систем. Сформируй четкий и точный запрос, который позволит получить максимально релевантные результаты.";

pub struct QueryGenerator {
    model: Arc<dyn CompletionModel>,
}

impl QueryGenerator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Rewrites a user question into a single web-search query string.
    /// Returns `None` when the call fails or yields nothing usable; the
    /// caller treats that as a hard stop for the request. No retries.
    pub async fn generate(&self, user_query: &str) -> Option<String> {
        let prompt = format!(
            "{INSTRUCTIONS}\n\n\
             Пользовательский запрос: \"{user_query}\"\n\n\
             Сформируй наиболее релевантный поисковый запрос для поисковой системы на основе данного вопроса.\n\
             Ответь только строкой с поисковым запросом без дополнительных пояснений."
        );

        let completion = match self.model.complete(&prompt).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!("search query generation failed: {e:#}");
                return None;
            }
        };

        let text = &completion.alternatives.first()?.text;
        if text.is_empty() {
            return None;
        }

        let query = sanitize(text);
        if query.is_empty() { None } else { Some(query) }
    }
}
