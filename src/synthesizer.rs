use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::llm::CompletionModel;
use crate::news::NewsItem;
use crate::sanitize::sanitize;
use crate::search::SearchResult;

/// Named fallbacks: every silent default the synthesizer can degrade to.
pub const GENERATION_ERROR_MESSAGE: &str =
    "Произошла ошибка при генерации ответа языковой моделью (YandexGPT).";
pub const UNEXPECTED_FORMAT_MESSAGE: &str = "Непредвиденный формат ответа от языковой модели.";
pub const EMPTY_COMPLETION_MESSAGE: &str = "Пустой ответ от языковой модели.";
pub const EMPTY_REASONING_FALLBACK: &str = "Ответ не удалось корректно сформировать.";

const NO_NEWS_SENTENCE: &str = "Нет актуальных новостей.";

const SYSTEM_PROMPT: &str = "Ты помощник, предоставляющий информацию об Университете ИТМО. \
Используй предоставленные данные из новостей и результатов поиска для формирования ответа. \
Если вопрос как-то относится с недавними событиями (после начала 2024 года), предпочитай использовать информацию из новостей. \
В противном случае используй результаты поиска. \
Выбери от одного до трёх НАИБОЛЕЕ релевантных запросу источников из представленных и запиши их в поле 'sources'. \
Вставляй ссылки на источники не обработанными, в том числе и на результаты поиска. Источники бери из поля url в результатах поиска и новостях. ВНИМАТЕЛЬНО СЛЕДИ чтобы источники были ссылками, там был в начале https или https \
Если вопрос с открытым ответом, установи 'answer' в null. \
Если в вопросе есть варианты ответа, предоставь ответ в поле 'answer'. \
В начале поля reasoning пиши YandexGPT. \
Верни ответ в формате JSON строго со следующими ключами: id, answer, reasoning, sources.";

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:http|ftp)s?://\S+$").unwrap());
static EMBEDDED_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static URL_PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""<url\d+>""#).unwrap());

/// The normalized synthesis result. `answer` is an integer or nothing,
/// `reasoning` is never empty, `sources` holds only validated URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAnswer {
    pub answer: Option<i64>,
    pub reasoning: String,
    pub sources: Vec<String>,
}

impl SynthesizedAnswer {
    fn fallback(reasoning: &str) -> Self {
        Self {
            answer: None,
            reasoning: reasoning.to_string(),
            sources: Vec::new(),
        }
    }
}

/// Outcome of looking for a JSON object inside free-form model text.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Parsed(serde_json::Map<String, Value>),
    Unparsed(String),
}

pub struct Synthesizer {
    model: Arc<dyn CompletionModel>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// One completion call followed by strict output parsing. Never errors:
    /// every failure mode degrades to a named fallback value.
    pub async fn synthesize(
        &self,
        question: &str,
        search_results: &[SearchResult],
        news: &[NewsItem],
    ) -> SynthesizedAnswer {
        let prompt = build_prompt(question, search_results, news);

        let completion = match self.model.complete(&prompt).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!("answer generation failed: {e:#}");
                return SynthesizedAnswer::fallback(GENERATION_ERROR_MESSAGE);
            }
        };

        let Some(alternative) = completion.alternatives.first() else {
            return SynthesizedAnswer::fallback(UNEXPECTED_FORMAT_MESSAGE);
        };
        if alternative.text.is_empty() {
            return SynthesizedAnswer::fallback(EMPTY_COMPLETION_MESSAGE);
        }

        let map = match extract_json(&alternative.text) {
            ModelOutput::Parsed(map) => map,
            // Raw text as reasoning is the designed fallback, not an error.
            ModelOutput::Unparsed(raw) => return SynthesizedAnswer::fallback(&raw),
        };

        let answer = coerce_answer(map.get("answer"));
        let sources = coerce_sources(map.get("sources"));

        let mut reasoning = sanitize(map.get("reasoning").and_then(Value::as_str).unwrap_or(""));
        if reasoning.is_empty() {
            reasoning = EMPTY_REASONING_FALLBACK.to_string();
        }

        SynthesizedAnswer {
            answer,
            reasoning,
            sources,
        }
    }
}

fn build_prompt(question: &str, search_results: &[SearchResult], news: &[NewsItem]) -> String {
    let context_news = if news.is_empty() {
        NO_NEWS_SENTENCE.to_string()
    } else {
        news.iter()
            .enumerate()
            .map(|(i, item)| match item {
                NewsItem::Article { title, text } => {
                    format!("Новость {}: {} - {}", i + 1, title, text)
                }
                NewsItem::Link(link) => format!("Новость {}: {}", i + 1, link),
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let context_search = search_results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "Результат поиска {}: {} - {}",
                i + 1,
                result.title,
                result.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{SYSTEM_PROMPT}\n\n\
         Контекст из новостей:\n{context_news}\n\n\
         Контекст из результатов поиска:\n{context_search}\n\n\
         Запрос: \"{question}\"\n\n\
         Пожалуйста, ответь только в формате JSON строго со следующими ключами: id, answer, reasoning, sources.\n\
         Не добавляй ничего кроме JSON. Пример формата ответа:\n\n\
         {{\n\
             \"id\": 999,\n\
             \"answer\": 2,\n\
             \"reasoning\": \"YandexGPT. Главный кампус ИТМО находится в Санкт-Петербурге.\",\n\
             \"sources\": [\"https://itmo.ru\", \"https://ru.wikipedia.org/wiki/Университет_ИТМО\"]\n\
         }}\n\n\
         Для открытых вопросов, поле \"answer\" должно быть null.\n\
         Вставляй наиболее релевантные источники как указано выше. Источники бери из поля url в результатах поиска и новостях.\n\
         В начале поля reasoning ВСЕГДА пиши YandexGPT."
    )
}

/// Locates the first `{` … last `}` span and tries a strict parse, then a
/// repair parse with known placeholder patterns substituted. Anything
/// short of a non-empty JSON object degrades to the trimmed raw text.
pub fn extract_json(text: &str) -> ModelOutput {
    let unparsed = || ModelOutput::Unparsed(text.trim().to_string());

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return unparsed();
    };
    if end < start {
        return unparsed();
    }
    let span = &text[start..=end];

    let parsed: Option<Value> = serde_json::from_str(span)
        .ok()
        .or_else(|| serde_json::from_str(&repair_placeholders(span)).ok());

    match parsed {
        Some(Value::Object(map)) if !map.is_empty() => ModelOutput::Parsed(map),
        _ => unparsed(),
    }
}

/// The model sometimes leaves the template's placeholder tokens in place
/// of real values; substitute the known ones before the retry parse.
fn repair_placeholders(span: &str) -> String {
    let repaired = span
        .replace("<int или null>", "null")
        .replace("\"<строка>\"", "\"\"");
    URL_PLACEHOLDER_RE.replace_all(&repaired, "\"\"").to_string()
}

/// `answer` comes out as an integer or nothing, whatever the model put
/// there: lists use their first element, numeric strings parse, the rest
/// is dropped.
pub fn coerce_answer(raw: Option<&Value>) -> Option<i64> {
    match raw? {
        Value::Number(n) => n.as_i64(),
        Value::Array(items) => items.first().and_then(coerce_loose_int),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_loose_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keeps only entries that are, or contain, syntactically valid URLs.
/// Order is preserved and duplicates survive; deduplication happens one
/// level up, in the response assembly.
pub fn coerce_sources(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };

    let mut sources = Vec::new();
    for entry in entries {
        match entry {
            Value::Object(map) => {
                if let Some(Value::String(url)) = map.get("url") {
                    let url = url.trim();
                    if is_url(url) {
                        sources.push(url.to_string());
                    }
                }
            }
            Value::String(s) => {
                let s = s.trim();
                if is_url(s) {
                    sources.push(s.to_string());
                } else {
                    extract_embedded_urls(s, &mut sources);
                }
            }
            other => extract_embedded_urls(&other.to_string(), &mut sources),
        }
    }
    sources
}

/// Syntactic URL check: http/https/ftp/ftps scheme followed by
/// non-whitespace, case-insensitive.
pub fn is_url(s: &str) -> bool {
    URL_RE.is_match(s)
}

fn extract_embedded_urls(text: &str, out: &mut Vec<String>) {
    for found in EMBEDDED_URL_RE.find_iter(text) {
        let candidate = found.as_str().trim();
        if is_url(candidate) {
            out.push(candidate.to_string());
        }
    }
}
