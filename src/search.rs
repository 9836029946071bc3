use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use moka::future::Cache;
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::llm::CompletionModel;

pub const MAX_SEARCH_RESULTS: usize = 3;

const MAX_TEXT_LENGTH: usize = 1000;
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_TITLE: &str = "Без заголовка";

/// Elements whose text never makes it into a scraped page.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "meta", "head", "footer", "nav", "aside"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub text: String,
}

/// A search hit before its page has been scraped.
#[derive(Debug, Clone, PartialEq)]
struct FoundDoc {
    title: String,
    url: String,
}

fn language_domain(lang: &str) -> Option<&'static str> {
    match lang {
        "lang_ru" => Some("yandex.ru"),
        "lang_tr" => Some("yandex.com.tr"),
        "lang_com" => Some("yandex.com"),
        _ => None,
    }
}

pub struct SearchProvider {
    http: reqwest::Client,
    model: Arc<dyn CompletionModel>,
    folder_id: String,
    api_key: String,
    languages: Vec<String>,
    cache: Cache<String, Vec<SearchResult>>,
}

impl SearchProvider {
    pub fn new(
        http: reqwest::Client,
        model: Arc<dyn CompletionModel>,
        folder_id: String,
        api_key: String,
    ) -> Self {
        Self {
            http,
            model,
            folder_id,
            api_key,
            languages: vec!["lang_ru".to_string()],
            cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Web search with page scraping. Failures at any layer are logged and
    /// degrade toward an empty list; "no results" is a valid, non-fatal
    /// outcome for the caller.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        let cache_key = format!("{}|{}|{}", query, max_results, self.languages.join(","));
        if let Some(hit) = self.cache.get(&cache_key).await {
            return hit;
        }

        let docs = self.find_documents(query, max_results).await;
        if docs.is_empty() {
            log::warn!("no relevant search results for query: {query}");
            self.cache.insert(cache_key, Vec::new()).await;
            return Vec::new();
        }

        // Scrape every hit concurrently; join before returning.
        let texts = join_all(docs.iter().map(|doc| self.scrape_page(&doc.url))).await;

        let results: Vec<SearchResult> = docs
            .into_iter()
            .zip(texts)
            .filter(|(_, text)| !text.is_empty())
            .map(|(doc, text)| SearchResult {
                title: doc.title,
                url: doc.url,
                text,
            })
            .collect();

        self.cache.insert(cache_key, results.clone()).await;
        results
    }

    async fn find_documents(&self, query: &str, max_results: usize) -> Vec<FoundDoc> {
        let mut found: Vec<FoundDoc> = Vec::new();

        for lang in &self.languages {
            let Some(domain) = language_domain(lang) else {
                log::warn!("unknown search language {lang}, skipping");
                continue;
            };

            let url = format!("https://{domain}/search/xml");
            let params = [
                ("folderid", self.folder_id.as_str()),
                ("apikey", self.api_key.as_str()),
                ("query", query),
                ("lr", "213"),
                ("l10n", "ru"),
                ("sortby", "rlv"),
                ("filter", "strict"),
                ("groupby", "attr=d.mode=deep.groups-on-page=1.docs-in-group=1"),
                ("maxpassages", "3"),
                ("page", "0"),
            ];

            let body = match self.fetch_search_xml(&url, &params).await {
                Ok(body) => body,
                Err(e) => {
                    log::error!("search API request failed: {:#}", e);
                    continue;
                }
            };

            match parse_search_xml(&body) {
                Ok(docs) => merge_docs(&mut found, docs, max_results),
                Err(e) => {
                    log::error!("search XML parse failed: {:#}", e);
                    continue;
                }
            }

            if found.len() >= max_results {
                break;
            }
        }

        found
    }

    async fn fetch_search_xml(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .context("failed to reach the search API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read the search API response")?;

        if !status.is_success() {
            let preview: String = body.chars().take(500).collect();
            anyhow::bail!("search API returned {}: {}", status, preview);
        }
        Ok(body)
    }

    async fn scrape_page(&self, url: &str) -> String {
        match self.fetch_and_clean(url).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("error scraping {url}: {:#}", e);
                String::new()
            }
        }
    }

    async fn fetch_and_clean(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", "Mozilla/5.0")
            .timeout(SCRAPE_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("page returned status {}", response.status());
        }
        let html = response.text().await?;

        let text = truncate_text(&extract_page_text(&html), MAX_TEXT_LENGTH);
        Ok(self.strong_clean(&text).await)
    }

    /// Model-based cleanup pass over scraped text. Best-effort: a failed
    /// call or an empty cleanup result keeps the uncleaned text.
    async fn strong_clean(&self, text: &str) -> String {
        let prompt = format!(
            "Ты помощник по очистке текста. Очисти следующий текст от HTML-тегов, спецсимволов, комментариев, избыточных пробелов и любых неинформативных данных. Верни только чистый текст без дополнительных пояснений.\n\n\
             Текст:\n{text}\n\nЧистый текст:"
        );

        match self.model.complete(&prompt).await {
            Ok(completion) => match completion.alternatives.first() {
                Some(alt) if !alt.text.trim().is_empty() => alt.text.trim().to_string(),
                _ => text.to_string(),
            },
            Err(e) => {
                log::warn!("text cleanup call failed, keeping raw text: {:#}", e);
                text.to_string()
            }
        }
    }
}

/// Appends `docs` to `found`, deduplicating by URL and stopping once
/// `max_results` is reached.
fn merge_docs(found: &mut Vec<FoundDoc>, docs: Vec<FoundDoc>, max_results: usize) {
    for doc in docs {
        if found.len() >= max_results {
            return;
        }
        if found.iter().any(|f| f.url == doc.url) {
            continue;
        }
        found.push(doc);
    }
}

#[derive(Clone, Copy, PartialEq)]
enum DocField {
    Url,
    Title,
}

/// Pulls `<doc>` entries out of a search API response. Only `<url>` and
/// `<title>` are read; documents without a URL are skipped.
fn parse_search_xml(xml: &str) -> Result<Vec<FoundDoc>> {
    let mut reader = Reader::from_str(xml);

    let mut docs = Vec::new();
    let mut in_doc = false;
    let mut field: Option<DocField> = None;
    let mut url = String::new();
    let mut title = String::new();

    loop {
        match reader.read_event().context("malformed search XML")? {
            Event::Start(e) => match e.name().as_ref() {
                b"doc" => {
                    in_doc = true;
                    url.clear();
                    title.clear();
                }
                b"url" if in_doc => field = Some(DocField::Url),
                b"title" if in_doc => field = Some(DocField::Title),
                _ => {}
            },
            Event::Text(t) if in_doc => {
                let text = t.unescape().context("bad text node in search XML")?;
                match field {
                    Some(DocField::Url) => url.push_str(&text),
                    // Highlight tags inside <title> keep the title field
                    // active, so their text still accumulates here.
                    Some(DocField::Title) => title.push_str(&text),
                    None => {}
                }
            }
            Event::CData(t) if in_doc => {
                let text = String::from_utf8_lossy(&t);
                match field {
                    Some(DocField::Url) => url.push_str(&text),
                    Some(DocField::Title) => title.push_str(&text),
                    None => {}
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"doc" => {
                    in_doc = false;
                    let url = url.trim();
                    let title = title.trim();
                    if !url.is_empty() {
                        docs.push(FoundDoc {
                            url: url.to_string(),
                            title: if title.is_empty() {
                                DEFAULT_TITLE.to_string()
                            } else {
                                title.to_string()
                            },
                        });
                    }
                }
                b"url" | b"title" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(docs)
}

/// Plain text of a page, skipping non-content elements, one text node per
/// line.
fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut lines: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<yandexsearch version="1.0">
  <response>
    <results>
      <grouping>
        <group>
          <doc>
            <url> https://itmo.ru/about </url>
            <title>Университет <hlword>ИТМО</hlword></title>
            <passages><passage>кампус</passage></passages>
          </doc>
        </group>
        <group>
          <doc>
            <url>https://news.itmo.ru/story</url>
          </doc>
        </group>
        <group>
          <doc>
            <title>Документ без ссылки</title>
          </doc>
        </group>
      </grouping>
    </results>
  </response>
</yandexsearch>"#;

    #[test]
    fn parses_docs_with_trimmed_urls_and_default_titles() {
        let docs = parse_search_xml(SEARCH_XML).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].url, "https://itmo.ru/about");
        assert_eq!(docs[0].title, "Университет ИТМО");
        assert_eq!(docs[1].url, "https://news.itmo.ru/story");
        assert_eq!(docs[1].title, DEFAULT_TITLE);
    }

    #[test]
    fn docless_response_parses_to_nothing() {
        let docs = parse_search_xml("<response><results/></response>").unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn merge_deduplicates_by_url_and_caps() {
        let mut found = Vec::new();
        let doc = |url: &str| FoundDoc {
            title: DEFAULT_TITLE.to_string(),
            url: url.to_string(),
        };
        merge_docs(
            &mut found,
            vec![doc("https://a"), doc("https://a"), doc("https://b")],
            MAX_SEARCH_RESULTS,
        );
        merge_docs(
            &mut found,
            vec![doc("https://b"), doc("https://c"), doc("https://d")],
            MAX_SEARCH_RESULTS,
        );
        let urls: Vec<&str> = found.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
    }

    #[test]
    fn page_text_skips_non_content_elements() {
        let html = r#"<html><head><title>t</title><style>.x{}</style></head>
            <body><nav>меню</nav><p>Главный кампус</p>
            <script>var x = 1;</script><footer>подвал</footer>
            <div>в Санкт-Петербурге</div></body></html>"#;
        let text = extract_page_text(html);
        assert_eq!(text, "Главный кампус\nв Санкт-Петербурге");
    }

    #[test]
    fn truncation_is_char_safe_and_marks_the_cut() {
        let short = "а".repeat(1000);
        assert_eq!(truncate_text(&short, MAX_TEXT_LENGTH), short);

        let long = "я".repeat(1001);
        let truncated = truncate_text(&long, MAX_TEXT_LENGTH);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 1003);
    }

    #[test]
    fn unknown_language_has_no_domain() {
        assert_eq!(language_domain("lang_ru"), Some("yandex.ru"));
        assert_eq!(language_domain("lang_tr"), Some("yandex.com.tr"));
        assert_eq!(language_domain("lang_com"), Some("yandex.com"));
        assert_eq!(language_domain("lang_en"), None);
    }
}
