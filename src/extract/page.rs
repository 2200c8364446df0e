//! Single-page article extraction
//!
//! A readability-style heuristic: prefer explicit content containers, then
//! the block holding the most paragraph text (discounted by link density),
//! then the whole body.

use crate::extract::classify::ScopeClassifier;
use crate::extract::text::{collapse_whitespace, element_text, summarize};
use crate::extract::timestamp::parse_timestamp;
use crate::model::{Article, Metadata, Source};
use crate::url::{canonicalize_url, extract_domain};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

const SUMMARY_CHARS: usize = 200;
const UNTITLED: &str = "Untitled";

/// Minimum text a container needs before it is trusted as the article body
const MIN_CONTAINER_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No readable content found")]
    EmptyContent,

    #[error("Invalid page URL: {0}")]
    InvalidUrl(String),
}

/// Extracts exactly one article from an HTML page
///
/// The scope comes from `source` when given, otherwise from `classifier`.
/// `now` is the retrieval time and the fallback publication time.
pub fn extract_article(
    html: &str,
    url: &Url,
    source: Option<&Source>,
    classifier: &ScopeClassifier,
    now: DateTime<Utc>,
) -> Result<Article, ExtractError> {
    let document = Html::parse_document(html);

    let content = main_content(&document);
    if content.is_empty() {
        return Err(ExtractError::EmptyContent);
    }

    let canonical =
        canonicalize_url(url.as_str()).map_err(|e| ExtractError::InvalidUrl(e.to_string()))?;

    let title = extract_title(&document);
    let author = first_match(
        &document,
        &[
            ("meta[name=\"author\"]", Some("content")),
            ("meta[property=\"article:author\"]", Some("content")),
            (".author", None),
        ],
    );
    let published_at = first_match(
        &document,
        &[
            ("meta[property=\"article:published_time\"]", Some("content")),
            ("meta[name=\"publishdate\"]", Some("content")),
            ("time[datetime]", Some("datetime")),
        ],
    )
    .and_then(|raw| parse_timestamp(&raw));

    let mut metadata = Metadata::new();
    metadata.insert("extraction_method".to_string(), "readability".into());
    if let Some(description) = first_match(&document, &[("meta[name=\"description\"]", Some("content"))]) {
        metadata.insert("description".to_string(), description.into());
    }
    if let Some(keywords) = first_match(&document, &[("meta[name=\"keywords\"]", Some("content"))]) {
        let keywords: Vec<Value> = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Value::String(k.to_string()))
            .collect();
        metadata.insert("keywords".to_string(), Value::Array(keywords));
    }
    if published_at.is_none() {
        metadata.insert("published_at_inferred".to_string(), true.into());
    }

    let (source_id, source_name, scope) = match source {
        Some(source) => (
            Some(source.id.clone()),
            Some(source.name.clone()),
            source.scope.clone(),
        ),
        None => (None, extract_domain(url), classifier.classify(&content)),
    };

    Ok(Article {
        title,
        url: canonical.to_string(),
        source_id,
        source_name,
        summary: Some(summarize(&content, SUMMARY_CHARS)),
        word_count: content.chars().count(),
        content,
        scope,
        published_at: published_at.unwrap_or(now),
        fetched_at: now,
        author,
        metadata,
    })
}

fn extract_title(document: &Html) -> String {
    first_match(
        document,
        &[
            ("meta[property=\"og:title\"]", Some("content")),
            ("meta[name=\"twitter:title\"]", Some("content")),
            ("title", None),
            ("h1", None),
        ],
    )
    .unwrap_or_else(|| UNTITLED.to_string())
}

/// Returns the first non-empty value from a chain of selectors
///
/// Each entry reads the named attribute, or the element text when `None`.
fn first_match(document: &Html, chain: &[(&str, Option<&str>)]) -> Option<String> {
    chain.iter().find_map(|(selector, attr)| {
        let selector = Selector::parse(selector).ok()?;
        let element = document.select(&selector).next()?;
        let value = match attr {
            Some(attr) => collapse_whitespace(element.value().attr(attr)?),
            None => collapse_whitespace(&element.text().collect::<String>()),
        };
        (!value.is_empty()).then_some(value)
    })
}

fn main_content(document: &Html) -> String {
    if let Some(text) = explicit_container(document) {
        return text;
    }

    if let Some(element) = best_scoring_block(document) {
        let text = element_text(element);
        if !text.is_empty() {
            return text;
        }
    }

    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(element_text)
        .unwrap_or_default()
}

fn explicit_container(document: &Html) -> Option<String> {
    ["article", "main", "[role=\"main\"]"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .map(element_text)
                .find(|text| text.chars().count() >= MIN_CONTAINER_CHARS)
        })
}

/// Scores each paragraph's parent by paragraph text length, discounted by
/// the share of the parent's text that sits inside links
fn best_scoring_block(document: &Html) -> Option<ElementRef<'_>> {
    let paragraphs = Selector::parse("p").ok()?;
    let links = Selector::parse("a").ok()?;

    let mut scores: HashMap<_, (ElementRef<'_>, f64)> = HashMap::new();
    for paragraph in document.select(&paragraphs) {
        let Some(parent) = paragraph.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        let length = element_text(paragraph).chars().count() as f64;
        scores.entry(parent.id()).or_insert((parent, 0.0)).1 += length;
    }

    scores
        .into_values()
        .map(|(element, score)| {
            let total = element_text(element).chars().count().max(1) as f64;
            let linked: usize = element
                .select(&links)
                .map(|a| element_text(a).chars().count())
                .sum();
            let density = (linked as f64 / total).min(1.0);
            (element, score * (1.0 - density))
        })
        .filter(|(_, score)| *score > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(element, _)| element)
}
