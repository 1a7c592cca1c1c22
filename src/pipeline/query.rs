// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query analysis
//!
//! Derives the normalized text, keywords, entities and intent from a user
//! message. Pure and non-failing; Vietnamese and English are both handled.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const VIETNAMESE_STOP_WORDS: &[&str] = &[
    "của", "và", "với", "trong", "cho", "từ", "đến", "về", "là", "có", "được", "sẽ", "đã",
    "đang", "này", "những", "các", "một", "thì", "mà", "khi", "nên",
];

const ENGLISH_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "are", "was", "were", "has", "have",
    "not", "but", "you", "your", "into", "about",
];

const QUESTION_WORDS: &[&str] = &[
    "gì", "nào", "sao", "tại sao", "như thế nào", "khi nào", "ở đâu", "bao nhiêu", "ai",
    "what", "why", "how", "when", "where", "who", "which",
];

const COMMAND_WORDS: &[&str] = &[
    "tìm", "hiển thị", "cho tôi", "giải thích", "so sánh", "liệt kê", "tóm tắt",
    "find", "show", "list", "explain", "compare", "summarize",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Question,
    Command,
    Statement,
}

/// Analysed user query, immutable once derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw_text: String,
    pub normalized_text: String,
    pub keywords: Vec<String>,
    /// Dates and numbers found in the raw text
    pub entities: Vec<String>,
    pub detected_intent: QueryIntent,
}

impl Query {
    pub fn parse(raw_text: &str) -> Self {
        let normalized_text = normalize_text(raw_text);
        Self {
            raw_text: raw_text.to_string(),
            keywords: extract_keywords(&normalized_text),
            entities: extract_entities(raw_text),
            detected_intent: detect_intent(raw_text, &normalized_text),
            normalized_text,
        }
    }
}

/// Lower-case, replace punctuation with spaces, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokens longer than two characters that are not stop words, in order
pub fn extract_keywords(normalized: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in normalized.split_whitespace() {
        if word.chars().count() <= 2
            || VIETNAMESE_STOP_WORDS.contains(&word)
            || ENGLISH_STOP_WORDS.contains(&word)
        {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}

fn date_regex() -> Option<&'static Regex> {
    static DATE: OnceLock<Option<Regex>> = OnceLock::new();
    DATE.get_or_init(|| Regex::new(r"\b\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}\b").ok())
        .as_ref()
}

fn number_regex() -> Option<&'static Regex> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"\b\d+\b").ok()).as_ref()
}

/// Dates (`d/m/yyyy`) followed by standalone numbers, de-duplicated
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    let matches = date_regex()
        .into_iter()
        .flat_map(|re| re.find_iter(text))
        .chain(number_regex().into_iter().flat_map(|re| re.find_iter(text)));

    for m in matches {
        let entity = m.as_str().to_string();
        if !entities.contains(&entity) {
            entities.push(entity);
        }
    }
    entities
}

fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    format!(" {} ", normalized).contains(&format!(" {} ", phrase))
}

pub fn detect_intent(raw_text: &str, normalized: &str) -> QueryIntent {
    if raw_text.trim_end().ends_with('?')
        || QUESTION_WORDS.iter().any(|w| contains_phrase(normalized, w))
    {
        QueryIntent::Question
    } else if COMMAND_WORDS.iter().any(|w| contains_phrase(normalized, w)) {
        QueryIntent::Command
    } else {
        QueryIntent::Statement
    }
}
