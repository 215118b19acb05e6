// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Query cleanup ahead of similarity search.

use once_cell::sync::Lazy;
use regex::Regex;

/// Interrogatives and auxiliaries that carry no retrieval signal.
pub const QUERY_STOPWORDS: &[&str] = &[
    "what", "how", "when", "where", "why", "who", "which", "whose", "whom", "is", "are", "was",
    "were", "do", "does", "did", "can", "could", "should", "would", "will",
];

static STOPWORD_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = QUERY_STOPWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).unwrap()
});

static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[?!.,;:'"()]"#).unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove stopwords, blank out punctuation, collapse whitespace.
///
/// An apostrophe is a word boundary, so a contraction keeps its tail:
/// `"What's the plan?"` becomes `"s the plan"`. The result may be empty.
pub fn preprocess_query(text: &str) -> String {
    let without_stopwords = STOPWORD_RE.replace_all(text, "");
    let without_punctuation = PUNCTUATION_RE.replace_all(&without_stopwords, " ");
    WHITESPACE_RE
        .replace_all(&without_punctuation, " ")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct QueryPreprocessor {
    enabled: bool,
}

impl Default for QueryPreprocessor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl QueryPreprocessor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The query to send. Falls back to `text` when preprocessing is off or
    /// consumed everything.
    pub fn prepare(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let cleaned = preprocess_query(text);
        if cleaned.is_empty() {
            text.to_string()
        } else {
            cleaned
        }
    }
}
