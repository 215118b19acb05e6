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

//! Structured-entity detection for auto-capture.
//!
//! Patterns run in a fixed order (api keys, emails, URLs, IP addresses) and
//! each pass reports matches left to right. Duplicate values are kept.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ApiKey,
    Email,
    Url,
    IpAddress,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ApiKey => "api_key",
            EntityKind::Email => "email",
            EntityKind::Url => "url",
            EntityKind::IpAddress => "ip_address",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed span found in free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: String,
}

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:mem|nr|sk|pk|api)[_-](?:prod|test|dev|live)[_-][a-z0-9]{16,64}\b")
        .unwrap()
});

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"']+"#).unwrap());

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\b").unwrap()
});

/// Stateless extractor. Cheap to construct; the patterns are shared statics.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> Vec<Entity> {
        extract_entities(text)
    }

    /// Short-circuits on the first hit.
    pub fn has_entities(&self, text: &str) -> bool {
        API_KEY_RE.is_match(text)
            || EMAIL_RE.is_match(text)
            || URL_RE.is_match(text)
            || IPV4_RE.captures_iter(text).any(|caps| valid_octets(&caps))
    }
}

/// Extract every entity in `text`, grouped by pass order.
pub fn extract_entities(text: &str) -> Vec<Entity> {
    let mut entities = Vec::new();

    let passes: [(&Regex, EntityKind); 3] = [
        (&*API_KEY_RE, EntityKind::ApiKey),
        (&*EMAIL_RE, EntityKind::Email),
        (&*URL_RE, EntityKind::Url),
    ];
    for (re, kind) in passes {
        entities.extend(re.find_iter(text).map(|m| Entity {
            kind,
            value: m.as_str().to_string(),
        }));
    }

    entities.extend(
        IPV4_RE
            .captures_iter(text)
            .filter(|caps| valid_octets(caps))
            .filter_map(|caps| caps.get(0))
            .map(|m| Entity {
                kind: EntityKind::IpAddress,
                value: m.as_str().to_string(),
            }),
    );

    entities
}

fn valid_octets(caps: &regex::Captures<'_>) -> bool {
    (1..=4).all(|i| {
        caps.get(i)
            .and_then(|g| g.as_str().parse::<u16>().ok())
            .is_some_and(|octet| octet <= 255)
    })
}
