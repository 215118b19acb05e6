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

//! Auto-capture decisions.
//!
//! Deciding is pure and offline: length bounds, then entity detection, then
//! the fixed trigger patterns. Duplicate checks against the store happen
//! later, only for accepted candidates.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::EntityExtractor;
use crate::message::{ConversationMessage, MessageRole};
use crate::privacy::redact_private;

/// Tag wrapping recalled memories injected into a prompt. Text carrying it
/// is never captured, otherwise recalled memories would be stored again.
pub const RECALL_BLOCK_TAG: &str = "relevant-memories";

static CAPTURE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // explicit requests
        r"(?i)\bremember\s+(?:that|this|to|my)\b",
        r"(?i)\bdon'?t\s+forget\b",
        r"(?i)\bimportant\s*:",
        // personal information
        r"(?i)\bmy\s+(?:name|email|phone|address|birthday|username|timezone)\b",
        r"(?i)\bmy\s+\w+\s+is\b",
        r"(?i)\bi\s+(?:am|work|live)\s+(?:a|an|at|in|on|as|for)\b",
        // preferences
        r"(?i)\bi\s+(?:really\s+)?(?:prefer|like|love|hate|want|need)\b",
        r"(?i)\b(?:always|never)\s+(?:use|do|run|deploy|commit|call)\b",
        // credentials and infrastructure
        r"(?i)\b(?:api[\s_-]?key|password|passphrase|secret|token|credentials?)\b",
        r"(?i)\b(?:server|host(?:name)?|ssh|database|db|endpoint)\s+(?:is|at|on|runs?)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub min_length: usize,
    pub max_length: usize,
    /// Candidates taken from a single turn.
    pub max_per_turn: usize,
    pub entity_extraction: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            min_length: 20,
            max_length: 2_000,
            max_per_turn: 3,
            entity_extraction: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptReason {
    Entities,
    Pattern,
}

impl AcceptReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptReason::Entities => "entities",
            AcceptReason::Pattern => "pattern",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooShort,
    TooLong,
    NoSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureVerdict {
    Accept(AcceptReason),
    Reject(RejectReason),
}

impl CaptureVerdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, CaptureVerdict::Accept(_))
    }
}

/// Text selected for storage, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCandidate {
    pub text: String,
    pub role: MessageRole,
    pub reason: AcceptReason,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureEngine {
    settings: CaptureSettings,
    extractor: EntityExtractor,
}

impl CaptureEngine {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            extractor: EntityExtractor::new(),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn decide(&self, text: &str) -> CaptureVerdict {
        let length = text.chars().count();
        if length < self.settings.min_length {
            return CaptureVerdict::Reject(RejectReason::TooShort);
        }
        if length > self.settings.max_length {
            return CaptureVerdict::Reject(RejectReason::TooLong);
        }

        if self.settings.entity_extraction && self.extractor.has_entities(text) {
            return CaptureVerdict::Accept(AcceptReason::Entities);
        }

        if matches_capture_pattern(text) {
            CaptureVerdict::Accept(AcceptReason::Pattern)
        } else {
            CaptureVerdict::Reject(RejectReason::NoSignal)
        }
    }

    pub fn should_capture(&self, text: &str) -> bool {
        self.decide(text).is_accept()
    }

    /// Accepted texts from a finished turn, in message order, capped at
    /// `max_per_turn`. Private spans are redacted first; injected recall
    /// blocks and fully private texts are skipped.
    pub fn candidates(&self, messages: &[ConversationMessage]) -> Vec<CaptureCandidate> {
        let mut selected = Vec::new();

        for message in messages.iter().filter(|m| m.role.is_conversational()) {
            for text in message.content.texts() {
                if selected.len() >= self.settings.max_per_turn {
                    return selected;
                }
                if contains_recall_block(text) {
                    continue;
                }

                let redaction = redact_private(text);
                if redaction.entirely_private {
                    continue;
                }

                if let CaptureVerdict::Accept(reason) = self.decide(&redaction.text) {
                    selected.push(CaptureCandidate {
                        text: redaction.text.into_owned(),
                        role: message.role,
                        reason,
                    });
                }
            }
        }

        selected
    }
}

pub fn matches_capture_pattern(text: &str) -> bool {
    CAPTURE_PATTERNS.iter().any(|re| re.is_match(text))
}

pub fn contains_recall_block(text: &str) -> bool {
    text.contains(&format!("<{}>", RECALL_BLOCK_TAG))
}
