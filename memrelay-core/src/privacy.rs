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

//! Privacy tags.
//!
//! Users can fence content with `<private>...</private>`; fenced spans are
//! replaced with `[REDACTED]` before anything is captured. An unclosed tag
//! hides the rest of the text.

use std::borrow::Cow;

const OPEN_TAG: &str = "<private>";
const CLOSE_TAG: &str = "</private>";
const REDACTION: &str = "[REDACTED]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction<'a> {
    pub text: Cow<'a, str>,
    pub redacted_count: usize,
    /// Nothing but whitespace remains outside the private spans.
    pub entirely_private: bool,
}

impl Redaction<'_> {
    pub fn had_private_content(&self) -> bool {
        self.redacted_count > 0
    }
}

pub fn redact_private(text: &str) -> Redaction<'_> {
    if !text.contains(OPEN_TAG) {
        return Redaction {
            text: Cow::Borrowed(text),
            redacted_count: 0,
            entirely_private: false,
        };
    }

    let mut output = String::with_capacity(text.len());
    let mut redacted_count = 0;
    let mut public_len = 0;
    let mut remaining = text;

    while let Some(start) = remaining.find(OPEN_TAG) {
        let before = &remaining[..start];
        public_len += before.trim().len();
        output.push_str(before);
        output.push_str(REDACTION);
        redacted_count += 1;

        let after_open = &remaining[start + OPEN_TAG.len()..];
        remaining = match after_open.find(CLOSE_TAG) {
            Some(end) => &after_open[end + CLOSE_TAG.len()..],
            None => "",
        };
    }

    public_len += remaining.trim().len();
    output.push_str(remaining);

    Redaction {
        text: Cow::Owned(output),
        redacted_count,
        entirely_private: public_len == 0,
    }
}
