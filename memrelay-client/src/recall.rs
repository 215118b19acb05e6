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

//! Rendering of recalled memories for prompt injection.

use crate::types::SearchHit;
use memrelay_core::RECALL_BLOCK_TAG;

/// Prompts shorter than this (in chars, trimmed) never trigger recall.
pub const MIN_RECALL_PROMPT_CHARS: usize = 5;

/// Render hits as a `<relevant-memories>` block, in the order given.
/// Returns `None` when there is nothing to inject.
pub fn format_recall_block(hits: &[SearchHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }

    let mut block = format!(
        "<{RECALL_BLOCK_TAG}>\nThe following memories may be relevant to this conversation:\n"
    );
    for hit in hits {
        let percent = (hit.score.clamp(0.0, 1.0) * 100.0).round() as u32;
        block.push_str(&format!("- [{percent}%] {}\n", hit.memory.content.trim()));
    }
    block.push_str(&format!("</{RECALL_BLOCK_TAG}>"));
    Some(block)
}
