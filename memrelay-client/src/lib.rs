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

//! # Memrelay Client
//!
//! Resilient access to a remote agent memory store, plus the two hooks an
//! agent host needs: recall before a turn, capture after it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use memrelay_client::{CancellationToken, ConversationMessage, MemoryRelay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RelayConfig::new("mem_live_0123456789abcdef", "my-agent")
//!         .with_auto_capture(true);
//!
//!     // A failed startup check disables memory instead of failing the host
//!     let Some(relay) = MemoryRelay::try_start(config).await else {
//!         return;
//!     };
//!
//!     let cancel = CancellationToken::new();
//!     let prompt = "Which port does the staging database use?";
//!     if let Some(context) = relay.recall_context(prompt, &cancel).await {
//!         println!("{context}\n\n{prompt}");
//!     }
//!
//!     let turn = vec![
//!         ConversationMessage::user("Remember that staging Postgres runs on port 5433"),
//!         ConversationMessage::assistant("Noted."),
//!     ];
//!     let report = relay.capture_turn(&turn, &cancel).await;
//!     println!("stored {} memories", report.stored.len());
//! }
//! ```
//!
//! ## Direct Operations
//!
//! ```no_run
//! use memrelay_client::{MemoryRelay, RelayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let relay = MemoryRelay::new(RelayConfig::new("mem_live_0123456789abcdef", "my-agent"))?;
//!
//! let record = relay.store("The deploy key lives in vault at ops/deploy", None).await?;
//! for hit in relay.search("deploy key", 5, 0.3).await? {
//!     println!("{:.2} {}", hit.score, hit.memory.content);
//! }
//! relay.delete(&record.id).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod gateway;
mod recall;
mod relay;
mod types;

pub use error::{RelayError, Result};
pub use gateway::{HttpGateway, MemoryGateway};
pub use recall::{format_recall_block, MIN_RECALL_PROMPT_CHARS};
pub use relay::{MemoryRelay, CAPTURE_SOURCE, MAX_CONTENT_CHARS, MAX_METADATA_BYTES};
pub use types::*;

pub use memrelay_core::{
    CancellationToken, CircuitBreakerSettings, ConversationMessage, ErrorKind, MessageContent,
    MessageRole, RelayConfig, RetrySettings,
};
