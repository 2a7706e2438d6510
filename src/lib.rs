//! # Codex Context
//!
//! Builds budgeted, multi-repository context bundles for language-model
//! queries.
//!
//! Configured repositories (local paths or remote git URLs) are resolved to
//! local paths through a freshness-checked mirror cache, walked for useful
//! text files, and combined with the current repository and working
//! directory into an [`models::AggregateContext`]. The [`summarize`] stage
//! ranks files by how likely they are to answer a configuration question
//! and cuts the bundle down to a byte budget.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌────────────┐
//! │   Fetcher   │──▶│   Reader    │──▶│  Gatherer   │──▶│ Summarizer │
//! │ cache + git │   │ walk+filter │   │  aggregate  │   │ score+trim │
//! └─────────────┘   └─────────────┘   └─────────────┘   └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`filter`] | Directory and file exclusion rules |
//! | [`reader`] | Repository walk producing file records |
//! | [`git`] | Version-control seam and the `git` CLI backend |
//! | [`fetcher`] | Remote mirror cache with staleness checks |
//! | [`score`] | File priority rules |
//! | [`summarize`] | Budgeted summarization |
//! | [`gather`] | Orchestration of all context sources |
//! | [`prompt`] | Prompt rendering |
//! | [`diagnostics`] | Event sink for non-fatal conditions |
//! | [`error`] | Error type |

pub mod cancel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod gather;
pub mod git;
pub mod models;
pub mod prompt;
pub mod reader;
pub mod score;
pub mod summarize;
