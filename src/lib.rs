//! Ratcomplete
//!
//! An incremental, asynchronous code-completion engine for text editors.
//!
//! # Architecture
//!
//! - **Editor Module**: Rope document, multi-range selection, transactions
//!   and position mapping through changes
//! - **Completion Module**: Sources, activation state, query scheduling,
//!   ranking and the selection dialog
//! - **Snippet Module**: Templates with tab-stop fields
//! - **Config Module**: `.ratcomplete` rc file
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ratcomplete::completion::{CompletionConfig, CompletionHandle, WordSource};
//! use ratcomplete::editor::Editor;
//!
//! # async fn demo() -> Result<(), ratcomplete::completion::EngineError> {
//! let handle = CompletionHandle::spawn(
//!     Editor::from_text("println\n"),
//!     vec![Arc::new(WordSource::new())],
//!     CompletionConfig::default(),
//! );
//! handle.type_text("pri").await?;
//! # Ok(())
//! # }
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::unnested_or_patterns)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::similar_names)]

pub mod completion;
pub mod config;
pub mod editor;
pub mod logging;
pub mod snippet;

// Re-export main types
pub use completion::{CompletionConfig, CompletionHandle, CompletionSource};
pub use config::Config;
pub use editor::Editor;
pub use snippet::{Snippet, SnippetNavigator};
