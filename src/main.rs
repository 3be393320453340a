//! Ratcomplete - demo entry point.
//!
//! Types each stdin line into an in-memory document and prints the
//! completion dialog as JSON after it.
//!
//! Usage: ratc [OPTIONS]
//!
//! Options:
//!   --version, -v      Show version
//!   --lang <id>        Keyword language (default: rust)

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use ratcomplete::completion::{CompletionHandle, CompletionSource, WordSource, keyword_source};
use ratcomplete::config::Config;
use ratcomplete::editor::Editor;
use ratcomplete::logging;

/// Crate version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Time given to sources after each line before the dialog is printed.
const SETTLE_MARGIN: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("ratc v{}", VERSION);
        return Ok(());
    }

    let language = args
        .iter()
        .position(|a| a == "--lang")
        .and_then(|i| args.get(i + 1))
        .map_or("rust", String::as_str);

    let config = Config::load()?;
    if let Err(e) = logging::init(&config.log_config) {
        eprintln!("Logging disabled: {}", e);
    }

    let mut sources: Vec<Arc<dyn CompletionSource>> = vec![Arc::new(WordSource::new())];
    if let Some(keywords) = keyword_source(language)? {
        sources.push(Arc::new(keywords));
    }

    let settle = config.completion.debounce + config.completion.accept_debounce + SETTLE_MARGIN;
    let editor = Editor::new().with_indent_unit(config.indent_unit.clone());
    let handle = CompletionHandle::spawn(editor, sources, config.completion);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        handle.type_text(&line).await?;
        tokio::time::sleep(settle).await;

        let snapshot = handle.snapshot().await?;
        println!("{}", serde_json::to_string(&snapshot)?);

        handle.close_completion().await?;
        handle.type_text("\n").await?;
    }

    handle.shutdown().await;
    Ok(())
}
