use std::sync::{Arc, LazyLock};

use htmd::HtmlToMarkdown;
use prospect_core::error::AppError;
use prospect_core::traits::Cleaner;
use regex::Regex;

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid regex"));

/// HTML-to-text cleaner using htmd.
///
/// Produces the readable page excerpt handed to the quality scorer: markup,
/// scripts, navigation chrome and forms are dropped, and runs of blank lines
/// are collapsed.
#[derive(Clone)]
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
                "form", "button", "img", "head",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for HtmdCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let markdown = self
            .converter
            .convert(html)
            .map_err(|e| AppError::ParseError(format!("HTML conversion failed: {e}")))?;
        Ok(BLANK_RUNS.replace_all(markdown.trim(), "\n\n").into_owned())
    }
}
