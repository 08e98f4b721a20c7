
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::path::Path;
use tracing::debug;

use crate::crawler::extractor::extract_page;
use crate::{MemoryError, Result};

/// How raw source bytes are turned into plain text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Html,
    Markdown,
    PlainText,
}

impl DocumentFormat {
    /// Pick a format from the file extension
    #[inline]
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("html" | "htm" | "xhtml") => Self::Html,
            Some("md" | "markdown") => Self::Markdown,
            _ => Self::PlainText,
        }
    }
}

/// Convert raw bytes of one source into the text that gets chunked
#[inline]
pub fn convert(source_id: &str, format: DocumentFormat, bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| MemoryError::conversion(source_id, format!("not valid UTF-8: {}", e)))?;

    let converted = match format {
        DocumentFormat::Html => extract_page(text).text,
        DocumentFormat::Markdown => markdown_to_text(text),
        DocumentFormat::PlainText => text.to_string(),
    };

    debug!(
        "Converted {} as {:?}: {} bytes -> {} chars",
        source_id,
        format,
        bytes.len(),
        converted.len()
    );
    Ok(converted)
}

/// Strip markdown syntax, keeping text, inline code and code blocks.
/// Block boundaries become newlines.
#[inline]
pub fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::with_capacity(markdown.len());

    for event in Parser::new(markdown) {
        match event {
            Event::Text(content) | Event::Code(content) => text.push_str(&content),
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::Start(Tag::Item) => text.push_str("- "),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableRow,
            ) => {
                if !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            Event::End(TagEnd::TableCell) => text.push(' '),
            _ => {}
        }
    }

    text.trim_end().to_string()
}
