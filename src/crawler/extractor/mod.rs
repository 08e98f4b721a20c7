
use itertools::Itertools;
use scraper::{Html, Selector};
use tracing::debug;

/// Elements whose text never belongs to a page's content
const UNWANTED_ELEMENTS: &str = "script, style, nav, footer, header, noscript";

/// Text content pulled out of one HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Contents of `<title>`, falling back to the first `<h1>`
    pub title: Option<String>,
    /// Visible text with whitespace collapsed to single spaces
    pub text: String,
}

/// Extract the readable text of an HTML document
#[inline]
pub fn extract_page(html: &str) -> ExtractedPage {
    let mut document = Html::parse_document(html);
    let title = extract_title(&document);

    remove_unwanted_elements(&mut document);

    let body_selector = Selector::parse("body").expect("valid selector");
    let raw_text: Vec<&str> = match document.select(&body_selector).next() {
        Some(body) => body.text().collect(),
        None => document.root_element().text().collect(),
    };
    let text = collapse_whitespace(&raw_text.join(" "));

    debug!(
        "Extracted page: title={:?}, {} chars of text",
        title,
        text.len()
    );
    ExtractedPage { title, text }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title, h1").expect("valid selector");

    let mut candidates: Vec<(bool, String)> = document
        .select(&title_selector)
        .map(|element| {
            let is_title = element.value().name() == "title";
            (is_title, collapse_whitespace(&element.text().collect::<String>()))
        })
        .filter(|(_, text)| !text.is_empty())
        .collect();

    // Prefer <title> over any heading, otherwise document order
    candidates.sort_by_key(|(is_title, _)| !*is_title);
    candidates.into_iter().next().map(|(_, text)| text)
}

fn remove_unwanted_elements(document: &mut Html) {
    let unwanted_selector = Selector::parse(UNWANTED_ELEMENTS).expect("valid selector");

    // Collect node ids first so the tree is not borrowed while detaching
    let unwanted_node_ids: Vec<_> = document
        .select(&unwanted_selector)
        .map(|element| element.id())
        .collect();

    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}

/// Collapse every whitespace run to one space and trim the ends
#[inline]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}
