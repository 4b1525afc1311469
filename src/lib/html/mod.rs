//! HTML parsing seam used by the extractor.
//!
//! The extractor only needs three queries over a parsed document: the text of
//! the first top-level heading, the first paragraph as a standalone fragment,
//! and the document serialized without that heading. [`MarkupParser`] and
//! [`Markup`] capture exactly that, so a different parser can be swapped in
//! without touching extraction.
use std::sync::LazyLock;

use scraper::{Html, Selector};
use thiserror::Error;

use crate::config::{PARAGRAPH_SELECTOR, TOP_HEADING_SELECTOR};

static TOP_HEADING: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(TOP_HEADING_SELECTOR).expect("static heading selector is valid")
});

static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(PARAGRAPH_SELECTOR).expect("static paragraph selector is valid")
});

/// Hard parser failure. Malformed markup that the parser can recover from is
/// not an error.
#[derive(Debug, Error)]
#[error("markup could not be parsed: {reason}")]
pub struct MarkupError {
    pub reason: String,
}

/// Queries over a parsed document.
pub trait Markup {
    /// Text content of the first top-level heading, inner markup stripped.
    fn first_heading_text(&self) -> Option<String>;

    /// The first paragraph anywhere in the tree, serialized on its own.
    fn first_paragraph_html(&self) -> Option<String>;

    /// The document serialized with only its first top-level heading removed.
    fn without_first_heading(&self) -> String;
}

pub trait MarkupParser: Send + Sync {
    type Document: Markup;

    fn parse(&self, html: &str) -> Result<Self::Document, MarkupError>;
}

/// html5ever-backed parser. Rendered post bodies are fragments, so input is
/// parsed in fragment mode and serialized back without a document wrapper.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScraperParser;

impl MarkupParser for ScraperParser {
    type Document = ScraperDocument;

    // html5ever recovers from any input, so this never returns an error.
    fn parse(&self, html: &str) -> Result<Self::Document, MarkupError> {
        Ok(ScraperDocument(Html::parse_fragment(html)))
    }
}

#[derive(Clone, Debug)]
pub struct ScraperDocument(Html);

impl Markup for ScraperDocument {
    fn first_heading_text(&self) -> Option<String> {
        self.0
            .select(&TOP_HEADING)
            .next()
            .map(|h| h.text().collect())
    }

    fn first_paragraph_html(&self) -> Option<String> {
        self.0.select(&PARAGRAPH).next().map(|p| p.html())
    }

    fn without_first_heading(&self) -> String {
        let mut content = self.0.clone();
        let heading = content.select(&TOP_HEADING).next().map(|h| h.id());
        if let Some(mut node) = heading.and_then(|id| content.tree.get_mut(id)) {
            node.detach();
        }
        content.root_element().inner_html()
    }
}
