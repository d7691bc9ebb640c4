//! HTML document parser

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::domain::ingestion::{DocumentParser, ParsedDocument, ParserInput};
use crate::domain::KnowledgeError;

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "head"];

const BLOCK_ELEMENTS: [&str; 14] = [
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "br", "li", "tr", "td", "th", "pre",
];

/// Extracts visible text from HTML pages
///
/// Block elements start new lines; scripts and styles are dropped. The
/// `<title>` becomes the document title.
#[derive(Debug, Clone, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    fn extract_title(document: &Html) -> Option<String> {
        let title_selector = Selector::parse("title").ok()?;
        document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_text(document: &Html) -> String {
        let body_selector = Selector::parse("body").ok();

        let root = if let Some(ref sel) = body_selector {
            document.select(sel).next()
        } else {
            None
        };

        let text = if let Some(body) = root {
            Self::extract_element_text(&body)
        } else {
            document.root_element().text().collect::<String>()
        };

        Self::normalize_text(&text)
    }

    fn extract_element_text(element: &scraper::ElementRef) -> String {
        let mut text = String::new();

        for node in element.children() {
            if let Some(el) = scraper::ElementRef::wrap(node) {
                let tag_name = el.value().name();

                if SKIPPED_ELEMENTS.contains(&tag_name) {
                    continue;
                }

                let block = BLOCK_ELEMENTS.contains(&tag_name);
                if block && !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }

                text.push_str(&Self::extract_element_text(&el));

                if block {
                    text.push('\n');
                }
            } else if let Some(txt) = node.value().as_text() {
                text.push_str(txt);
            }
        }

        text
    }

    fn normalize_text(text: &str) -> String {
        let lines: Vec<&str> = text
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();

        lines.join("\n")
    }
}

#[async_trait]
impl DocumentParser for HtmlParser {
    fn supported_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }

    async fn parse(&self, input: &ParserInput) -> Result<ParsedDocument, KnowledgeError> {
        let raw = input.text()?;
        let document = Html::parse_document(&raw);

        let parsed = ParsedDocument::new(Self::extract_text(&document));

        Ok(match Self::extract_title(&document) {
            Some(title) => parsed.with_title(title),
            None => parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(html: &str) -> ParsedDocument {
        HtmlParser::new()
            .parse(&ParserInput::new("page.html", html))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_parse_simple_html() {
        let html = r#"
            <!DOCTYPE html>
            <html>
            <head><title>Release Notes</title></head>
            <body>
                <h1>Version 2</h1>
                <p>Chunks can now be disabled.</p>
            </body>
            </html>
        "#;

        let result = parse(html).await;

        assert_eq!(result.content, "Version 2\nChunks can now be disabled.");
        assert_eq!(result.title.as_deref(), Some("Release Notes"));
    }

    #[tokio::test]
    async fn test_scripts_and_styles_are_dropped() {
        let html = r#"
            <html>
            <head><style>.hidden { display: none; }</style></head>
            <body>
                <p>Visible text</p>
                <script>var secret = 'hidden';</script>
                <noscript>enable javascript</noscript>
            </body>
            </html>
        "#;

        let result = parse(html).await;

        assert_eq!(result.content, "Visible text");
    }

    #[tokio::test]
    async fn test_list_items_become_lines() {
        let html = "<html><body><ul><li>First</li><li>Second</li></ul></body></html>";

        let result = parse(html).await;

        assert_eq!(result.content, "First\nSecond");
        assert!(result.title.is_none());
    }

    #[tokio::test]
    async fn test_nested_inline_text() {
        let html = "<div><div><span>Deeply</span> <em>nested</em></div></div>";

        let result = parse(html).await;

        assert_eq!(result.content, "Deeply nested");
    }

    #[test]
    fn test_supported_extensions() {
        let parser = HtmlParser::new();
        assert!(parser.supports_extension("html"));
        assert!(parser.supports_extension("htm"));
        assert!(!parser.supports_extension("txt"));
    }
}
