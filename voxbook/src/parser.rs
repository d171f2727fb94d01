//! Book parsing: turn a source file into plain narrated text.
//!
//! Both formats reduce to the same thing: a title and one content
//! string where paragraphs are separated by blank lines, ready for
//! block extraction.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parsed book ready for narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBook {
    pub title: String,
    /// Plain text; paragraphs separated by blank lines.
    pub content: String,
}

/// Parse a book file, dispatching on extension.
pub fn parse_book(path: &Path) -> Result<ParsedBook> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" => parse_txt(path),
        "epub" => parse_epub(path),
        other => anyhow::bail!(
            "unsupported book format '.{other}' for {}: expected .txt or .epub",
            path.display()
        ),
    }
}

/// Plain text: the file as-is, titled after its file stem.
fn parse_txt(path: &Path) -> Result<ParsedBook> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string();

    Ok(ParsedBook { title, content })
}

/// EPUB: walk the spine in reading order and flatten every document
/// to plain text.
fn parse_epub(path: &Path) -> Result<ParsedBook> {
    let mut doc = epub::doc::EpubDoc::new(path)
        .map_err(|e| anyhow::anyhow!("failed to open EPUB {}: {e}", path.display()))?;

    let title = doc
        .mdata("title")
        .map(|m| m.value.clone())
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "Untitled".to_string());

    let spine = doc.spine.clone();
    let mut sections = Vec::new();

    for spine_item in spine.iter() {
        if let Some((bytes, _mime)) = doc.get_resource(&spine_item.idref) {
            let html = String::from_utf8_lossy(&bytes);
            let text = flatten_html(&html);
            if !text.trim().is_empty() {
                sections.push(text);
            }
        }
    }

    if sections.is_empty() {
        anyhow::bail!("EPUB {} contains no readable text", path.display());
    }

    Ok(ParsedBook {
        title,
        content: sections.join("\n\n"),
    })
}

/// Convert one HTML document to narration-ready plain text: joined
/// lines within a paragraph, blank lines between paragraphs.
fn flatten_html(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 1000);

    let mut result = String::new();
    let mut prev_was_blank = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if !prev_was_blank && !result.is_empty() {
                result.push_str("\n\n");
                prev_was_blank = true;
            }
            continue;
        }

        prev_was_blank = false;
        if !result.is_empty() && !result.ends_with('\n') {
            result.push(' ');
        }
        result.push_str(trimmed);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_txt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("o-cortico.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "First paragraph.\n\nSecond paragraph.").unwrap();

        let book = parse_book(&path).unwrap();
        assert_eq!(book.title, "o-cortico");
        assert_eq!(book.content, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_book(Path::new("/books/novel.mobi")).unwrap_err();
        assert!(err.to_string().contains(".mobi"));
    }

    #[test]
    fn test_missing_extension() {
        assert!(parse_book(Path::new("/books/novel")).is_err());
    }

    #[test]
    fn test_flatten_html_joins_wrapped_lines() {
        let text = flatten_html("<p>one\ntwo</p><p>three</p>");
        assert_eq!(text, "one two\n\nthree");
    }

    #[test]
    fn test_flatten_html_collapses_blank_runs() {
        let text = flatten_html("<p>alpha</p>\n\n\n\n<p>beta</p>");
        assert_eq!(text, "alpha\n\nbeta");
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn test_flatten_html_empty_document() {
        assert_eq!(flatten_html("<html><body></body></html>"), "");
    }
}
