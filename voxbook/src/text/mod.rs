//! Text model: paragraph blocks, segmentation, and position tracking.

pub mod position;
pub mod segmenter;

pub use segmenter::{segment_from, Segment};

/// One paragraph-level unit of a parsed book.
///
/// Blocks are created once when a book's content is split and are
/// immutable afterwards. `start` is the absolute character offset of
/// the block's first character in the full document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    /// 0-based position in document order.
    pub index: usize,
    /// Absolute character offset into the full text.
    pub start: usize,
    /// Paragraph text, trimmed of surrounding whitespace.
    pub text: String,
}

impl TextBlock {
    /// Character length of the block text.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Split book content into paragraph blocks.
///
/// Paragraph boundaries are blank lines (lines that are empty after
/// trimming). Whitespace-only paragraphs are dropped. Offsets are
/// character offsets into `content`, non-decreasing in block order.
pub fn blocks(content: &str) -> Vec<TextBlock> {
    let lines = lines_with_offsets(content);

    let mut out: Vec<TextBlock> = Vec::new();
    let mut para: Vec<&(usize, String)> = Vec::new();

    let mut flush = |para: &mut Vec<&(usize, String)>, out: &mut Vec<TextBlock>| {
        if para.is_empty() {
            return;
        }
        let joined = para
            .iter()
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let text = joined.trim().to_string();
        if !text.is_empty() {
            let (first_offset, first_line) = para[0];
            let leading_ws = first_line.chars().take_while(|c| c.is_whitespace()).count();
            out.push(TextBlock {
                index: out.len(),
                start: first_offset + leading_ws,
                text,
            });
        }
        para.clear();
    };

    for entry in &lines {
        if entry.1.trim().is_empty() {
            flush(&mut para, &mut out);
        } else {
            para.push(entry);
        }
    }
    flush(&mut para, &mut out);

    out
}

/// Split content into lines, tracking the character offset of each.
fn lines_with_offsets(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut line_start = 0usize;
    let mut pos = 0usize;

    for ch in content.chars() {
        if ch == '\n' {
            lines.push((line_start, std::mem::take(&mut current)));
            pos += 1;
            line_start = pos;
        } else {
            current.push(ch);
            pos += 1;
        }
    }
    lines.push((line_start, current));

    lines
}
