//! Greedy segmentation of text blocks into speakable segments.

use super::TextBlock;

/// Default maximum characters per synthesized segment.
pub const DEFAULT_SEGMENT_BUDGET: usize = 1000;

/// Separator inserted between blocks joined into one segment.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// A contiguous run of blocks whose joined text fits the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Index of the first block in the segment.
    pub start_block: usize,
    /// Index of the last block (inclusive).
    pub end_block: usize,
    /// Block texts joined by [`BLOCK_SEPARATOR`].
    pub text: String,
}

impl Segment {
    /// Number of blocks covered by this segment.
    pub fn block_count(&self) -> usize {
        self.end_block - self.start_block + 1
    }
}

/// Compute the segment starting at `start_block`.
///
/// Packs blocks left-to-right until adding the next block would push
/// the joined text past `budget` characters. The first block is always
/// included even when it alone exceeds the budget, so an oversized
/// paragraph can never stall segmentation. Returns `None` when
/// `start_block` is past the last block or the accumulated text is
/// blank.
pub fn segment_from(blocks: &[TextBlock], start_block: usize, budget: usize) -> Option<Segment> {
    if start_block >= blocks.len() {
        return None;
    }

    let mut text = String::new();
    let mut end_block = start_block;

    for block in &blocks[start_block..] {
        let candidate_len = if text.is_empty() {
            block.len()
        } else {
            text.chars().count() + BLOCK_SEPARATOR.len() + block.len()
        };
        if candidate_len > budget && !text.is_empty() {
            break;
        }
        if !text.is_empty() {
            text.push_str(BLOCK_SEPARATOR);
        }
        text.push_str(&block.text);
        end_block = block.index;
    }

    if text.trim().is_empty() {
        return None;
    }

    Some(Segment {
        start_block,
        end_block,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_blocks(lengths: &[usize]) -> Vec<TextBlock> {
        let mut start = 0;
        lengths
            .iter()
            .enumerate()
            .map(|(index, &len)| {
                let block = TextBlock {
                    index,
                    start,
                    text: "x".repeat(len),
                };
                start += len + 2;
                block
            })
            .collect()
    }

    #[test]
    fn test_segment_packs_until_budget() {
        // 400 + 2 + 300 = 702 fits; adding 500 would make 1207
        let blocks = make_blocks(&[400, 300, 500]);

        let first = segment_from(&blocks, 0, 1000).unwrap();
        assert_eq!(first.start_block, 0);
        assert_eq!(first.end_block, 1);
        assert_eq!(first.text.chars().count(), 702);

        let second = segment_from(&blocks, 2, 1000).unwrap();
        assert_eq!(second.start_block, 2);
        assert_eq!(second.end_block, 2);

        assert!(segment_from(&blocks, 3, 1000).is_none());
    }

    #[test]
    fn test_oversized_first_block_included_alone() {
        let blocks = make_blocks(&[1500, 10]);
        let seg = segment_from(&blocks, 0, 1000).unwrap();
        assert_eq!(seg.start_block, 0);
        assert_eq!(seg.end_block, 0);
        assert_eq!(seg.text.chars().count(), 1500);
    }

    #[test]
    fn test_past_end_returns_none() {
        let blocks = make_blocks(&[10]);
        assert!(segment_from(&blocks, 1, 1000).is_none());
        assert!(segment_from(&[], 0, 1000).is_none());
    }

    #[test]
    fn test_separator_is_two_chars() {
        let blocks = make_blocks(&[3, 3]);
        let seg = segment_from(&blocks, 0, 1000).unwrap();
        assert_eq!(seg.text, "xxx\n\nxxx");
    }

    #[test]
    fn test_deterministic() {
        let blocks = make_blocks(&[120, 340, 90, 700, 15]);
        let a = segment_from(&blocks, 1, 500);
        let b = segment_from(&blocks, 1, 500);
        assert_eq!(a, b);
    }

    proptest! {
        /// Segmenting repeatedly from block 0 partitions every block
        /// exactly once, and each segment respects the budget unless a
        /// single block alone exceeds it.
        #[test]
        fn prop_segments_partition_blocks(
            lengths in proptest::collection::vec(1usize..200, 1..40),
            budget in 1usize..600,
        ) {
            let blocks = make_blocks(&lengths);
            let mut next = 0usize;
            let mut covered = Vec::new();

            while let Some(seg) = segment_from(&blocks, next, budget) {
                prop_assert_eq!(seg.start_block, next);
                prop_assert!(seg.end_block >= seg.start_block);
                covered.extend(seg.start_block..=seg.end_block);

                let len = seg.text.chars().count();
                if seg.block_count() > 1 {
                    prop_assert!(len <= budget);
                } else {
                    // A single block may legitimately exceed the budget.
                    prop_assert_eq!(len, blocks[seg.start_block].len());
                }

                next = seg.end_block + 1;
            }

            prop_assert_eq!(next, blocks.len());
            let expected: Vec<usize> = (0..blocks.len()).collect();
            prop_assert_eq!(covered, expected);
        }
    }
}
