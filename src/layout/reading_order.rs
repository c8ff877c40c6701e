//! Reading-order resolution and two-page-spread detection.
//!
//! Spread detection always runs before ordering: whether a page image holds
//! two facing source pages changes the ordering strategy, so the flag must
//! be final first. After this module runs, each block's `reading_order`
//! value is authoritative for every downstream consumer; insertion order
//! must never be used as a substitute.

use crate::model::{PageStructure, TextBlock};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Candidate folio number: a bare 1-2 digit numeral.
    static ref FOLIO: Regex = Regex::new(r"^\d{1,2}$").unwrap();
}

/// Fraction of page height considered "the bottom of the page" for folio
/// number detection.
const FOLIO_BAND: f32 = 0.15;

/// Minimum gutter width, as a fraction of page width, for the weak spread
/// signal.
const GUTTER_FRACTION: f32 = 0.10;

/// Minimum share of all blocks each half must hold for the weak balance
/// signal.
const BALANCE_FRACTION: f32 = 0.20;

/// Detect whether a page image contains two facing source pages.
///
/// Strong signal: two or more bare 1-2 digit numerals near the bottom of the
/// page — facing pages each carry a folio number. Weak signal (only when the
/// strong one is absent): the blocks split cleanly left/right of the page
/// midpoint with either a wide gutter between the halves or a substantial
/// share of blocks on each side. A block straddling the midpoint defeats the
/// weak signal; a real spread has an empty gutter.
pub fn detect_two_page_spread(blocks: &[TextBlock], page_width: f32, page_height: f32) -> bool {
    let folio_count = blocks
        .iter()
        .filter(|b| {
            FOLIO.is_match(b.text.trim())
                && b.bounding_box
                    .map(|bb| bb.top() < FOLIO_BAND * page_height)
                    .unwrap_or(false)
        })
        .count();
    if folio_count >= 2 {
        return true;
    }

    let positioned: Vec<_> = blocks.iter().filter_map(|b| b.bounding_box).collect();
    if positioned.len() < 2 {
        return false;
    }

    let midpoint = page_width / 2.0;
    if positioned
        .iter()
        .any(|bb| bb.left() < midpoint && bb.right() > midpoint)
    {
        return false;
    }

    let left: Vec<_> = positioned.iter().filter(|bb| bb.right() <= midpoint).collect();
    let right: Vec<_> = positioned.iter().filter(|bb| bb.left() >= midpoint).collect();
    if left.is_empty() || right.is_empty() {
        return false;
    }

    let left_extent = left.iter().map(|bb| bb.right()).fold(f32::MIN, f32::max);
    let right_extent = right.iter().map(|bb| bb.left()).fold(f32::MAX, f32::min);
    let gap = right_extent - left_extent;

    let total = positioned.len() as f32;
    let balanced = left.len() as f32 >= BALANCE_FRACTION * total
        && right.len() as f32 >= BALANCE_FRACTION * total;

    gap > GUTTER_FRACTION * page_width || balanced
}

/// Resolve the page's reading order in place.
///
/// Runs spread detection first, orders non-excluded blocks (single sequence,
/// or left half before right half for spreads), then reassigns each block's
/// `reading_order` as 1..=N and records the index permutation on the page.
/// Blocks without coordinates sort last in insertion order. Excluded blocks
/// (suppressed headers/footers) keep `reading_order` 0 and never occupy a
/// slot in the main sequence.
pub fn resolve_reading_order(page: &mut PageStructure) {
    page.is_two_page_spread =
        detect_two_page_spread(&page.text_blocks, page.width, page.height);

    let candidates: Vec<usize> = (0..page.text_blocks.len())
        .filter(|&i| !page.text_blocks[i].exclude_from_reading_order)
        .collect();

    let (mut positioned, positionless): (Vec<usize>, Vec<usize>) = candidates
        .into_iter()
        .partition(|&i| page.text_blocks[i].bounding_box.is_some());

    let order: Vec<usize> = if page.is_two_page_spread {
        let midpoint = page.width / 2.0;
        let (mut left, mut right): (Vec<usize>, Vec<usize>) = positioned
            .into_iter()
            .partition(|&i| center_x(&page.text_blocks[i]) < midpoint);
        sort_top_down(&mut left, &page.text_blocks);
        sort_top_down(&mut right, &page.text_blocks);
        left.into_iter()
            .chain(right)
            .chain(positionless)
            .collect()
    } else {
        sort_top_down(&mut positioned, &page.text_blocks);
        positioned.into_iter().chain(positionless).collect()
    };

    for block in &mut page.text_blocks {
        block.reading_order = 0;
    }
    for (rank, &idx) in order.iter().enumerate() {
        page.text_blocks[idx].reading_order = rank as u32 + 1;
    }
    page.reading_order = order;
}

fn center_x(block: &TextBlock) -> f32 {
    block.bounding_box.map(|bb| bb.center().x).unwrap_or(0.0)
}

/// Sort block indices by top edge descending (top of page first), then left
/// edge ascending. Stable with total comparisons, so ties preserve insertion
/// order and the result is deterministic.
fn sort_top_down(indices: &mut [usize], blocks: &[TextBlock]) {
    indices.sort_by(|&a, &b| {
        let ba = blocks[a].bounding_box.expect("positioned partition");
        let bb = blocks[b].bounding_box.expect("positioned partition");
        bb.top()
            .total_cmp(&ba.top())
            .then_with(|| ba.left().total_cmp(&bb.left()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn mock_block(text: &str, x: f32, y: f32, w: f32, h: f32) -> TextBlock {
        TextBlock::new(text, Some(BoundingBox::new(1, x, y, w, h)))
    }

    fn mock_page(blocks: Vec<TextBlock>) -> PageStructure {
        let mut page = PageStructure::new(1, 612.0, 792.0);
        page.text_blocks = blocks;
        page
    }

    #[test]
    fn test_folio_numbers_signal_spread() {
        // Two short numerals in the bottom band of the page.
        let blocks = vec![
            mock_block("Some content on the left side", 40.0, 400.0, 200.0, 14.0),
            mock_block("10", 140.0, 30.0, 14.0, 12.0),
            mock_block("11", 460.0, 30.0, 14.0, 12.0),
        ];
        assert!(detect_two_page_spread(&blocks, 612.0, 792.0));
    }

    #[test]
    fn test_single_column_is_not_spread() {
        // One column of text spanning the midpoint, no folio numerals.
        let blocks = vec![
            mock_block("First paragraph of body text", 72.0, 700.0, 460.0, 14.0),
            mock_block("Second paragraph of body text", 72.0, 660.0, 460.0, 14.0),
            mock_block("Third paragraph", 72.0, 620.0, 300.0, 14.0),
        ];
        assert!(!detect_two_page_spread(&blocks, 612.0, 792.0));
    }

    #[test]
    fn test_wide_gutter_signals_spread() {
        let blocks = vec![
            mock_block("Left page text", 20.0, 700.0, 200.0, 14.0),
            mock_block("More left text", 20.0, 660.0, 200.0, 14.0),
            mock_block("Right page text", 380.0, 700.0, 200.0, 14.0),
        ];
        // Gap from 220 to 380 is 160pt > 10% of 612.
        assert!(detect_two_page_spread(&blocks, 612.0, 792.0));
    }

    #[test]
    fn test_folio_at_top_of_page_is_not_a_folio() {
        // Numerals high on the page (e.g. dates) are not folio candidates.
        let blocks = vec![
            mock_block("12", 100.0, 700.0, 14.0, 12.0),
            mock_block("34", 400.0, 700.0, 14.0, 12.0),
            mock_block("Body text spanning much of the page width", 72.0, 400.0, 460.0, 14.0),
        ];
        assert!(!detect_two_page_spread(&blocks, 612.0, 792.0));
    }

    #[test]
    fn test_ordering_top_down_left_right() {
        let mut page = mock_page(vec![
            mock_block("bottom", 72.0, 100.0, 100.0, 14.0),
            mock_block("top right", 300.0, 700.0, 100.0, 14.0),
            mock_block("top left", 72.0, 700.0, 100.0, 14.0),
        ]);
        resolve_reading_order(&mut page);

        let texts: Vec<&str> = page
            .blocks_in_reading_order()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(texts, vec!["top left", "top right", "bottom"]);
        assert_eq!(page.text_blocks[2].reading_order, 1);
        assert_eq!(page.text_blocks[1].reading_order, 2);
        assert_eq!(page.text_blocks[0].reading_order, 3);
    }

    #[test]
    fn test_spread_orders_left_half_first() {
        let mut page = mock_page(vec![
            // Right page, top.
            mock_block("right top", 380.0, 700.0, 180.0, 14.0),
            // Left page, two lines.
            mock_block("left top", 20.0, 700.0, 180.0, 14.0),
            mock_block("left bottom", 20.0, 400.0, 180.0, 14.0),
            // Right page, bottom.
            mock_block("right bottom", 380.0, 400.0, 180.0, 14.0),
        ]);
        resolve_reading_order(&mut page);

        assert!(page.is_two_page_spread);
        let texts: Vec<&str> = page
            .blocks_in_reading_order()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec!["left top", "left bottom", "right top", "right bottom"]
        );
    }

    #[test]
    fn test_reading_order_is_gapless_permutation() {
        let mut page = mock_page(vec![
            mock_block("a", 72.0, 700.0, 100.0, 14.0),
            mock_block("b", 72.0, 650.0, 100.0, 14.0),
            mock_block("c", 72.0, 600.0, 100.0, 14.0),
            mock_block("d", 72.0, 550.0, 100.0, 14.0),
        ]);
        resolve_reading_order(&mut page);

        let mut orders: Vec<u32> = page.text_blocks.iter().map(|b| b.reading_order).collect();
        orders.sort_unstable();
        assert_eq!(orders, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_excluded_blocks_do_not_shift_numbering() {
        let mut footer = mock_block("42", 290.0, 20.0, 20.0, 12.0);
        footer.exclude_from_reading_order = true;
        let mut page = mock_page(vec![
            mock_block("body one", 72.0, 700.0, 100.0, 14.0),
            footer,
            mock_block("body two", 72.0, 600.0, 100.0, 14.0),
        ]);
        resolve_reading_order(&mut page);

        assert_eq!(page.text_blocks[0].reading_order, 1);
        assert_eq!(page.text_blocks[2].reading_order, 2);
        assert_eq!(page.text_blocks[1].reading_order, 0);
        assert_eq!(page.reading_order, vec![0, 2]);
    }

    #[test]
    fn test_positionless_blocks_sort_last_in_insertion_order() {
        let mut page = mock_page(vec![
            TextBlock::new("no coords first", None),
            mock_block("positioned", 72.0, 700.0, 100.0, 14.0),
            TextBlock::new("no coords second", None),
        ]);
        resolve_reading_order(&mut page);

        let texts: Vec<&str> = page
            .blocks_in_reading_order()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec!["positioned", "no coords first", "no coords second"]
        );
    }

    #[test]
    fn test_detection_precedes_ordering() {
        // The flag must be set even though ordering also ran.
        let mut page = mock_page(vec![
            mock_block("10", 140.0, 30.0, 14.0, 12.0),
            mock_block("11", 460.0, 30.0, 14.0, 12.0),
        ]);
        resolve_reading_order(&mut page);
        assert!(page.is_two_page_spread);
        assert_eq!(page.reading_order.len(), 2);
    }
}
