//! Semantic classification of text blocks.
//!
//! Classification is a chain of ordered heuristics; the first match wins and
//! the order is load-bearing (a bulleted line that happens to be all caps is
//! a list item, not a heading). An optional external classifier can override
//! the heuristic result, but the heuristics always run first so the system
//! stays fully functional with the external service disabled.

use crate::model::{BlockType, PageStructure};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Numbered, lettered or bulleted list prefix.
    static ref LIST_PREFIX: Regex =
        Regex::new(r"^\s*(?:[-•*‣▪]|\(?\d{1,3}[.)]|\(?[a-zA-Z][.)])\s+").unwrap();
    /// "Chapter N" style heading.
    static ref CHAPTER: Regex = Regex::new(r"(?i)^chapter\s+\d+").unwrap();
    /// "N." numbered section heading.
    static ref NUMBERED_SECTION: Regex = Regex::new(r"^\d+\.\s+").unwrap();
    /// "N.M" numbered subsection heading.
    static ref NUMBERED_SUBSECTION: Regex = Regex::new(r"^\d+\.\d+").unwrap();
    /// "Word: definition" glossary entry.
    static ref GLOSSARY: Regex =
        Regex::new(r"^[A-Z][A-Za-z'\-]*(?:\s+[A-Za-z'\-]+){0,3}:\s+\S").unwrap();
    /// Bare page number.
    static ref PAGE_NUMBER: Regex = Regex::new(r"^\d{1,4}$").unwrap();
    /// "Page N" / "Page N of M" folio text.
    static ref PAGE_LABEL: Regex = Regex::new(r"(?i)^page\s+\d+(\s+of\s+\d+)?$").unwrap();
    /// A standalone number somewhere in running-header boilerplate.
    static ref EMBEDDED_NUMBER: Regex = Regex::new(r"(^|\s)\d{1,4}(\s|$)").unwrap();
}

/// Fraction of page height forming the header and footer suppression bands.
const BAND_FRACTION: f32 = 0.10;

/// Classify one block's text.
///
/// Returns the block type and, for headings recognized with a level, that
/// level. Headings recognized without a level (all-caps lines) report
/// `None`; consumers treat that as level 1.
pub fn classify(text: &str) -> (BlockType, Option<u8>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (BlockType::Paragraph, None);
    }

    // 1. List prefix.
    if LIST_PREFIX.is_match(trimmed) {
        return (BlockType::ListItem, None);
    }

    // 2. Short all-uppercase line.
    if trimmed.len() < 100
        && trimmed.len() > 3
        && trimmed.chars().any(|c| c.is_alphabetic())
        && !trimmed.chars().any(|c| c.is_lowercase())
    {
        return (BlockType::Heading, None);
    }

    // 3. Title-case phrase without terminal sentence punctuation.
    if trimmed.len() < 60
        && trimmed.len() > 3
        && is_title_case(trimmed)
        && !ends_like_sentence(trimmed)
    {
        let level = if trimmed.len() < 40 { 1 } else { 2 };
        return (BlockType::Heading, Some(level));
    }

    // 4. Chapter and numbered-section headings.
    if CHAPTER.is_match(trimmed) {
        return (BlockType::Heading, Some(1));
    }
    if NUMBERED_SUBSECTION.is_match(trimmed) {
        return (BlockType::Heading, Some(3));
    }
    if NUMBERED_SECTION.is_match(trimmed) {
        return (BlockType::Heading, Some(2));
    }

    // 5. Glossary entry.
    if GLOSSARY.is_match(trimmed) {
        return (BlockType::GlossaryTerm, None);
    }

    // 6. Default.
    (BlockType::Paragraph, None)
}

/// Every word starts with an uppercase letter (small connective words are
/// allowed lowercase after the first word).
fn is_title_case(text: &str) -> bool {
    const SMALL_WORDS: [&str; 12] = [
        "a", "an", "the", "of", "and", "or", "in", "on", "at", "by", "for", "to",
    ];
    let mut words = text.split_whitespace().enumerate().peekable();
    if words.peek().is_none() {
        return false;
    }
    let mut capitalized = 0;
    for (i, word) in words {
        let Some(first) = word.chars().find(|c| c.is_alphabetic()) else {
            return false;
        };
        if first.is_uppercase() {
            capitalized += 1;
        } else if i == 0 || !SMALL_WORDS.contains(&word.to_lowercase().as_str()) {
            return false;
        }
    }
    capitalized > 0
}

fn ends_like_sentence(text: &str) -> bool {
    matches!(text.chars().last(), Some('.') | Some('!') | Some('?'))
}

/// Suppress running headers and footers on one page.
///
/// Blocks inside the top or bottom 10% of the page whose text looks like a
/// page number or short boilerplate are reclassified `HEADER`/`FOOTER` and
/// marked excluded. They stay in the page's block list for completeness but
/// are dropped from the read-aloud flow; the caller re-resolves reading
/// order afterwards so content numbering never shifts around them.
pub fn suppress_headers_footers(page: &mut PageStructure) {
    let top_band = page.height * (1.0 - BAND_FRACTION);
    let bottom_band = page.height * BAND_FRACTION;

    for block in &mut page.text_blocks {
        let Some(bbox) = block.bounding_box else {
            continue;
        };
        let in_top = bbox.bottom() >= top_band;
        let in_bottom = bbox.top() <= bottom_band;
        if !(in_top || in_bottom) {
            continue;
        }
        if !is_boilerplate(&block.text) {
            continue;
        }
        block.block_type = if in_top {
            BlockType::Header
        } else {
            BlockType::Footer
        };
        block.exclude_from_reading_order = true;
        block.heading_level = None;
    }
}

/// Page-number or short running-header boilerplate.
fn is_boilerplate(text: &str) -> bool {
    let trimmed = text.trim();
    if PAGE_NUMBER.is_match(trimmed) || PAGE_LABEL.is_match(trimmed) {
        return true;
    }
    trimmed.len() <= 60
        && trimmed.split_whitespace().count() <= 5
        && EMBEDDED_NUMBER.is_match(trimmed)
        && !ends_like_sentence(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::layout::reading_order::resolve_reading_order;
    use crate::model::TextBlock;

    #[test]
    fn test_bulleted_list_item() {
        assert_eq!(classify("• Horses eat hay").0, BlockType::ListItem);
        assert_eq!(classify("- dash item").0, BlockType::ListItem);
        assert_eq!(classify("* star item").0, BlockType::ListItem);
    }

    #[test]
    fn test_numbered_and_lettered_list_items() {
        assert_eq!(classify("1. first thing").0, BlockType::ListItem);
        assert_eq!(classify("12) twelfth thing").0, BlockType::ListItem);
        assert_eq!(classify("a) lettered").0, BlockType::ListItem);
        assert_eq!(classify("B. lettered").0, BlockType::ListItem);
    }

    #[test]
    fn test_list_prefix_wins_over_all_caps() {
        // Precedence: the list rule runs before the all-caps heading rule.
        let (block_type, _) = classify("• ALL CAPS ITEM");
        assert_eq!(block_type, BlockType::ListItem);
    }

    #[test]
    fn test_all_caps_heading_without_level() {
        let (block_type, level) = classify("ALL ABOUT HORSES");
        assert_eq!(block_type, BlockType::Heading);
        assert_eq!(level, None);
    }

    #[test]
    fn test_all_caps_too_short_or_too_long() {
        assert_eq!(classify("AB").0, BlockType::Paragraph);
        let long = "VERY LONG SHOUTED SENTENCE THAT GOES ON AND ON WELL PAST THE \
                    ONE HUNDRED CHARACTER THRESHOLD FOR HEADINGS YES";
        assert_eq!(classify(long).0, BlockType::Paragraph);
    }

    #[test]
    fn test_title_case_heading_levels() {
        let (block_type, level) = classify("A Day at the Farm");
        assert_eq!(block_type, BlockType::Heading);
        assert_eq!(level, Some(1));

        let (block_type, level) = classify("The Long History of Horse Domestication Today");
        assert_eq!(block_type, BlockType::Heading);
        assert_eq!(level, Some(2));
    }

    #[test]
    fn test_title_case_with_period_is_not_heading() {
        assert_eq!(classify("The Horse Ran Away.").0, BlockType::Paragraph);
    }

    #[test]
    fn test_chapter_heading() {
        let (block_type, level) = classify("Chapter 3 concerns feeding habits");
        assert_eq!(block_type, BlockType::Heading);
        assert_eq!(level, Some(1));
    }

    #[test]
    fn test_numbered_subsection_heading() {
        let (block_type, level) = classify("2.4 Grooming your horse daily");
        assert_eq!(block_type, BlockType::Heading);
        assert_eq!(level, Some(3));
    }

    #[test]
    fn test_glossary_term() {
        let (block_type, _) = classify("Farrier: a person who shoes horses");
        assert_eq!(block_type, BlockType::GlossaryTerm);
    }

    #[test]
    fn test_default_paragraph() {
        let (block_type, _) =
            classify("The horse trotted along the fence line, looking for a gate.");
        assert_eq!(block_type, BlockType::Paragraph);
    }

    #[test]
    fn test_footer_suppression_keeps_numbering_stable() {
        let mut page = PageStructure::new(1, 612.0, 792.0);
        page.text_blocks = vec![
            TextBlock::new("Body paragraph one", Some(BoundingBox::new(1, 72.0, 700.0, 400.0, 14.0))),
            TextBlock::new("42", Some(BoundingBox::new(1, 290.0, 20.0, 20.0, 12.0))),
            TextBlock::new("Body paragraph two", Some(BoundingBox::new(1, 72.0, 600.0, 400.0, 14.0))),
        ];
        suppress_headers_footers(&mut page);
        resolve_reading_order(&mut page);

        assert_eq!(page.text_blocks[1].block_type, BlockType::Footer);
        assert!(page.text_blocks[1].exclude_from_reading_order);
        assert_eq!(page.text_blocks[1].reading_order, 0);
        // Real content numbering is unaffected by the suppressed folio.
        assert_eq!(page.text_blocks[0].reading_order, 1);
        assert_eq!(page.text_blocks[2].reading_order, 2);
        // The block stays in the page list for debugging.
        assert_eq!(page.text_blocks.len(), 3);
    }

    #[test]
    fn test_header_band_boilerplate() {
        let mut page = PageStructure::new(1, 612.0, 792.0);
        page.text_blocks = vec![TextBlock::new(
            "HORSES | 7",
            Some(BoundingBox::new(1, 72.0, 770.0, 100.0, 12.0)),
        )];
        suppress_headers_footers(&mut page);
        assert_eq!(page.text_blocks[0].block_type, BlockType::Header);
    }

    #[test]
    fn test_mid_page_number_is_not_suppressed() {
        let mut page = PageStructure::new(1, 612.0, 792.0);
        page.text_blocks = vec![TextBlock::new(
            "42",
            Some(BoundingBox::new(1, 72.0, 400.0, 20.0, 12.0)),
        )];
        suppress_headers_footers(&mut page);
        assert_eq!(page.text_blocks[0].block_type, BlockType::Paragraph);
        assert!(!page.text_blocks[0].exclude_from_reading_order);
    }

    #[test]
    fn test_real_sentence_in_footer_band_survives() {
        let mut page = PageStructure::new(1, 612.0, 792.0);
        page.text_blocks = vec![TextBlock::new(
            "The foal was born at midnight in the spring.",
            Some(BoundingBox::new(1, 72.0, 30.0, 400.0, 14.0)),
        )];
        suppress_headers_footers(&mut page);
        assert!(!page.text_blocks[0].exclude_from_reading_order);
    }
}
