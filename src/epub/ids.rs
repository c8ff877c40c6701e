//! Deterministic identifier assignment.
//!
//! Every identifier shared between independently generated archive files is
//! produced here and nowhere else. The content-document generator and the
//! synchronization generator both call [`element_id`]; the `_li` suffix for
//! list items exists in exactly this one place, so the two files cannot
//! drift apart.

use crate::model::{BlockType, PageStructure, TextBlock};

/// Deterministic block identifier from pure inputs.
///
/// URL-fragment-safe: lowercase letters, digits and underscores only.
///
/// # Examples
///
/// ```
/// use readalong::epub::ids::block_id;
/// use readalong::model::BlockType;
///
/// assert_eq!(block_id(3, BlockType::Paragraph, 2), "p0003_para_002");
/// assert_eq!(block_id(12, BlockType::Heading, 1), "p0012_head_001");
/// ```
pub fn block_id(page_number: u32, block_type: BlockType, reading_order: u32) -> String {
    format!(
        "p{:04}_{}_{:03}",
        page_number,
        block_type.slug(),
        reading_order
    )
}

/// The element id used in both the content document and the synchronization
/// document for a block. List items get the `_li` variant.
pub fn element_id(block: &TextBlock) -> String {
    if block.block_type == BlockType::ListItem {
        format!("{}_li", block.id)
    } else {
        block.id.clone()
    }
}

/// Assign final ids to a page's blocks.
///
/// Runs once, after classification and reading-order resolution are final;
/// ids never change afterwards. Blocks excluded from the reading flow have
/// no reading-order slot and are never referenced by synchronization files,
/// so they keep an empty id.
pub fn assign_block_ids(page: &mut PageStructure) {
    let page_number = page.page_number;
    for block in &mut page.text_blocks {
        if block.exclude_from_reading_order {
            block.id = String::new();
        } else {
            block.id = block_id(page_number, block.block_type, block.reading_order);
        }
    }
}

/// Content document file name for a page.
pub fn page_doc_name(page_number: u32) -> String {
    format!("page_{:04}.xhtml", page_number)
}

/// Synchronization document file name for a page.
pub fn smil_name(page_number: u32) -> String {
    format!("page_{:04}.smil", page_number)
}

/// Archive path of a page's rendered image, given its file extension.
pub fn image_name(page_number: u32, ext: &str) -> String {
    format!("page_{:04}.{}", page_number, ext)
}

/// Manifest item id for a page's content document.
pub fn page_item_id(page_number: u32) -> String {
    format!("page{:04}", page_number)
}
