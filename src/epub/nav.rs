//! The navigation document.

use crate::epub::ids::page_doc_name;
use crate::model::DocumentStructure;
use quick_xml::escape::escape;

/// Build `nav.xhtml` from the document's table of contents.
///
/// Falls back to one entry per page when no headings were detected, so the
/// archive always has a usable navigation surface.
pub fn build_nav_document(doc: &DocumentStructure) -> String {
    let mut items = String::new();

    if doc.table_of_contents.is_empty() {
        for page in &doc.pages {
            items.push_str(&format!(
                "      <li><a href=\"{}\">Page {}</a></li>\n",
                page_doc_name(page.page_number),
                page.page_number
            ));
        }
    } else {
        for entry in &doc.table_of_contents {
            let href = if entry.block_id.is_empty() {
                page_doc_name(entry.page_number)
            } else {
                format!("{}#{}", page_doc_name(entry.page_number), entry.block_id)
            };
            items.push_str(&format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                escape(&href),
                escape(&entry.title)
            ));
        }
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" \
         xmlns:epub=\"http://www.idpf.org/2007/ops\">\n\
         <head>\n\
         \x20 <meta charset=\"utf-8\"/>\n\
         \x20 <title>{title}</title>\n\
         </head>\n\
         <body>\n\
         \x20 <nav epub:type=\"toc\" id=\"toc\">\n\
         \x20   <h1>Contents</h1>\n\
         \x20   <ol>\n\
         {items}\
         \x20   </ol>\n\
         \x20 </nav>\n\
         </body>\n\
         </html>\n",
        title = escape(&doc.metadata.title),
        items = items,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentMetadata, PageStructure, TocEntry};

    #[test]
    fn test_nav_uses_toc_entries() {
        let mut doc = DocumentStructure::new(DocumentMetadata::with_title("Horses"));
        doc.table_of_contents.push(TocEntry {
            title: "ALL ABOUT HORSES".to_string(),
            page_number: 1,
            level: 1,
            block_id: "p0001_head_001".to_string(),
        });
        let nav = build_nav_document(&doc);
        assert!(nav.contains("href=\"page_0001.xhtml#p0001_head_001\""));
        assert!(nav.contains(">ALL ABOUT HORSES</a>"));
        assert!(nav.contains("epub:type=\"toc\""));
    }

    #[test]
    fn test_nav_falls_back_to_page_entries() {
        let mut doc = DocumentStructure::new(DocumentMetadata::with_title("Horses"));
        doc.pages.push(PageStructure::new(1, 612.0, 792.0));
        doc.pages.push(PageStructure::new(2, 612.0, 792.0));
        let nav = build_nav_document(&doc);
        assert!(nav.contains(">Page 1</a>"));
        assert!(nav.contains(">Page 2</a>"));
    }
}
