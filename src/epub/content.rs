//! Fixed-layout content documents.
//!
//! Each source page becomes one pre-paginated XHTML document: the rendered
//! page image fills the canvas and a visually-hidden text layer carries the
//! page's blocks in reading order for assistive technology. Element ids in
//! the text layer come from `epub::ids`, the same function the
//! synchronization generator uses, so media-overlay anchors always resolve.

use crate::epub::ids::element_id;
use crate::epub::sanitize::is_speakable;
use crate::model::{BlockType, PageStructure, TextBlock};
use quick_xml::escape::escape;

/// Pixel dimensions of the page canvas.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    /// Canvas width in CSS pixels
    pub width: u32,
    /// Canvas height in CSS pixels
    pub height: u32,
}

/// Build one page's XHTML content document.
///
/// `image_href` is the archive-relative path of the rendered page image, or
/// `None` for a text-only page (image rendering unavailable). Only speakable
/// blocks enter the text layer; consecutive list items are grouped into one
/// list element.
pub fn build_page_document(
    page: &PageStructure,
    language: &str,
    viewport: Viewport,
    image_href: Option<&str>,
) -> String {
    let mut body = String::new();

    if let Some(href) = image_href {
        let alt = page
            .page_image()
            .map(|img| img.alt_text.clone())
            .unwrap_or_else(|| format!("Page {}", page.page_number));
        body.push_str(&format!(
            "    <img class=\"page-image\" src=\"{}\" alt=\"{}\"/>\n",
            escape(href),
            escape(&alt)
        ));
    }

    body.push_str("    <div class=\"text-layer\">\n");
    let spoken: Vec<&TextBlock> = page
        .blocks_in_reading_order()
        .filter(|b| is_speakable(b))
        .collect();
    let mut i = 0;
    while i < spoken.len() {
        let block = spoken[i];
        if block.block_type == BlockType::ListItem {
            body.push_str("      <ul>\n");
            while i < spoken.len() && spoken[i].block_type == BlockType::ListItem {
                body.push_str(&format!(
                    "        <li id=\"{}\">{}</li>\n",
                    element_id(spoken[i]),
                    escape(&spoken[i].text)
                ));
                i += 1;
            }
            body.push_str("      </ul>\n");
        } else {
            body.push_str(&render_block(block));
            i += 1;
        }
    }
    body.push_str("    </div>\n");

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" \
         xmlns:epub=\"http://www.idpf.org/2007/ops\" \
         xml:lang=\"{lang}\" lang=\"{lang}\">\n\
         <head>\n\
         \x20 <meta charset=\"utf-8\"/>\n\
         \x20 <meta name=\"viewport\" content=\"width={w}, height={h}\"/>\n\
         \x20 <title>Page {page}</title>\n\
         \x20 <link rel=\"stylesheet\" type=\"text/css\" href=\"css/style.css\"/>\n\
         </head>\n\
         <body>\n\
         \x20 <div class=\"page\" style=\"width: {w}px; height: {h}px;\">\n\
         {body}\
         \x20 </div>\n\
         </body>\n\
         </html>\n",
        lang = escape(language),
        w = viewport.width,
        h = viewport.height,
        page = page.page_number,
        body = body,
    )
}

fn render_block(block: &TextBlock) -> String {
    let id = element_id(block);
    let text = escape(&block.text);
    match block.block_type {
        BlockType::Heading => {
            let level = block.effective_heading_level();
            format!("      <h{lvl} id=\"{id}\">{text}</h{lvl}>\n", lvl = level)
        },
        BlockType::Caption => {
            format!("      <p class=\"caption\" id=\"{id}\">{text}</p>\n")
        },
        BlockType::GlossaryTerm => {
            format!("      <p class=\"glossary-term\" id=\"{id}\">{text}</p>\n")
        },
        _ => format!("      <p id=\"{id}\">{text}</p>\n"),
    }
}

/// The shared fixed-layout stylesheet.
///
/// The text layer stays in the document flow for screen readers but is
/// invisible on the rendered canvas.
pub const STYLESHEET: &str = "\
.page {\n\
  position: relative;\n\
  margin: 0;\n\
  padding: 0;\n\
}\n\
.page-image {\n\
  position: absolute;\n\
  top: 0;\n\
  left: 0;\n\
  width: 100%;\n\
  height: 100%;\n\
}\n\
.text-layer {\n\
  position: absolute;\n\
  top: 0;\n\
  left: 0;\n\
  width: 1px;\n\
  height: 1px;\n\
  overflow: hidden;\n\
  clip: rect(0 0 0 0);\n\
  white-space: nowrap;\n\
}\n\
.media-overlay-active {\n\
  background-color: #ffe9a8;\n\
}\n";
