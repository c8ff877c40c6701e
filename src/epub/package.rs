//! The package document: manifest and spine.

use crate::epub::ids::page_item_id;
use crate::model::DocumentMetadata;
use indexmap::IndexMap;
use quick_xml::escape::escape;

/// One manifest entry.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    /// Archive path relative to the package document
    pub href: String,
    /// MIME media type
    pub media_type: String,
    /// `properties` attribute (e.g. `nav`), when any
    pub properties: Option<String>,
    /// `media-overlay` attribute referencing a SMIL item id, when any
    pub media_overlay: Option<String>,
}

/// Accumulates manifest and spine entries in insertion order.
///
/// Insertion order is what serializes, which keeps the generated package
/// document byte-stable for identical input documents.
#[derive(Debug, Default)]
pub struct PackageBuilder {
    manifest: IndexMap<String, ManifestItem>,
    spine: Vec<String>,
    /// (overlay item id, duration seconds) pairs for media:duration metadata
    overlay_durations: Vec<(String, f64)>,
}

impl PackageBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a manifest item under `id`.
    pub fn add_item(&mut self, id: impl Into<String>, item: ManifestItem) {
        self.manifest.insert(id.into(), item);
    }

    /// Add a page content document and put it on the spine.
    pub fn add_page(&mut self, page_number: u32, href: String, media_overlay: Option<String>) {
        let id = page_item_id(page_number);
        self.add_item(
            id.clone(),
            ManifestItem {
                href,
                media_type: "application/xhtml+xml".to_string(),
                properties: None,
                media_overlay,
            },
        );
        self.spine.push(id);
    }

    /// Record an overlay's total duration for the package metadata.
    pub fn add_overlay_duration(&mut self, overlay_id: impl Into<String>, seconds: f64) {
        self.overlay_durations.push((overlay_id.into(), seconds));
    }

    /// Render `content.opf`.
    ///
    /// Declares `rendition:layout` pre-paginated: every page is a fixed
    /// canvas over a rendered image.
    pub fn build(&self, metadata: &DocumentMetadata) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" \
             unique-identifier=\"pub-id\" prefix=\"rendition: \
             http://www.idpf.org/vocab/rendition/#\">\n\
             \x20 <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n",
        );

        out.push_str(&format!(
            "    <dc:identifier id=\"pub-id\">{}</dc:identifier>\n",
            escape(&metadata.identifier)
        ));
        out.push_str(&format!(
            "    <dc:title>{}</dc:title>\n",
            escape(&metadata.title)
        ));
        out.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            escape(&metadata.language)
        ));
        if let Some(author) = &metadata.author {
            out.push_str(&format!(
                "    <dc:creator>{}</dc:creator>\n",
                escape(author)
            ));
        }
        if let Some(publisher) = &metadata.publisher {
            out.push_str(&format!(
                "    <dc:publisher>{}</dc:publisher>\n",
                escape(publisher)
            ));
        }
        out.push_str("    <meta property=\"rendition:layout\">pre-paginated</meta>\n");

        for (overlay_id, seconds) in &self.overlay_durations {
            out.push_str(&format!(
                "    <meta property=\"media:duration\" refines=\"#{}\">{}</meta>\n",
                escape(overlay_id),
                crate::model::format_clock(*seconds)
            ));
        }
        if !self.overlay_durations.is_empty() {
            let total: f64 = self.overlay_durations.iter().map(|(_, s)| s).sum();
            out.push_str(&format!(
                "    <meta property=\"media:duration\">{}</meta>\n",
                crate::model::format_clock(total)
            ));
        }

        out.push_str("  </metadata>\n  <manifest>\n");
        for (id, item) in &self.manifest {
            out.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
                escape(id),
                escape(&item.href),
                escape(&item.media_type)
            ));
            if let Some(props) = &item.properties {
                out.push_str(&format!(" properties=\"{}\"", escape(props)));
            }
            if let Some(overlay) = &item.media_overlay {
                out.push_str(&format!(" media-overlay=\"{}\"", escape(overlay)));
            }
            out.push_str("/>\n");
        }
        out.push_str("  </manifest>\n  <spine>\n");
        for idref in &self.spine {
            out.push_str(&format!("    <itemref idref=\"{}\"/>\n", escape(idref)));
        }
        out.push_str("  </spine>\n</package>\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> DocumentMetadata {
        DocumentMetadata {
            title: "All About Horses".to_string(),
            author: Some("J. Rider".to_string()),
            language: "en".to_string(),
            publisher: None,
            identifier: "urn:uuid:0000".to_string(),
        }
    }

    #[test]
    fn test_opf_declares_prepaginated_layout() {
        let builder = PackageBuilder::new();
        let opf = builder.build(&metadata());
        assert!(opf.contains("rendition:layout\">pre-paginated"));
        assert!(opf.contains("<dc:title>All About Horses</dc:title>"));
        assert!(opf.contains("<dc:creator>J. Rider</dc:creator>"));
    }

    #[test]
    fn test_spine_preserves_page_order() {
        let mut builder = PackageBuilder::new();
        builder.add_page(1, "page_0001.xhtml".into(), None);
        builder.add_page(2, "page_0002.xhtml".into(), Some("smil0002".into()));
        let opf = builder.build(&metadata());

        let first = opf.find("idref=\"page0001\"").unwrap();
        let second = opf.find("idref=\"page0002\"").unwrap();
        assert!(first < second);
        assert!(opf.contains("media-overlay=\"smil0002\""));
    }

    #[test]
    fn test_overlay_durations_emit_media_duration() {
        let mut builder = PackageBuilder::new();
        builder.add_overlay_duration("smil0001", 10.0);
        builder.add_overlay_duration("smil0002", 5.5);
        let opf = builder.build(&metadata());

        assert!(opf.contains("refines=\"#smil0001\">00:00:10.000"));
        assert!(opf.contains("refines=\"#smil0002\">00:00:05.500"));
        // Whole-publication duration is the sum.
        assert!(opf.contains("property=\"media:duration\">00:00:15.500"));
    }

    #[test]
    fn test_manifest_insertion_order_is_stable() {
        let mut builder = PackageBuilder::new();
        builder.add_item(
            "zeta",
            ManifestItem {
                href: "z.png".into(),
                media_type: "image/png".into(),
                properties: None,
                media_overlay: None,
            },
        );
        builder.add_item(
            "alpha",
            ManifestItem {
                href: "a.png".into(),
                media_type: "image/png".into(),
                properties: None,
                media_overlay: None,
            },
        );
        let opf = builder.build(&metadata());
        assert!(opf.find("id=\"zeta\"").unwrap() < opf.find("id=\"alpha\"").unwrap());
    }
}
