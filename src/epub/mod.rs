//! Fixed-layout EPUB3 packaging with read-aloud media overlays.
//!
//! Packaging is all-or-nothing: every document is generated in memory
//! first, then the archive is written to a temporary file and renamed into
//! place. A failure on any single page aborts the whole job's packaging and
//! leaves nothing behind.

pub mod content;
pub mod ids;
pub mod nav;
pub mod package;
pub mod sanitize;
pub mod smil;
pub mod writer;

use crate::error::{Error, Result};
use crate::model::{AudioSync, DocumentStructure};
use content::Viewport;
use package::{ManifestItem, PackageBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use writer::EpubArchive;

/// Points-per-inch of the page coordinate space.
const POINTS_PER_INCH: f32 = 72.0;

/// CSS pixels per inch used for fallback viewports.
const CSS_DPI: f32 = 96.0;

/// Build the complete archive for a converted document and write it to
/// `output_path`.
///
/// `syncs` carries the narration timing data; pages without any produce no
/// synchronization document and keep a plain spine entry.
pub fn package(
    doc: &DocumentStructure,
    syncs: &[AudioSync],
    output_path: &Path,
) -> Result<PathBuf> {
    let mut builder = PackageBuilder::new();
    let mut archive = EpubArchive::new();

    builder.add_item(
        "nav",
        ManifestItem {
            href: "nav.xhtml".to_string(),
            media_type: "application/xhtml+xml".to_string(),
            properties: Some("nav".to_string()),
            media_overlay: None,
        },
    );
    archive.add_oebps("nav.xhtml", nav::build_nav_document(doc).into_bytes());

    builder.add_item(
        "css",
        ManifestItem {
            href: "css/style.css".to_string(),
            media_type: "text/css".to_string(),
            properties: None,
            media_overlay: None,
        },
    );
    archive.add_oebps("css/style.css", content::STYLESHEET.as_bytes().to_vec());

    for page in &doc.pages {
        let n = page.page_number;

        let image = match page.page_image() {
            Some(img) => {
                let bytes = std::fs::read(&img.image_path).map_err(|e| {
                    Error::Packaging(format!(
                        "page {}: reading {}: {}",
                        n,
                        img.image_path.display(),
                        e
                    ))
                })?;
                Some(sniff_image(n, bytes)?)
            },
            None => None,
        };

        let viewport = image
            .as_ref()
            .map(|img| img.viewport)
            .unwrap_or_else(|| Viewport {
                width: (page.width / POINTS_PER_INCH * CSS_DPI).round() as u32,
                height: (page.height / POINTS_PER_INCH * CSS_DPI).round() as u32,
            });

        let image_href = image.as_ref().map(|img| format!("image/{}", img.name));
        let xhtml =
            content::build_page_document(page, &doc.metadata.language, viewport, image_href.as_deref());

        let units = smil::page_sync_units(page, syncs);
        let overlay_id = if let Some(smil_doc) = smil::build_smil_document(page, &units) {
            let id = format!("smil{:04}", n);
            builder.add_item(
                id.clone(),
                ManifestItem {
                    href: smil::smil_href(n),
                    media_type: "application/smil+xml".to_string(),
                    properties: None,
                    media_overlay: None,
                },
            );
            builder.add_overlay_duration(id.clone(), smil::units_duration(&units));
            archive.add_oebps(smil::smil_href(n), smil_doc.into_bytes());
            Some(id)
        } else {
            None
        };

        builder.add_page(n, ids::page_doc_name(n), overlay_id);
        archive.add_oebps(ids::page_doc_name(n), xhtml.into_bytes());

        if let Some(img) = image {
            builder.add_item(
                format!("img{:04}", n),
                ManifestItem {
                    href: format!("image/{}", img.name),
                    media_type: img.media_type.to_string(),
                    properties: None,
                    media_overlay: None,
                },
            );
            archive.add_oebps(format!("image/{}", img.name), img.bytes);
        }
    }

    // Audio clips, deduplicated by archive name, in stable order.
    let mut audio_files: BTreeMap<String, PathBuf> = BTreeMap::new();
    for sync in syncs {
        let name = sync
            .audio_file_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());
        audio_files.insert(name, sync.audio_file_path.clone());
    }
    for (i, (name, path)) in audio_files.iter().enumerate() {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Packaging(format!("audio {}: {}", path.display(), e)))?;
        builder.add_item(
            format!("audio{:04}", i + 1),
            ManifestItem {
                href: format!("audio/{}", name),
                media_type: audio_media_type(name).to_string(),
                properties: None,
                media_overlay: None,
            },
        );
        archive.add_oebps(format!("audio/{}", name), bytes);
    }

    archive.add_oebps("content.opf", builder.build(&doc.metadata).into_bytes());
    archive.write_to(output_path)
}

struct PageImage {
    name: String,
    media_type: &'static str,
    viewport: Viewport,
    bytes: Vec<u8>,
}

fn sniff_image(page_number: u32, bytes: Vec<u8>) -> Result<PageImage> {
    let format = image::guess_format(&bytes)
        .map_err(|e| Error::Packaging(format!("page {}: image format: {}", page_number, e)))?;
    let (ext, media_type) = match format {
        image::ImageFormat::Jpeg => ("jpg", "image/jpeg"),
        _ => ("png", "image/png"),
    };
    let (w, h) = image::io::Reader::new(std::io::Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| Error::Packaging(format!("page {}: image: {}", page_number, e)))?
        .into_dimensions()
        .map_err(|e| Error::Packaging(format!("page {}: image: {}", page_number, e)))?;
    Ok(PageImage {
        name: ids::image_name(page_number, ext),
        media_type,
        viewport: Viewport {
            width: w,
            height: h,
        },
        bytes,
    })
}

fn audio_media_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".m4a") || lower.ends_with(".mp4") || lower.ends_with(".aac") {
        "audio/mp4"
    } else if lower.ends_with(".wav") {
        "audio/wav"
    } else if lower.ends_with(".ogg") || lower.ends_with(".oga") {
        "audio/ogg"
    } else {
        "audio/mpeg"
    }
}
