//! Synchronization (media overlay) documents.
//!
//! Maps narration timing data onto the text-layer element ids. Block-level
//! sync records become one timed unit each, sequenced by the referenced
//! block's reading order — reading order is authoritative for sequencing,
//! clip start times are just metadata. Page-level records are split across
//! the page's speakable blocks in equal shares, with the final block
//! absorbing the rounding remainder so the allocated durations sum exactly
//! to the page total.

use crate::epub::ids::{element_id, smil_name};
use crate::epub::sanitize::is_speakable;
use crate::model::{format_clock, AudioSync, PageStructure};
use quick_xml::escape::escape;
use std::collections::HashMap;
use std::path::Path;

/// One timed text/audio pair in a page's overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUnit {
    /// Element id in the page's content document
    pub element_id: String,
    /// Reading-order rank of the referenced block (sequencing key)
    pub reading_order: u32,
    /// Audio file name within the archive's `audio/` directory
    pub audio_name: String,
    /// Clip start in seconds
    pub begin: f64,
    /// Clip end in seconds
    pub end: f64,
}

/// Compute a page's timed units from its sync records.
///
/// Records referencing unknown block ids are dropped with a warning; a
/// page-level record on a page with no speakable blocks has nothing to
/// anchor to and is likewise dropped.
pub fn page_sync_units(page: &PageStructure, syncs: &[AudioSync]) -> Vec<SyncUnit> {
    let by_id: HashMap<&str, &crate::model::TextBlock> = page
        .text_blocks
        .iter()
        .filter(|b| !b.id.is_empty())
        .map(|b| (b.id.as_str(), b))
        .collect();

    let mut units: Vec<SyncUnit> = Vec::new();

    for sync in syncs.iter().filter(|s| s.page_number == page.page_number) {
        let audio_name = file_name(&sync.audio_file_path);
        match &sync.block_id {
            Some(block_id) => match by_id.get(block_id.as_str()) {
                Some(block) => units.push(SyncUnit {
                    element_id: element_id(block),
                    reading_order: block.reading_order,
                    audio_name: audio_name.clone(),
                    begin: sync.start_time,
                    end: sync.end_time,
                }),
                None => {
                    log::warn!(
                        "page {}: sync references unknown block id {:?}, dropped",
                        page.page_number,
                        block_id
                    );
                },
            },
            None => units.extend(distribute_page_sync(page, sync, &audio_name)),
        }
    }

    units.sort_by_key(|u| u.reading_order);
    units
}

/// Split a page-level clip range across the page's speakable blocks.
///
/// Boundaries are computed cumulatively and the last boundary is pinned to
/// the record's end time, so the sub-range durations telescope to exactly
/// the page total with no rounding drift.
fn distribute_page_sync(page: &PageStructure, sync: &AudioSync, audio_name: &str) -> Vec<SyncUnit> {
    let targets: Vec<_> = page
        .blocks_in_reading_order()
        .filter(|b| is_speakable(b) && !b.id.is_empty())
        .collect();
    if targets.is_empty() {
        log::debug!(
            "page {}: page-level sync with no speakable blocks, dropped",
            page.page_number
        );
        return Vec::new();
    }

    let n = targets.len();
    let share = sync.duration() / n as f64;
    let mut units = Vec::with_capacity(n);
    for (i, block) in targets.iter().enumerate() {
        let begin = sync.start_time + share * i as f64;
        let end = if i + 1 == n {
            sync.end_time
        } else {
            sync.start_time + share * (i + 1) as f64
        };
        units.push(SyncUnit {
            element_id: element_id(block),
            reading_order: block.reading_order,
            audio_name: audio_name.to_string(),
            begin,
            end,
        });
    }
    units
}

/// Total audio duration covered by a page's units, in seconds.
pub fn units_duration(units: &[SyncUnit]) -> f64 {
    units.iter().map(|u| u.end - u.begin).sum()
}

/// Render a page's synchronization document.
///
/// Returns `None` when the page has no units (no audio was supplied for it).
pub fn build_smil_document(page: &PageStructure, units: &[SyncUnit]) -> Option<String> {
    if units.is_empty() {
        return None;
    }

    let page_doc = crate::epub::ids::page_doc_name(page.page_number);
    let mut body = String::new();
    for (i, unit) in units.iter().enumerate() {
        body.push_str(&format!(
            "    <par id=\"par{idx}\">\n\
             \x20     <text src=\"../{doc}#{id}\"/>\n\
             \x20     <audio src=\"../audio/{audio}\" clipBegin=\"{begin}\" clipEnd=\"{end}\"/>\n\
             \x20   </par>\n",
            idx = i + 1,
            doc = page_doc,
            id = escape(&unit.element_id),
            audio = escape(&unit.audio_name),
            begin = format_clock(unit.begin),
            end = format_clock(unit.end),
        ));
    }

    Some(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <smil xmlns=\"http://www.w3.org/ns/SMIL\" \
         xmlns:epub=\"http://www.idpf.org/2007/ops\" version=\"3.0\">\n\
         \x20 <body>\n\
         \x20 <seq id=\"seq1\" epub:textref=\"../{doc}\" epub:type=\"bodymatter\">\n\
         {body}\
         \x20 </seq>\n\
         \x20 </body>\n\
         </smil>\n",
        doc = page_doc,
        body = body,
    ))
}

/// Archive entry name for a page's overlay, under `smil/`.
pub fn smil_href(page_number: u32) -> String {
    format!("smil/{}", smil_name(page_number))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.mp3".to_string())
}
