//! Zip container assembly.
//!
//! The archive layout is fixed: the `mimetype` entry comes first and is
//! stored uncompressed so readers can sniff it at a fixed offset; everything
//! else is deflated. Writing is all-or-nothing: entries go to a temporary
//! file that is renamed over the final path only on full success, so a
//! half-written archive never lands on disk.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MIMETYPE: &[u8] = b"application/epub+zip";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// In-memory archive entries, assembled fully before anything touches disk.
#[derive(Debug, Default)]
pub struct EpubArchive {
    entries: Vec<(String, Vec<u8>)>,
}

impl EpubArchive {
    /// Empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry under `OEBPS/`.
    pub fn add_oebps(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.entries.push((format!("OEBPS/{}", path.into()), data));
    }

    /// Entry names in write order, for inspection.
    pub fn entry_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Serialize the archive to `final_path`.
    ///
    /// Writes to `<final_path>.partial` first and renames on success; the
    /// partial file is removed on any failure.
    pub fn write_to(&self, final_path: &Path) -> Result<PathBuf> {
        let partial = final_path.with_extension("epub.partial");
        let result = self.write_zip(&partial);
        match result {
            Ok(()) => {
                fs::rename(&partial, final_path)
                    .map_err(|e| Error::Packaging(format!("finalize rename: {}", e)))?;
                Ok(final_path.to_path_buf())
            },
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            },
        }
    }

    fn write_zip(&self, path: &Path) -> Result<()> {
        let file =
            fs::File::create(path).map_err(|e| Error::Packaging(format!("create: {}", e)))?;
        let mut zip = ZipWriter::new(file);

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // mimetype must be the first entry and must not be compressed.
        zip.start_file("mimetype", stored)
            .map_err(|e| Error::Packaging(format!("mimetype: {}", e)))?;
        zip.write_all(MIMETYPE)
            .map_err(|e| Error::Packaging(format!("mimetype: {}", e)))?;

        zip.start_file("META-INF/container.xml", deflated)
            .map_err(|e| Error::Packaging(format!("container.xml: {}", e)))?;
        zip.write_all(CONTAINER_XML.as_bytes())
            .map_err(|e| Error::Packaging(format!("container.xml: {}", e)))?;

        for (name, data) in &self.entries {
            zip.start_file(name.as_str(), deflated)
                .map_err(|e| Error::Packaging(format!("{}: {}", name, e)))?;
            zip.write_all(data)
                .map_err(|e| Error::Packaging(format!("{}: {}", name, e)))?;
        }

        zip.finish()
            .map_err(|e| Error::Packaging(format!("finish: {}", e)))?;
        Ok(())
    }
}
