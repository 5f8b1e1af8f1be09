//! DOCX package access: read every zip entry, edit parts, write a new archive.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use super::xml::XmlDocument;
use crate::error::TransformError;
use crate::storage;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const SETTINGS_PART: &str = "word/settings.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// An opened DOCX package held fully in memory.
///
/// Entry order and compression are kept so untouched parts come back out
/// the way they went in.
pub struct DocxPackage {
    entries: Vec<Entry>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self, TransformError> {
        let file = std::fs::File::open(path).map_err(|e| TransformError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut archive = zip::ZipArchive::new(file)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| TransformError::Docx(format!("Failed to read '{}': {}", entry.name(), e)))?;

            let compression = match entry.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            entries.push(Entry {
                name: entry.name().to_string(),
                data,
                compression,
                is_dir: entry.is_dir(),
            });
        }

        let package = Self { entries };
        if package.part(DOCUMENT_PART).is_none() {
            return Err(TransformError::Docx(format!(
                "Package has no main document part '{}'",
                DOCUMENT_PART
            )));
        }
        Ok(package)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    /// Replaces a part, or appends it as a new deflated entry.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| !e.is_dir && e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }

    pub fn xml_part(&self, name: &str) -> Result<XmlDocument, TransformError> {
        let data = self
            .part(name)
            .ok_or_else(|| TransformError::Docx(format!("Package has no part '{}'", name)))?;
        let text = std::str::from_utf8(data).map_err(|e| TransformError::Xml {
            part: name.to_string(),
            reason: format!("not valid UTF-8: {}", e),
        })?;
        XmlDocument::parse(name, text.trim_start_matches('\u{feff}'))
    }

    pub fn set_xml_part(&mut self, name: &str, doc: &XmlDocument) -> Result<(), TransformError> {
        let bytes = doc.to_bytes(name)?;
        self.set_part(name, bytes);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TransformError> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(entry.compression);
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            writer.start_file(entry.name.as_str(), options)?;
            writer
                .write_all(&entry.data)
                .map_err(|e| TransformError::Docx(format!("Failed to write '{}': {}", entry.name, e)))?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    /// Writes the package to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), TransformError> {
        let bytes = self.to_bytes()?;
        storage::write_atomic(path, &bytes)?;
        Ok(())
    }
}
