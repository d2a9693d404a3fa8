//! Delimited input files.
//!
//! Input is comma- or tab-separated text with a header row. The delimiter is
//! sniffed from the start of the file, a UTF-8 byte order mark is dropped and
//! header names are matched case-insensitively.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{DELIMITER_SNIFF_BYTES, INPUT_EXTENSIONS, REFERENCE_FILE_MARKERS};
use crate::error::Result;
use crate::types::RawRecord;

/// Files holding citation lists rather than dating records.
pub fn is_reference_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    REFERENCE_FILE_MARKERS.iter().any(|m| lower.contains(m))
}

/// `*.csv` and `*.tsv` files in `dir`, sorted by file name. Reference files
/// are left out.
pub fn discover_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let has_input_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| INPUT_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
            .unwrap_or(false);
        if !has_input_ext {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if is_reference_file(name) {
            info!("Skipping reference file: {}", name);
            continue;
        }
        files.push(path);
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Tab if one appears in the first few kilobytes, comma otherwise.
pub fn sniff_delimiter(text: &str) -> u8 {
    if text
        .as_bytes()
        .iter()
        .take(DELIMITER_SNIFF_BYTES)
        .any(|&b| b == b'\t')
    {
        b'\t'
    } else {
        b','
    }
}

/// One input file opened for reading.
pub struct DelimitedFile {
    name: String,
    reader: csv::Reader<Cursor<String>>,
}

impl DelimitedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("{} is not valid UTF-8; undecodable bytes replaced", path.display());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_text(name, text))
    }

    pub fn from_text(name: impl Into<String>, text: String) -> Self {
        let text = match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        };
        let delimiter = sniff_delimiter(&text);
        let name = name.into();
        debug!("Reading {} with delimiter {:?}", name, delimiter as char);

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(Cursor::new(text));
        Self { name, reader }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data rows in file order. A row that cannot be decoded yields an error
    /// for that row only.
    pub fn records(&mut self) -> Result<impl Iterator<Item = Result<RawRecord>> + '_> {
        let headers = self.reader.headers()?.clone();
        Ok(self.reader.records().map(move |row| -> Result<RawRecord> {
            let row = row?;
            let mut raw = RawRecord::new();
            for (column, value) in headers.iter().zip(row.iter()) {
                raw.insert(column, value);
            }
            Ok(raw)
        }))
    }
}
