use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::record::{BikeRecord, FIELD_NAMES};

const URL_HEADER: &str = "URL";

#[derive(Debug, Deserialize)]
struct UrlRow {
    #[serde(rename = "URL")]
    url: String,
}

/// Read the URL list: header `URL`, one absolute URL per row. Empty rows are skipped.
pub fn read_urls(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open URL list {}", path.display()))?;

    let mut urls = Vec::new();
    for row in reader.deserialize::<UrlRow>() {
        let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
        let url = row.url.trim();
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

/// Write the URL list, replacing any existing file.
pub fn save_urls<'a>(path: &Path, urls: impl IntoIterator<Item = &'a String>) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record([URL_HEADER])?;
    let mut count = 0;
    for url in urls {
        writer.write_record([url.as_str()])?;
        count += 1;
    }
    writer.flush()?;
    info!("Saved {} URLs to {}", count, path.display());
    Ok(count)
}

/// URLs already present in the `url` column of a record file. A missing file is empty.
/// A trailing partial row is not counted; the sink drops it on open.
pub fn existing_urls(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(&bytes[..complete_len(&bytes)]);

    let Some(col) = reader.headers()?.iter().position(|h| h == FIELD_NAMES[0]) else {
        warn!("{} has no url column, nothing to resume", path.display());
        return Ok(HashSet::new());
    };

    let mut done = HashSet::new();
    for row in reader.records() {
        let row = row?;
        if let Some(url) = row.get(col).filter(|u| !u.is_empty()) {
            done.insert(url.to_string());
        }
    }
    Ok(done)
}

/// Append-only record file. Header is written only when the file starts empty.
pub struct RecordSink<W: Write = File> {
    writer: csv::Writer<W>,
}

impl RecordSink<File> {
    pub fn open(path: &Path, fresh: bool) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(fresh)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let len = repair_tail(&mut file)
            .with_context(|| format!("Failed to repair {}", path.display()))?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self::from_writer(file, len == 0))
    }
}

impl<W: Write> RecordSink<W> {
    pub fn from_writer(writer: W, write_header: bool) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(writer);
        Self { writer }
    }

    /// Write one record and flush it to disk.
    pub fn append(&mut self, record: &BikeRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Length of the prefix that ends with a complete line.
fn complete_len(bytes: &[u8]) -> usize {
    bytes.iter().rposition(|&b| b == b'\n').map_or(0, |pos| pos + 1)
}

/// Cut a trailing partial row back to the last newline. Returns the new length.
fn repair_tail(file: &mut File) -> std::io::Result<u64> {
    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;

    let keep = complete_len(&contents);
    if keep < contents.len() {
        warn!(dropped = contents.len() - keep, "truncating partial trailing row");
        file.set_len(keep as u64)?;
    }
    Ok(keep as u64)
}

// ── Tests ──
