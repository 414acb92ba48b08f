//! Preview extraction from drawing files.
//!
//! Clip Studio `.clip` files embed a SQLite database somewhere past a
//! proprietary header. The extractor locates it by scanning for the SQLite
//! magic, copies the tail into a temporary file, and probes the handful of
//! table names known to hold the canvas preview. The first blob of
//! plausible size wins and is re-encoded to PNG (or written raw when it
//! does not decode as an image).
//!
//! A perceptual hash of the previous preview per source file suppresses
//! saves that did not change the canvas, so idle re-saves do not turn into
//! commits.

mod phash;

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::ImageFormat;
use log::warn;
use rusqlite::{types::ValueRef, Connection, OpenFlags};

use crate::errors::ThumbnailError;

pub use phash::{compute_phash, hamming_distance};

const SQLITE_MAGIC: &[u8] = b"SQLite format 3";

/// Tables probed for the embedded preview, in preference order.
const PREVIEW_TABLES: &[&str] = &["CanvasPreview", "Thumbnail", "PreviewImage"];

/// Blobs at or below this size are palette or metadata noise, not previews.
const MIN_PREVIEW_BYTES: usize = 100;

/// Previews within this hamming distance of the previous capture count as
/// unchanged and are skipped.
const UNCHANGED_DISTANCE_MAX: u32 = 0;

/// A freshly captured thumbnail on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedThumbnail {
    pub thumbnail_path: PathBuf,
    /// Capture time, seconds since the Unix epoch. Also baked into the
    /// output filename.
    pub timestamp: i64,
}

/// Extracts preview thumbnails from watched drawing files into `out_dir`.
///
/// Stateful: it remembers the perceptual hash of the last preview per
/// source file to skip unchanged saves.
pub struct ThumbnailExtractor {
    out_dir: PathBuf,
    last_hashes: HashMap<PathBuf, String>,
}

impl ThumbnailExtractor {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            last_hashes: HashMap::new(),
        }
    }

    /// Pull the current preview out of `source`.
    ///
    /// Returns `Ok(None)` when the preview is perceptually identical to the
    /// last one captured from this file.
    pub fn extract(&mut self, source: &Path) -> Result<Option<ExtractedThumbnail>, ThumbnailError> {
        let data = fs::read(source).map_err(|err| ThumbnailError::Unreadable {
            path: source.to_path_buf(),
            source: err,
        })?;

        let offset = sqlite_payload_offset(&data).ok_or_else(|| ThumbnailError::NoSqlitePayload {
            path: source.to_path_buf(),
        })?;
        let blob = probe_preview_blob(&data[offset..], source)?;

        let decoded = image::load_from_memory(&blob);
        match &decoded {
            Ok(image) => {
                let hash = compute_phash(image);
                if let Some(previous) = self.last_hashes.get(source) {
                    if hamming_distance(&hash, previous) <= UNCHANGED_DISTANCE_MAX {
                        return Ok(None);
                    }
                }
                self.last_hashes.insert(source.to_path_buf(), hash);
            }
            Err(_) => {
                // Undecodable previews cannot be compared, so never skip
                // them, and forget any stale hash for this file.
                self.last_hashes.remove(source);
            }
        }

        fs::create_dir_all(&self.out_dir).map_err(|err| ThumbnailError::Write {
            path: self.out_dir.clone(),
            source: err,
        })?;

        let stem = source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("drawing");
        let timestamp = Utc::now().timestamp();
        let out_path = self.out_dir.join(format!("{stem}_{timestamp}.png"));

        match decoded {
            Ok(image) => {
                image
                    .save_with_format(&out_path, ImageFormat::Png)
                    .map_err(|err| ThumbnailError::Encode {
                        path: out_path.clone(),
                        source: err,
                    })?;
            }
            Err(err) => {
                warn!(
                    "preview from {} does not decode ({err}), writing raw bytes",
                    source.display()
                );
                fs::write(&out_path, &blob).map_err(|err| ThumbnailError::Write {
                    path: out_path.clone(),
                    source: err,
                })?;
            }
        }

        // Canonical path, matching what downstream consumers store.
        let thumbnail_path = fs::canonicalize(&out_path).unwrap_or(out_path);

        Ok(Some(ExtractedThumbnail {
            thumbnail_path,
            timestamp,
        }))
    }
}

fn sqlite_payload_offset(data: &[u8]) -> Option<usize> {
    data.windows(SQLITE_MAGIC.len())
        .position(|window| window == SQLITE_MAGIC)
}

fn probe_preview_blob(payload: &[u8], source: &Path) -> Result<Vec<u8>, ThumbnailError> {
    let probe_err = |err: anyhow::Error| ThumbnailError::Probe {
        path: source.to_path_buf(),
        source: err,
    };

    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|err| probe_err(anyhow::Error::new(err).context("failed to create temp database")))?;
    tmp.write_all(payload)
        .and_then(|()| tmp.flush())
        .map_err(|err| probe_err(anyhow::Error::new(err).context("failed to spool temp database")))?;

    let conn = Connection::open_with_flags(tmp.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|err| probe_err(anyhow::Error::new(err).context("failed to open embedded database")))?;

    for table in PREVIEW_TABLES {
        // Absent tables are expected; each format revision carries a
        // different subset.
        let mut stmt = match conn.prepare(&format!("SELECT * FROM {table} LIMIT 1")) {
            Ok(stmt) => stmt,
            Err(_) => continue,
        };
        let columns = stmt.column_count();
        let mut rows = stmt
            .query([])
            .map_err(|err| probe_err(anyhow::Error::new(err).context("failed to query preview table")))?;

        if let Some(row) = rows
            .next()
            .map_err(|err| probe_err(anyhow::Error::new(err).context("failed to read preview row")))?
        {
            for index in 0..columns {
                if let Ok(ValueRef::Blob(bytes)) = row.get_ref(index) {
                    if bytes.len() > MIN_PREVIEW_BYTES {
                        return Ok(bytes.to_vec());
                    }
                }
            }
        }
    }

    Err(ThumbnailError::NoPreview {
        path: source.to_path_buf(),
    })
}
