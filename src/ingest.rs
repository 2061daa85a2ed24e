//! Upload pipeline for photoatlas.
//!
//! Walks every configured collection directory in order, extracts each
//! JPEG's metadata, and uploads the file to the remote store tagged with
//! its collection name and carrying the pipe-delimited metadata string.
//! Files at or above the 10 MiB remote limit are skipped and collected
//! into a failure report; upload errors propagate and abort the run.

use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cloudinary::{MediaStore, UploadOptions, UploadSource};
use crate::config::Config;
use crate::exif::{self, ExifMetadata};

/// Remote upload limit; larger files are skipped, not split.
const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Outcome of one ingest run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub uploaded: usize,
    /// Newline-separated paths of files skipped for size.
    pub failed_files: String,
}

/// Lists a collection directory's JPEG files, sorted by name. Extension
/// matching is case-insensitive; everything else is ignored.
pub fn scan_collection_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read collection directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Builds the pipe-delimited metadata string attached to an upload,
/// e.g. `latitude=41.87|longitude=-87.62|altitude=180|timestamp=2023:05:01 10:00:00`.
/// Absent fields are omitted.
pub fn metadata_string(metadata: &ExifMetadata) -> String {
    let mut parts = Vec::new();
    if let Some(latitude) = metadata.latitude {
        parts.push(format!("latitude={latitude}"));
    }
    if let Some(longitude) = metadata.longitude {
        parts.push(format!("longitude={longitude}"));
    }
    if let Some(altitude) = metadata.altitude {
        parts.push(format!("altitude={altitude}"));
    }
    if let Some(timestamp) = &metadata.timestamp {
        parts.push(format!("timestamp={timestamp}"));
    }
    parts.join("|")
}

/// Drives uploads for all configured collections.
pub struct Ingestor<'a> {
    store: &'a dyn MediaStore,
    config: &'a Config,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn MediaStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Processes every collection in configured order. Collections are
    /// sequential; a remote failure aborts the run.
    pub async fn run(&self) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for collection in &self.config.collections {
            let dir = self.config.collection_dir(collection);
            info!("Processing collection '{}' from {}", collection, dir.display());
            self.process_collection(collection, &dir, &mut report).await?;
        }

        Ok(report)
    }

    async fn process_collection(
        &self,
        collection: &str,
        dir: &Path,
        report: &mut IngestReport,
    ) -> Result<()> {
        for path in scan_collection_dir(dir)? {
            let metadata = exif::extract_from_path(&path)?;

            let size = fs::metadata(&path)
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .len();
            if size >= MAX_UPLOAD_BYTES {
                report.failed_files.push_str(&path.display().to_string());
                report.failed_files.push('\n');
                info!("skipping oversized file: {}", path.display());
                continue;
            }

            info!("uploading: {}", path.display());
            let options = UploadOptions {
                tags: vec![collection.to_string()],
                metadata: Some(metadata_string(&metadata)),
                ..Default::default()
            };
            self.store
                .upload(UploadSource::File(path.clone()), &options)
                .await
                .with_context(|| format!("Failed to upload {}", path.display()))?;

            report.uploaded += 1;
        }

        Ok(())
    }
}
