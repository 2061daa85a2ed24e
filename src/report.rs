//! Secondary exports: the coordinate CSV and per-collection HTML
//! gallery fragments.
//!
//! Both read the local collection directories directly, so they work
//! without any remote round trip. Like the manifest, the CSV is
//! rebuilt from scratch on every run.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::exif;
use crate::ingest::scan_collection_dir;

/// One row of the tabular export.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub filepath: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<String>,
}

/// Scans every configured collection and extracts one row per JPEG.
pub fn collect_csv_rows(config: &Config) -> Result<Vec<CsvRow>> {
    let mut rows = Vec::new();

    for collection in &config.collections {
        let dir = config.collection_dir(collection);
        for path in scan_collection_dir(&dir)? {
            let metadata = exif::extract_from_path(&path)?;
            rows.push(CsvRow {
                filepath: path.display().to_string(),
                latitude: metadata.latitude,
                longitude: metadata.longitude,
                timestamp: metadata.timestamp,
            });
        }
    }

    Ok(rows)
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes the 4-column CSV, header included, replacing any previous file.
pub fn write_csv(path: &Path, rows: &[CsvRow]) -> Result<()> {
    let mut out = String::from("Filepath,Latitude,Longitude,Timestamp\n");

    for row in rows {
        let latitude = row.latitude.map(|v| v.to_string()).unwrap_or_default();
        let longitude = row.longitude.map(|v| v.to_string()).unwrap_or_default();
        let timestamp = row.timestamp.clone().unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&row.filepath),
            latitude,
            longitude,
            csv_field(&timestamp)
        ));
    }

    fs::write(path, out).with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    Ok(())
}

/// Builds the HTML fragment for one collection: a heading plus a
/// justified-gallery block of thumbnail tags whose hover handlers carry
/// the photo's coordinates. Photos without a position are left out.
pub fn gallery_fragment(collection: &str, dir: &Path) -> Result<String> {
    let mut fragment = format!(
        "<h2>{}</h2>\n<div class=\"justified-gallery\">\n",
        collection.replace('_', " ")
    );

    for path in scan_collection_dir(dir)? {
        let metadata = exif::extract_from_path(&path)?;
        let (Some(latitude), Some(longitude)) = (metadata.latitude, metadata.longitude) else {
            continue;
        };

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let thumbnail_name = match filename.rfind('.') {
            Some(idx) => format!("{}_thumbnail{}", &filename[..idx], &filename[idx..]),
            None => filename.clone(),
        };
        let thumbnail_path = dir.join("thumbnails").join(&thumbnail_name);

        fragment.push_str(&format!(
            "<a><img src=\"{}\" onmouseenter=\"highlightMarker([{},{}])\"/></a>\n",
            thumbnail_path.display(),
            latitude,
            longitude
        ));
    }

    fragment.push_str("</div>\n");
    Ok(fragment)
}
