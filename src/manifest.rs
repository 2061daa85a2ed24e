//! Manifest generation for photoatlas.
//!
//! Rebuilds `photo-data.json` from the remote store: every collection is
//! listed by tag, ranked chronologically, and appended to the manifest in
//! rank order. The manifest file is rewritten wholesale after each
//! completed collection, so collections finished before a mid-run failure
//! survive while the failing one contributes nothing.

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::cloudinary::{AssetDescriptor, MediaStore};
use crate::config::Config;
use crate::rank::{parse_exif_timestamp, rank_by_timestamp};

/// One manifest entry, as the map-gallery front end consumes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoRecord {
    pub id: String,
    pub root_url: String,
    pub height: u32,
    pub width: u32,
    /// Collection name
    pub location: String,
    /// Caption, or a single space when none was attached
    pub description: String,
    pub longitude: f64,
    pub latitude: f64,
    /// ISO-8601 capture time, reparsed from the camera format
    pub timestamp: String,
}

fn metadata_f64(asset: &AssetDescriptor, key: &str) -> Result<f64> {
    let value = asset
        .metadata
        .get(key)
        .ok_or_else(|| anyhow!("Asset {} has no {} metadata", asset.public_id, key))?;
    value
        .parse::<f64>()
        .with_context(|| format!("Asset {} has unparseable {}: {value:?}", asset.public_id, key))
}

/// Converts one remote asset into its manifest entry.
fn record_from_asset(
    asset: &AssetDescriptor,
    collection: &str,
    root_url: &str,
) -> Result<PhotoRecord> {
    let camera_timestamp = asset
        .metadata
        .get("timestamp")
        .ok_or_else(|| anyhow!("Asset {} has no timestamp metadata", asset.public_id))?;
    let timestamp = parse_exif_timestamp(camera_timestamp)
        .ok_or_else(|| {
            anyhow!(
                "Asset {} has unparseable timestamp {camera_timestamp:?}",
                asset.public_id
            )
        })?
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();

    let description = asset
        .metadata
        .get("caption")
        .cloned()
        .unwrap_or_else(|| " ".to_string());

    Ok(PhotoRecord {
        id: asset.public_id.clone(),
        root_url: root_url.to_string(),
        height: asset.height,
        width: asset.width,
        location: collection.to_string(),
        description,
        longitude: metadata_f64(asset, "longitude")?,
        latitude: metadata_f64(asset, "latitude")?,
        timestamp,
    })
}

/// Orders one collection's assets chronologically: the asset whose rank
/// is `k` lands at position `k`. A missing or malformed timestamp on any
/// asset fails the whole collection.
pub fn order_collection(assets: &[AssetDescriptor]) -> Result<Vec<&AssetDescriptor>> {
    let timestamps: Vec<&str> = assets
        .iter()
        .map(|asset| {
            asset
                .metadata
                .get("timestamp")
                .map(String::as_str)
                .unwrap_or("")
        })
        .collect();

    let ranks = rank_by_timestamp(&timestamps)?;

    let mut order = vec![0usize; assets.len()];
    for (index, rank) in ranks.into_iter().enumerate() {
        order[rank] = index;
    }

    Ok(order.into_iter().map(|index| &assets[index]).collect())
}

/// Builds the full manifest from the remote store.
pub struct ManifestBuilder<'a> {
    store: &'a dyn MediaStore,
    config: &'a Config,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(store: &'a dyn MediaStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Builds and persists the manifest collection by collection. The
    /// output file is rewritten after each collection completes.
    pub async fn build_and_write(&self, manifest_path: &Path) -> Result<Vec<PhotoRecord>> {
        let mut records = Vec::new();

        for collection in &self.config.collections {
            let assets = self
                .store
                .resources_by_tag(collection, self.config.max_results)
                .await?;
            info!("Ranking {} assets in '{}'", assets.len(), collection);

            let ordered = order_collection(&assets)
                .with_context(|| format!("Failed to rank collection '{collection}'"))?;
            for asset in ordered {
                records.push(record_from_asset(asset, collection, &self.config.root_url)?);
            }

            write_manifest(manifest_path, &records)?;
        }

        Ok(records)
    }
}

/// Writes the manifest, replacing any previous contents.
pub fn write_manifest(path: &Path, records: &[PhotoRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;

    Ok(())
}
