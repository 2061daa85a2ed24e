//! Bandwidth-capping resize pass.
//!
//! Re-fetches every uploaded asset and overwrites it with a downscaled,
//! recompressed rendition. Unlike ingest, failures here are per-item: a
//! bad asset is logged and the loop moves on. A fixed half-second delay
//! follows each asset to stay under the remote rate limit.

use anyhow::Result;
use log::{error, info};
use std::time::Duration;

use crate::cloudinary::{AssetDescriptor, MediaStore, UploadOptions, UploadSource};
use crate::config::{Config, ResizeSettings};

const INTER_ITEM_DELAY: Duration = Duration::from_millis(500);

/// What happened to one asset during the pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ResizeOutcome {
    Resized(String),
    /// Already within 100px of the target; left untouched.
    AlreadySmall(String),
    Failed(String, String),
}

/// Picks the eager transformation for an asset, or `None` when the asset
/// is already small enough. Landscape images are capped by width,
/// portrait by height.
pub fn plan_transformation(asset: &AssetDescriptor, settings: &ResizeSettings) -> Option<String> {
    if asset.width <= settings.target_width + 100 {
        return None;
    }

    if asset.width > asset.height {
        Some(format!("w_{},q_{}", settings.target_width, settings.quality))
    } else {
        Some(format!("h_{},q_{}", settings.target_width, settings.quality))
    }
}

/// Drives the resize pass over all configured collections.
pub struct Resizer<'a> {
    store: &'a dyn MediaStore,
    config: &'a Config,
}

impl<'a> Resizer<'a> {
    pub fn new(store: &'a dyn MediaStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    pub async fn run(&self) -> Result<Vec<ResizeOutcome>> {
        let mut outcomes = Vec::new();

        for collection in &self.config.collections {
            let assets = self
                .store
                .resources_by_tag(collection, self.config.max_results)
                .await?;

            for asset in assets {
                info!("Processing: {}", asset.public_id);
                match self.resize_asset(&asset.public_id).await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        error!("Failed to resize {}: {}", asset.public_id, e);
                        outcomes.push(ResizeOutcome::Failed(
                            asset.public_id.clone(),
                            e.to_string(),
                        ));
                    }
                }

                tokio::time::sleep(INTER_ITEM_DELAY).await;
            }
        }

        Ok(outcomes)
    }

    async fn resize_asset(&self, public_id: &str) -> Result<ResizeOutcome> {
        let details = self.store.resource(public_id).await?;

        let Some(transformation) = plan_transformation(&details, &self.config.resize) else {
            info!("Skipping {} as it is already small enough", public_id);
            return Ok(ResizeOutcome::AlreadySmall(public_id.to_string()));
        };

        let options = UploadOptions {
            public_id: Some(public_id.to_string()),
            overwrite: true,
            transformation: Some(transformation),
            ..Default::default()
        };
        self.store
            .upload(UploadSource::Url(details.secure_url.clone()), &options)
            .await?;

        info!("Successfully resized: {}", public_id);
        Ok(ResizeOutcome::Resized(public_id.to_string()))
    }
}
