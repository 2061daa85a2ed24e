//! In-memory stand-in for the remote media store, used by tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::cloudinary::{AssetDescriptor, MediaStore, UploadOptions, UploadSource};

/// Record of one upload call, kept for assertions.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    /// Local path or source URL, as a display string
    pub source: String,
    pub options: UploadOptions,
}

/// A `MediaStore` that serves canned per-tag listings and records
/// uploads instead of performing them.
#[derive(Default)]
pub struct MockMediaStore {
    assets_by_tag: Mutex<HashMap<String, Vec<AssetDescriptor>>>,
    missing_resources: Mutex<HashSet<String>>,
    uploads: Mutex<Vec<UploadRecord>>,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assets(self, tag: &str, assets: Vec<AssetDescriptor>) -> Self {
        self.assets_by_tag
            .lock()
            .unwrap()
            .insert(tag.to_string(), assets);
        self
    }

    /// Makes `resource()` fail for the given public id even when a
    /// listing mentions it.
    pub fn with_missing_resource(self, public_id: &str) -> Self {
        self.missing_resources
            .lock()
            .unwrap()
            .insert(public_id.to_string());
        self
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().unwrap().clone()
    }
}

/// Builds a plausible remote asset descriptor for tests.
pub fn mock_asset(public_id: &str, metadata: &[(&str, &str)]) -> AssetDescriptor {
    AssetDescriptor {
        public_id: public_id.to_string(),
        width: 4032,
        height: 3024,
        url: format!("http://res.cloudinary.com/demo/image/upload/v1/{public_id}.jpg"),
        secure_url: format!("https://res.cloudinary.com/demo/image/upload/v1/{public_id}.jpg"),
        metadata: metadata
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn upload(
        &self,
        source: UploadSource,
        options: &UploadOptions,
    ) -> Result<AssetDescriptor> {
        let source = match source {
            UploadSource::File(path) => path.display().to_string(),
            UploadSource::Url(url) => url,
        };
        self.uploads.lock().unwrap().push(UploadRecord {
            source: source.clone(),
            options: options.clone(),
        });

        let public_id = options.public_id.clone().unwrap_or(source);
        Ok(mock_asset(&public_id, &[]))
    }

    async fn resources_by_tag(&self, tag: &str, _max_results: u32) -> Result<Vec<AssetDescriptor>> {
        Ok(self
            .assets_by_tag
            .lock()
            .unwrap()
            .get(tag)
            .cloned()
            .unwrap_or_default())
    }

    async fn resource(&self, public_id: &str) -> Result<AssetDescriptor> {
        if self.missing_resources.lock().unwrap().contains(public_id) {
            return Err(anyhow!("No such resource: {public_id}"));
        }
        self.assets_by_tag
            .lock()
            .unwrap()
            .values()
            .flatten()
            .find(|asset| asset.public_id == public_id)
            .cloned()
            .ok_or_else(|| anyhow!("No such resource: {public_id}"))
    }
}
