use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for the bandwidth-capping resize pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResizeSettings {
    /// JPEG quality applied on re-upload
    pub quality: u32,
    /// Longest-edge target in pixels
    pub target_width: u32,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            target_width: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ordered list of collection names. Each maps 1:1 to a directory
    /// under `photos_dir` and a remote tag; this list is the sole work
    /// schedule, so keep it in sync with both.
    pub collections: Vec<String>,
    pub photos_dir: String,
    pub manifest_path: String,
    pub csv_path: String,
    /// Delivery URL prefix recorded in every manifest entry
    pub root_url: String,
    /// Cap on assets fetched per tag when building the manifest
    pub max_results: u32,
    pub resize: ResizeSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collections: vec!["Chicago".to_string(), "Detroit".to_string()],
            photos_dir: "photos".to_string(),
            manifest_path: "src/photo-data.json".to_string(),
            csv_path: "photo-data.csv".to_string(),
            root_url: "https://res.cloudinary.com/<cloud_name>/image/upload/".to_string(),
            max_results: 100,
            resize: ResizeSettings::default(),
        }
    }
}

impl Config {
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config = serde_yaml::from_str(&yaml)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Ok(config)
    }

    pub fn get_config_path(config_arg: &Option<PathBuf>) -> PathBuf {
        config_arg
            .clone()
            .unwrap_or_else(|| PathBuf::from("photoatlas.yaml"))
    }

    /// Directory holding one collection's JPEGs.
    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        Path::new(&self.photos_dir).join(collection)
    }
}
