//! Cloudinary client for photoatlas.
//!
//! This module wraps the two Cloudinary endpoints the pipeline needs: the
//! upload API (signed multipart POST) and the admin API (basic-auth GET
//! for per-tag resource listings and single-asset lookups). The
//! `MediaStore` trait is the seam the pipeline code is written against,
//! so tests can substitute an in-memory store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Cloudinary account credentials, loaded from the environment at
/// process start.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            cloud_name: env::var("CLOUDINARY_CLOUD_NAME")
                .context("CLOUDINARY_CLOUD_NAME is not set")?,
            api_key: env::var("CLOUDINARY_API_KEY").context("CLOUDINARY_API_KEY is not set")?,
            api_secret: env::var("CLOUDINARY_API_SECRET")
                .context("CLOUDINARY_API_SECRET is not set")?,
        })
    }
}

/// One remote asset as Cloudinary describes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub public_id: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
    pub secure_url: String,
    /// Structured metadata previously attached at upload time
    /// (latitude/longitude/altitude/timestamp, optionally caption).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl AssetDescriptor {
    /// Delivery URL for the 100px-wide gallery thumbnail.
    ///
    /// The manifest stores only `root_url` and the public id; the front
    /// end splices in its own transformation segments. This method and
    /// `icon_url` pin the exact segments that contract expects.
    pub fn thumbnail_url(&self) -> String {
        insert_transformation(&self.url, "w_100,q_80/")
    }

    /// Delivery URL for the 40x40 map icon. See `thumbnail_url`.
    pub fn icon_url(&self) -> String {
        insert_transformation(&self.url, "w_ 40,h_40,c_fill,q_80/")
    }
}

/// Inserts a transformation segment right after the `upload/` path
/// component of a delivery URL. Returns the URL unchanged when the
/// component is missing.
fn insert_transformation(url: &str, transformation: &str) -> String {
    match url.find("upload/") {
        Some(idx) => {
            let split = idx + "upload/".len();
            format!("{}{}{}", &url[..split], transformation, &url[split..])
        }
        None => url.to_string(),
    }
}

/// Source of the bytes for an upload: a local file or a URL the remote
/// store fetches itself (used by the resize pass).
#[derive(Debug, Clone)]
pub enum UploadSource {
    File(PathBuf),
    Url(String),
}

/// Options attached to a single upload call.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Tags to attach; the collection name in practice.
    pub tags: Vec<String>,
    /// Pipe-delimited `key=value|key=value` metadata string.
    pub metadata: Option<String>,
    /// Explicit public id, to overwrite an existing asset in place.
    pub public_id: Option<String>,
    pub overwrite: bool,
    /// Eager transformation applied server-side, e.g. `w_1000,q_80`.
    pub transformation: Option<String>,
}

/// Interface to the remote media store.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores content and attaches tags/metadata, returning the remote
    /// descriptor.
    async fn upload(&self, source: UploadSource, options: &UploadOptions)
        -> Result<AssetDescriptor>;

    /// Lists the assets carrying a tag, with their attached metadata.
    async fn resources_by_tag(&self, tag: &str, max_results: u32) -> Result<Vec<AssetDescriptor>>;

    /// Looks up a single asset by its public id.
    async fn resource(&self, public_id: &str) -> Result<AssetDescriptor>;
}

#[derive(Debug, Deserialize)]
struct ResourceList {
    resources: Vec<AssetDescriptor>,
}

/// Concrete Cloudinary-backed implementation of `MediaStore`.
pub struct CloudinaryClient {
    client: Client,
    credentials: Credentials,
    api_base: String,
}

impl CloudinaryClient {
    pub fn new(credentials: Credentials) -> Self {
        let api_base = format!(
            "https://api.cloudinary.com/v1_1/{}",
            credentials.cloud_name
        );
        Self::with_api_base(credentials, api_base)
    }

    /// Points the client at a different API root; used by tests to talk
    /// to a local mock server.
    pub fn with_api_base(credentials: Credentials, api_base: String) -> Self {
        Self {
            client: Client::new(),
            credentials,
            api_base,
        }
    }

    /// Computes the SHA-256 request signature over the sorted parameter
    /// string, as the upload API requires.
    fn sign(&self, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();

        let to_sign = sorted
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.credentials.api_secret.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    fn upload_params(&self, options: &UploadOptions, timestamp: i64) -> Vec<(String, String)> {
        let mut params = vec![("timestamp".to_string(), timestamp.to_string())];
        if !options.tags.is_empty() {
            params.push(("tags".to_string(), options.tags.join(",")));
        }
        if let Some(metadata) = &options.metadata {
            params.push(("metadata".to_string(), metadata.clone()));
        }
        if let Some(public_id) = &options.public_id {
            params.push(("public_id".to_string(), public_id.clone()));
        }
        if options.overwrite {
            params.push(("overwrite".to_string(), "true".to_string()));
        }
        if let Some(transformation) = &options.transformation {
            params.push(("transformation".to_string(), transformation.clone()));
        }
        params.push(("signature_algorithm".to_string(), "sha256".to_string()));
        params
    }
}

#[async_trait]
impl MediaStore for CloudinaryClient {
    async fn upload(
        &self,
        source: UploadSource,
        options: &UploadOptions,
    ) -> Result<AssetDescriptor> {
        let timestamp = Utc::now().timestamp();
        let params = self.upload_params(options, timestamp);
        let signature = self.sign(&params);

        let mut form = reqwest::multipart::Form::new()
            .text("api_key", self.credentials.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        form = match source {
            UploadSource::File(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| "upload.jpg".to_string());
                form.part(
                    "file",
                    reqwest::multipart::Part::bytes(bytes).file_name(filename),
                )
            }
            UploadSource::Url(url) => form.text("file", url),
        };

        let response = self
            .client
            .post(format!("{}/image/upload", self.api_base))
            .multipart(form)
            .send()
            .await
            .context("Upload request failed")?
            .error_for_status()
            .context("Upload rejected by Cloudinary")?;

        response
            .json::<AssetDescriptor>()
            .await
            .context("Failed to parse upload response")
    }

    async fn resources_by_tag(&self, tag: &str, max_results: u32) -> Result<Vec<AssetDescriptor>> {
        let url = format!("{}/resources/image/tags/{}", self.api_base, tag);
        let response = self
            .client
            .get(url)
            .query(&[
                ("max_results", max_results.to_string()),
                ("metadata", "true".to_string()),
            ])
            .basic_auth(
                &self.credentials.api_key,
                Some(&self.credentials.api_secret),
            )
            .send()
            .await
            .with_context(|| format!("Failed to list resources for tag {tag}"))?
            .error_for_status()
            .with_context(|| format!("Resource listing rejected for tag {tag}"))?;

        let list = response
            .json::<ResourceList>()
            .await
            .context("Failed to parse resource listing")?;

        Ok(list.resources)
    }

    async fn resource(&self, public_id: &str) -> Result<AssetDescriptor> {
        let url = format!("{}/resources/image/upload/{}", self.api_base, public_id);
        let response = self
            .client
            .get(url)
            .basic_auth(
                &self.credentials.api_key,
                Some(&self.credentials.api_secret),
            )
            .send()
            .await
            .with_context(|| format!("Failed to look up resource {public_id}"))?
            .error_for_status()
            .with_context(|| format!("Resource lookup rejected for {public_id}"))?;

        response
            .json::<AssetDescriptor>()
            .await
            .context("Failed to parse resource response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> Credentials {
        Credentials {
            cloud_name: "demo".to_string(),
            api_key: "key123".to_string(),
            api_secret: "secret456".to_string(),
        }
    }

    #[test]
    fn test_signature_is_deterministic_and_sorted() {
        let client = CloudinaryClient::new(test_credentials());

        let forward = vec![
            ("tags".to_string(), "Chicago".to_string()),
            ("timestamp".to_string(), "1700000000".to_string()),
        ];
        let reversed = vec![
            ("timestamp".to_string(), "1700000000".to_string()),
            ("tags".to_string(), "Chicago".to_string()),
        ];

        let sig = client.sign(&forward);
        assert_eq!(sig, client.sign(&reversed));
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_upload_params_include_options() {
        let client = CloudinaryClient::new(test_credentials());
        let options = UploadOptions {
            tags: vec!["Chicago".to_string()],
            metadata: Some("latitude=41.9|timestamp=2023:05:01 10:00:00".to_string()),
            public_id: Some("chicago/skyline".to_string()),
            overwrite: true,
            transformation: Some("w_1000,q_80".to_string()),
        };

        let params = client.upload_params(&options, 1700000000);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();

        assert!(keys.contains(&"tags"));
        assert!(keys.contains(&"metadata"));
        assert!(keys.contains(&"public_id"));
        assert!(keys.contains(&"overwrite"));
        assert!(keys.contains(&"transformation"));
        assert!(keys.contains(&"timestamp"));
    }

    #[test]
    fn test_thumbnail_and_icon_urls() {
        let asset = AssetDescriptor {
            public_id: "abc123".to_string(),
            width: 4032,
            height: 3024,
            url: "http://res.cloudinary.com/demo/image/upload/v1/abc123.jpg".to_string(),
            secure_url: "https://res.cloudinary.com/demo/image/upload/v1/abc123.jpg".to_string(),
            metadata: HashMap::new(),
        };

        assert_eq!(
            asset.thumbnail_url(),
            "http://res.cloudinary.com/demo/image/upload/w_100,q_80/v1/abc123.jpg"
        );
        assert_eq!(
            asset.icon_url(),
            "http://res.cloudinary.com/demo/image/upload/w_ 40,h_40,c_fill,q_80/v1/abc123.jpg"
        );
    }

    #[tokio::test]
    async fn test_resources_by_tag_parses_listing() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "resources": [
                {
                    "public_id": "chicago/one",
                    "width": 4032,
                    "height": 3024,
                    "url": "http://res.cloudinary.com/demo/image/upload/v1/chicago/one.jpg",
                    "secure_url": "https://res.cloudinary.com/demo/image/upload/v1/chicago/one.jpg",
                    "metadata": {
                        "latitude": "41.87",
                        "longitude": "-87.62",
                        "timestamp": "2023:05:01 10:00:00"
                    }
                }
            ]
        }"#;

        let mock = server
            .mock("GET", "/resources/image/tags/Chicago")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = CloudinaryClient::with_api_base(test_credentials(), server.url());
        let resources = client.resources_by_tag("Chicago", 100).await?;

        mock.assert_async().await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].public_id, "chicago/one");
        assert_eq!(
            resources[0].metadata.get("timestamp").map(String::as_str),
            Some("2023:05:01 10:00:00")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_resource_lookup_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/resources/image/upload/missing")
            .with_status(404)
            .create_async()
            .await;

        let client = CloudinaryClient::with_api_base(test_credentials(), server.url());
        assert!(client.resource("missing").await.is_err());
    }
}
