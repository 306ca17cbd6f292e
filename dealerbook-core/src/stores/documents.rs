use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::error::DocumentError;
use crate::stores::DocumentStore;

/// Document store writing files under a local directory.
///
/// Public URLs are `base_url/name` with the name percent-encoded; serving
/// them is left to whatever exposes the directory (the HTTP router does this
/// for local deployments).
pub struct LocalDocumentStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalDocumentStore {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> Result<Self, std::io::Error> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            base_url: base_url.into(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolves `name` inside the base directory, refusing path traversal.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && !name.contains(|c: char| c == '/' || c == '\\')
            && name != "."
            && name != "..";
        valid.then(|| self.base_path.join(name))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), DocumentError> {
        let path = self.path_for(name).ok_or_else(|| DocumentError::Upload {
            name: name.to_string(),
            cause: "invalid document name".into(),
        })?;

        // Write then rename so readers never see a half-written document.
        let staging = self.base_path.join(format!(".{}.partial", name));
        let written = async {
            fs::write(&staging, &bytes).await?;
            fs::rename(&staging, &path).await
        }
        .await;
        written.map_err(|e| DocumentError::Upload {
            name: name.to_string(),
            cause: e.into(),
        })?;

        info!("Stored document {} ({} bytes)", name, bytes.len());
        Ok(())
    }

    async fn public_url(&self, name: &str) -> Result<String, DocumentError> {
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(name)
        ))
    }
}

/// Document store backed by an object-storage REST API.
///
/// Uploads go to `{base}/storage/v1/object/{bucket}/{name}` with upsert
/// enabled; public URLs are `{base}/storage/v1/object/public/{bucket}/{name}`.
/// The name is percent-encoded in both.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpObjectStore {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            api_key: api_key.into(),
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl DocumentStore for HttpObjectStore {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DocumentError> {
        let upload_error = |cause: crate::error::BoxError| DocumentError::Upload {
            name: name.to_string(),
            cause,
        };

        let response = self
            .client
            .post(self.object_url(name))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| upload_error(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(upload_error(
                format!("object storage answered {}", status).into(),
            ));
        }

        info!("Uploaded document {} to bucket {}", name, self.bucket);
        Ok(())
    }

    async fn public_url(&self, name: &str) -> Result<String, DocumentError> {
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name)
        ))
    }
}
