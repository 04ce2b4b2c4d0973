//! File upload side-channel.
//!
//! Files are pushed as raw bytes to the configured upload endpoint, which
//! answers with a publicly fetchable URL that later lands in the page's file
//! blocks. Uploads are best-effort: a failed upload leaves the file without
//! a URL and the body builder degrades it to a fallback note.

use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::UploadConfig;
use crate::error::Result;
use crate::input::InputFile;

/// Client for the upload endpoint.
#[derive(Clone)]
pub struct UploadClient {
    endpoint: String,
    client: reqwest::Client,
}

impl UploadClient {
    /// Build a client when an endpoint is configured; `None` otherwise.
    pub fn from_config(config: &UploadConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            endpoint,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
        }))
    }

    /// Upload one file's bytes. Returns the public URL, or `None` on any
    /// failure — upload failures never abort the publish.
    pub async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Option<String> {
        let result = self
            .client
            .post(&self.endpoint)
            .query(&[("filename", name)])
            .body(bytes)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "file upload failed");
                return None;
            }
        };
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(file = %name, %status, %body, "file upload rejected");
            return None;
        }
        match response.json::<serde_json::Value>().await {
            Ok(blob) => blob["url"].as_str().map(|s| s.to_string()),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "file upload returned invalid body");
                None
            }
        }
    }

    /// Upload every file that does not yet have a public URL.
    ///
    /// Uploads run concurrently as an unordered batch; each task carries its
    /// original list index, so results are reassigned to the right entries
    /// regardless of completion order or partial failure. Files that already
    /// have a URL are never re-uploaded.
    pub async fn upload_all(&self, files: &mut [InputFile]) {
        let mut tasks: JoinSet<(usize, Option<String>)> = JoinSet::new();
        for (index, file) in files.iter().enumerate() {
            if file.public_url.is_some() {
                continue;
            }
            let client = self.clone();
            let name = file.name.clone();
            let bytes = file.bytes.clone();
            tasks.spawn(async move { (index, client.upload_file(&name, bytes).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, url)) = joined {
                files[index].public_url = url;
            }
        }
    }
}
