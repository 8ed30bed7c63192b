use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn resource_type(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    pub url: String,
    /// Seconds; only reported for video uploads.
    pub duration: Option<f64>,
}

/// Third-party media host that turns a local file into a public URL.
#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, path: &Path, kind: MediaKind) -> anyhow::Result<UploadedMedia>;
}

/// Signed uploads against the Cloudinary REST upload API.
pub struct CloudinaryHost {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct CloudinaryUpload {
    secure_url: String,
    #[serde(default)]
    duration: Option<f64>,
}

impl CloudinaryHost {
    pub fn new(cloud_name: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://api.cloudinary.com/v1_1/{cloud_name}"),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    /// Request signature: SHA-1 over the sorted signed params followed by
    /// the API secret.
    fn signature(&self, timestamp: i64) -> String {
        let mut hasher = Sha1::new();
        hasher.update(format!("timestamp={timestamp}{}", self.api_secret).as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, path: &Path, kind: MediaKind) -> anyhow::Result<UploadedMedia> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());

        let timestamp = Utc::now().timestamp();
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::stream_with_length(reqwest::Body::from(file), size)
                    .file_name(file_name),
            )
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", self.signature(timestamp));

        let url = format!("{}/{}/upload", self.base_url, kind.resource_type());
        let uploaded: CloudinaryUpload = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Uploaded {} bytes to {}", size, uploaded.secure_url);
        Ok(UploadedMedia {
            url: uploaded.secure_url,
            duration: uploaded.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Multipart, routing::post};
    use serde_json::{Value, json};

    /// Stand-in upload endpoint: reports the size of the `file` part it got.
    async fn fake_upload(mut multipart: Multipart) -> Json<Value> {
        let mut size = 0;
        let mut signed = false;
        while let Some(field) = multipart.next_field().await.unwrap() {
            match field.name() {
                Some("file") => size = field.bytes().await.unwrap().len(),
                Some("signature") => signed = field.text().await.unwrap().len() == 40,
                _ => {}
            }
        }
        assert!(signed);
        Json(json!({ "secure_url": format!("https://media.test/{size}"), "duration": 3.5 }))
    }

    #[tokio::test]
    async fn upload_streams_file_from_disk() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/video/upload", post(fake_upload));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, vec![7u8; 300_000]).await.unwrap();

        let mut host = CloudinaryHost::new("demo", "key", "abcd");
        host.base_url = format!("http://{addr}");
        let uploaded = host.upload(&path, MediaKind::Video).await.unwrap();
        assert_eq!(uploaded.url, "https://media.test/300000");
        assert_eq!(uploaded.duration, Some(3.5));
    }

    #[test]
    fn signature_is_hex_sha1_of_params_and_secret() {
        let host = CloudinaryHost::new("demo", "key", "abcd");
        // sha1("timestamp=1315060510abcd")
        assert_eq!(
            host.signature(1_315_060_510),
            "a21ad0f63beb4de2e5575204b79ab90bffb02c10"
        );
        assert_ne!(host.signature(1_315_060_510), host.signature(1_315_060_511));
    }
}
