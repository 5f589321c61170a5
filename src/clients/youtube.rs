//! YouTube Data API client for publishing call recordings.
//!
//! Uploads use the resumable protocol: a metadata request opens an upload
//! session whose URL comes back in the `Location` header, then the file
//! bytes are sent to that URL in a single `PUT`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::{endpoint, ensure_success, ClientError, DEFAULT_TRANSFER_TIMEOUT};
use crate::config::YoutubeConfig;

const SERVICE: &str = "youtube";

#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Whether the channel already has a video with exactly this title.
    async fn video_exists(&self, title: &str) -> Result<bool, ClientError>;

    /// Upload a video file and return the new video id.
    async fn upload_video(
        &self,
        path: &Path,
        title: &str,
        description: &str,
    ) -> Result<String, ClientError>;
}

#[derive(Debug, Serialize)]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    category_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    privacy_status: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    snippet: Option<SearchSnippet>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

pub struct YoutubeClient {
    client: Client,
    config: YoutubeConfig,
    transfer_timeout: Duration,
}

impl YoutubeClient {
    pub fn new(client: Client, config: &YoutubeConfig) -> Self {
        Self {
            client,
            config: config.clone(),
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Open a resumable upload session and return its URL.
    async fn start_upload(
        &self,
        title: &str,
        description: &str,
        content_length: u64,
    ) -> Result<String, ClientError> {
        let url = endpoint(&self.config.upload_base, "videos");
        let metadata = VideoResource {
            snippet: Snippet {
                title,
                description,
                category_id: &self.config.category_id,
            },
            status: Status {
                privacy_status: &self.config.privacy_status,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", content_length.to_string())
            .json(&metadata)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::UnexpectedResponse {
                service: SERVICE,
                message: "upload session has no Location header".to_string(),
            })
    }
}

#[async_trait]
impl VideoHost for YoutubeClient {
    async fn video_exists(&self, title: &str) -> Result<bool, ClientError> {
        let url = endpoint(&self.config.api_base, "search");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("q", title),
                ("part", "snippet"),
                ("type", "video"),
                ("forMine", "true"),
                ("maxResults", "5"),
            ])
            .send()
            .await?;
        let results: SearchResponse = ensure_success(SERVICE, response).await?.json().await?;

        let exists = results
            .items
            .iter()
            .filter_map(|item| item.snippet.as_ref())
            .any(|s| s.title.trim().eq_ignore_ascii_case(title.trim()));
        debug!("Video '{}' exists: {}", title, exists);
        Ok(exists)
    }

    async fn upload_video(
        &self,
        path: &Path,
        title: &str,
        description: &str,
    ) -> Result<String, ClientError> {
        let file = fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let session_url = self.start_upload(title, description, size).await?;

        info!("Uploading {} bytes from {:?}", size, path);
        let response = self
            .client
            .put(&session_url)
            .bearer_auth(&self.config.access_token)
            .header(CONTENT_TYPE, "video/*")
            .header(CONTENT_LENGTH, size)
            .timeout(self.transfer_timeout)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        let video: UploadedVideo = ensure_success(SERVICE, response).await?.json().await?;

        info!("Uploaded video {} '{}'", video.id, title);
        Ok(video.id)
    }
}
