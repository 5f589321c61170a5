//! Zoom client: scheduled meetings and cloud recordings.

use std::path::Path;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{endpoint, ensure_success, ClientError, DEFAULT_TRANSFER_TIMEOUT};
use crate::config::ZoomConfig;
use crate::schedule::ParsedSchedule;

const SERVICE: &str = "zoom";

/// Zoom returns numeric meeting ids; we carry them as strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

/// A newly scheduled meeting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedMeeting {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub join_url: String,
}

/// One file of a cloud recording.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingFile {
    #[serde(default)]
    pub id: Option<String>,

    /// "MP4", "M4A", "TRANSCRIPT", "CHAT", ...
    #[serde(default)]
    pub file_type: Option<String>,

    #[serde(default)]
    pub download_url: Option<String>,

    #[serde(default)]
    pub recording_start: Option<DateTime<Utc>>,

    #[serde(default)]
    pub recording_end: Option<DateTime<Utc>>,
}

/// Recording metadata for a single meeting.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingRecordings {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    #[serde(default)]
    pub uuid: Option<String>,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Scheduled length in minutes
    #[serde(default)]
    pub duration: Option<u32>,

    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub recording_files: Vec<RecordingFile>,
}

impl MeetingRecordings {
    /// When the meeting ended: the reported end time, else the end of the
    /// last recording file, else start plus scheduled duration.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        if let Some(end) = self.end_time {
            return Some(end);
        }
        if let Some(end) = self.recording_files.iter().filter_map(|f| f.recording_end).max() {
            return Some(end);
        }
        match (self.start_time, self.duration) {
            (Some(start), Some(minutes)) => Some(start + Duration::minutes(i64::from(minutes))),
            _ => None,
        }
    }

    /// First file of the given type (case-insensitive) with a download URL.
    pub fn file_of_type(&self, file_type: &str) -> Option<&RecordingFile> {
        self.recording_files.iter().find(|f| {
            f.download_url.is_some()
                && f.file_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(file_type))
        })
    }
}

#[derive(Debug, Deserialize)]
struct RecordingsPage {
    #[serde(default)]
    meetings: Vec<MeetingRecordings>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateMeetingRequest<'a> {
    topic: &'a str,
    /// 2 = scheduled meeting
    #[serde(rename = "type")]
    kind: u8,
    start_time: String,
    duration: u32,
    timezone: &'static str,
    settings: MeetingSettings,
}

#[derive(Debug, Serialize)]
struct MeetingSettings {
    host_video: bool,
    participant_video: bool,
    auto_recording: &'static str,
}

/// Meeting provider operations used by the workflows.
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    async fn create_meeting(
        &self,
        topic: &str,
        schedule: &ParsedSchedule,
    ) -> Result<CreatedMeeting, ClientError>;

    async fn get_recordings(&self, meeting_id: &str) -> Result<MeetingRecordings, ClientError>;

    /// Recordings of meetings held between `from` and `to` (inclusive).
    async fn list_recordings(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MeetingRecordings>, ClientError>;

    async fn download_text(&self, url: &str) -> Result<String, ClientError>;

    /// Stream a recording file to `dest`, returning the number of bytes written.
    async fn download_file(&self, url: &str, dest: &Path) -> Result<u64, ClientError>;
}

pub struct ZoomClient {
    client: Client,
    api_base: String,
    user_id: String,
    token: String,
    transfer_timeout: StdDuration,
}

impl ZoomClient {
    pub fn new(client: Client, config: &ZoomConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.clone(),
            user_id: config.user_id.clone(),
            token: config.token.clone(),
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    pub fn with_transfer_timeout(mut self, timeout: StdDuration) -> Self {
        self.transfer_timeout = timeout;
        self
    }
}

#[async_trait]
impl MeetingProvider for ZoomClient {
    async fn create_meeting(
        &self,
        topic: &str,
        schedule: &ParsedSchedule,
    ) -> Result<CreatedMeeting, ClientError> {
        let url = endpoint(&self.api_base, &format!("users/{}/meetings", self.user_id));
        let request = CreateMeetingRequest {
            topic,
            kind: 2,
            start_time: schedule.start_time_utc(),
            duration: schedule.duration_minutes(),
            timezone: "UTC",
            settings: MeetingSettings {
                host_video: true,
                participant_video: true,
                auto_recording: "cloud",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;
        let meeting: CreatedMeeting = ensure_success(SERVICE, response).await?.json().await?;

        info!("Created Zoom meeting {} for '{}'", meeting.id, topic);
        Ok(meeting)
    }

    async fn get_recordings(&self, meeting_id: &str) -> Result<MeetingRecordings, ClientError> {
        let url = endpoint(&self.api_base, &format!("meetings/{}/recordings", meeting_id));
        debug!("Fetching recordings for meeting {}", meeting_id);

        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
        let recordings = ensure_success(SERVICE, response).await?.json().await?;
        Ok(recordings)
    }

    async fn list_recordings(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MeetingRecordings>, ClientError> {
        let url = endpoint(&self.api_base, &format!("users/{}/recordings", self.user_id));
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        let mut meetings = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("from", from.clone()),
                ("to", to.clone()),
                ("page_size", "300".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("next_page_token", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await?;
            let page: RecordingsPage = ensure_success(SERVICE, response).await?.json().await?;
            meetings.extend(page.meetings);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} recorded meetings from {} to {}", meetings.len(), from, to);
        Ok(meetings)
    }

    async fn download_text(&self, url: &str) -> Result<String, ClientError> {
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        let text = ensure_success(SERVICE, response).await?.text().await?;
        Ok(text)
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<u64, ClientError> {
        let mut response = ensure_success(
            SERVICE,
            self.client
                .get(url)
                .bearer_auth(&self.token)
                .timeout(self.transfer_timeout)
                .send()
                .await?,
        )
        .await?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Downloaded {} bytes to {:?}", written, dest);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::clients::build_http_client;
    use crate::config::HttpConfig;

    fn client_for(server: &MockServer) -> ZoomClient {
        ZoomClient::new(
            Client::new(),
            &ZoomConfig {
                token: "zoom-token".to_string(),
                user_id: "me".to_string(),
                api_base: server.uri(),
            },
        )
    }

    #[tokio::test]
    async fn test_create_meeting_sends_schedule() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/me/meetings"))
            .and(header("authorization", "Bearer zoom-token"))
            .and(body_partial_json(serde_json::json!({
                "topic": "Issue 1: ACD",
                "type": 2,
                "start_time": "2025-01-16T14:00:00Z",
                "duration": 90,
                "settings": { "auto_recording": "cloud" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 81234567890u64,
                "join_url": "https://zoom.us/j/81234567890"
            })))
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2025, 1, 16, 14, 0, 0).unwrap();
        let schedule = ParsedSchedule::new(start, 90).unwrap();
        let meeting = client_for(&server)
            .create_meeting("Issue 1: ACD", &schedule)
            .await
            .unwrap();

        assert_eq!(meeting.id, "81234567890");
        assert_eq!(meeting.join_url, "https://zoom.us/j/81234567890");
    }

    #[tokio::test]
    async fn test_create_meeting_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid access token"))
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let schedule = ParsedSchedule::new(start, 60).unwrap();
        let err = client_for(&server)
            .create_meeting("Test Meeting", &schedule)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::HttpStatus { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_get_recordings_finds_transcript() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meetings/123/recordings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 123,
                "uuid": "abc==",
                "topic": "ACD",
                "start_time": "2025-01-16T14:00:00Z",
                "duration": 90,
                "recording_files": [
                    { "file_type": "MP4", "download_url": "https://zoom.us/rec/mp4",
                      "recording_end": "2025-01-16T15:25:00Z" },
                    { "file_type": "TRANSCRIPT", "download_url": "https://zoom.us/rec/vtt",
                      "recording_end": "2025-01-16T15:31:00Z" }
                ]
            })))
            .mount(&server)
            .await;

        let recordings = client_for(&server).get_recordings("123").await.unwrap();
        assert_eq!(recordings.id, "123");
        assert_eq!(
            recordings.file_of_type("transcript").unwrap().download_url.as_deref(),
            Some("https://zoom.us/rec/vtt")
        );
        assert_eq!(
            recordings.end_time(),
            Some(Utc.with_ymd_and_hms(2025, 1, 16, 15, 31, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_list_recordings_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/recordings"))
            .and(query_param("next_page_token", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meetings": [{ "id": 2, "topic": "second" }],
                "next_page_token": ""
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me/recordings"))
            .and(query_param("from", "2025-01-01"))
            .and(query_param("to", "2025-01-31"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meetings": [{ "id": 1, "topic": "first" }],
                "next_page_token": "p2"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let meetings = client_for(&server).list_recordings(from, to).await.unwrap();

        let ids: Vec<&str> = meetings.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_download_text_and_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rec/vtt"))
            .and(header("authorization", "Bearer zoom-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("WEBVTT\n\nhello"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rec/mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 2048]))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client
            .download_text(&format!("{}/rec/vtt", server.uri()))
            .await
            .unwrap();
        assert!(text.starts_with("WEBVTT"));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("123.mp4");
        let written = client
            .download_file(&format!("{}/rec/mp4", server.uri()), &dest)
            .await
            .unwrap();
        assert_eq!(written, 2048);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 2048);
    }

    #[tokio::test]
    async fn test_download_file_outlives_api_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rec/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![7u8; 512])
                    .set_delay(StdDuration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let http = build_http_client(&HttpConfig {
            timeout_seconds: 1,
            ..HttpConfig::default()
        })
        .unwrap();
        let config = ZoomConfig {
            token: "zoom-token".to_string(),
            user_id: "me".to_string(),
            api_base: server.uri(),
        };
        let url = format!("{}/rec/slow", server.uri());

        let api_only = ZoomClient::new(http.clone(), &config);
        assert!(matches!(
            api_only.download_text(&url).await,
            Err(ClientError::Http(e)) if e.is_timeout()
        ));

        let client =
            ZoomClient::new(http, &config).with_transfer_timeout(StdDuration::from_secs(10));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("slow.mp4");
        let written = client.download_file(&url, &dest).await.unwrap();
        assert_eq!(written, 512);
    }

    #[test]
    fn test_end_time_falls_back_to_schedule() {
        let recordings: MeetingRecordings = serde_json::from_value(serde_json::json!({
            "id": "9",
            "start_time": "2025-01-16T14:00:00Z",
            "duration": 60
        }))
        .unwrap();
        assert_eq!(
            recordings.end_time(),
            Some(Utc.with_ymd_and_hms(2025, 1, 16, 15, 0, 0).unwrap())
        );
        assert!(recordings.file_of_type("MP4").is_none());
    }
}
