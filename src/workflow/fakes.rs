//! In-memory collaborators for workflow tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::clients::discourse::CreatedPost;
use crate::clients::{
    CalendarProvider, ChatNotifier, ClientError, CreatedMeeting, Issue, IssueComment,
    IssueTracker, MeetingProvider, MeetingRecordings, TopicProvider, TopicUpdate, VideoHost,
};
use crate::schedule::ParsedSchedule;

fn unavailable(service: &'static str) -> ClientError {
    ClientError::HttpStatus {
        service,
        status: 503,
        body: "unavailable".to_string(),
    }
}

pub struct FakeIssues {
    pub issue: Issue,
    pub existing_comments: Vec<IssueComment>,
    pub posted: Mutex<Vec<String>>,
}

impl FakeIssues {
    pub fn new(number: u64, title: &str, body: Option<&str>) -> Self {
        Self {
            issue: Issue {
                number,
                title: title.to_string(),
                body: body.map(|b| b.to_string()),
            },
            existing_comments: Vec::new(),
            posted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_comment(mut self, body: &str) -> Self {
        let id = self.existing_comments.len() as u64 + 1;
        self.existing_comments.push(IssueComment {
            id,
            body: body.to_string(),
        });
        self
    }

    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeIssues {
    async fn get_issue(&self, number: u64) -> Result<Issue, ClientError> {
        if number == self.issue.number {
            Ok(self.issue.clone())
        } else {
            Err(ClientError::HttpStatus {
                service: "github",
                status: 404,
                body: "Not Found".to_string(),
            })
        }
    }

    async fn create_comment(&self, _number: u64, body: &str) -> Result<(), ClientError> {
        self.posted.lock().unwrap().push(body.to_string());
        Ok(())
    }

    async fn list_comments(&self, _number: u64) -> Result<Vec<IssueComment>, ClientError> {
        Ok(self.existing_comments.clone())
    }
}

#[derive(Default)]
pub struct FakeMeetings {
    pub fail_create: bool,
    pub created: Mutex<Vec<(String, ParsedSchedule)>>,
    pub recordings: HashMap<String, MeetingRecordings>,
    pub listed: Vec<MeetingRecordings>,
    pub texts: HashMap<String, String>,
    pub downloads: Mutex<Vec<PathBuf>>,
    pub list_window: Mutex<Option<(NaiveDate, NaiveDate)>>,
}

impl FakeMeetings {
    pub fn with_recording(mut self, recording: MeetingRecordings) -> Self {
        self.recordings.insert(recording.id.clone(), recording);
        self
    }

    pub fn created(&self) -> Vec<(String, ParsedSchedule)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeetingProvider for FakeMeetings {
    async fn create_meeting(
        &self,
        topic: &str,
        schedule: &ParsedSchedule,
    ) -> Result<CreatedMeeting, ClientError> {
        if self.fail_create {
            return Err(unavailable("zoom"));
        }
        let mut created = self.created.lock().unwrap();
        created.push((topic.to_string(), *schedule));
        let id = format!("{}", 81000000000u64 + created.len() as u64);
        Ok(CreatedMeeting {
            join_url: format!("https://zoom.us/j/{}", id),
            id,
        })
    }

    async fn get_recordings(&self, meeting_id: &str) -> Result<MeetingRecordings, ClientError> {
        self.recordings
            .get(meeting_id)
            .cloned()
            .ok_or_else(|| ClientError::HttpStatus {
                service: "zoom",
                status: 404,
                body: "This recording does not exist.".to_string(),
            })
    }

    async fn list_recordings(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MeetingRecordings>, ClientError> {
        *self.list_window.lock().unwrap() = Some((from, to));
        Ok(self.listed.clone())
    }

    async fn download_text(&self, url: &str) -> Result<String, ClientError> {
        self.texts.get(url).cloned().ok_or_else(|| unavailable("zoom"))
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<u64, ClientError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, url.as_bytes())?;
        self.downloads.lock().unwrap().push(dest.to_path_buf());
        Ok(url.len() as u64)
    }
}

pub struct FakeTopics {
    pub next_topic_id: u64,
    pub fail_update: bool,
    pub created: Mutex<Vec<(String, String, u64)>>,
    pub updates: Mutex<Vec<(u64, TopicUpdate)>>,
    pub posts: Mutex<Vec<(u64, String)>>,
}

impl Default for FakeTopics {
    fn default() -> Self {
        Self {
            next_topic_id: 500,
            fail_update: false,
            created: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTopics {
    pub fn created(&self) -> Vec<(String, String, u64)> {
        self.created.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(u64, TopicUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(u64, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TopicProvider for FakeTopics {
    async fn create_topic(
        &self,
        title: &str,
        body: &str,
        category_id: u64,
    ) -> Result<CreatedPost, ClientError> {
        let mut created = self.created.lock().unwrap();
        created.push((title.to_string(), body.to_string(), category_id));
        let topic_id = self.next_topic_id + created.len() as u64 - 1;
        Ok(CreatedPost {
            id: topic_id * 10,
            topic_id,
        })
    }

    async fn update_topic(&self, topic_id: u64, update: &TopicUpdate) -> Result<(), ClientError> {
        if self.fail_update {
            return Err(unavailable("discourse"));
        }
        self.updates.lock().unwrap().push((topic_id, update.clone()));
        Ok(())
    }

    async fn create_post(&self, topic_id: u64, body: &str) -> Result<CreatedPost, ClientError> {
        self.posts.lock().unwrap().push((topic_id, body.to_string()));
        Ok(CreatedPost { id: 1, topic_id })
    }

    fn topic_url(&self, topic_id: u64) -> String {
        format!("https://forum.example/t/{}", topic_id)
    }
}

#[derive(Default)]
pub struct FakeCalendar {
    pub fail: bool,
    pub events: Mutex<Vec<(String, ParsedSchedule)>>,
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn create_event(
        &self,
        summary: &str,
        schedule: &ParsedSchedule,
        _description: &str,
    ) -> Result<Option<String>, ClientError> {
        if self.fail {
            return Err(unavailable("calendar"));
        }
        self.events
            .lock()
            .unwrap()
            .push((summary.to_string(), *schedule));
        Ok(Some("https://calendar.example/event".to_string()))
    }
}

#[derive(Default)]
pub struct FakeChat {
    pub fail: bool,
    pub messages: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatNotifier for FakeChat {
    async fn send_message(&self, text: &str) -> Result<(), ClientError> {
        if self.fail {
            return Err(unavailable("telegram"));
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeVideos {
    pub existing_titles: Vec<String>,
    /// (file path, whether the file existed at upload time, title)
    pub uploads: Mutex<Vec<(PathBuf, bool, String)>>,
}

#[async_trait]
impl VideoHost for FakeVideos {
    async fn video_exists(&self, title: &str) -> Result<bool, ClientError> {
        Ok(self.existing_titles.iter().any(|t| t == title))
    }

    async fn upload_video(
        &self,
        path: &Path,
        title: &str,
        _description: &str,
    ) -> Result<String, ClientError> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists(), title.to_string()));
        Ok("yt-video-1".to_string())
    }
}

/// Build recording metadata from JSON, the way the API returns it.
pub fn recording(value: serde_json::Value) -> MeetingRecordings {
    serde_json::from_value(value).unwrap()
}
