//! Recording follow-up for finished meetings.
//!
//! Zoom needs a few hours after a call ends before transcripts and video
//! files are ready, so a poll only picks up meetings whose end is at least
//! `eligibility_delay_hours` in the past. Each eligible meeting gets its
//! transcript posted and, when a video host is configured, its recording
//! published.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::WorkflowError;
use crate::clients::{MeetingProvider, TopicProvider, VideoHost};
use crate::config::{PollingConfig, MAX_ELIGIBILITY_DELAY_HOURS, MAX_LOOKBACK_DAYS};
use crate::storage::{MeetingMapping, MeetingRecord};

/// Whether a meeting that ended at `end` is old enough to process.
pub fn is_meeting_eligible(end: DateTime<Utc>, now: DateTime<Utc>, delay: Duration) -> bool {
    now - end >= delay
}

/// Counts from one poll run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub processed: usize,
    pub skipped: usize,
    pub not_yet_eligible: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded { video_id: String },
    AlreadyUploaded { video_id: String },
    /// A video with the same title is already on the channel.
    AlreadyExists { title: String },
}

pub struct RecordingWorkflow {
    pub(super) meetings: Arc<dyn MeetingProvider>,
    pub(super) topics: Arc<dyn TopicProvider>,
    videos: Option<Arc<dyn VideoHost>>,
    pub(super) category_id: u64,
    pub(super) mapping_path: PathBuf,
    recordings_dir: PathBuf,
    polling: PollingConfig,
}

impl RecordingWorkflow {
    pub fn new(
        meetings: Arc<dyn MeetingProvider>,
        topics: Arc<dyn TopicProvider>,
        category_id: u64,
        mapping_path: PathBuf,
        recordings_dir: PathBuf,
        polling: PollingConfig,
    ) -> Self {
        Self {
            meetings,
            topics,
            videos: None,
            category_id,
            mapping_path,
            recordings_dir,
            polling,
        }
    }

    pub fn with_videos(mut self, videos: Arc<dyn VideoHost>) -> Self {
        self.videos = Some(videos);
        self
    }

    /// Process every finished meeting in the lookback window, or only
    /// `force_meeting_id` when given (bypassing the eligibility delay).
    pub async fn poll_recordings(
        &self,
        now: DateTime<Utc>,
        force_meeting_id: Option<&str>,
    ) -> Result<PollSummary, WorkflowError> {
        let mut summary = PollSummary::default();

        if let Some(meeting_id) = force_meeting_id {
            info!("Forcing processing of meeting {}", meeting_id);
            match self.process_meeting(meeting_id).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    error!("Failed to process meeting {}: {}", meeting_id, e);
                    summary.failed += 1;
                }
            }
            return Ok(summary);
        }

        let to = now.date_naive();
        let from = to - Duration::days(self.polling.lookback_days.clamp(1, MAX_LOOKBACK_DAYS));
        let delay = Duration::hours(
            self.polling
                .eligibility_delay_hours
                .clamp(0, MAX_ELIGIBILITY_DELAY_HOURS),
        );
        let recordings = self.meetings.list_recordings(from, to).await?;
        let mapping = MeetingMapping::load(&self.mapping_path)?;
        info!("Found {} recorded meetings since {}", recordings.len(), from);

        let mut seen = HashSet::new();
        for meeting in recordings {
            if meeting.id.is_empty() || !seen.insert(meeting.id.clone()) {
                summary.skipped += 1;
                continue;
            }
            if mapping
                .get(&meeting.id)
                .is_some_and(|r| r.transcript_posted)
            {
                debug!("Transcript for {} already posted", meeting.id);
                summary.skipped += 1;
                continue;
            }
            let Some(end) = meeting.end_time() else {
                warn!("Meeting {} has no end time, skipping", meeting.id);
                summary.skipped += 1;
                continue;
            };
            if !is_meeting_eligible(end, now, delay) {
                debug!("Meeting {} ended at {}, not yet eligible", meeting.id, end);
                summary.not_yet_eligible += 1;
                continue;
            }

            match self.process_meeting(&meeting.id).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    error!("Failed to process meeting {}: {}", meeting.id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Poll complete: {} processed, {} skipped, {} not yet eligible, {} failed",
            summary.processed, summary.skipped, summary.not_yet_eligible, summary.failed
        );
        Ok(summary)
    }

    async fn process_meeting(&self, meeting_id: &str) -> Result<(), WorkflowError> {
        self.post_transcript(meeting_id).await?;
        if self.videos.is_some() {
            if let Err(e) = self.upload_recording(meeting_id).await {
                warn!("Recording upload for {} failed: {}", meeting_id, e);
            }
        }
        Ok(())
    }

    /// Publish a meeting's MP4 recording to the video host.
    pub async fn upload_recording(&self, meeting_id: &str) -> Result<UploadOutcome, WorkflowError> {
        let videos = self.videos.as_ref().ok_or(WorkflowError::NoVideoHost)?;
        let mut mapping = MeetingMapping::load(&self.mapping_path)?;

        if let Some(video_id) = mapping
            .get(meeting_id)
            .and_then(|r| r.youtube_video_id.clone())
        {
            info!("Meeting {} already uploaded as {}", meeting_id, video_id);
            return Ok(UploadOutcome::AlreadyUploaded { video_id });
        }

        let recordings = self.meetings.get_recordings(meeting_id).await?;
        let download_url = recordings
            .file_of_type("MP4")
            .and_then(|f| f.download_url.clone())
            .ok_or_else(|| WorkflowError::RecordingNotFound(meeting_id.to_string()))?;

        let title = mapping
            .get(meeting_id)
            .map(|r| r.issue_title.clone())
            .filter(|t| !t.is_empty())
            .or_else(|| recordings.topic.clone())
            .unwrap_or_else(|| format!("Meeting {}", meeting_id));

        if videos.video_exists(&title).await? {
            info!("Video '{}' already exists, skipping upload", title);
            return Ok(UploadOutcome::AlreadyExists { title });
        }

        let path = self.recordings_dir.join(format!("{}.mp4", meeting_id));
        let bytes = self.meetings.download_file(&download_url, &path).await?;
        info!("Downloaded {} bytes for meeting {}", bytes, meeting_id);

        let description = recording_description(&title, recordings.start_time);
        let uploaded = videos.upload_video(&path, &title, &description).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Could not remove {:?}: {}", path, e);
        }
        let video_id = uploaded?;

        let topic_id = match mapping.get_mut(meeting_id) {
            Some(record) => {
                record.youtube_video_id = Some(video_id.clone());
                Some(record.discourse_topic_id)
            }
            None => None,
        };
        if topic_id.is_none() {
            // No topic yet; keep the video id so the next run doesn't re-upload.
            let mut record = MeetingRecord::new(0, title.clone());
            record.youtube_video_id = Some(video_id.clone());
            mapping.insert(meeting_id, record);
        }
        mapping.save(&self.mapping_path)?;

        if let Some(topic_id) = topic_id.filter(|id| *id != 0) {
            let body = format!("Recording: https://www.youtube.com/watch?v={}", video_id);
            if let Err(e) = self.topics.create_post(topic_id, &body).await {
                warn!("Failed to post recording link to topic {}: {}", topic_id, e);
            }
        }

        Ok(UploadOutcome::Uploaded { video_id })
    }
}

fn recording_description(title: &str, start: Option<DateTime<Utc>>) -> String {
    match start {
        Some(start) => format!(
            "Recording of {} held on {}.",
            title,
            start.format("%B %-d, %Y at %H:%M UTC")
        ),
        None => format!("Recording of {}.", title),
    }
}
