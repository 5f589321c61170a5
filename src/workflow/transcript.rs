//! Posting meeting transcripts to the forum.

use serde::Serialize;
use tracing::info;

use super::recordings::RecordingWorkflow;
use super::WorkflowError;
use crate::storage::{MeetingMapping, MeetingRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptOutcome {
    pub topic_id: u64,
    /// True when no topic was mapped and a new one had to be opened.
    pub created_topic: bool,
}

impl RecordingWorkflow {
    /// Download a meeting's transcript and post it to the meeting's topic,
    /// opening a new topic if the meeting was never mapped to one.
    pub async fn post_transcript(&self, meeting_id: &str) -> Result<TranscriptOutcome, WorkflowError> {
        let recordings = self.meetings.get_recordings(meeting_id).await?;
        let url = recordings
            .file_of_type("TRANSCRIPT")
            .and_then(|f| f.download_url.clone())
            .ok_or_else(|| WorkflowError::TranscriptNotFound(meeting_id.to_string()))?;
        let transcript = self.meetings.download_text(&url).await?;

        let mut mapping = MeetingMapping::load(&self.mapping_path)?;
        let existing = mapping
            .get(meeting_id)
            .map(|r| r.discourse_topic_id)
            .filter(|id| *id != 0);

        let outcome = match existing {
            Some(topic_id) => {
                self.topics.create_post(topic_id, &transcript).await?;
                info!("Posted transcript for {} to topic {}", meeting_id, topic_id);
                TranscriptOutcome {
                    topic_id,
                    created_topic: false,
                }
            }
            None => {
                let title = format!("Zoom Transcript for Meeting {}", meeting_id);
                let created = self
                    .topics
                    .create_topic(&title, &transcript, self.category_id)
                    .await?;
                info!(
                    "Created topic {} for transcript of {}",
                    created.topic_id, meeting_id
                );
                TranscriptOutcome {
                    topic_id: created.topic_id,
                    created_topic: true,
                }
            }
        };

        match mapping.get_mut(meeting_id) {
            Some(record) => {
                record.discourse_topic_id = outcome.topic_id;
                record.transcript_posted = true;
            }
            None => {
                let title = recordings.topic.clone().unwrap_or_default();
                let mut record = MeetingRecord::new(outcome.topic_id, title);
                record.start_time = recordings.start_time;
                record.transcript_posted = true;
                mapping.insert(meeting_id, record);
            }
        }
        mapping.save(&self.mapping_path)?;

        Ok(outcome)
    }
}
