//! Meeting ↔ topic mapping document.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::StorageError;

/// What we know about one scheduled meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub discourse_topic_id: u64,

    pub issue_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_video_id: Option<String>,

    /// Issue the meeting was created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub transcript_posted: bool,
}

impl MeetingRecord {
    pub fn new(discourse_topic_id: u64, issue_title: impl Into<String>) -> Self {
        Self {
            discourse_topic_id,
            issue_title: issue_title.into(),
            youtube_video_id: None,
            issue_number: None,
            start_time: None,
            transcript_posted: false,
        }
    }
}

/// Meeting id → record, kept sorted so the file diffs cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingMapping {
    meetings: BTreeMap<String, MeetingRecord>,
}

impl MeetingMapping {
    /// Read the mapping, treating a missing or empty file as an empty map.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            debug!("No mapping at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let mapping: Self = serde_json::from_str(&contents).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded {} meetings from {:?}", mapping.len(), path);
        Ok(mapping)
    }

    /// Write the whole mapping, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)?;

        info!("Saved {} meetings to {:?}", self.len(), path);
        Ok(())
    }

    pub fn get(&self, meeting_id: &str) -> Option<&MeetingRecord> {
        self.meetings.get(meeting_id)
    }

    pub fn get_mut(&mut self, meeting_id: &str) -> Option<&mut MeetingRecord> {
        self.meetings.get_mut(meeting_id)
    }

    pub fn insert(&mut self, meeting_id: impl Into<String>, record: MeetingRecord) {
        self.meetings.insert(meeting_id.into(), record);
    }

    /// The meeting created for an issue, if any.
    pub fn find_by_issue(&self, issue_number: u64) -> Option<(&str, &MeetingRecord)> {
        self.meetings
            .iter()
            .find(|(_, r)| r.issue_number == Some(issue_number))
            .map(|(id, r)| (id.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mapping = MeetingMapping::load(&dir.path().join("none.json")).unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("mapping.json");

        let mut mapping = MeetingMapping::default();
        let mut record = MeetingRecord::new(123, "ACD 200");
        record.issue_number = Some(42);
        mapping.insert("81234567890", record.clone());
        mapping.save(&path).unwrap();

        let loaded = MeetingMapping::load(&path).unwrap();
        assert_eq!(loaded, mapping);
        assert_eq!(loaded.get("81234567890"), Some(&record));
    }

    #[test]
    fn test_reads_legacy_document_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");
        fs::write(
            &path,
            r#"{
                "81234567890": {
                    "discourse_topic_id": 22000,
                    "issue_title": "Protocol call",
                    "youtube_video_id": "abc123"
                },
                "81234567891": { "discourse_topic_id": 22001, "issue_title": "Next call" }
            }"#,
        )
        .unwrap();

        let mapping = MeetingMapping::load(&path).unwrap();
        assert_eq!(mapping.len(), 2);
        let record = mapping.get("81234567890").unwrap();
        assert_eq!(record.youtube_video_id.as_deref(), Some("abc123"));
        assert!(!record.transcript_posted);
        assert!(mapping.get("81234567891").unwrap().youtube_video_id.is_none());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let mut mapping = MeetingMapping::default();
        mapping.insert("1", MeetingRecord::new(5, "t"));
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "1": { "discourse_topic_id": 5, "issue_title": "t", "transcript_posted": false }
            })
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            MeetingMapping::load(&path),
            Err(StorageError::Json { .. })
        ));
    }

    #[test]
    fn test_find_by_issue() {
        let mut mapping = MeetingMapping::default();
        let mut record = MeetingRecord::new(9, "Call");
        record.issue_number = Some(7);
        mapping.insert("m1", MeetingRecord::new(8, "Other"));
        mapping.insert("m2", record);

        let (id, found) = mapping.find_by_issue(7).unwrap();
        assert_eq!(id, "m2");
        assert_eq!(found.discourse_topic_id, 9);
        assert!(mapping.find_by_issue(8).is_none());
    }

    #[test]
    fn test_get_mut_updates_record() {
        let mut mapping = MeetingMapping::default();
        mapping.insert("m1", MeetingRecord::new(1, "Call"));
        mapping.get_mut("m1").unwrap().youtube_video_id = Some("vid".to_string());
        assert_eq!(
            mapping.get("m1").unwrap().youtube_video_id.as_deref(),
            Some("vid")
        );
    }
}
