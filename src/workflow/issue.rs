//! Call-request issue handling.
//!
//! An issue becomes a Discourse topic (created once, updated on later
//! edits) and, when its body carries a valid schedule, a Zoom meeting plus
//! optional calendar and chat announcements. A body without a usable
//! schedule gets a help comment and no meeting: we never guess a time.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use super::WorkflowError;
use crate::clients::{
    CalendarProvider, ChatNotifier, CreatedMeeting, Issue, IssueComment, IssueTracker,
    MeetingProvider, TopicProvider, TopicUpdate,
};
use crate::schedule::{parse_schedule, ParsedSchedule, ScheduleError, ScheduleErrorKind};
use crate::storage::{MeetingMapping, MeetingRecord};

/// Substituted for issues created without a description.
pub const EMPTY_BODY: &str = "(No issue body provided.)";

const TOPIC_COMMENT_PREFIX: &str = "Discourse topic created: ";

lazy_static! {
    static ref TOPIC_COMMENT_RE: Regex =
        Regex::new(r"Discourse topic created: \S*/t/(?:[^/\s]+/)?([0-9]+)")
            .expect("topic comment pattern is valid");
}

/// What happened to the meeting side of an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingOutcome {
    Created { meeting_id: String, join_url: String },
    AlreadyScheduled { meeting_id: String },
    InvalidSchedule(ScheduleError),
    /// The meeting API rejected the request; the error was posted on the issue.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleIssueOutcome {
    pub issue_number: u64,
    pub topic_id: u64,
    pub topic_created: bool,
    pub meeting: MeetingOutcome,
}

pub struct IssueWorkflow {
    issues: Arc<dyn IssueTracker>,
    meetings: Arc<dyn MeetingProvider>,
    topics: Arc<dyn TopicProvider>,
    calendar: Option<Arc<dyn CalendarProvider>>,
    chat: Option<Arc<dyn ChatNotifier>>,
    category_id: u64,
    mapping_path: PathBuf,
}

impl IssueWorkflow {
    pub fn new(
        issues: Arc<dyn IssueTracker>,
        meetings: Arc<dyn MeetingProvider>,
        topics: Arc<dyn TopicProvider>,
        category_id: u64,
        mapping_path: PathBuf,
    ) -> Self {
        Self {
            issues,
            meetings,
            topics,
            calendar: None,
            chat: None,
            category_id,
            mapping_path,
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarProvider>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatNotifier>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Sync one issue to the forum and, if possible, schedule its meeting.
    pub async fn handle_issue(&self, number: u64) -> Result<HandleIssueOutcome, WorkflowError> {
        let issue = self.issues.get_issue(number).await?;
        let body = issue
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(EMPTY_BODY)
            .to_string();
        info!("Handling issue #{} '{}'", number, issue.title);

        let mut mapping = MeetingMapping::load(&self.mapping_path)?;
        let comments = self.issues.list_comments(number).await?;

        let existing_topic = mapping
            .find_by_issue(number)
            .map(|(_, record)| record.discourse_topic_id)
            .or_else(|| topic_id_from_comments(&comments));

        let (topic_id, topic_created) = match existing_topic {
            Some(topic_id) => {
                let update = TopicUpdate {
                    title: Some(issue.title.clone()),
                    body: Some(body.clone()),
                    category_id: None,
                };
                self.topics.update_topic(topic_id, &update).await?;
                (topic_id, false)
            }
            None => {
                let created = self
                    .topics
                    .create_topic(&issue.title, &body, self.category_id)
                    .await?;
                let comment = format!(
                    "{}{}",
                    TOPIC_COMMENT_PREFIX,
                    self.topics.topic_url(created.topic_id)
                );
                self.issues.create_comment(number, &comment).await?;
                (created.topic_id, true)
            }
        };

        let meeting = match parse_schedule(&body) {
            Ok(schedule) => {
                self.schedule_meeting(&issue, &schedule, topic_id, &mut mapping)
                    .await?
            }
            Err(err) => {
                warn!("Issue #{} has no usable schedule: {}", number, err);
                self.issues
                    .create_comment(number, &help_comment(&err))
                    .await?;
                MeetingOutcome::InvalidSchedule(err)
            }
        };

        Ok(HandleIssueOutcome {
            issue_number: number,
            topic_id,
            topic_created,
            meeting,
        })
    }

    async fn schedule_meeting(
        &self,
        issue: &Issue,
        schedule: &ParsedSchedule,
        topic_id: u64,
        mapping: &mut MeetingMapping,
    ) -> Result<MeetingOutcome, WorkflowError> {
        if let Some((meeting_id, record)) = mapping.find_by_issue(issue.number) {
            let meeting_id = meeting_id.to_string();
            info!(
                "Issue #{} already has meeting {}, not creating another",
                issue.number, meeting_id
            );
            if record.issue_title != issue.title {
                if let Some(record) = mapping.get_mut(&meeting_id) {
                    record.issue_title = issue.title.clone();
                }
                mapping.save(&self.mapping_path)?;
            }
            return Ok(MeetingOutcome::AlreadyScheduled { meeting_id });
        }

        let topic = format!("Issue {}: {}", issue.number, issue.title);
        let meeting = match self.meetings.create_meeting(&topic, schedule).await {
            Ok(meeting) => meeting,
            Err(e) => {
                error!("Failed to create meeting for issue #{}: {}", issue.number, e);
                self.issues
                    .create_comment(issue.number, &format!("Error creating Zoom meeting: {}", e))
                    .await?;
                return Ok(MeetingOutcome::Failed(e.to_string()));
            }
        };

        self.issues
            .create_comment(
                issue.number,
                &format!(
                    "Zoom meeting created: {}\nZoom Meeting ID: {}",
                    meeting.join_url, meeting.id
                ),
            )
            .await?;

        let mut record = MeetingRecord::new(topic_id, issue.title.clone());
        record.issue_number = Some(issue.number);
        record.start_time = Some(schedule.start_time());
        mapping.insert(meeting.id.clone(), record);
        mapping.save(&self.mapping_path)?;

        self.announce(issue, schedule, &meeting, topic_id).await;

        Ok(MeetingOutcome::Created {
            meeting_id: meeting.id,
            join_url: meeting.join_url,
        })
    }

    /// Calendar and chat announcements. Failures are logged, not returned.
    async fn announce(
        &self,
        issue: &Issue,
        schedule: &ParsedSchedule,
        meeting: &CreatedMeeting,
        topic_id: u64,
    ) {
        let topic_url = self.topics.topic_url(topic_id);

        if let Some(calendar) = &self.calendar {
            let description = format!(
                "Zoom: {}\nDiscussion: {}\nIssue: #{}",
                meeting.join_url, topic_url, issue.number
            );
            match calendar
                .create_event(&issue.title, schedule, &description)
                .await
            {
                Ok(link) => info!("Calendar event: {}", link.as_deref().unwrap_or("(no link)")),
                Err(e) => warn!("Failed to create calendar event: {}", e),
            }
        }

        if let Some(chat) = &self.chat {
            let text = format!(
                "*{}*\n\nStart: {}\nDuration: {} minutes\nZoom: {}\nDiscourse: {}",
                issue.title,
                schedule.start_time().format("%a %b %-d, %Y %H:%M UTC"),
                schedule.duration_minutes(),
                meeting.join_url,
                topic_url
            );
            if let Err(e) = chat.send_message(&text).await {
                warn!("Failed to send chat notification: {}", e);
            }
        }
    }
}

/// Topic id from an earlier "Discourse topic created" comment, newest first.
fn topic_id_from_comments(comments: &[IssueComment]) -> Option<u64> {
    comments.iter().rev().find_map(|c| {
        TOPIC_COMMENT_RE
            .captures(&c.body)
            .and_then(|caps| caps[1].parse().ok())
    })
}

/// Comment explaining why no meeting was created and what the body should contain.
pub fn help_comment(err: &ScheduleError) -> String {
    let problem = match err.kind() {
        ScheduleErrorKind::MissingDateTime => "Couldn't find a date/time in UTC.",
        ScheduleErrorKind::InvalidDateTime => "The date/time is not a valid calendar date.",
        ScheduleErrorKind::NonPositiveDuration => "The meeting must end after it starts.",
        ScheduleErrorKind::MissingDuration => "Couldn't find a duration or an end time.",
    };

    let example = Utc
        .with_ymd_and_hms(2025, 1, 16, 14, 0, 0)
        .single()
        .and_then(|start| ParsedSchedule::new(start, 90).ok())
        .map(|s| s.to_issue_snippet())
        .unwrap_or_default();

    format!(
        "Meeting couldn't be created due to format error. {} ({})\n\n\
         Expected date/time in UTC followed by a duration, like:\n\n{}\n\n\
         or with an end time: `[Jan 16, 2025, 14:00-15:30 UTC]`.\n\n\
         Please update the issue or schedule the meeting manually.",
        problem,
        err.detail(),
        example
    )
}
