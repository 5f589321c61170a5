//! Google Calendar event creation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{endpoint, ensure_success, ClientError};
use crate::config::CalendarConfig;
use crate::schedule::ParsedSchedule;

const SERVICE: &str = "calendar";

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Create an event and return its HTML link, when the API provides one.
    async fn create_event(
        &self,
        summary: &str,
        schedule: &ParsedSchedule,
        description: &str,
    ) -> Result<Option<String>, ClientError>;
}

#[derive(Debug, Serialize)]
struct EventRequest<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    #[serde(default)]
    html_link: Option<String>,
}

pub struct CalendarClient {
    client: Client,
    api_base: String,
    calendar_id: String,
    access_token: String,
}

impl CalendarClient {
    pub fn new(client: Client, config: &CalendarConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.clone(),
            calendar_id: config.calendar_id.clone(),
            access_token: config.access_token.clone(),
        }
    }
}

#[async_trait]
impl CalendarProvider for CalendarClient {
    async fn create_event(
        &self,
        summary: &str,
        schedule: &ParsedSchedule,
        description: &str,
    ) -> Result<Option<String>, ClientError> {
        let mut url = url::Url::parse(&endpoint(&self.api_base, "calendars"))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.api_base.clone()))?
            .push(&self.calendar_id)
            .push("events");

        let request = EventRequest {
            summary,
            description,
            start: EventTime {
                date_time: schedule.start_time_utc(),
            },
            end: EventTime {
                date_time: schedule.end_time().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;
        let event: EventResponse = ensure_success(SERVICE, response).await?.json().await?;

        info!("Created calendar event '{}'", summary);
        Ok(event.html_link)
    }
}
