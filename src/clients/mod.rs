//! HTTP clients for the external services the bot talks to.
//!
//! Every service sits behind a small async trait so the workflows can be
//! driven by in-memory fakes in tests. The concrete clients are thin
//! translations between our types and each service's REST API.

pub mod calendar;
pub mod discourse;
pub mod github;
pub mod telegram;
pub mod youtube;
pub mod zoom;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

use crate::config::HttpConfig;

pub use calendar::{CalendarClient, CalendarProvider};
pub use discourse::{DiscourseClient, TopicProvider, TopicUpdate};
pub use github::{GithubClient, Issue, IssueComment, IssueTracker};
pub use telegram::{ChatNotifier, TelegramClient};
pub use youtube::{VideoHost, YoutubeClient};
pub use zoom::{CreatedMeeting, MeetingProvider, MeetingRecordings, RecordingFile, ZoomClient};

/// Errors returned by the service clients.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    HttpStatus {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Rate limited by {service}, retry after {retry_after_secs}s")]
    RateLimited {
        service: &'static str,
        retry_after_secs: u64,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected response from {service}: {message}")]
    UnexpectedResponse {
        service: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-request limit for recording downloads and uploads. The client-wide
/// timeout covers the whole response body, so large transfers override it.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(3600);

/// Build the shared HTTP client with timeout and user agent applied.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("acdbot")),
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()?;

    Ok(client)
}

/// Turn non-success responses into errors, keeping the body for context.
pub(crate) async fn ensure_success(
    service: &'static str,
    response: Response,
) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        return Err(ClientError::RateLimited {
            service,
            retry_after_secs: retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::HttpStatus {
        service,
        status: status.as_u16(),
        body: truncate(&body, 500),
    })
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoint_joins_slashes() {
        assert_eq!(
            endpoint("https://api.zoom.us/v2/", "/users/me"),
            "https://api.zoom.us/v2/users/me"
        );
        assert_eq!(endpoint("http://x", "y"), "http://x/y");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn test_client_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("user-agent", "acdbot-test"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = build_http_client(&HttpConfig {
            timeout_seconds: 5,
            user_agent: "acdbot-test".to_string(),
            ..HttpConfig::default()
        })
        .unwrap();
        let response = client
            .get(format!("{}/ping", server.uri()))
            .send()
            .await
            .unwrap();
        assert!(ensure_success("test", response).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_success_maps_status_and_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let client = Client::new();

        let response = client
            .get(format!("{}/missing", server.uri()))
            .send()
            .await
            .unwrap();
        match ensure_success("test", response).await {
            Err(ClientError::HttpStatus { status, body, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "not here");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        let response = client
            .get(format!("{}/busy", server.uri()))
            .send()
            .await
            .unwrap();
        assert!(matches!(
            ensure_success("test", response).await,
            Err(ClientError::RateLimited {
                retry_after_secs: 7,
                ..
            })
        ));
    }
}
