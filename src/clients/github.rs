//! GitHub issues client (REST v3).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{endpoint, ensure_success, ClientError};
use crate::config::GithubConfig;

const SERVICE: &str = "github";

/// The parts of an issue the bot reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    /// `null` for issues created without a description
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
}

/// Issue tracker operations used by the workflows.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn get_issue(&self, number: u64) -> Result<Issue, ClientError>;

    async fn create_comment(&self, number: u64, body: &str) -> Result<(), ClientError>;

    async fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ClientError>;
}

pub struct GithubClient {
    client: Client,
    api_base: String,
    repo: String,
    token: String,
}

impl GithubClient {
    pub fn new(client: Client, config: &GithubConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.clone(),
            repo: config.repo.clone(),
            token: config.token.clone(),
        }
    }

    /// Same credentials, different repository.
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    fn issue_url(&self, number: u64, suffix: &str) -> String {
        endpoint(
            &self.api_base,
            &format!("repos/{}/issues/{}{}", self.repo, number, suffix),
        )
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    async fn get_issue(&self, number: u64) -> Result<Issue, ClientError> {
        let url = self.issue_url(number, "");
        debug!("Fetching issue {}#{}", self.repo, number);

        let response = self.authed(self.client.get(&url)).send().await?;
        let issue = ensure_success(SERVICE, response).await?.json().await?;
        Ok(issue)
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<(), ClientError> {
        let url = self.issue_url(number, "/comments");

        let response = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        ensure_success(SERVICE, response).await?;

        info!("Commented on {}#{}", self.repo, number);
        Ok(())
    }

    async fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ClientError> {
        let url = self.issue_url(number, "/comments");

        let response = self
            .authed(self.client.get(&url))
            .query(&[("per_page", "100")])
            .send()
            .await?;
        let comments = ensure_success(SERVICE, response).await?.json().await?;
        Ok(comments)
    }
}
