//! Discourse forum client.
//!
//! Topics are created through `POST /posts.json`; editing a topic's body
//! means editing its first post, which requires looking the topic up first.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{endpoint, ensure_success, ClientError};
use crate::config::DiscourseConfig;

const SERVICE: &str = "discourse";

/// Result of creating a topic or a reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPost {
    /// Post id
    pub id: u64,
    pub topic_id: u64,
}

/// Fields to change on an existing topic. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category_id: Option<u64>,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    raw: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archetype: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct TopicDetails {
    post_stream: PostStream,
}

#[derive(Debug, Deserialize)]
struct PostStream {
    posts: Vec<PostSummary>,
}

#[derive(Debug, Deserialize)]
struct PostSummary {
    id: u64,
}

/// Forum operations used by the workflows.
#[async_trait]
pub trait TopicProvider: Send + Sync {
    async fn create_topic(
        &self,
        title: &str,
        body: &str,
        category_id: u64,
    ) -> Result<CreatedPost, ClientError>;

    async fn update_topic(&self, topic_id: u64, update: &TopicUpdate) -> Result<(), ClientError>;

    /// Reply to an existing topic.
    async fn create_post(&self, topic_id: u64, body: &str) -> Result<CreatedPost, ClientError>;

    /// Public URL of a topic.
    fn topic_url(&self, topic_id: u64) -> String;
}

pub struct DiscourseClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_username: String,
}

impl DiscourseClient {
    pub fn new(client: Client, config: &DiscourseConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            api_username: config.api_username.clone(),
        }
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Api-Key", &self.api_key)
            .header("Api-Username", &self.api_username)
    }

    async fn submit_post(&self, post: &NewPost<'_>) -> Result<CreatedPost, ClientError> {
        let url = endpoint(&self.base_url, "posts.json");
        let response = self.authed(self.client.post(&url)).json(post).send().await?;
        let created = ensure_success(SERVICE, response).await?.json().await?;
        Ok(created)
    }

    async fn first_post_id(&self, topic_id: u64) -> Result<u64, ClientError> {
        let url = endpoint(&self.base_url, &format!("t/{}.json", topic_id));
        let response = self.authed(self.client.get(&url)).send().await?;
        let details: TopicDetails = ensure_success(SERVICE, response).await?.json().await?;

        details
            .post_stream
            .posts
            .first()
            .map(|p| p.id)
            .ok_or_else(|| ClientError::UnexpectedResponse {
                service: SERVICE,
                message: format!("topic {} has no posts", topic_id),
            })
    }
}

#[async_trait]
impl TopicProvider for DiscourseClient {
    async fn create_topic(
        &self,
        title: &str,
        body: &str,
        category_id: u64,
    ) -> Result<CreatedPost, ClientError> {
        let created = self
            .submit_post(&NewPost {
                title: Some(title),
                raw: body,
                category: Some(category_id),
                topic_id: None,
                archetype: Some("regular"),
            })
            .await?;

        info!("Created Discourse topic {} '{}'", created.topic_id, title);
        Ok(created)
    }

    async fn update_topic(&self, topic_id: u64, update: &TopicUpdate) -> Result<(), ClientError> {
        let first_post = self.first_post_id(topic_id).await?;

        let mut topic_fields = serde_json::Map::new();
        if let Some(title) = update.title.as_deref().filter(|t| !t.is_empty()) {
            topic_fields.insert("title".to_string(), title.into());
        }
        if let Some(category_id) = update.category_id {
            topic_fields.insert("category_id".to_string(), category_id.into());
        }

        if !topic_fields.is_empty() {
            let url = endpoint(&self.base_url, &format!("t/{}.json", topic_id));
            let response = self
                .authed(self.client.put(&url))
                .json(&topic_fields)
                .send()
                .await?;
            ensure_success(SERVICE, response).await?;
            debug!("Updated topic {} fields", topic_id);
        }

        if let Some(body) = &update.body {
            let url = endpoint(&self.base_url, &format!("posts/{}.json", first_post));
            let response = self
                .authed(self.client.put(&url))
                .json(&serde_json::json!({ "post": { "raw": body } }))
                .send()
                .await?;
            ensure_success(SERVICE, response).await?;
            debug!("Updated first post {} of topic {}", first_post, topic_id);
        }

        info!("Updated Discourse topic {}", topic_id);
        Ok(())
    }

    async fn create_post(&self, topic_id: u64, body: &str) -> Result<CreatedPost, ClientError> {
        let created = self
            .submit_post(&NewPost {
                title: None,
                raw: body,
                category: None,
                topic_id: Some(topic_id),
                archetype: None,
            })
            .await?;

        info!("Replied to Discourse topic {}", topic_id);
        Ok(created)
    }

    fn topic_url(&self, topic_id: u64) -> String {
        endpoint(&self.base_url, &format!("t/{}", topic_id))
    }
}
