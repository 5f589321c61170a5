//! Telegram bot notifications.

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{endpoint, ensure_success, ClientError};
use crate::config::TelegramConfig;

const SERVICE: &str = "telegram";

#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<(), ClientError>;
}

pub struct TelegramClient {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.clone(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }
}

#[async_trait]
impl ChatNotifier for TelegramClient {
    async fn send_message(&self, text: &str) -> Result<(), ClientError> {
        let url = endpoint(&self.api_base, &format!("bot{}/sendMessage", self.bot_token));
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
            ("parse_mode", "Markdown"),
        ];

        let response = self.client.post(&url).form(&form).send().await?;
        ensure_success(SERVICE, response).await?;

        info!("Sent Telegram message to {}", self.chat_id);
        Ok(())
    }
}
