//! Chat collaborator: a readiness gate plus "post text to a channel".
//!
//! The Discord implementation talks to the REST API with raw reqwest; no
//! gateway connection is needed to post messages.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::types::ChannelId;

/// Discord rejects message content above this many characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Resolves once the sink can deliver messages. An error here is fatal.
    async fn wait_until_ready(&self) -> Result<()>;

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()>;
}

#[async_trait]
impl<T: ChatSink + ?Sized> ChatSink for Arc<T> {
    async fn wait_until_ready(&self) -> Result<()> {
        (**self).wait_until_ready().await
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        (**self).send_message(channel_id, text).await
    }
}

// --- Discord API response types ---

#[derive(Debug, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct DiscordChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Discord bot client bound to the channel it announces in.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: ChannelId,
}

impl DiscordClient {
    pub fn new(api_base: &str, token: String, channel_id: ChannelId) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            channel_id,
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Identity of the bot token.
    pub async fn current_user(&self) -> Result<DiscordUser> {
        let url = format!("{}/users/@me", self.api_base);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .context("failed to reach Discord")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Discord rejected the bot token (HTTP {status})");
        }
        resp.json().await.context("malformed /users/@me response")
    }

    /// Look up the configured channel; fails if the bot cannot see it.
    pub async fn channel(&self) -> Result<DiscordChannel> {
        let url = format!("{}/channels/{}", self.api_base, self.channel_id);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .context("failed to reach Discord")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Invalid channel ID {} (HTTP {status})", self.channel_id);
        }
        resp.json().await.context("malformed channel response")
    }

    async fn post(&self, channel_id: ChannelId, content: &str) -> Result<()> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&json!({ "content": content }))
            .send()
            .await
            .context("failed to reach Discord")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Discord sendMessage failed (HTTP {status}): {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl ChatSink for DiscordClient {
    async fn wait_until_ready(&self) -> Result<()> {
        let user = self.current_user().await?;
        info!("Bot is online as {} ({})", user.username, user.id);
        let channel = self.channel().await?;
        info!(
            "Posting to #{} ({})",
            channel.name.as_deref().unwrap_or("unnamed"),
            channel.id
        );
        Ok(())
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.post(channel_id, &chunk).await?;
        }
        debug!("Sent {} chars to channel {channel_id}", text.chars().count());
        Ok(())
    }
}

/// Split `text` into pieces of at most `max` characters, preferring line
/// boundaries. A single line longer than `max` is hard-split.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
