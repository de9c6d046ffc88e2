//! Telegram Bot API channel.
//!
//! Sends go through `sendMessage` with Markdown parsing. The same client can
//! long-poll `getUpdates` and answer every incoming message with the sender's
//! numeric ID, which is how operators discover the recipient ID to configure
//! on their device.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, NotificationChannel};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const PARSE_MODE: &str = "Markdown";
const RESPONDER_BACKOFF: Duration = Duration::from_secs(5);
/// Extra time granted to a long poll beyond its server-side timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<Option<T>, ChannelError> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(ChannelError::Rejected(
                self.description
                    .unwrap_or_else(|| "request rejected without description".to_owned()),
            ))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// A reply the ID responder owes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReply {
    pub chat_id: String,
    pub reply_to: i64,
    pub text: String,
}

pub fn id_reply_text(user_id: i64) -> String {
    format!("Your Telegram ID is: {}", user_id)
}

/// Replies owed for a page of updates, plus the offset that acknowledges it.
///
/// Updates without a message or without a sender are acknowledged and
/// skipped.
pub fn plan_id_replies(updates: &[Update], offset: Option<i64>) -> (Vec<IdReply>, Option<i64>) {
    let replies = updates
        .iter()
        .filter_map(|u| u.message.as_ref())
        .filter_map(|m| {
            m.from.as_ref().map(|user| IdReply {
                chat_id: m.chat.id.to_string(),
                reply_to: m.message_id,
                text: id_reply_text(user.id),
            })
        })
        .collect();
    let next = updates.iter().map(|u| u.update_id + 1).max().or(offset);
    (replies, next)
}

fn transport(e: reqwest::Error) -> ChannelError {
    // Request URLs embed the bot token.
    ChannelError::Transport(e.without_url().to_string())
}

/// Bot API client.
#[derive(Clone)]
pub struct TelegramChannel {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(transport)?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<Option<T>, ChannelError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let resp = request.send().await.map_err(transport)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(transport)?;
        match serde_json::from_slice::<ApiResponse<T>>(&bytes) {
            Ok(api) => api.into_result(),
            Err(_) if status.is_success() => Err(ChannelError::Transport(format!(
                "{} returned an unreadable body",
                method
            ))),
            Err(_) => Err(ChannelError::Rejected(format!("HTTP {}", status))),
        }
    }

    /// Send `text` to `chat_id`, optionally with a parse mode.
    pub async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), ChannelError> {
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
            reply_to_message_id: None,
        };
        self.call::<_, serde_json::Value>("sendMessage", &body, None)
            .await
            .map(|_| ())
    }

    async fn reply(&self, reply: &IdReply) -> Result<(), ChannelError> {
        let body = SendMessageRequest {
            chat_id: &reply.chat_id,
            text: &reply.text,
            parse_mode: None,
            reply_to_message_id: Some(reply.reply_to),
        };
        self.call::<_, serde_json::Value>("sendMessage", &body, None)
            .await
            .map(|_| ())
    }

    /// Long-poll for message updates.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError> {
        let body = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message"],
        };
        let timeout = Duration::from_secs(timeout_secs) + POLL_GRACE;
        Ok(self
            .call::<_, Vec<Update>>("getUpdates", &body, Some(timeout))
            .await?
            .unwrap_or_default())
    }

    /// Answer every incoming message with the sender's Telegram ID until
    /// `shutdown` flips to `true` or its sender is dropped.
    pub async fn run_id_responder(&self, poll_timeout: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("Telegram ID responder started");
        let mut offset: Option<i64> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let page = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                page = self.get_updates(offset, poll_timeout.as_secs()) => page,
            };

            match page {
                Ok(updates) => {
                    let (replies, next) = plan_id_replies(&updates, offset);
                    offset = next;
                    for reply in &replies {
                        if let Err(e) = self.reply(reply).await {
                            warn!("failed to answer chat {}: {}", reply.chat_id, e);
                        } else {
                            debug!("answered ID request from chat {}", reply.chat_id);
                        }
                    }
                }
                Err(e) => {
                    warn!("getUpdates failed: {}; retrying in {:?}", e, RESPONDER_BACKOFF);
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(RESPONDER_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Telegram ID responder stopped");
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        self.send_text(recipient, text, Some(PARSE_MODE)).await
    }
}
