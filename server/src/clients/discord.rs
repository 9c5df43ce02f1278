use async_trait::async_trait;
use porta_shared::{
    ButtonStyle, ChannelId, MessageId, PanelBody, PanelControls, UserId,
};
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::clients::messages::{MessageLayer, Notice};
use crate::config::DiscordSettings;
use crate::error::MessageError;

const USER_AGENT: &str = concat!("DiscordBot (porta, ", env!("CARGO_PKG_VERSION"), ")");
const THREAD_NAME_MAX_CHARS: usize = 100;
const PUBLIC_THREAD: u8 = 11;
const THREAD_ARCHIVE_MINUTES: u32 = 1440;
const ERROR_BODY_MAX_CHARS: usize = 300;

#[derive(Deserialize)]
struct Created<T> {
    id: T,
}

/// Discord REST implementation of the message layer.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    application_id: Option<u64>,
}

impl DiscordClient {
    pub fn new(settings: &DiscordSettings) -> Result<Self, MessageError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| MessageError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            bot_token: settings.bot_token.trim().to_string(),
            application_id: settings.application_id,
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        what: &str,
    ) -> Result<reqwest::Response, MessageError> {
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.api_base))
            .header(AUTHORIZATION, format!("Bot {}", self.bot_token));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MessageError::Transient(format!("{what}: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body, what))
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        what: &str,
    ) -> Result<T, MessageError> {
        self.request(method, path, body, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| MessageError::Transient(format!("{what}: invalid response: {e}")))
    }

    /// Replaces the application's global slash commands. Returns how many are registered.
    pub async fn register_commands(&self, commands: &Value) -> Result<usize, MessageError> {
        let Some(application_id) = self.application_id else {
            return Ok(0);
        };
        let registered: Vec<Value> = self
            .request_json(
                Method::PUT,
                &format!("/applications/{application_id}/commands"),
                Some(commands),
                "application commands",
            )
            .await?;
        Ok(registered.len())
    }
}

#[async_trait]
impl MessageLayer for DiscordClient {
    async fn send(
        &self,
        channel: ChannelId,
        body: &PanelBody,
        controls: &PanelControls,
    ) -> Result<MessageId, MessageError> {
        let payload = panel_payload(body, controls);
        let created: Created<MessageId> = self
            .request_json(
                Method::POST,
                &format!("/channels/{channel}/messages"),
                Some(&payload),
                &format!("channel {channel}"),
            )
            .await?;
        Ok(created.id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        body: &PanelBody,
        controls: &PanelControls,
    ) -> Result<(), MessageError> {
        let payload = panel_payload(body, controls);
        self.request(
            Method::PATCH,
            &format!("/channels/{channel}/messages/{message}"),
            Some(&payload),
            &format!("message {message} in channel {channel}"),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), MessageError> {
        self.request(
            Method::DELETE,
            &format!("/channels/{channel}/messages/{message}"),
            None,
            &format!("message {message} in channel {channel}"),
        )
        .await?;
        Ok(())
    }

    async fn resolve(&self, channel: ChannelId, message: MessageId) -> Result<(), MessageError> {
        self.request(
            Method::GET,
            &format!("/channels/{channel}/messages/{message}"),
            None,
            &format!("message {message} in channel {channel}"),
        )
        .await?;
        Ok(())
    }

    async fn create_thread(
        &self,
        channel: ChannelId,
        name: &str,
    ) -> Result<ChannelId, MessageError> {
        let name: String = name.chars().take(THREAD_NAME_MAX_CHARS).collect();
        let payload = json!({
            "name": name,
            "type": PUBLIC_THREAD,
            "auto_archive_duration": THREAD_ARCHIVE_MINUTES,
        });
        let created: Created<ChannelId> = self
            .request_json(
                Method::POST,
                &format!("/channels/{channel}/threads"),
                Some(&payload),
                &format!("channel {channel}"),
            )
            .await?;
        Ok(created.id)
    }

    async fn post_text(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, MessageError> {
        let payload = json!({
            "content": content,
            "allowed_mentions": { "parse": ["roles", "users"] },
        });
        let created: Created<MessageId> = self
            .request_json(
                Method::POST,
                &format!("/channels/{channel}/messages"),
                Some(&payload),
                &format!("channel {channel}"),
            )
            .await?;
        Ok(created.id)
    }

    async fn current_user(&self) -> Result<UserId, MessageError> {
        let user: Created<UserId> = self
            .request_json(Method::GET, "/users/@me", None, "current user")
            .await?;
        Ok(user.id)
    }

    async fn edit_interaction_response(
        &self,
        token: &str,
        notice: &Notice,
    ) -> Result<(), MessageError> {
        let Some(application_id) = self.application_id else {
            return Err(MessageError::Rejected {
                status: 0,
                body: "DISCORD_APPLICATION_ID is not configured".to_string(),
            });
        };
        self.request(
            Method::PATCH,
            &format!("/webhooks/{application_id}/{token}/messages/@original"),
            Some(&notice_payload(notice)),
            "interaction response",
        )
        .await?;
        Ok(())
    }
}

/// 403 and 404 are terminal for the addressed resource; rate limits and server errors are
/// transient.
pub fn classify_status(status: u16, body: &str, what: &str) -> MessageError {
    match status {
        403 | 404 => MessageError::Gone(what.to_string()),
        429 | 500..=599 => MessageError::Transient(format!("{what}: HTTP {status}")),
        _ => MessageError::Rejected {
            status,
            body: body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
        },
    }
}

pub fn embed_json(body: &PanelBody) -> Value {
    let fields: Vec<Value> = body
        .fields
        .iter()
        .map(|field| {
            json!({
                "name": field.name,
                "value": field.value,
                "inline": field.inline,
            })
        })
        .collect();
    let mut embed = json!({
        "title": body.title,
        "color": body.color,
        "fields": fields,
    });
    if let Some(description) = &body.description {
        embed["description"] = Value::String(description.clone());
    }
    embed
}

pub fn components_json(controls: &PanelControls) -> Value {
    let rows: Vec<Value> = controls
        .rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            let buttons: Vec<Value> = row
                .iter()
                .map(|button| {
                    json!({
                        "type": 2,
                        "style": button_style_code(button.style),
                        "label": button.label,
                        "custom_id": button.custom_id,
                    })
                })
                .collect();
            json!({ "type": 1, "components": buttons })
        })
        .collect();
    Value::Array(rows)
}

pub fn notice_payload(notice: &Notice) -> Value {
    let embeds: Vec<Value> = notice.embed.iter().map(embed_json).collect();
    json!({
        "content": notice.content.clone().unwrap_or_default(),
        "embeds": embeds,
    })
}

fn panel_payload(body: &PanelBody, controls: &PanelControls) -> Value {
    json!({
        "embeds": [embed_json(body)],
        "components": components_json(controls),
    })
}

fn button_style_code(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
    }
}
