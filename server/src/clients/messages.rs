use async_trait::async_trait;
use porta_shared::{ChannelId, MessageId, PanelBody, PanelControls, UserId};

use crate::error::MessageError;

/// Ephemeral answer shown to the user who triggered an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub content: Option<String>,
    pub embed: Option<PanelBody>,
}

impl Notice {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    pub fn embed(body: PanelBody) -> Self {
        Self {
            content: None,
            embed: Some(body),
        }
    }
}

/// Chat-platform operations the core needs.
#[async_trait]
pub trait MessageLayer: Send + Sync {
    async fn send(
        &self,
        channel: ChannelId,
        body: &PanelBody,
        controls: &PanelControls,
    ) -> Result<MessageId, MessageError>;

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        body: &PanelBody,
        controls: &PanelControls,
    ) -> Result<(), MessageError>;

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), MessageError>;

    /// `Err(MessageError::Gone)` when the channel or message is unknown or inaccessible.
    async fn resolve(&self, channel: ChannelId, message: MessageId) -> Result<(), MessageError>;

    async fn create_thread(&self, channel: ChannelId, name: &str)
    -> Result<ChannelId, MessageError>;

    async fn post_text(&self, channel: ChannelId, content: &str)
    -> Result<MessageId, MessageError>;

    async fn current_user(&self) -> Result<UserId, MessageError>;

    /// Completes a deferred interaction response.
    async fn edit_interaction_response(
        &self,
        token: &str,
        notice: &Notice,
    ) -> Result<(), MessageError>;
}
