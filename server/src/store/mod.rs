//! Durable panel bindings and the ticket/request ledger.
//!
//! Every operation is a single atomic statement against one row, so the reconciler and the
//! dispatcher can interleave freely without in-process locking.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use porta_shared::{
    ChannelId, HelpTicket, MapChangeRequest, MessageId, NewHelpTicket, NewMapChangeRequest,
    TicketFiling, TicketState, UserId,
};

use crate::error::StoreError;

pub use postgres::PgStore;

/// The message currently rendering the panel of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelBinding {
    pub channel: ChannelId,
    pub message: MessageId,
}

#[async_trait]
pub trait PanelStore: Send + Sync {
    /// Point-in-time read of every binding.
    async fn list_bindings(&self) -> Result<Vec<PanelBinding>, StoreError>;

    async fn binding_for(&self, channel: ChannelId) -> Result<Option<PanelBinding>, StoreError>;

    /// Inserts the binding only when the channel has none. Returns the row that already
    /// holds the channel when the claim is lost.
    async fn claim_binding(
        &self,
        binding: PanelBinding,
    ) -> Result<Option<PanelBinding>, StoreError>;

    /// Insert-or-replace keyed by channel; the last writer wins.
    async fn upsert_binding(&self, binding: PanelBinding) -> Result<(), StoreError>;

    /// Removes the row only while it still points at `binding.message`, so a panel recreated
    /// in the meantime survives. Returns whether a row was removed.
    async fn delete_binding(&self, binding: PanelBinding) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn file_map_change_request(
        &self,
        request: NewMapChangeRequest,
    ) -> Result<MapChangeRequest, StoreError>;

    /// No-op when the opener already has an open ticket for the server.
    async fn file_help_ticket(&self, ticket: NewHelpTicket) -> Result<TicketFiling, StoreError>;

    async fn open_help_ticket(
        &self,
        server_key: &str,
        opener: UserId,
    ) -> Result<Option<HelpTicket>, StoreError>;

    async fn set_help_ticket_state(
        &self,
        thread: ChannelId,
        state: TicketState,
    ) -> Result<Option<HelpTicket>, StoreError>;
}
