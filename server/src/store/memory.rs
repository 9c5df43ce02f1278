use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use porta_shared::{
    ChannelId, HelpTicket, MapChangeRequest, NewHelpTicket, NewMapChangeRequest, TicketFiling,
    TicketState, UserId,
};

use super::{Ledger, PanelBinding, PanelStore};
use crate::error::StoreError;

/// Same row semantics as the Postgres tables, kept under one mutex per table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bindings: Mutex<Vec<PanelBinding>>,
    help_tickets: Mutex<Vec<HelpTicket>>,
    map_requests: Mutex<Vec<MapChangeRequest>>,
}

impl MemoryStore {
    pub fn with_bindings(bindings: impl IntoIterator<Item = PanelBinding>) -> Self {
        let store = Self::default();
        store.bindings.lock().expect("bindings lock").extend(bindings);
        store
    }

    pub fn bindings(&self) -> Vec<PanelBinding> {
        self.bindings.lock().expect("bindings lock").clone()
    }

    pub fn help_tickets(&self) -> Vec<HelpTicket> {
        self.help_tickets.lock().expect("tickets lock").clone()
    }

    pub fn map_requests(&self) -> Vec<MapChangeRequest> {
        self.map_requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl PanelStore for MemoryStore {
    async fn list_bindings(&self) -> Result<Vec<PanelBinding>, StoreError> {
        Ok(self.bindings())
    }

    async fn binding_for(&self, channel: ChannelId) -> Result<Option<PanelBinding>, StoreError> {
        Ok(self
            .bindings
            .lock()
            .expect("bindings lock")
            .iter()
            .find(|b| b.channel == channel)
            .copied())
    }

    async fn claim_binding(
        &self,
        binding: PanelBinding,
    ) -> Result<Option<PanelBinding>, StoreError> {
        let mut rows = self.bindings.lock().expect("bindings lock");
        if let Some(holder) = rows.iter().find(|b| b.channel == binding.channel) {
            return Ok(Some(*holder));
        }
        if rows.iter().any(|b| b.message == binding.message) {
            return Err(StoreError::Conflict("panel_bindings.message_id"));
        }
        rows.push(binding);
        Ok(None)
    }

    async fn upsert_binding(&self, binding: PanelBinding) -> Result<(), StoreError> {
        let mut rows = self.bindings.lock().expect("bindings lock");
        if rows
            .iter()
            .any(|b| b.message == binding.message && b.channel != binding.channel)
        {
            return Err(StoreError::Conflict("panel_bindings.message_id"));
        }
        match rows.iter_mut().find(|b| b.channel == binding.channel) {
            Some(row) => row.message = binding.message,
            None => rows.push(binding),
        }
        Ok(())
    }

    async fn delete_binding(&self, binding: PanelBinding) -> Result<bool, StoreError> {
        let mut rows = self.bindings.lock().expect("bindings lock");
        let before = rows.len();
        rows.retain(|b| *b != binding);
        Ok(rows.len() != before)
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn file_map_change_request(
        &self,
        request: NewMapChangeRequest,
    ) -> Result<MapChangeRequest, StoreError> {
        let mut rows = self.map_requests.lock().expect("requests lock");
        let filed = MapChangeRequest {
            id: rows.len() as i64 + 1,
            server_key: request.server_key,
            map_name: request.map_name,
            requester: request.requester,
            thread: request.thread,
            state: TicketState::Open,
            created_at: Utc::now(),
        };
        rows.push(filed.clone());
        Ok(filed)
    }

    async fn file_help_ticket(&self, ticket: NewHelpTicket) -> Result<TicketFiling, StoreError> {
        let mut rows = self.help_tickets.lock().expect("tickets lock");
        if rows.iter().any(|t| t.thread == ticket.thread) {
            return Err(StoreError::Conflict("help_tickets.thread_id"));
        }
        let duplicate = rows.iter().any(|t| {
            t.state == TicketState::Open
                && t.server_key == ticket.server_key
                && t.opener == ticket.opener
        });
        if duplicate {
            return Ok(TicketFiling::Ignored);
        }
        let id = rows.len() as i64 + 1;
        rows.push(HelpTicket {
            id,
            server_key: ticket.server_key,
            opener: ticket.opener,
            thread: ticket.thread,
            state: TicketState::Open,
            created_at: Utc::now(),
        });
        Ok(TicketFiling::Created { id })
    }

    async fn open_help_ticket(
        &self,
        server_key: &str,
        opener: UserId,
    ) -> Result<Option<HelpTicket>, StoreError> {
        Ok(self
            .help_tickets
            .lock()
            .expect("tickets lock")
            .iter()
            .find(|t| t.state == TicketState::Open && t.server_key == server_key && t.opener == opener)
            .cloned())
    }

    async fn set_help_ticket_state(
        &self,
        thread: ChannelId,
        state: TicketState,
    ) -> Result<Option<HelpTicket>, StoreError> {
        let mut rows = self.help_tickets.lock().expect("tickets lock");
        let Some(index) = rows.iter().position(|t| t.thread == thread) else {
            return Ok(None);
        };
        if state == TicketState::Open {
            let (server_key, opener) = (rows[index].server_key.clone(), rows[index].opener);
            let reopened_twice = rows.iter().enumerate().any(|(i, t)| {
                i != index
                    && t.state == TicketState::Open
                    && t.server_key == server_key
                    && t.opener == opener
            });
            if reopened_twice {
                return Err(StoreError::Conflict("help_tickets open ticket per opener"));
            }
        }
        rows[index].state = state;
        Ok(Some(rows[index].clone()))
    }
}
