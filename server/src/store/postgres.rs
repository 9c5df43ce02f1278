use async_trait::async_trait;
use chrono::{DateTime, Utc};
use porta_shared::{
    ChannelId, HelpTicket, MapChangeRequest, MessageId, NewHelpTicket, NewMapChangeRequest,
    TicketFiling, TicketState, UserId,
};
use sqlx::PgPool;

use super::{Ledger, PanelBinding, PanelStore};
use crate::error::StoreError;

type BindingRow = (i64, i64);
type HelpTicketRow = (i64, String, i64, i64, String, DateTime<Utc>);

const HELP_TICKET_COLUMNS: &str = "id, server_key, opener_id, thread_id, state, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn binding_from_row((channel_id, message_id): BindingRow) -> PanelBinding {
    PanelBinding {
        channel: ChannelId::from_db(channel_id),
        message: MessageId::from_db(message_id),
    }
}

fn help_ticket_from_row(row: HelpTicketRow) -> Result<HelpTicket, StoreError> {
    let (id, server_key, opener_id, thread_id, state, created_at) = row;
    Ok(HelpTicket {
        id,
        server_key,
        opener: UserId::from_db(opener_id),
        thread: ChannelId::from_db(thread_id),
        state: state
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("help ticket {id}: {e}")))?,
        created_at,
    })
}

fn conflict_or(error: sqlx_core::error::Error, constraint: &'static str) -> StoreError {
    let unique = error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        StoreError::Conflict(constraint)
    } else {
        StoreError::Database(error)
    }
}

#[async_trait]
impl PanelStore for PgStore {
    async fn list_bindings(&self) -> Result<Vec<PanelBinding>, StoreError> {
        let rows: Vec<BindingRow> = sqlx::query_as(
            "SELECT channel_id, message_id FROM panel_bindings ORDER BY channel_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(binding_from_row).collect())
    }

    async fn binding_for(&self, channel: ChannelId) -> Result<Option<PanelBinding>, StoreError> {
        let row: Option<BindingRow> = sqlx::query_as(
            "SELECT channel_id, message_id FROM panel_bindings WHERE channel_id = $1",
        )
        .bind(channel.to_db())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(binding_from_row))
    }

    async fn claim_binding(
        &self,
        binding: PanelBinding,
    ) -> Result<Option<PanelBinding>, StoreError> {
        let claimed: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO panel_bindings (channel_id, message_id) VALUES ($1, $2) \
             ON CONFLICT (channel_id) DO NOTHING RETURNING channel_id",
        )
        .bind(binding.channel.to_db())
        .bind(binding.message.to_db())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "panel_bindings.message_id"))?;
        if claimed.is_some() {
            return Ok(None);
        }
        // The holder may have been pruned since the insert lost.
        self.binding_for(binding.channel)
            .await?
            .map(Some)
            .ok_or(StoreError::Conflict("panel_bindings.channel_id"))
    }

    async fn upsert_binding(&self, binding: PanelBinding) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO panel_bindings (channel_id, message_id) VALUES ($1, $2) \
             ON CONFLICT (channel_id) DO UPDATE \
             SET message_id = EXCLUDED.message_id, updated_at = now()",
        )
        .bind(binding.channel.to_db())
        .bind(binding.message.to_db())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "panel_bindings.message_id"))?;
        Ok(())
    }

    async fn delete_binding(&self, binding: PanelBinding) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM panel_bindings WHERE channel_id = $1 AND message_id = $2")
                .bind(binding.channel.to_db())
                .bind(binding.message.to_db())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Ledger for PgStore {
    async fn file_map_change_request(
        &self,
        request: NewMapChangeRequest,
    ) -> Result<MapChangeRequest, StoreError> {
        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO map_change_requests (server_key, map_name, requester_id, thread_id, state) \
             VALUES ($1, $2, $3, $4, 'open') RETURNING id, created_at",
        )
        .bind(&request.server_key)
        .bind(&request.map_name)
        .bind(request.requester.to_db())
        .bind(request.thread.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(MapChangeRequest {
            id,
            server_key: request.server_key,
            map_name: request.map_name,
            requester: request.requester,
            thread: request.thread,
            state: TicketState::Open,
            created_at,
        })
    }

    async fn file_help_ticket(&self, ticket: NewHelpTicket) -> Result<TicketFiling, StoreError> {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO help_tickets (server_key, opener_id, thread_id, state) \
             VALUES ($1, $2, $3, 'open') \
             ON CONFLICT (server_key, opener_id) WHERE state = 'open' DO NOTHING \
             RETURNING id",
        )
        .bind(&ticket.server_key)
        .bind(ticket.opener.to_db())
        .bind(ticket.thread.to_db())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "help_tickets.thread_id"))?;

        Ok(match inserted {
            Some(id) => TicketFiling::Created { id },
            None => TicketFiling::Ignored,
        })
    }

    async fn open_help_ticket(
        &self,
        server_key: &str,
        opener: UserId,
    ) -> Result<Option<HelpTicket>, StoreError> {
        let row: Option<HelpTicketRow> = sqlx::query_as(&format!(
            "SELECT {HELP_TICKET_COLUMNS} FROM help_tickets \
             WHERE server_key = $1 AND opener_id = $2 AND state = 'open'"
        ))
        .bind(server_key)
        .bind(opener.to_db())
        .fetch_optional(&self.pool)
        .await?;
        row.map(help_ticket_from_row).transpose()
    }

    async fn set_help_ticket_state(
        &self,
        thread: ChannelId,
        state: TicketState,
    ) -> Result<Option<HelpTicket>, StoreError> {
        let row: Option<HelpTicketRow> = sqlx::query_as(&format!(
            "UPDATE help_tickets SET state = $2 WHERE thread_id = $1 \
             RETURNING {HELP_TICKET_COLUMNS}"
        ))
        .bind(thread.to_db())
        .bind(state.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "help_tickets open ticket per opener"))?;
        row.map(help_ticket_from_row).transpose()
    }
}
