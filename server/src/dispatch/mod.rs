//! On-demand operations triggered by people: panel creation, server control, and tickets.
//!
//! Collaborator failures come back as [`DispatchError`] values with human-readable messages;
//! nothing here panics or retries.

pub mod actions;

use porta_shared::{
    ChannelId, HelpTicket, MapChangeRequest, NewHelpTicket, NewMapChangeRequest, PanelBody,
    ServerDescriptor, TicketFiling, TicketState, normalize_key, render_server_info,
};
use tracing::{info, warn};

use crate::auth::Caller;
use crate::error::{ControlError, DispatchError, StoreError};
use crate::services::{panel_reconciler, snapshot_builder};
use crate::state::AppState;
use crate::store::PanelBinding;

pub const MAX_MAP_NAME_CHARS: usize = 64;
pub const MAX_CONSOLE_TEXT_CHARS: usize = 190;
const MAX_OUTPUT_CHARS: usize = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOutcome {
    Created(PanelBinding),
    Updated(PanelBinding),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketOutcome {
    Opened { id: i64, thread: ChannelId },
    AlreadyOpen(HelpTicket),
}

pub fn require_privileged(state: &AppState, caller: &Caller) -> Result<(), DispatchError> {
    if state.authorizer.is_privileged(&caller.roles) {
        return Ok(());
    }
    state.observability.record_permission_denial();
    info!(user_id = %caller.user, "denied privileged action");
    Err(DispatchError::PermissionDenied)
}

pub fn server<'a>(state: &'a AppState, key: &str) -> Result<&'a ServerDescriptor, DispatchError> {
    state
        .settings
        .registry
        .get(key)
        .ok_or_else(|| DispatchError::UnknownServer(normalize_key(key)))
}

/// Edits the channel's panel in place, or sends a new one when there is none or it vanished.
///
/// A fresh channel is claimed with a conditional insert; when a concurrent create wins the
/// claim, the message sent here is deleted and the winner's panel is edited instead.
pub async fn create_or_update_panel(
    state: &AppState,
    channel: ChannelId,
) -> Result<PanelOutcome, DispatchError> {
    let (body, controls) = panel_reconciler::render(state).await;

    let mut vanished = false;
    if let Some(existing) = state.panels.binding_for(channel).await? {
        match state
            .messages
            .edit(channel, existing.message, &body, &controls)
            .await
        {
            Ok(()) => return Ok(PanelOutcome::Updated(existing)),
            Err(e) if e.is_gone() => {
                info!(
                    channel_id = %channel,
                    message_id = %existing.message,
                    "panel message vanished, recreating"
                );
                vanished = true;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let message = state.messages.send(channel, &body, &controls).await?;
    let binding = PanelBinding { channel, message };
    let holder = if vanished {
        match state.panels.upsert_binding(binding).await {
            Ok(()) => None,
            Err(StoreError::Conflict(constraint)) => Some(
                state
                    .panels
                    .binding_for(channel)
                    .await?
                    .ok_or(StoreError::Conflict(constraint))?,
            ),
            Err(e) => return Err(e.into()),
        }
    } else {
        state.panels.claim_binding(binding).await?
    };

    let Some(holder) = holder else {
        info!(channel_id = %channel, message_id = %message, "panel created");
        return Ok(PanelOutcome::Created(binding));
    };
    warn!(
        channel_id = %channel,
        message_id = %message,
        holder_id = %holder.message,
        "channel already has a panel, editing it instead"
    );
    match state.messages.delete(channel, message).await {
        Ok(()) => {}
        Err(e) if e.is_gone() => {}
        Err(e) => {
            warn!(
                channel_id = %channel,
                message_id = %message,
                error = %e,
                "failed to delete duplicate panel"
            );
        }
    }
    state
        .messages
        .edit(channel, holder.message, &body, &controls)
        .await?;
    Ok(PanelOutcome::Updated(holder))
}

/// Runs a raw console command on `server_key` for a privileged caller.
pub async fn execute(
    state: &AppState,
    server_key: &str,
    command: &str,
    caller: &Caller,
) -> Result<String, DispatchError> {
    require_privileged(state, caller)?;
    let server = server(state, server_key)?;
    let command = validate_console_text(command)?;
    run_command(state, server, command, caller).await
}

pub async fn change_map(
    state: &AppState,
    server_key: &str,
    map: &str,
    caller: &Caller,
) -> Result<String, DispatchError> {
    require_privileged(state, caller)?;
    let server = server(state, server_key)?;
    let map = validate_map_name(map)?;
    run_command(state, server, &format!("changelevel {map}"), caller).await
}

pub async fn restart(
    state: &AppState,
    server_key: &str,
    caller: &Caller,
) -> Result<String, DispatchError> {
    require_privileged(state, caller)?;
    let server = server(state, server_key)?;
    run_command(state, server, "mp_restartgame 1", caller).await
}

pub async fn say(
    state: &AppState,
    server_key: &str,
    text: &str,
    caller: &Caller,
) -> Result<String, DispatchError> {
    require_privileged(state, caller)?;
    let server = server(state, server_key)?;
    let text = validate_console_text(text)?;
    run_command(state, server, &format!("say {text}"), caller).await
}

async fn run_command(
    state: &AppState,
    server: &ServerDescriptor,
    command: &str,
    caller: &Caller,
) -> Result<String, DispatchError> {
    let timeout = state.settings.control_timeout;
    let outcome = tokio::time::timeout(
        timeout,
        state.control.execute(
            &server.control,
            &server.control_credential,
            command,
            timeout,
        ),
    )
    .await
    .unwrap_or(Err(ControlError::Timeout(timeout)));

    state.observability.record_control_command(outcome.is_err());
    match outcome {
        Ok(output) => {
            info!(
                server = %server.key,
                user_id = %caller.user,
                command,
                "control command executed"
            );
            Ok(command_output(&output))
        }
        Err(e) => {
            warn!(
                server = %server.key,
                user_id = %caller.user,
                command,
                error = %e,
                "control command failed"
            );
            Err(e.into())
        }
    }
}

/// Trimmed command output, `ok` when empty, cut to fit in a chat message.
pub fn command_output(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "ok".to_string();
    }
    trimmed.chars().take(MAX_OUTPUT_CHARS).collect()
}

pub async fn info(state: &AppState, server_key: &str) -> Result<PanelBody, DispatchError> {
    let status = snapshot_builder::build_one(state, server_key)
        .await
        .ok_or_else(|| DispatchError::UnknownServer(normalize_key(server_key)))?;
    Ok(render_server_info(&status))
}

/// Display passwords for one server, or for all of them.
pub fn password(state: &AppState, server_key: Option<&str>) -> Result<String, DispatchError> {
    let line = |server: &ServerDescriptor| {
        let shown = match server.display_password.as_deref() {
            Some(pw) if !pw.is_empty() => format!("||{pw}||"),
            _ => "— (no password)".to_string(),
        };
        format!("**{}**: {shown}", server.label())
    };
    match server_key {
        Some(key) => Ok(line(server(state, key)?)),
        None => Ok(state
            .settings
            .registry
            .iter()
            .map(line)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

pub fn links(state: &AppState) -> String {
    state
        .settings
        .registry
        .iter()
        .map(|server| {
            format!(
                "**{}**: steam://connect/{}",
                server.label(),
                server.query
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Opens a discussion thread for the request and records it.
pub async fn request_map_change(
    state: &AppState,
    caller: &Caller,
    channel: ChannelId,
    server_key: &str,
    map: &str,
) -> Result<MapChangeRequest, DispatchError> {
    let server = server(state, server_key)?;
    let map = validate_map_name(map)?;

    let thread = state
        .messages
        .create_thread(channel, &format!("Map request • {} • {map}", server.key))
        .await?;
    let intro = staff_ping(
        state,
        &format!(
            "<@{}> requested map `{map}` on **{}**.",
            caller.user,
            server.label()
        ),
    );
    state.messages.post_text(thread, &intro).await?;

    let request = state
        .ledger
        .file_map_change_request(NewMapChangeRequest {
            server_key: server.key.clone(),
            map_name: map.to_string(),
            requester: caller.user,
            thread,
        })
        .await?;
    info!(server = %server.key, map, request_id = request.id, "map change request filed");
    Ok(request)
}

/// One open help ticket per (server, opener); a second attempt points at the first.
pub async fn open_help_ticket(
    state: &AppState,
    caller: &Caller,
    channel: ChannelId,
    server_key: &str,
) -> Result<TicketOutcome, DispatchError> {
    let server = server(state, server_key)?;
    if let Some(existing) = state.ledger.open_help_ticket(&server.key, caller.user).await? {
        state.observability.record_ticket_filing(false);
        return Ok(TicketOutcome::AlreadyOpen(existing));
    }

    let thread = state
        .messages
        .create_thread(
            channel,
            &format!("CS2 help • {} • {}", server.key, caller.display_name),
        )
        .await?;
    let filing = state
        .ledger
        .file_help_ticket(NewHelpTicket {
            server_key: server.key.clone(),
            opener: caller.user,
            thread,
        })
        .await?;
    state.observability.record_ticket_filing(filing.was_created());

    match filing {
        TicketFiling::Created { id } => {
            let intro = staff_ping(
                state,
                &format!("<@{}> needs help on **{}**.", caller.user, server.label()),
            );
            state.messages.post_text(thread, &intro).await?;
            info!(server = %server.key, ticket_id = id, thread_id = %thread, "help ticket opened");
            Ok(TicketOutcome::Opened { id, thread })
        }
        TicketFiling::Ignored => {
            let existing = state
                .ledger
                .open_help_ticket(&server.key, caller.user)
                .await?
                .ok_or(StoreError::Conflict("help_tickets open ticket per opener"))?;
            // Lost a race with a concurrent filing; leave a pointer instead of a second ping.
            state
                .messages
                .post_text(
                    thread,
                    &format!(
                        "<@{}> you already have an open ticket for **{}**: <#{}>",
                        caller.user,
                        server.label(),
                        existing.thread
                    ),
                )
                .await?;
            Ok(TicketOutcome::AlreadyOpen(existing))
        }
    }
}

/// Moves the ticket bound to `thread` out of `open`.
pub async fn close_ticket(
    state: &AppState,
    caller: &Caller,
    thread: ChannelId,
    new_state: TicketState,
) -> Result<HelpTicket, DispatchError> {
    require_privileged(state, caller)?;
    if new_state == TicketState::Open {
        return Err(DispatchError::InvalidInput(
            "A ticket can only be closed as handled or rejected.".to_string(),
        ));
    }
    let ticket = state
        .ledger
        .set_help_ticket_state(thread, new_state)
        .await?
        .ok_or_else(|| {
            DispatchError::InvalidInput("This channel is not a help ticket thread.".to_string())
        })?;
    info!(ticket_id = ticket.id, state = %new_state, user_id = %caller.user, "help ticket closed");
    Ok(ticket)
}

fn staff_ping(state: &AppState, text: &str) -> String {
    let mentions = state.authorizer.staff_mentions();
    if mentions.is_empty() {
        text.to_string()
    } else {
        format!("{mentions} {text}")
    }
}

pub fn validate_map_name(raw: &str) -> Result<&str, DispatchError> {
    let map = raw.trim();
    let valid_chars = map
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-'));
    if map.is_empty() || map.chars().count() > MAX_MAP_NAME_CHARS || !valid_chars {
        return Err(DispatchError::InvalidInput(format!(
            "Map names are 1-{MAX_MAP_NAME_CHARS} characters of letters, digits, `_`, `.`, `/` or `-`."
        )));
    }
    Ok(map)
}

pub fn validate_console_text(raw: &str) -> Result<&str, DispatchError> {
    let text = raw.trim();
    if text.is_empty()
        || text.chars().count() > MAX_CONSOLE_TEXT_CHARS
        || text.contains(['\n', '\r'])
    {
        return Err(DispatchError::InvalidInput(format!(
            "Text must be a single line of 1-{MAX_CONSOLE_TEXT_CHARS} characters."
        )));
    }
    Ok(text)
}
