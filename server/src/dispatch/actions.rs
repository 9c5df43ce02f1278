//! Handler table from UI callbacks onto dispatcher operations.

use std::collections::BTreeMap;

use porta_shared::{ActionKey, ChannelId, PanelAction, TicketState};
use tracing::warn;

use super::{PanelOutcome, TicketOutcome};
use crate::auth::Caller;
use crate::clients::Notice;
use crate::error::{DispatchError, ErrorClass};
use crate::state::AppState;

pub const INPUT_SERVER: &str = "server";
pub const INPUT_MAP: &str = "map";
pub const INPUT_TEXT: &str = "text";
pub const INPUT_COMMAND: &str = "command";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Action {
        key: ActionKey,
        inputs: BTreeMap<String, String>,
    },
    Panel,
    CloseTicket(TicketState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub request: Request,
    pub caller: Caller,
    pub channel: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalInput {
    pub id: &'static str,
    pub label: &'static str,
    pub placeholder: &'static str,
    pub max_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalSpec {
    pub custom_id: String,
    pub title: String,
    pub inputs: Vec<ModalInput>,
}

/// What the adapter should answer right away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Reply(Notice),
    Modal(ModalSpec),
    /// Acknowledge now and complete with [`run`].
    Defer,
}

const SERVER_INPUT: ModalInput = ModalInput {
    id: INPUT_SERVER,
    label: "Server",
    placeholder: "surf",
    max_length: 32,
};

fn input_for(action: PanelAction) -> Option<ModalInput> {
    match action {
        PanelAction::ChangeMap | PanelAction::MapRequest => Some(ModalInput {
            id: INPUT_MAP,
            label: "Map name",
            placeholder: "surf_utopia_v3",
            max_length: super::MAX_MAP_NAME_CHARS,
        }),
        PanelAction::Say => Some(ModalInput {
            id: INPUT_TEXT,
            label: "Message",
            placeholder: "Server restarting in 5 minutes",
            max_length: super::MAX_CONSOLE_TEXT_CHARS,
        }),
        PanelAction::Rcon => Some(ModalInput {
            id: INPUT_COMMAND,
            label: "Console command",
            placeholder: "status",
            max_length: super::MAX_CONSOLE_TEXT_CHARS,
        }),
        _ => None,
    }
}

fn needs_server(action: PanelAction) -> bool {
    !matches!(action, PanelAction::Password | PanelAction::Links)
}

fn modal_title(action: PanelAction) -> &'static str {
    match action {
        PanelAction::ChangeMap => "Change map",
        PanelAction::Say => "Say in server chat",
        PanelAction::Rcon => "Run console command",
        PanelAction::MapRequest => "Request a map",
        PanelAction::Ticket => "Ask an admin for help",
        _ => "Details",
    }
}

fn server_key<'a>(key: &'a ActionKey, inputs: &'a BTreeMap<String, String>) -> Option<&'a str> {
    key.server
        .as_deref()
        .or_else(|| inputs.get(INPUT_SERVER).map(String::as_str))
        .filter(|key| !key.trim().is_empty())
}

fn input<'a>(inputs: &'a BTreeMap<String, String>, id: &str) -> &'a str {
    inputs.get(id).map(String::as_str).unwrap_or_default()
}

/// Decides the immediate answer. Authorization and key validation happen here, before any
/// collaborator call.
pub fn plan(state: &AppState, invocation: &Invocation) -> Plan {
    let (key, inputs) = match &invocation.request {
        Request::Panel | Request::CloseTicket(_) => {
            return match super::require_privileged(state, &invocation.caller) {
                Ok(()) => Plan::Defer,
                Err(e) => Plan::Reply(failure(e)),
            };
        }
        Request::Action { key, inputs } => (key, inputs),
    };

    if key.action.is_privileged()
        && let Err(e) = super::require_privileged(state, &invocation.caller)
    {
        return Plan::Reply(failure(e));
    }

    let server = server_key(key, inputs);
    if let Some(server) = server
        && let Err(e) = super::server(state, server)
    {
        return Plan::Reply(failure(e));
    }

    let mut missing = Vec::new();
    if needs_server(key.action) && server.is_none() {
        missing.push(SERVER_INPUT);
    }
    if let Some(field) = input_for(key.action)
        && !inputs.contains_key(field.id)
    {
        missing.push(field);
    }
    if !missing.is_empty() {
        if key.server.is_none() && matches!(key.action, PanelAction::Info | PanelAction::Restart) {
            return Plan::Reply(failure(DispatchError::InvalidInput(
                "Pick a server first.".to_string(),
            )));
        }
        return Plan::Modal(ModalSpec {
            custom_id: key.custom_id(),
            title: modal_title(key.action).to_string(),
            inputs: missing,
        });
    }

    match key.action {
        PanelAction::Password => Plan::Reply(
            super::password(state, server)
                .map(Notice::text)
                .unwrap_or_else(failure),
        ),
        PanelAction::Links => Plan::Reply(Notice::text(super::links(state))),
        _ => Plan::Defer,
    }
}

/// Performs a deferred invocation and renders its answer.
pub async fn run(state: &AppState, invocation: &Invocation) -> Notice {
    let caller = &invocation.caller;
    let (key, inputs) = match &invocation.request {
        Request::Panel => {
            return match super::create_or_update_panel(state, invocation.channel).await {
                Ok(PanelOutcome::Created(_)) => Notice::text("Panel created."),
                Ok(PanelOutcome::Updated(_)) => Notice::text("Panel updated."),
                Err(e) => failure(e),
            };
        }
        Request::CloseTicket(new_state) => {
            return match super::close_ticket(state, caller, invocation.channel, *new_state).await
            {
                Ok(ticket) => Notice::text(format!("Ticket #{} marked {}.", ticket.id, ticket.state)),
                Err(e) => failure(e),
            };
        }
        Request::Action { key, inputs } => (key, inputs),
    };

    let server = server_key(key, inputs).unwrap_or_default();
    let result = match key.action {
        PanelAction::Info => super::info(state, server).await.map(Notice::embed),
        PanelAction::Password => super::password(state, Some(server).filter(|s| !s.is_empty()))
            .map(Notice::text),
        PanelAction::Links => Ok(Notice::text(super::links(state))),
        PanelAction::ChangeMap => {
            let map = input(inputs, INPUT_MAP);
            super::change_map(state, server, map, caller)
                .await
                .map(|out| command_notice(server, &format!("changelevel {}", map.trim()), &out))
        }
        PanelAction::Restart => super::restart(state, server, caller)
            .await
            .map(|out| command_notice(server, "mp_restartgame 1", &out)),
        PanelAction::Say => {
            let text = input(inputs, INPUT_TEXT);
            super::say(state, server, text, caller)
                .await
                .map(|out| command_notice(server, &format!("say {}", text.trim()), &out))
        }
        PanelAction::Rcon => {
            let command = input(inputs, INPUT_COMMAND);
            super::execute(state, server, command, caller)
                .await
                .map(|out| command_notice(server, command.trim(), &out))
        }
        PanelAction::MapRequest => super::request_map_change(
            state,
            caller,
            invocation.channel,
            server,
            input(inputs, INPUT_MAP),
        )
        .await
        .map(|request| {
            Notice::text(format!(
                "Map request for `{}` filed: <#{}>",
                request.map_name, request.thread
            ))
        }),
        PanelAction::Ticket => super::open_help_ticket(state, caller, invocation.channel, server)
            .await
            .map(|outcome| match outcome {
                TicketOutcome::Opened { thread, .. } => {
                    Notice::text(format!("Help thread opened: <#{thread}>"))
                }
                TicketOutcome::AlreadyOpen(ticket) => Notice::text(format!(
                    "You already have an open help ticket: <#{}>",
                    ticket.thread
                )),
            }),
    };
    result.unwrap_or_else(failure)
}

fn command_notice(server: &str, command: &str, output: &str) -> Notice {
    Notice::text(format!(
        "**{}** `{command}`\n```\n{output}\n```",
        server.trim().to_ascii_uppercase()
    ))
}

fn failure(error: DispatchError) -> Notice {
    if matches!(
        error.class(),
        ErrorClass::TransientUpstream | ErrorClass::Internal | ErrorClass::ResourceGone
    ) {
        warn!(error = %error, "interaction failed");
    }
    Notice::text(error.to_string())
}
