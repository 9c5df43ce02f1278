use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::ServerRegistry;
use crate::status::{INFO_NAMES_CAP, PANEL_NAMES_CAP, ServerStatus, StatusSnapshot, truncate_names};

pub const PANEL_COLOR: u32 = 0x5865F2;
pub const ONLINE_COLOR: u32 = 0x57F287;
pub const OFFLINE_COLOR: u32 = 0xED4245;

/// Chat platforms allow five component rows; one is reserved for the tools row.
pub const MAX_SERVER_ROWS: usize = 4;
const MAX_TITLE_CHARS: usize = 256;

const CUSTOM_ID_PREFIX: &str = "porta";

/// Platform-neutral rendered message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelBody {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<PanelField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl PanelField {
    fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelButton {
    pub label: String,
    pub custom_id: String,
    pub style: ButtonStyle,
}

/// Interactive controls attached to a panel, as rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelControls {
    pub rows: Vec<Vec<PanelButton>>,
}

/// Everything a panel interaction can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelAction {
    Info,
    Password,
    Links,
    ChangeMap,
    Restart,
    Say,
    Rcon,
    MapRequest,
    Ticket,
}

impl PanelAction {
    pub const ALL: [PanelAction; 9] = [
        Self::Info,
        Self::Password,
        Self::Links,
        Self::ChangeMap,
        Self::Restart,
        Self::Say,
        Self::Rcon,
        Self::MapRequest,
        Self::Ticket,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Password => "password",
            Self::Links => "links",
            Self::ChangeMap => "changemap",
            Self::Restart => "restart",
            Self::Say => "say",
            Self::Rcon => "rcon",
            Self::MapRequest => "maprequest",
            Self::Ticket => "ticket",
        }
    }

    /// Actions that reach the remote-control collaborator.
    pub fn is_privileged(self) -> bool {
        matches!(
            self,
            Self::ChangeMap | Self::Restart | Self::Say | Self::Rcon
        )
    }
}

impl fmt::Display for PanelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| format!("unknown panel action '{s}'"))
    }
}

/// `(action, server key)` carried by a component's custom id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub action: PanelAction,
    pub server: Option<String>,
}

impl ActionKey {
    pub fn new(action: PanelAction, server: Option<&str>) -> Self {
        Self {
            action,
            server: server.map(crate::registry::normalize_key),
        }
    }

    pub fn custom_id(&self) -> String {
        match &self.server {
            Some(server) => format!("{CUSTOM_ID_PREFIX}:{}:{server}", self.action),
            None => format!("{CUSTOM_ID_PREFIX}:{}", self.action),
        }
    }

    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(':');
        if parts.next()? != CUSTOM_ID_PREFIX {
            return None;
        }
        let action = parts.next()?.parse().ok()?;
        let server = parts.next().filter(|key| !key.is_empty());
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(action, server))
    }
}

/// Multi-server panel body. Pure function of the snapshot.
pub fn render_panel(snapshot: &StatusSnapshot) -> PanelBody {
    let names: Vec<String> = snapshot.servers.iter().map(|s| capitalize(&s.key)).collect();
    let title = if names.is_empty() {
        "Game Servers".to_string()
    } else {
        let title = format!("Game Servers — {}", names.join(" & "));
        if title.chars().count() > MAX_TITLE_CHARS {
            title.chars().take(MAX_TITLE_CHARS - 1).chain(['…']).collect()
        } else {
            title
        }
    };

    let fields = snapshot
        .servers
        .iter()
        .map(|status| {
            let label = status.key.to_ascii_uppercase();
            if status.online {
                PanelField::new(
                    format!("{label} — ONLINE"),
                    format!(
                        "**Address:** `{}`\n**Map:** `{}`\n**Players:** `{}`\n**Names:** {}",
                        status.address,
                        status.map.as_deref().unwrap_or("?"),
                        status.player_count_label(),
                        truncate_names(&status.names, PANEL_NAMES_CAP),
                    ),
                    false,
                )
            } else {
                PanelField::new(
                    format!("{label} — OFFLINE"),
                    format!(
                        "**Address:** `{}`\nCannot query server: `{}`",
                        status.address,
                        status.offline_reason.as_deref().unwrap_or("unreachable"),
                    ),
                    false,
                )
            }
        })
        .collect();

    PanelBody {
        title,
        description: Some("Live status. Use the buttons below for actions.".to_string()),
        color: PANEL_COLOR,
        fields,
    }
}

/// Ephemeral single-server view.
pub fn render_server_info(status: &ServerStatus) -> PanelBody {
    let label = status.key.to_ascii_uppercase();
    if !status.online {
        return PanelBody {
            title: format!("{label} status"),
            description: Some(format!(
                "Server at `{}` is offline: `{}`",
                status.address,
                status.offline_reason.as_deref().unwrap_or("unreachable"),
            )),
            color: OFFLINE_COLOR,
            fields: Vec::new(),
        };
    }

    PanelBody {
        title: format!("{label} status"),
        description: None,
        color: ONLINE_COLOR,
        fields: vec![
            PanelField::new("Address", status.address.clone(), true),
            PanelField::new("Map", status.map.clone().unwrap_or_else(|| "?".into()), true),
            PanelField::new("Players", status.player_count_label(), true),
            PanelField::new(
                "Player names",
                truncate_names(&status.names, INFO_NAMES_CAP),
                false,
            ),
        ],
    }
}

pub fn panel_controls(registry: &ServerRegistry) -> PanelControls {
    let mut rows: Vec<Vec<PanelButton>> = registry
        .iter()
        .take(MAX_SERVER_ROWS)
        .map(|server| {
            let label = capitalize(&server.key);
            let key = Some(server.key.as_str());
            vec![
                button(&label, "Info", PanelAction::Info, key, ButtonStyle::Secondary),
                button(&label, "Change Map", PanelAction::ChangeMap, key, ButtonStyle::Primary),
                button(&label, "Restart", PanelAction::Restart, key, ButtonStyle::Danger),
                button(&label, "Say", PanelAction::Say, key, ButtonStyle::Success),
                button(&label, "RCON", PanelAction::Rcon, key, ButtonStyle::Secondary),
            ]
        })
        .collect();

    rows.push(vec![
        tool_button("Connect Links", PanelAction::Links, ButtonStyle::Secondary),
        tool_button("Passwords", PanelAction::Password, ButtonStyle::Secondary),
        tool_button("Map Request", PanelAction::MapRequest, ButtonStyle::Success),
        tool_button("Admin Help", PanelAction::Ticket, ButtonStyle::Danger),
    ]);

    PanelControls { rows }
}

fn button(
    server_label: &str,
    text: &str,
    action: PanelAction,
    server: Option<&str>,
    style: ButtonStyle,
) -> PanelButton {
    PanelButton {
        label: format!("{server_label}: {text}"),
        custom_id: ActionKey::new(action, server).custom_id(),
        style,
    }
}

fn tool_button(text: &str, action: PanelAction, style: ButtonStyle) -> PanelButton {
    PanelButton {
        label: text.to_string(),
        custom_id: ActionKey::new(action, None).custom_id(),
        style,
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
