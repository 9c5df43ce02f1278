use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, UserId};

/// Lifecycle state shared by map-change requests and help tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketState {
    Open,
    Handled,
    Rejected,
}

impl TicketState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Handled => "handled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "handled" => Ok(Self::Handled),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown ticket state '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMapChangeRequest {
    pub server_key: String,
    pub map_name: String,
    pub requester: UserId,
    pub thread: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapChangeRequest {
    pub id: i64,
    pub server_key: String,
    pub map_name: String,
    pub requester: UserId,
    pub thread: ChannelId,
    pub state: TicketState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHelpTicket {
    pub server_key: String,
    pub opener: UserId,
    pub thread: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpTicket {
    pub id: i64,
    pub server_key: String,
    pub opener: UserId,
    pub thread: ChannelId,
    pub state: TicketState,
    pub created_at: DateTime<Utc>,
}

/// Outcome of filing a help ticket. `Ignored` means an open ticket for the same
/// (server, opener) already exists and still stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFiling {
    Created { id: i64 },
    Ignored,
}

impl TicketFiling {
    pub fn was_created(self) -> bool {
        matches!(self, Self::Created { .. })
    }
}
