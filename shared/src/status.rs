use serde::{Deserialize, Serialize};

use crate::registry::ServerDescriptor;

/// Cap for player-name lists in single-server views.
pub const INFO_NAMES_CAP: usize = 1024;
/// Cap for player-name lists inside the multi-server panel, where names share a field with
/// address, map and player count.
pub const PANEL_NAMES_CAP: usize = 512;

const EMPTY_NAMES: &str = "—";

/// What a successful upstream query reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub map: Option<String>,
    pub players: u32,
    pub max_players: u32,
    pub names: Vec<String>,
}

/// Status of one server key at the time the snapshot was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub key: String,
    pub address: String,
    pub online: bool,
    pub map: Option<String>,
    pub players: u32,
    pub max_players: u32,
    /// Sorted lexicographically.
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_reason: Option<String>,
}

impl ServerStatus {
    pub fn online(server: &ServerDescriptor, info: ServerInfo) -> Self {
        let mut names = info.names;
        names.sort();
        Self {
            key: server.key.clone(),
            address: server.query.to_string(),
            online: true,
            map: info.map,
            players: info.players,
            max_players: info.max_players,
            names,
            offline_reason: None,
        }
    }

    pub fn offline(server: &ServerDescriptor, reason: impl Into<String>) -> Self {
        Self {
            key: server.key.clone(),
            address: server.query.to_string(),
            online: false,
            map: None,
            players: 0,
            max_players: 0,
            names: Vec::new(),
            offline_reason: Some(reason.into()),
        }
    }

    pub fn player_count_label(&self) -> String {
        format!("{}/{}", self.players, self.max_players)
    }
}

/// Point-in-time status of a set of servers, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub servers: Vec<ServerStatus>,
}

impl StatusSnapshot {
    pub fn get(&self, key: &str) -> Option<&ServerStatus> {
        self.servers.iter().find(|status| status.key == key)
    }

    pub fn online_count(&self) -> usize {
        self.servers.iter().filter(|status| status.online).count()
    }
}

/// Joins already-sorted names and cuts the joined string to at most `cap` characters.
pub fn truncate_names(names: &[String], cap: usize) -> String {
    if names.is_empty() {
        return EMPTY_NAMES.to_string();
    }
    let joined = names.join(", ");
    if joined.chars().count() <= cap {
        return joined;
    }
    joined.chars().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::{INFO_NAMES_CAP, ServerInfo, ServerStatus, truncate_names};
    use crate::registry::{Endpoint, ServerDescriptor};

    fn surf() -> ServerDescriptor {
        ServerDescriptor {
            key: "surf".to_string(),
            query: Endpoint::new("203.0.113.7", 27015),
            control: Endpoint::new("203.0.113.7", 27015),
            control_credential: String::new(),
            display_password: None,
        }
    }

    #[test]
    fn online_status_sorts_player_names() {
        let status = ServerStatus::online(
            &surf(),
            ServerInfo {
                map: Some("surf_beginner".to_string()),
                players: 3,
                max_players: 24,
                names: vec!["zed".into(), "Alice".into(), "bob".into()],
            },
        );

        assert_eq!(status.names, vec!["Alice", "bob", "zed"]);
        assert_eq!(status.address, "203.0.113.7:27015");
        assert_eq!(status.player_count_label(), "3/24");
    }

    #[test]
    fn offline_status_carries_no_player_data() {
        let status = ServerStatus::offline(&surf(), "timed out");
        assert!(!status.online);
        assert!(status.names.is_empty());
        assert_eq!(status.map, None);
        assert_eq!(status.players, 0);
    }

    #[test]
    fn truncation_cuts_joined_names_to_exact_cap() {
        let names: Vec<String> = (0..400).map(|i| format!("player_{i:03}")).collect();
        let first = truncate_names(&names, INFO_NAMES_CAP);
        let second = truncate_names(&names, INFO_NAMES_CAP);

        assert_eq!(first.chars().count(), INFO_NAMES_CAP);
        assert_eq!(first, second);
        assert!(first.starts_with("player_000, player_001"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let names = vec!["ÄÖÜ".repeat(10)];
        let cut = truncate_names(&names, 7);
        assert_eq!(cut.chars().count(), 7);
        assert_eq!(cut, "ÄÖÜÄÖÜÄ");
    }

    #[test]
    fn short_and_empty_lists_are_not_padded() {
        assert_eq!(truncate_names(&[], 10), "—");
        assert_eq!(truncate_names(&["a".into(), "b".into()], 10), "a, b");
    }
}
