use std::fmt;

use serde::{Deserialize, Serialize};

/// Host/port pair of an upstream game-server service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Static connection coordinates of one logical game server.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub key: String,
    pub query: Endpoint,
    pub control: Endpoint,
    pub control_credential: String,
    pub display_password: Option<String>,
}

impl fmt::Debug for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerDescriptor")
            .field("key", &self.key)
            .field("query", &self.query)
            .field("control", &self.control)
            .field("control_credential", &"<redacted>")
            .field(
                "display_password",
                &self.display_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ServerDescriptor {
    /// Upper-cased key used in human-facing labels.
    pub fn label(&self) -> String {
        self.key.to_ascii_uppercase()
    }
}

/// Ordered, immutable set of configured servers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerRegistry {
    servers: Vec<ServerDescriptor>,
}

impl ServerRegistry {
    /// Later duplicates of a key are dropped; keys are normalized to lowercase.
    pub fn new(servers: impl IntoIterator<Item = ServerDescriptor>) -> Self {
        let mut unique: Vec<ServerDescriptor> = Vec::new();
        for mut server in servers {
            server.key = normalize_key(&server.key);
            if server.key.is_empty() || unique.iter().any(|s| s.key == server.key) {
                continue;
            }
            unique.push(server);
        }
        Self { servers: unique }
    }

    pub fn get(&self, key: &str) -> Option<&ServerDescriptor> {
        let key = normalize_key(key);
        self.servers.iter().find(|server| server.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.servers.iter().map(|server| server.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerDescriptor> {
        self.servers.iter()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

pub fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}
