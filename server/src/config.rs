use std::collections::BTreeSet;
use std::time::Duration;

use porta_shared::{Endpoint, MAX_SERVER_ROWS, RoleId, ServerDescriptor, ServerRegistry};

use crate::error::ConfigError;

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_SERVER_KEYS: &str = "surf,bhop";
pub const DEFAULT_GAME_HOST: &str = "127.0.0.1";
pub const DEFAULT_GAME_PORT: u16 = 27015;
pub const MAX_SERVER_KEY_CHARS: usize = 32;

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_PANEL_REFRESH_SECS: u64 = 30;
pub const DEFAULT_PANEL_EDIT_PAUSE_MS: u64 = 200;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 2500;
pub const DEFAULT_CONTROL_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_DISCORD_HTTP_TIMEOUT_SECS: u64 = 10;

pub const READY_PROBE_INITIAL_BACKOFF_MS: u64 = 500;
pub const READY_PROBE_MAX_BACKOFF_SECS: u64 = 30;
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Immutable process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord: DiscordSettings,
    pub privileged_roles: BTreeSet<RoleId>,
    pub registry: ServerRegistry,
    pub http_addr: String,
    pub refresh_interval: Duration,
    pub edit_pause: Duration,
    pub query_timeout: Duration,
    pub control_timeout: Duration,
}

#[derive(Clone)]
pub struct DiscordSettings {
    pub bot_token: String,
    pub application_id: Option<u64>,
    /// Hex-encoded Ed25519 key used to verify interaction webhooks.
    pub public_key: Option<String>,
    pub api_base: String,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for DiscordSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSettings")
            .field("bot_token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("public_key", &self.public_key)
            .field("api_base", &self.api_base)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = env_string("DISCORD_BOT_TOKEN")
            .ok_or(ConfigError::Missing("DISCORD_BOT_TOKEN"))?;

        let mut privileged_roles: BTreeSet<RoleId> =
            role_ids_from_csv(env_string("DISCORD_ADMIN_ROLE_IDS").as_deref());
        privileged_roles.extend(role_ids_from_csv(
            env_string("DISCORD_MOD_ROLE_IDS").as_deref(),
        ));

        let registry = server_registry_from_env()?;
        if registry.is_empty() {
            return Err(ConfigError::Invalid {
                name: "GAME_SERVER_KEYS",
                reason: "no server keys configured".to_string(),
            });
        }

        Ok(Self {
            discord: DiscordSettings {
                bot_token,
                application_id: env_parsed("DISCORD_APPLICATION_ID"),
                public_key: env_string("DISCORD_PUBLIC_KEY"),
                api_base: env_string("DISCORD_API_BASE")
                    .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.to_string()),
                http_timeout: Duration::from_secs(DEFAULT_DISCORD_HTTP_TIMEOUT_SECS),
            },
            privileged_roles,
            registry,
            http_addr: format!(
                "{}:{}",
                env_string("HTTP_HOST").unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
                env_positive::<u16>("HTTP_PORT").unwrap_or(DEFAULT_HTTP_PORT)
            ),
            refresh_interval: Duration::from_secs(
                env_positive("PANEL_REFRESH_SECS").unwrap_or(DEFAULT_PANEL_REFRESH_SECS),
            ),
            edit_pause: Duration::from_millis(
                env_positive("PANEL_EDIT_PAUSE_MS").unwrap_or(DEFAULT_PANEL_EDIT_PAUSE_MS),
            ),
            query_timeout: Duration::from_millis(
                env_positive("QUERY_TIMEOUT_MS").unwrap_or(DEFAULT_QUERY_TIMEOUT_MS),
            ),
            control_timeout: Duration::from_millis(
                env_positive("CONTROL_TIMEOUT_MS").unwrap_or(DEFAULT_CONTROL_TIMEOUT_MS),
            ),
        })
    }
}

pub fn db_max_connections() -> u32 {
    env_positive("DB_MAX_CONNECTIONS").unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
}

fn server_registry_from_env() -> Result<ServerRegistry, ConfigError> {
    let keys = env_string("GAME_SERVER_KEYS").unwrap_or_else(|| DEFAULT_SERVER_KEYS.to_string());
    let mut servers = Vec::new();
    for key in keys.split(',').map(str::trim).filter(|key| !key.is_empty()) {
        if key.chars().count() > MAX_SERVER_KEY_CHARS {
            return Err(ConfigError::Invalid {
                name: "GAME_SERVER_KEYS",
                reason: format!("key {key:?} is longer than {MAX_SERVER_KEY_CHARS} characters"),
            });
        }
        servers.push(server_descriptor_from_env(key)?);
    }
    // Each server needs its own button row on the panel.
    if servers.len() > MAX_SERVER_ROWS {
        return Err(ConfigError::Invalid {
            name: "GAME_SERVER_KEYS",
            reason: format!(
                "{} servers configured, the panel has room for {MAX_SERVER_ROWS}",
                servers.len()
            ),
        });
    }
    Ok(ServerRegistry::new(servers))
}

fn server_descriptor_from_env(key: &str) -> Result<ServerDescriptor, ConfigError> {
    let prefix = format!("CS2_{}", key.to_ascii_uppercase());
    let default_port = default_port_for(key);

    let host =
        env_string(&format!("{prefix}_HOST")).unwrap_or_else(|| DEFAULT_GAME_HOST.to_string());
    let port = env_port(&format!("{prefix}_PORT"))?.unwrap_or(default_port);
    let rcon_host = env_string(&format!("{prefix}_RCON_HOST")).unwrap_or_else(|| host.clone());
    let rcon_port = env_port(&format!("{prefix}_RCON_PORT"))?.unwrap_or(port);

    Ok(ServerDescriptor {
        key: key.to_string(),
        query: Endpoint::new(host, port),
        control: Endpoint::new(rcon_host, rcon_port),
        control_credential: env_string(&format!("{prefix}_RCON_PASSWORD")).unwrap_or_default(),
        display_password: env_string(&format!("{prefix}_PASSWORD")),
    })
}

fn default_port_for(key: &str) -> u16 {
    match key.to_ascii_lowercase().as_str() {
        "bhop" => 27016,
        _ => DEFAULT_GAME_PORT,
    }
}

/// Comma-separated ids; entries that are not plain numbers are skipped.
pub fn role_ids_from_csv(raw: Option<&str>) -> BTreeSet<RoleId> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|value| value.parse().ok())
        .collect()
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|value| value.parse::<T>().ok())
}

fn env_positive<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    env_parsed::<T>(name).filter(|value| *value > T::default())
}

fn env_port(name: &str) -> Result<Option<u16>, ConfigError> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .map(Some)
            .ok_or_else(|| ConfigError::Invalid {
                name: "port",
                reason: format!("{name}={raw} is not a valid port"),
            }),
    }
}
