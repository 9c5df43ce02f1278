use std::collections::{BTreeMap, BTreeSet};

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use ed25519_dalek::{Signature, VerifyingKey};
use porta_shared::{ActionKey, ChannelId, PanelAction, RoleId, TicketState, UserId};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::auth::Caller;
use crate::clients::Notice;
use crate::clients::discord::notice_payload;
use crate::config::DiscordSettings;
use crate::dispatch::actions::{
    self, INPUT_COMMAND, INPUT_MAP, INPUT_SERVER, INPUT_TEXT, Invocation, ModalSpec, Plan,
    Request,
};
use crate::error::ConfigError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

const PING: u8 = 1;
const APPLICATION_COMMAND: u8 = 2;
const MESSAGE_COMPONENT: u8 = 3;
const MODAL_SUBMIT: u8 = 5;

const PONG: u8 = 1;
const CHANNEL_MESSAGE: u8 = 4;
const DEFERRED_CHANNEL_MESSAGE: u8 = 5;
const MODAL: u8 = 9;
const EPHEMERAL: u64 = 1 << 6;
const MODAL_TITLE_MAX_CHARS: usize = 45;

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    token: String,
    channel_id: Option<String>,
    member: Option<Member>,
    user: Option<User>,
    data: Option<InteractionData>,
}

#[derive(Debug, Deserialize)]
struct Member {
    user: User,
    #[serde(default)]
    roles: Vec<String>,
    nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    #[serde(default)]
    username: String,
    global_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InteractionData {
    name: Option<String>,
    #[serde(default)]
    options: Vec<CommandOption>,
    custom_id: Option<String>,
    #[serde(default)]
    components: Vec<ComponentRow>,
}

#[derive(Debug, Deserialize)]
struct CommandOption {
    name: String,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ComponentRow {
    #[serde(default)]
    components: Vec<TextInput>,
}

#[derive(Debug, Deserialize)]
struct TextInput {
    custom_id: String,
    value: Option<String>,
}

/// Parses the hex application key. An unset key disables the endpoint.
pub fn interaction_key(settings: &DiscordSettings) -> Result<Option<VerifyingKey>, ConfigError> {
    let Some(raw) = settings.public_key.as_deref() else {
        return Ok(None);
    };
    let invalid = |reason: String| ConfigError::Invalid {
        name: "DISCORD_PUBLIC_KEY",
        reason,
    };
    let bytes: [u8; 32] = hex::decode(raw.trim())
        .map_err(|e| invalid(e.to_string()))?
        .try_into()
        .map_err(|_| invalid("expected 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map(Some)
        .map_err(|e| invalid(e.to_string()))
}

fn verify_signature(key: &VerifyingKey, headers: &HeaderMap, body: &[u8]) -> Result<(), String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| format!("missing {name}"))
    };
    let timestamp = header(TIMESTAMP_HEADER)?;
    let signature: [u8; 64] = hex::decode(header(SIGNATURE_HEADER)?)
        .map_err(|e| format!("signature is not hex: {e}"))?
        .try_into()
        .map_err(|_| "signature must be 64 bytes".to_string())?;

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);
    key.verify_strict(&message, &Signature::from_bytes(&signature))
        .map_err(|e| format!("signature mismatch: {e}"))
}

pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(key) = state.interaction_key else {
        return (StatusCode::NOT_FOUND, "interactions are not enabled").into_response();
    };
    if let Err(reason) = verify_signature(&key, &headers, &body) {
        state.observability.record_interaction_signature_failure();
        debug!(reason, "rejected interaction");
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }
    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            warn!(error = %e, "malformed interaction payload");
            return (StatusCode::BAD_REQUEST, "malformed interaction").into_response();
        }
    };
    state.observability.record_interaction();

    if interaction.kind == PING {
        return Json(json!({ "type": PONG })).into_response();
    }
    let Some(invocation) = invocation_from(&interaction) else {
        return Json(message_response(&Notice::text("Unsupported interaction."))).into_response();
    };

    match actions::plan(&state, &invocation) {
        Plan::Reply(notice) => Json(message_response(&notice)).into_response(),
        Plan::Modal(spec) => Json(modal_response(&spec)).into_response(),
        Plan::Defer => {
            let token = interaction.token;
            tokio::spawn(async move {
                let notice = actions::run(&state, &invocation).await;
                if let Err(e) = state
                    .messages
                    .edit_interaction_response(&token, &notice)
                    .await
                {
                    warn!(error = %e, "failed to complete deferred interaction");
                }
            });
            Json(json!({
                "type": DEFERRED_CHANNEL_MESSAGE,
                "data": { "flags": EPHEMERAL },
            }))
            .into_response()
        }
    }
}

fn caller_from(interaction: &Interaction) -> Option<Caller> {
    let (user, roles, nick) = match (&interaction.member, &interaction.user) {
        (Some(member), _) => (&member.user, member.roles.as_slice(), member.nick.as_deref()),
        (None, Some(user)) => (user, &[][..], None),
        (None, None) => return None,
    };
    let display_name = nick
        .or(user.global_name.as_deref())
        .unwrap_or(&user.username)
        .to_string();
    Some(Caller {
        user: user.id.parse::<UserId>().ok()?,
        display_name,
        roles: roles
            .iter()
            .filter_map(|role| role.parse::<RoleId>().ok())
            .collect::<BTreeSet<_>>(),
    })
}

fn option_value(options: &[CommandOption], name: &str) -> Option<String> {
    let value = options.iter().find(|option| option.name == name)?.value.as_ref()?;
    Some(match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

fn input_id_for(action: PanelAction) -> Option<&'static str> {
    match action {
        PanelAction::ChangeMap | PanelAction::MapRequest => Some(INPUT_MAP),
        PanelAction::Say => Some(INPUT_TEXT),
        PanelAction::Rcon => Some(INPUT_COMMAND),
        _ => None,
    }
}

fn command_request(data: &InteractionData) -> Option<Request> {
    let options = &data.options;
    let action = |action: PanelAction, server: Option<String>, inputs: BTreeMap<String, String>| {
        Request::Action {
            key: ActionKey::new(action, server.as_deref()),
            inputs,
        }
    };
    match data.name.as_deref()? {
        "panel" => Some(Request::Panel),
        "status" => Some(action(
            PanelAction::Info,
            option_value(options, INPUT_SERVER),
            BTreeMap::new(),
        )),
        "password" => Some(action(
            PanelAction::Password,
            option_value(options, INPUT_SERVER),
            BTreeMap::new(),
        )),
        "control" => {
            let kind: PanelAction = option_value(options, "action")?.parse().ok()?;
            if !kind.is_privileged() {
                return None;
            }
            let mut inputs = BTreeMap::new();
            if let (Some(id), Some(value)) = (input_id_for(kind), option_value(options, "value")) {
                inputs.insert(id.to_string(), value);
            }
            Some(action(kind, option_value(options, INPUT_SERVER), inputs))
        }
        "ticket-close" => {
            let state: TicketState = option_value(options, "state")?.parse().ok()?;
            Some(Request::CloseTicket(state))
        }
        _ => None,
    }
}

fn invocation_from(interaction: &Interaction) -> Option<Invocation> {
    let data = interaction.data.as_ref()?;
    let request = match interaction.kind {
        APPLICATION_COMMAND => command_request(data)?,
        MESSAGE_COMPONENT => Request::Action {
            key: ActionKey::parse(data.custom_id.as_deref()?)?,
            inputs: BTreeMap::new(),
        },
        MODAL_SUBMIT => Request::Action {
            key: ActionKey::parse(data.custom_id.as_deref()?)?,
            inputs: data
                .components
                .iter()
                .flat_map(|row| &row.components)
                .filter_map(|input| Some((input.custom_id.clone(), input.value.clone()?)))
                .collect(),
        },
        _ => return None,
    };
    Some(Invocation {
        request,
        caller: caller_from(interaction)?,
        channel: interaction.channel_id.as_deref()?.parse::<ChannelId>().ok()?,
    })
}

fn message_response(notice: &Notice) -> Value {
    let mut data = notice_payload(notice);
    data["flags"] = json!(EPHEMERAL);
    json!({ "type": CHANNEL_MESSAGE, "data": data })
}

fn modal_response(spec: &ModalSpec) -> Value {
    let rows: Vec<Value> = spec
        .inputs
        .iter()
        .map(|input| {
            json!({
                "type": 1,
                "components": [{
                    "type": 4,
                    "custom_id": input.id,
                    "label": input.label,
                    "style": 1,
                    "min_length": 1,
                    "max_length": input.max_length,
                    "placeholder": input.placeholder,
                    "required": true,
                }],
            })
        })
        .collect();
    json!({
        "type": MODAL,
        "data": {
            "custom_id": spec.custom_id,
            "title": spec.title.chars().take(MODAL_TITLE_MAX_CHARS).collect::<String>(),
            "components": rows,
        },
    })
}

/// Global slash command definitions registered at startup.
pub fn slash_commands() -> Value {
    let server_option = |required: bool| {
        json!({
            "type": 3,
            "name": INPUT_SERVER,
            "description": "Server key, e.g. surf",
            "required": required,
        })
    };
    let privileged_actions: Vec<Value> = PanelAction::ALL
        .iter()
        .filter(|action| action.is_privileged())
        .map(|action| json!({ "name": action.as_str(), "value": action.as_str() }))
        .collect();
    json!([
        {
            "name": "panel",
            "description": "Create or refresh the server status panel in this channel",
        },
        {
            "name": "status",
            "description": "Show live status for one server",
            "options": [server_option(true)],
        },
        {
            "name": "password",
            "description": "Show the join password",
            "options": [server_option(false)],
        },
        {
            "name": "control",
            "description": "Run an admin action on a server",
            "options": [
                {
                    "type": 3,
                    "name": "action",
                    "description": "What to do",
                    "required": true,
                    "choices": privileged_actions,
                },
                server_option(true),
                {
                    "type": 3,
                    "name": "value",
                    "description": "Map name, chat text or console command",
                    "required": false,
                },
            ],
        },
        {
            "name": "ticket-close",
            "description": "Close the help ticket of this thread",
            "options": [{
                "type": 3,
                "name": "state",
                "description": "Outcome",
                "required": true,
                "choices": [
                    { "name": "handled", "value": "handled" },
                    { "name": "rejected", "value": "rejected" },
                ],
            }],
        },
    ])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ed25519_dalek::{Signer, SigningKey};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::{interaction_key, slash_commands};
    use crate::config::DiscordSettings;
    use crate::testing::{ADMIN_ROLE, Harness, MessageCall};

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn harness() -> Harness {
        let mut harness = Harness::new();
        harness.state.interaction_key = Some(signing_key().verifying_key());
        harness
    }

    fn signed_request(body: &Value, key: &SigningKey) -> Request<Body> {
        let body = body.to_string();
        let timestamp = "1760000000";
        let signature = key.sign(format!("{timestamp}{body}").as_bytes());
        Request::post("/interactions")
            .header("content-type", "application/json")
            .header("x-signature-timestamp", timestamp)
            .header("x-signature-ed25519", hex::encode(signature.to_bytes()))
            .body(Body::from(body))
            .expect("request")
    }

    async fn send(harness: &Harness, request: Request<Body>) -> (StatusCode, Value) {
        let response = crate::app::build_app(harness.state.clone())
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn member(roles: &[String]) -> Value {
        json!({ "user": { "id": "2", "username": "player" }, "roles": roles })
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let harness = harness();
        let (status, body) = send(&harness, signed_request(&json!({ "type": 1 }), &signing_key())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "type": 1 }));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let harness = harness();
        let forged = SigningKey::from_bytes(&[9u8; 32]);

        let (status, _) = send(&harness, signed_request(&json!({ "type": 1 }), &forged)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let counters = harness.state.observability.snapshot();
        assert_eq!(counters.interaction_signature_failures_total, 1);
        assert_eq!(counters.interactions_total, 0);
    }

    #[tokio::test]
    async fn restart_button_without_role_is_denied_inline() {
        let harness = harness();
        let payload = json!({
            "type": 3,
            "token": "tok",
            "channel_id": "77",
            "member": member(&[]),
            "data": { "custom_id": "porta:restart:surf" },
        });

        let (status, body) = send(&harness, signed_request(&payload, &signing_key())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], 4);
        assert_eq!(body["data"]["content"], "No permission.");
        assert_eq!(body["data"]["flags"], 64);
        assert!(harness.control.commands().is_empty());
    }

    #[tokio::test]
    async fn say_button_opens_a_modal() {
        let harness = harness();
        let payload = json!({
            "type": 3,
            "token": "tok",
            "channel_id": "77",
            "member": member(&[ADMIN_ROLE.to_string()]),
            "data": { "custom_id": "porta:say:bhop" },
        });

        let (_, body) = send(&harness, signed_request(&payload, &signing_key())).await;

        assert_eq!(body["type"], 9);
        assert_eq!(body["data"]["custom_id"], "porta:say:bhop");
        assert_eq!(body["data"]["components"][0]["components"][0]["custom_id"], "text");
    }

    #[tokio::test]
    async fn modal_submit_is_deferred_then_completed() {
        let harness = harness();
        let payload = json!({
            "type": 5,
            "token": "tok-5",
            "channel_id": "77",
            "member": member(&[ADMIN_ROLE.to_string()]),
            "data": {
                "custom_id": "porta:say:bhop",
                "components": [{ "type": 1, "components": [
                    { "type": 4, "custom_id": "text", "value": "restart soon" }
                ]}],
            },
        });

        let (_, body) = send(&harness, signed_request(&payload, &signing_key())).await;
        assert_eq!(body, json!({ "type": 5, "data": { "flags": 64 } }));

        let completed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let done = harness.messages.calls().into_iter().find_map(|call| match call {
                    MessageCall::InteractionResponse(token, notice) => Some((token, notice)),
                    _ => None,
                });
                if let Some(done) = done {
                    return done;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("follow-up sent");

        assert_eq!(completed.0, "tok-5");
        assert!(
            completed
                .1
                .content
                .as_deref()
                .is_some_and(|text| text.contains("`say restart soon`"))
        );
        assert_eq!(harness.control.commands().len(), 1);
    }

    #[tokio::test]
    async fn slash_control_maps_value_onto_the_action_input() {
        let harness = harness();
        let payload = json!({
            "type": 2,
            "token": "tok",
            "channel_id": "77",
            "member": member(&[ADMIN_ROLE.to_string()]),
            "data": {
                "name": "control",
                "options": [
                    { "name": "action", "value": "changemap" },
                    { "name": "server", "value": "surf" },
                    { "name": "value", "value": "surf_mesa" },
                ],
            },
        });

        let (_, body) = send(&harness, signed_request(&payload, &signing_key())).await;
        assert_eq!(body["type"], 5);
    }

    #[test]
    fn public_key_must_be_32_hex_bytes() {
        let mut settings = DiscordSettings {
            bot_token: "t".to_string(),
            application_id: None,
            public_key: Some("abcd".to_string()),
            api_base: String::new(),
            http_timeout: Duration::from_secs(1),
        };
        assert!(interaction_key(&settings).is_err());

        settings.public_key = Some(hex::encode(signing_key().verifying_key().to_bytes()));
        assert!(interaction_key(&settings).expect("valid key").is_some());

        settings.public_key = None;
        assert!(interaction_key(&settings).expect("unset key").is_none());
    }

    #[test]
    fn control_command_offers_only_privileged_actions() {
        let commands = slash_commands();
        let control = commands
            .as_array()
            .expect("array")
            .iter()
            .find(|command| command["name"] == "control")
            .expect("control command");
        let choices: Vec<&str> = control["options"][0]["choices"]
            .as_array()
            .expect("choices")
            .iter()
            .filter_map(|choice| choice["value"].as_str())
            .collect();
        assert_eq!(choices, vec!["changemap", "restart", "say", "rcon"]);
    }
}
