use std::fmt::Write as _;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::services::snapshot_builder;
use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "ready": state.is_ready(),
        "servers": state.settings.registry.keys().collect::<Vec<_>>(),
        "interactions_enabled": state.interaction_key.is_some(),
        "observability": {
            "reconcile_cycles_total": observability.reconcile_cycles_total,
            "panels_edited_total": observability.panels_edited_total,
            "panels_pruned_total": observability.panels_pruned_total,
            "panel_edit_failures_total": observability.panel_edit_failures_total,
            "status_queries_total": observability.status_queries_total,
            "status_query_failures_total": observability.status_query_failures_total,
            "control_commands_total": observability.control_commands_total,
            "control_failures_total": observability.control_failures_total,
            "permission_denials_total": observability.permission_denials_total,
            "tickets_created_total": observability.tickets_created_total,
            "tickets_ignored_total": observability.tickets_ignored_total,
            "interactions_total": observability.interactions_total,
            "interaction_signature_failures_total": observability.interaction_signature_failures_total,
        }
    }))
}

/// Live status of one server, queried on demand.
pub async fn get_server_status(
    State(state): State<AppState>,
    Path(server): Path<String>,
) -> Response {
    let Some(status) = snapshot_builder::build_one(&state, &server).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown server `{server}`") })),
        )
            .into_response();
    };

    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(serde_json::json!({
            "server": status.key,
            "address": status.address,
            "online": status.online,
            "map": status.map,
            "players": status.players,
            "max_players": status.max_players,
            "names": status.names,
        })),
    )
        .into_response()
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_prometheus_metrics(
        state.is_ready(),
        state.settings.registry.len(),
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn write_metric(body: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(body, "# HELP porta_{name} {help}");
    let _ = writeln!(body, "# TYPE porta_{name} {kind}");
    let _ = writeln!(body, "porta_{name} {value}");
}

fn render_prometheus_metrics(
    ready: bool,
    configured_servers: usize,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    write_metric(
        &mut body,
        "ready",
        "gauge",
        "Whether the chat platform connection is ready (1 or 0).",
        u64::from(ready),
    );
    write_metric(
        &mut body,
        "configured_servers",
        "gauge",
        "Number of game servers in the registry.",
        configured_servers as u64,
    );

    let counters = [
        (
            "reconcile_cycles_total",
            "Total panel refresh cycles started.",
            observability.reconcile_cycles_total,
        ),
        (
            "panels_edited_total",
            "Total panel messages edited by the refresh loop.",
            observability.panels_edited_total,
        ),
        (
            "panels_pruned_total",
            "Total panel bindings deleted because their message vanished.",
            observability.panels_pruned_total,
        ),
        (
            "panel_edit_failures_total",
            "Total transient failures while refreshing a panel.",
            observability.panel_edit_failures_total,
        ),
        (
            "status_queries_total",
            "Total game server status queries.",
            observability.status_queries_total,
        ),
        (
            "status_query_failures_total",
            "Total status queries that timed out or failed.",
            observability.status_query_failures_total,
        ),
        (
            "control_commands_total",
            "Total remote console commands sent.",
            observability.control_commands_total,
        ),
        (
            "control_failures_total",
            "Total remote console commands that failed.",
            observability.control_failures_total,
        ),
        (
            "permission_denials_total",
            "Total privileged actions refused.",
            observability.permission_denials_total,
        ),
        (
            "tickets_created_total",
            "Total help tickets opened.",
            observability.tickets_created_total,
        ),
        (
            "tickets_ignored_total",
            "Total help ticket attempts answered with an existing open ticket.",
            observability.tickets_ignored_total,
        ),
        (
            "interactions_total",
            "Total verified interactions received.",
            observability.interactions_total,
        ),
        (
            "interaction_signature_failures_total",
            "Total interactions rejected for a bad signature.",
            observability.interaction_signature_failures_total,
        ),
    ];
    for (name, help, value) in counters {
        write_metric(&mut body, name, "counter", help, value);
    }
    body
}
