use porta_shared::{PanelBody, PanelControls, panel_controls, render_panel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{MessageError, StoreError};
use crate::services::snapshot_builder;
use crate::state::AppState;
use crate::store::PanelBinding;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub bindings: usize,
    pub edited: usize,
    pub pruned: usize,
    pub skipped: usize,
}

enum RowOutcome {
    Edited,
    Pruned,
    Skipped,
}

/// Renders the current panel. Shared by the reconciler and the dispatcher.
pub async fn render(state: &AppState) -> (PanelBody, PanelControls) {
    let snapshot = snapshot_builder::build(state).await;
    (
        render_panel(&snapshot),
        panel_controls(&state.settings.registry),
    )
}

/// One pass over every binding. Stops between rows once `cancel` fires; rows already
/// processed keep their result and the rest are left for the next run.
pub async fn run_cycle(
    state: &AppState,
    cancel: &CancellationToken,
) -> Result<CycleSummary, StoreError> {
    state.observability.record_reconcile_cycle();
    let bindings = state.panels.list_bindings().await?;
    let mut summary = CycleSummary {
        bindings: bindings.len(),
        ..CycleSummary::default()
    };
    let mut rendered: Option<(PanelBody, PanelControls)> = None;

    for (index, binding) in bindings.into_iter().enumerate() {
        if index > 0 {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(state.settings.edit_pause) => {}
            }
        } else if cancel.is_cancelled() {
            break;
        }

        match refresh_row(state, binding, &mut rendered).await {
            RowOutcome::Edited => summary.edited += 1,
            RowOutcome::Pruned => summary.pruned += 1,
            RowOutcome::Skipped => summary.skipped += 1,
        }
    }

    if summary.bindings > 0 {
        info!(
            bindings = summary.bindings,
            edited = summary.edited,
            pruned = summary.pruned,
            skipped = summary.skipped,
            "panel refresh cycle complete"
        );
    }
    Ok(summary)
}

async fn refresh_row(
    state: &AppState,
    binding: PanelBinding,
    rendered: &mut Option<(PanelBody, PanelControls)>,
) -> RowOutcome {
    if let Err(e) = state.messages.resolve(binding.channel, binding.message).await {
        return absorb(state, binding, e).await;
    }

    let (body, controls) = match rendered.take() {
        Some(panel) => panel,
        None => render(state).await,
    };
    let edited = state
        .messages
        .edit(binding.channel, binding.message, &body, &controls)
        .await;
    *rendered = Some((body, controls));

    match edited {
        Ok(()) => {
            state.observability.record_panel_edited();
            RowOutcome::Edited
        }
        Err(e) => absorb(state, binding, e).await,
    }
}

async fn absorb(state: &AppState, binding: PanelBinding, error: MessageError) -> RowOutcome {
    if !error.is_gone() {
        state.observability.record_panel_edit_failure();
        warn!(
            channel_id = %binding.channel,
            message_id = %binding.message,
            error = %error,
            "panel refresh failed, keeping binding"
        );
        return RowOutcome::Skipped;
    }

    match state.panels.delete_binding(binding).await {
        Ok(removed) => {
            if removed {
                state.observability.record_panel_pruned();
                info!(
                    channel_id = %binding.channel,
                    message_id = %binding.message,
                    "pruned panel binding for vanished message"
                );
            }
            RowOutcome::Pruned
        }
        Err(e) => {
            warn!(channel_id = %binding.channel, error = %e, "failed to prune panel binding");
            RowOutcome::Skipped
        }
    }
}

/// Periodic task body driven by the scheduler.
pub async fn tick(state: AppState, cancel: CancellationToken) {
    if let Err(e) = run_cycle(&state, &cancel).await {
        warn!(error = %e, "panel refresh cycle could not read bindings");
    }
}
