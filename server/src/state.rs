use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ed25519_dalek::VerifyingKey;
use tokio::sync::watch;

use crate::auth::Authorizer;
use crate::clients::{MessageLayer, RemoteControl, ServerQuery};
use crate::config::Settings;
use crate::store::{Ledger, PanelStore};

/// External systems the core talks to, behind trait objects so tests can swap them.
#[derive(Clone)]
pub struct Collaborators {
    pub query: Arc<dyn ServerQuery>,
    pub control: Arc<dyn RemoteControl>,
    pub messages: Arc<dyn MessageLayer>,
    pub panels: Arc<dyn PanelStore>,
    pub ledger: Arc<dyn Ledger>,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub query: Arc<dyn ServerQuery>,
    pub control: Arc<dyn RemoteControl>,
    pub messages: Arc<dyn MessageLayer>,
    pub panels: Arc<dyn PanelStore>,
    pub ledger: Arc<dyn Ledger>,
    pub authorizer: Arc<Authorizer>,
    /// Application public key for interaction signatures. None disables `/interactions`.
    pub interaction_key: Option<VerifyingKey>,
    /// Flips to true once the chat platform answered the readiness probe.
    pub ready: watch::Receiver<bool>,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    reconcile_cycles_total: AtomicU64,
    panels_edited_total: AtomicU64,
    panels_pruned_total: AtomicU64,
    panel_edit_failures_total: AtomicU64,
    status_queries_total: AtomicU64,
    status_query_failures_total: AtomicU64,
    control_commands_total: AtomicU64,
    control_failures_total: AtomicU64,
    permission_denials_total: AtomicU64,
    tickets_created_total: AtomicU64,
    tickets_ignored_total: AtomicU64,
    interactions_total: AtomicU64,
    interaction_signature_failures_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservabilitySnapshot {
    pub reconcile_cycles_total: u64,
    pub panels_edited_total: u64,
    pub panels_pruned_total: u64,
    pub panel_edit_failures_total: u64,
    pub status_queries_total: u64,
    pub status_query_failures_total: u64,
    pub control_commands_total: u64,
    pub control_failures_total: u64,
    pub permission_denials_total: u64,
    pub tickets_created_total: u64,
    pub tickets_ignored_total: u64,
    pub interactions_total: u64,
    pub interaction_signature_failures_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            reconcile_cycles_total: self.reconcile_cycles_total.load(Ordering::Relaxed),
            panels_edited_total: self.panels_edited_total.load(Ordering::Relaxed),
            panels_pruned_total: self.panels_pruned_total.load(Ordering::Relaxed),
            panel_edit_failures_total: self.panel_edit_failures_total.load(Ordering::Relaxed),
            status_queries_total: self.status_queries_total.load(Ordering::Relaxed),
            status_query_failures_total: self
                .status_query_failures_total
                .load(Ordering::Relaxed),
            control_commands_total: self.control_commands_total.load(Ordering::Relaxed),
            control_failures_total: self.control_failures_total.load(Ordering::Relaxed),
            permission_denials_total: self.permission_denials_total.load(Ordering::Relaxed),
            tickets_created_total: self.tickets_created_total.load(Ordering::Relaxed),
            tickets_ignored_total: self.tickets_ignored_total.load(Ordering::Relaxed),
            interactions_total: self.interactions_total.load(Ordering::Relaxed),
            interaction_signature_failures_total: self
                .interaction_signature_failures_total
                .load(Ordering::Relaxed),
        }
    }

    pub fn record_reconcile_cycle(&self) {
        self.reconcile_cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panel_edited(&self) {
        self.panels_edited_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panel_pruned(&self) {
        self.panels_pruned_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panel_edit_failure(&self) {
        self.panel_edit_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_query(&self, failed: bool) {
        self.status_queries_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.status_query_failures_total
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_control_command(&self, failed: bool) {
        self.control_commands_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.control_failures_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_permission_denial(&self) {
        self.permission_denials_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ticket_filing(&self, created: bool) {
        let counter = if created {
            &self.tickets_created_total
        } else {
            &self.tickets_ignored_total
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interaction(&self) {
        self.interactions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interaction_signature_failure(&self) {
        self.interaction_signature_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(
        settings: Settings,
        collaborators: Collaborators,
        interaction_key: Option<VerifyingKey>,
        ready: watch::Receiver<bool>,
    ) -> Self {
        let authorizer = Authorizer::new(settings.privileged_roles.clone());
        Self {
            settings: Arc::new(settings),
            query: collaborators.query,
            control: collaborators.control,
            messages: collaborators.messages,
            panels: collaborators.panels,
            ledger: collaborators.ledger,
            authorizer: Arc::new(authorizer),
            interaction_key,
            ready,
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}
