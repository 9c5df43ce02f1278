pub mod panel_reconciler;
pub mod scheduler;
pub mod snapshot_builder;
