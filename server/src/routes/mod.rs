pub mod api;
pub mod interactions;
