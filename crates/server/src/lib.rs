pub mod api;
pub mod notifier;
pub mod state;
