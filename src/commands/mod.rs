pub mod config;
mod context;
pub mod fetch;
pub mod history;
pub mod pending;
mod progress;
pub mod push;
pub mod status;
pub mod sync;
pub mod watch;
