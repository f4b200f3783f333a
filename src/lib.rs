// Public API for integration tests and potential library usage

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod prompts;
pub mod sink;
pub mod state;
pub mod store;
pub mod types;
