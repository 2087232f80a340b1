// The binary in main.rs is a thin terminal driver over these modules;
// integration tests and benches use them directly.

pub mod config;
pub mod content;
pub mod engine;
pub mod event;
pub mod session;
pub mod store;
pub mod vault;
