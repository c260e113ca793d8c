pub mod config;
pub mod drainer;
pub mod orchestrator;
pub mod poll;
pub mod request;
pub mod retry;
pub mod state;
