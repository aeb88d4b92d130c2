pub mod config;
pub mod esc;
pub mod messages;
pub mod runtime;
