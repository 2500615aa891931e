pub mod backend;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod store;
pub mod triage;
