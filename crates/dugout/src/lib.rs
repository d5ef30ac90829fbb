// Library root: re-exports all modules so integration tests and the binary
// can access the crate's public API.

pub mod app;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod draft;
pub mod protocol;
pub mod roster;
pub mod settings;
pub mod ws_server;
