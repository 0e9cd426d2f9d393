//! # Atlas - World Server Application
//!
//! Application shell around the Atlas synchronization core: CLI parsing,
//! TOML configuration, logging setup, world bootstrap, and graceful
//! shutdown. The synchronization logic itself lives in `world_server` and
//! `world_client`; this crate wires it together and hosts it.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

pub use app::{bootstrap_world, Application, WorldHandles};
pub use cli::CliArgs;
pub use config::AppConfig;
