//! Polis local control-plane server.
//!
//! Sits between one author's static site directory and the federation
//! fabric: signed content lifecycle, blessing protocol, stream projections,
//! and the background sync orchestrator. The HTTP handler layer, web UI, and
//! renderer are external; they consume the typed surface exposed here.

pub mod config;
pub mod context;

pub use config::{discovery_settings, load_config, load_env, parse_env, save_config, DiscoverySettings};
pub use context::AppContext;
