//! Core modules of the sync engine.
//!
//! The dependency direction runs leaves-first: `state` and `queue` own the
//! device tier, `transport`/`client` own the wire boundary, `server` is the
//! authoritative side of that boundary, and the two coordinators
//! (`economy`, `progress`) orchestrate across all of them.

pub mod client;
pub mod config;
pub mod db;
pub mod economy;
pub mod error;
pub mod journal;
pub mod progress;
pub mod queue;
pub mod schemas;
pub mod server;
pub mod state;
pub mod time;
pub mod transport;
