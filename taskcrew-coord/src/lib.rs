//! `taskcrew` coordinator library.
//!
//! Owns the task store and load registry shared by a manager, engineers
//! and testers, enforces the task lifecycle, and rebalances engineer load.
//! Exposed for the binary, tests and embedding.

pub mod config;
pub mod coordinator;
pub mod rebalancer;
pub mod registry;
pub mod roles;
pub mod router;
pub mod server;
pub mod state;
pub mod store;
pub mod translate;
