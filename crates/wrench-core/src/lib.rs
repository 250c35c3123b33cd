//! wrench-core library.
//!
//! Workflow engine, dynamic attribute validation, and hierarchy propagation
//! for work-order tracking. The engine and validator are pure with respect
//! to shared state; all I/O goes through the collaborator traits in
//! [`repo`], with a SQLite implementation in [`db`].
//!
//! # Conventions
//!
//! - **Errors**: domain enums per concern (`thiserror` or hand-written),
//!   `anyhow::Result` with context at I/O boundaries.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod fields;
pub mod model;
pub mod propagate;
pub mod repo;
pub mod retry;
pub mod workflow;
