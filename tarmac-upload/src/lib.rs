//! Tarmac Upload
//!
//! Ingestion service: accepts a repository url, snapshots its contents into
//! object storage under `source/{id}`, and enqueues the deployment for the
//! builder. Also answers status queries.

pub mod api;
pub mod config;
pub mod service;
pub mod source;
