//! Tarmac Server
//!
//! Serves published artifacts. The first label of the request's host names
//! the deployment, the request path names the file under `dist/{id}/`.

pub mod api;
pub mod config;
pub mod content;
