//! Data Transfer Objects for the HTTP surface
//!
//! Request and response bodies exchanged between the upload service and its
//! clients (the CLI, browsers, scripts). Field names follow the public JSON
//! contract, hence the camelCase renames.

pub mod deploy;
