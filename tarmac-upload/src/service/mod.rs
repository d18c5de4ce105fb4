//! Service Module
//!
//! Business logic layer for the upload service.

pub mod deploy;

pub use deploy::{DeployError, DeployService};
