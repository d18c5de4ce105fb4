//! Tarmac Builder
//!
//! A stateless worker that turns queued deployments into published sites.
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Services: the build executor and the per-deployment pipeline
//! - Scheduler: the queue consumer loop
//!
//! The builder blocks on the build queue, rebuilds each deployment's source
//! tree locally, runs the build command, and mirrors the output directory to
//! `dist/{id}`. One job runs at a time; scale by running more builders.

pub mod config;
pub mod scheduler;
pub mod service;
