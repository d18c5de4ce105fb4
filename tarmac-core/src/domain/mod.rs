//! Core domain types
//!
//! This module contains the core domain structures used across Tarmac services.
//! The upload service creates deployments, the builder moves them through their
//! lifecycle and the content server serves whatever has been published.

pub mod deployment;
