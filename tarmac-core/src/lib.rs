//! Tarmac Core
//!
//! Core types and abstractions for the Tarmac static-site platform.
//!
//! This crate contains:
//! - Domain types: Deployments and their status lifecycle
//! - DTOs: Request/response bodies shared by the upload service and its clients
//! - Identity generation and validation for deployment ids
//! - The object-storage key layout shared by every service

pub mod domain;
pub mod dto;
pub mod id;
pub mod keys;
