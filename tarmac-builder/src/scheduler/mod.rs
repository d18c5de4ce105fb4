//! Scheduler layer for the builder
//!
//! Pulls deployment ids off the build queue and runs them through the
//! pipeline, one at a time.

pub mod consumer;

pub use consumer::QueueConsumer;
