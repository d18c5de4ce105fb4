//! Service layer
//!
//! The executor runs a build command; the pipeline drives one deployment
//! through fetch, build and publish. The executor is trait-based so tests
//! and alternative sandboxes can replace the shell.

mod execution;
mod pipeline;

pub use execution::{BuildExecutor, ExecutionError, ShellBuildExecutor};
pub use pipeline::{BuildError, BuildPipeline, BuildStage};
