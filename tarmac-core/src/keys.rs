//! Object-storage key layout and shared names
//!
//! Every deployment owns two disjoint prefixes: `source/{id}` holds the raw
//! repository contents and `dist/{id}` holds the published build output.

/// Name of the FIFO list holding pending deployment ids
pub const BUILD_QUEUE: &str = "build-queue";

/// Name of the hash mapping deployment ids to status strings
pub const STATUS_HASH: &str = "status";

pub const SOURCE_ROOT: &str = "source";
pub const DIST_ROOT: &str = "dist";

/// Prefix holding the cloned repository of a deployment
pub fn source_prefix(id: &str) -> String {
    format!("{SOURCE_ROOT}/{id}")
}

/// Prefix holding the published artifact of a deployment
pub fn dist_prefix(id: &str) -> String {
    format!("{DIST_ROOT}/{id}")
}

/// Joins a prefix and an already-normalized relative path with a single `/`
pub fn join(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{relative}")
    }
}
