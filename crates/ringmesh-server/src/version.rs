//! Build and version metadata embedded by `build.rs`.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit SHA
pub const GIT_SHA: &str = env!("VERGEN_GIT_SHA");

pub const GIT_COMMIT_TIMESTAMP: &str = env!("VERGEN_GIT_COMMIT_TIMESTAMP");

pub const GIT_BRANCH: &str = env!("VERGEN_GIT_BRANCH");

/// "true" when the working tree had uncommitted changes
pub const GIT_DIRTY: &str = env!("VERGEN_GIT_DIRTY");

pub const RUSTC_VERSION: &str = env!("VERGEN_RUSTC_SEMVER");

pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

pub const TARGET: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");

/// `<version> (<sha>[ dirty])`, as printed in the startup log line.
pub fn full_version() -> String {
    let dirty = if GIT_DIRTY == "true" { " dirty" } else { "" };
    format!("{VERSION} ({GIT_SHA}{dirty})")
}

/// Multi-line build report for `ringmesh-server version`.
pub fn build_info() -> String {
    format!(
        "ringmesh-server {VERSION}\n\
         commit: {GIT_SHA} ({GIT_COMMIT_TIMESTAMP})\n\
         branch: {GIT_BRANCH}\n\
         built:  {BUILD_TIMESTAMP}\n\
         rustc:  {RUSTC_VERSION}\n\
         target: {TARGET}"
    )
}
