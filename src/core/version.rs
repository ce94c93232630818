//! Build metadata and extension API version accessors.
//! Includes the generated version.rs from the build script.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Parse the extension API version string from the build script into u32.
/// Falls back to a stable default if parsing fails.
pub fn get_api_version() -> u32 {
    EXTENSION_API_VERSION.parse().unwrap_or(20250727)
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line version banner used by the binary's startup log
pub fn version_banner() -> String {
    format!(
        "moduleflow {} (api {}, built {}, git {})",
        env!("CARGO_PKG_VERSION"),
        get_api_version(),
        build_time(),
        git_hash()
    )
}
