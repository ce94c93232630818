//! Generic error handling utilities
//!
//! Provides unified error reporting across the framework's error types while
//! keeping the distinction between misuse the caller can fix (bad thread
//! counts, unknown module names, invalid configuration files) and internal
//! failures that only make sense to someone debugging the runtime.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the caller can act on
    ///
    /// Examples of user-actionable errors:
    /// - Invalid controller configuration (zero worker threads)
    /// - Posting to a module name that was never registered
    /// - Malformed configuration files
    ///
    /// Examples of system errors:
    /// - Worker thread spawn failures
    /// - Poisoned synchronisation primitives
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// User-actionable errors log their own message; system errors log the
/// operation context and keep the details at debug level.
///
/// # Examples
/// ```rust,no_run
/// # use moduleflow::core::error_handling::log_error_with_context;
/// # use moduleflow::module::api::ModuleError;
/// let error = ModuleError::InvalidArgument {
///     argument: "thread_count",
///     reason: "thread_count must be at least 1".to_string(),
/// };
/// log_error_with_context(&error, "Initialising controller");
/// // Logs: "FATAL: thread_count must be at least 1"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
