//! Configuration constants for the subprocess transport

/// Maximum accepted length of one wire line (1MB)
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Number of recent stderr lines kept for diagnostics
pub const STDERR_RING_CAPACITY: usize = 40;

/// Seconds the close path waits for a graceful exit before killing
pub const GRACEFUL_EXIT_SECS: u64 = 5;

/// Environment variables never passed to the child, even when allowlisted
///
/// These affect how the child loads and executes code and would create
/// security holes if forwarded.
pub const BLOCKED_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];
