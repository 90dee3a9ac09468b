//! Configuration constants for the subprocess transport

/// Default maximum line length on either output channel (1MB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// API key variable removed from the child's environment
///
/// Without it the CLI falls back to the interactive subscription login
/// instead of metered API billing.
pub const API_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";

/// Dangerous environment variables that may not be injected into the subprocess
///
/// These variables can affect how the subprocess loads and executes code.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
    API_KEY_ENV_VAR,
];

/// Executable name searched on `PATH`
pub const CLI_BINARY_NAME: &str = "claude";
