//! Environment variable based runtime configuration.

use std::env;

/// Runtime configuration loaded from environment variables.
///
/// - `RESTFLOW_STACK_SIZE` — coroutine stack size in bytes, decimal or
///   `0x`-prefixed hex. Default `0x4000` (16 KB). Larger stacks support
///   deeper handler chains; smaller stacks cut memory for high concurrency.
/// - `RESTFLOW_BODY_LIMIT` — default request body cap in bytes applied by
///   the demo wiring. Default 1 MiB. Handlers pick their own limit when
///   reading the body; this is only the out-of-the-box value.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes.
    pub stack_size: usize,
    /// Default request body cap in bytes.
    pub body_limit: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        RuntimeConfig {
            stack_size: parse_size_var("RESTFLOW_STACK_SIZE").unwrap_or(0x4000),
            body_limit: parse_size_var("RESTFLOW_BODY_LIMIT").unwrap_or(1024 * 1024),
        }
    }
}

fn parse_size_var(var: &str) -> Option<usize> {
    let val = env::var(var).ok()?;
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}
