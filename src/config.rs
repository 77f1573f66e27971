//! Kernel configuration loaded from the environment.
//!
//! Environment variables:
//! - `EDIT_MAX_CONFLICT_RETRIES`: retries of a conflicting edit (default: 3)
//! - `EDIT_REQUIRE_AUTHORSHIP`: only authors may edit (default: false)
//! - `EDIT_REJECT_PUBLISHED`: published modules are read-only (default: false)
//! - `LOOKUP_CACHE_ENTRIES`: size of the module type/license cache (default: 256)
//! - `SEED_ENVIRONMENT`: `production` selects live license prices (default: test)
//! - `RUN_SEED`: seed lookup tables at startup (default: false)

use std::str::FromStr;

use crate::editor::EditPolicy;
use crate::seed::SeedEnvironment;

/// Read `key` from the environment and parse it, falling back to `default`
/// when unset or unparseable.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Top-level configuration shared by the editor, reader and service.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Editor policy.
    pub edit_policy: EditPolicy,
    /// Capacity of the lookup row cache.
    pub lookup_cache_entries: usize,
    /// Which license price list to seed.
    pub seed_environment: SeedEnvironment,
    /// Whether to seed lookup tables at startup.
    pub run_seed: bool,
}

impl KernelConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        let defaults = EditPolicy::default();
        Self {
            edit_policy: EditPolicy {
                max_conflict_retries: env_or("EDIT_MAX_CONFLICT_RETRIES", defaults.max_conflict_retries),
                require_authorship: env_or("EDIT_REQUIRE_AUTHORSHIP", defaults.require_authorship),
                reject_published: env_or("EDIT_REJECT_PUBLISHED", defaults.reject_published),
            },
            lookup_cache_entries: env_or("LOOKUP_CACHE_ENTRIES", 256),
            seed_environment: std::env::var("SEED_ENVIRONMENT")
                .map(|s| SeedEnvironment::from_name(&s))
                .unwrap_or(SeedEnvironment::Test),
            run_seed: env_or("RUN_SEED", false),
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            edit_policy: EditPolicy::default(),
            lookup_cache_entries: 256,
            seed_environment: SeedEnvironment::Test,
            run_seed: false,
        }
    }
}
