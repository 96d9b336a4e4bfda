//! Command-line configuration.
//!
//! Every global option can also be set through the environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MEDBED_DATABASE` | medbed.db | SQLite database path, or `:memory:` |
//! | `MEDBED_LOG_LEVEL` | warn | Log level |
//! | `MEDBED_BUSY_TIMEOUT_MS` | 5000 | How long a writer waits for the database lock |
//! | `MEDBED_REGISTRATION_FEE` | 20.0 | Fee recorded on every check-in |
//! | `MEDBED_ALLOW_DUPLICATE_VISITS` | false | Allow several open visits per patient and hospital |
//!
//! `RUST_LOG` takes precedence over `MEDBED_LOG_LEVEL`.

use clap::Args;
use medbed_allocation::AllocationPolicy;
use medbed_persistence::backends::sqlite::SqliteBackendConfig;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Global options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct CliConfig {
    /// SQLite database path, or `:memory:`.
    #[arg(long, global = true, env = "MEDBED_DATABASE", default_value = "medbed.db")]
    pub database: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, env = "MEDBED_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Milliseconds a writer waits for another writer's lock.
    #[arg(long, global = true, env = "MEDBED_BUSY_TIMEOUT_MS", default_value = "5000")]
    pub busy_timeout_ms: u32,

    /// Registration fee recorded on every check-in.
    #[arg(long, global = true, env = "MEDBED_REGISTRATION_FEE", default_value = "20.0")]
    pub registration_fee: f64,

    /// Allow a patient several open visits at the same hospital.
    #[arg(
        long,
        global = true,
        env = "MEDBED_ALLOW_DUPLICATE_VISITS",
        default_value = "false"
    )]
    pub allow_duplicate_visits: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database: "medbed.db".to_string(),
            log_level: "warn".to_string(),
            busy_timeout_ms: 5000,
            registration_fee: 20.0,
            allow_duplicate_visits: false,
            json: false,
        }
    }
}

impl CliConfig {
    /// Validates the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.trim().is_empty() {
            errors.push("Database path cannot be empty".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "Log level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            ));
        }

        if self.busy_timeout_ms == 0 {
            errors.push("Busy timeout cannot be 0".to_string());
        }

        if !self.registration_fee.is_finite() || self.registration_fee < 0.0 {
            errors.push(format!(
                "Registration fee must be a non-negative amount, got {}",
                self.registration_fee
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Backend settings derived from the options.
    pub fn backend_config(&self) -> SqliteBackendConfig {
        SqliteBackendConfig {
            busy_timeout_ms: self.busy_timeout_ms,
            ..Default::default()
        }
    }

    /// Allocation rules derived from the options.
    pub fn policy(&self) -> AllocationPolicy {
        AllocationPolicy::default()
            .with_single_open_visit(!self.allow_duplicate_visits)
            .with_registration_fee(self.registration_fee)
    }

    /// Creates a configuration suitable for testing: an in-memory database
    /// and verbose logging.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            database: ":memory:".to_string(),
            log_level: "debug".to_string(),
            busy_timeout_ms: 1000,
            ..Default::default()
        }
    }
}
