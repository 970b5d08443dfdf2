use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

fn default_resource_name() -> String {
    "freeframe".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Name of the host resource this runtime belongs to. Lifecycle signals
    /// for any other resource are ignored.
    #[serde(default = "default_resource_name")]
    pub resource_name: String,
    /// PostgreSQL connection string for module storage. When unset, storage
    /// goes to the host's key/value cells.
    #[serde(default)]
    pub database_connection: Option<String>,
    /// Default tracing filter, used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resource_name: default_resource_name(),
            database_connection: None,
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // A missing .env is fine; real deployments set the variables directly.
        dotenvy::dotenv().ok();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with defaults
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (not tracked by git)
            .add_source(File::with_name("config/local").required(false))
            // FF_DATABASE_CONNECTION, FF_RESOURCE_NAME, ...
            .add_source(Environment::with_prefix("FF").prefix_separator("_").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Whether module storage should use the relational medium.
    pub fn uses_database(&self) -> bool {
        self.database_connection
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }
}
