//! Server configuration from the deployment environment.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use tablelog_core::table_name::{TableNameValidator, ValidatorConfigError};

/// Errors assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// A variable is present but unusable.
    #[error("invalid value for {name}: {reason}")]
    InvalidVar {
        /// Variable name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The table name validator could not be built.
    #[error(transparent)]
    Validator(#[from] ValidatorConfigError),
}

/// Runtime configuration for the log server.
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Path of the storage database.
    pub db_path: PathBuf,
    /// Account all logs live under.
    pub account: String,
    /// Write key required by `add-objecthash`.
    pub write_api_key: String,
    /// Log name acceptance policy.
    pub table_names: TableNameValidator,
}

impl ServerConfig {
    /// Reads configuration from the environment.
    ///
    /// `VDB_SECRET` is required. `PORT` defaults to 8080,
    /// `VERIFIABLE_TABLENAME_VALIDATOR` to `uuid`, `TABLELOG_DB` to
    /// `tablelog.db`, `TABLELOG_ACCOUNT` to `tablelog`.
    ///
    /// # Errors
    ///
    /// Returns an error for missing or malformed variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
                name: "PORT",
                reason: format!("not a port number: {raw}"),
            })?,
            Err(_) => 8080,
        };

        let write_api_key =
            env::var("VDB_SECRET").map_err(|_| ConfigError::MissingVar("VDB_SECRET"))?;

        let validator_name =
            env::var("VERIFIABLE_TABLENAME_VALIDATOR").unwrap_or_else(|_| "uuid".to_owned());
        let validator_param =
            env::var("VERIFIABLE_TABLENAME_VALIDATOR_PARAM").unwrap_or_default();
        let table_names = TableNameValidator::create_named(&validator_name, &validator_param)?;

        Ok(Self {
            port,
            db_path: env::var("TABLELOG_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("tablelog.db")),
            account: env::var("TABLELOG_ACCOUNT").unwrap_or_else(|_| "tablelog".to_owned()),
            write_api_key,
            table_names,
        })
    }
}
