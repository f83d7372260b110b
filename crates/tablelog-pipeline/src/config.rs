//! Pipeline configuration from the deployment environment.

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

    /// The resource whitelist could not be built.
    #[error(transparent)]
    Validator(#[from] ValidatorConfigError),
}

/// Runtime configuration for the pipeline worker.
pub struct PipelineConfig {
    /// Base URL of the log server.
    pub log_server: String,
    /// Write key for `add-objecthash`.
    pub log_api_key: String,
    /// Upstream source base URL.
    pub source_base_url: String,
    /// Resources to mirror, also the table whitelist.
    pub resource_ids: Vec<String>,
    /// Worker pool size.
    pub workers: usize,
    /// Queue partition name.
    pub queue_name: String,
    /// Path of the pipeline database.
    pub db_path: PathBuf,
    /// Port for the health listener; `None` disables it.
    pub health_port: Option<u16>,
    /// Validator derived from the resource whitelist.
    pub table_names: TableNameValidator,
}

impl PipelineConfig {
    /// Reads configuration from the environment.
    ///
    /// `VERIFIABLE_LOG_SERVER`, `VERIFIABLE_LOG_API_KEY` and
    /// `CKAN_RESOURCE_IDS` are required. `CKAN_BASE_URL` defaults to
    /// `https://data.gov.au`, `QUE_WORKERS` to 2, `QUE_QUEUE` to the empty
    /// partition, `TABLELOG_PIPELINE_DB` to `pipeline.db`; `PORT` enables
    /// the health listener when set.
    ///
    /// # Errors
    ///
    /// Returns an error for missing or malformed variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_server = env::var("VERIFIABLE_LOG_SERVER")
            .map_err(|_| ConfigError::MissingVar("VERIFIABLE_LOG_SERVER"))?;
        let log_api_key = env::var("VERIFIABLE_LOG_API_KEY")
            .map_err(|_| ConfigError::MissingVar("VERIFIABLE_LOG_API_KEY"))?;

        let resource_ids: Vec<String> = env::var("CKAN_RESOURCE_IDS")
            .map_err(|_| ConfigError::MissingVar("CKAN_RESOURCE_IDS"))?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        let table_names = TableNameValidator::whitelist(&resource_ids)?;

        let workers = match env::var("QUE_WORKERS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
                name: "QUE_WORKERS",
                reason: format!("not a worker count: {raw}"),
            })?,
            Err(_) => 2,
        };

        let health_port = match env::var("PORT") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::InvalidVar {
                name: "PORT",
                reason: format!("not a port number: {raw}"),
            })?),
            Err(_) => None,
        };

        Ok(Self {
            log_server,
            log_api_key,
            source_base_url: env::var("CKAN_BASE_URL")
                .unwrap_or_else(|_| "https://data.gov.au".to_owned()),
            resource_ids,
            workers,
            queue_name: env::var("QUE_QUEUE").unwrap_or_default(),
            db_path: env::var("TABLELOG_PIPELINE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("pipeline.db")),
            health_port,
            table_names,
        })
    }
}
