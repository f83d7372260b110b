//! SQL-over-HTTP access to the upstream tabular source.
//!
//! The source exposes the CKAN datastore search API: a `GET` to
//! `/api/3/action/datastore_search_sql?sql=...` returning
//! `{"result": {"records": [...]}}`. Table names are interpolated into the
//! SQL only after passing the table name validator.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::PipelineError;

#[derive(Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    records: Vec<Map<String, Value>>,
}

/// Client for the upstream source.
#[derive(Clone)]
pub struct SourceClient {
    base_url: String,
    http: reqwest::Client,
}

impl SourceClient {
    /// Creates a client for the source rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    async fn search(&self, sql: &str) -> Result<Vec<Map<String, Value>>, PipelineError> {
        let url = format!("{}/api/3/action/datastore_search_sql", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("sql", sql)])
            .send()
            .await
            .map_err(|e| PipelineError::Source(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(PipelineError::Source(format!(
                "bad status code: {}",
                response.status().as_u16()
            )));
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Source(e.to_string()))?;
        Ok(body.result.records)
    }

    /// Probes the highest `_id` in a table. `table` must be canonical.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an empty result set.
    pub async fn max_id(&self, table: &str) -> Result<i64, PipelineError> {
        let records = self
            .search(&format!(r#"SELECT MAX(_id) AS max_id FROM "{table}""#))
            .await?;
        let first = records
            .first()
            .ok_or_else(|| PipelineError::Source("unexpectedly got no results fetching max id".into()))?;
        // MAX over an empty table is NULL; treat it as an empty cursor.
        match first.get("max_id") {
            None | Some(Value::Null) => Ok(0),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| PipelineError::Source(format!("max_id not an integer: {value}"))),
        }
    }

    /// Fetches the rows with `_id` in `[start, end]`. `table` must be
    /// canonical.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-200 status.
    pub async fn fetch_window(
        &self,
        table: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Map<String, Value>>, PipelineError> {
        self.search(&format!(
            r#"SELECT * FROM "{table}" WHERE _id >= {start} AND _id <= {end}"#
        ))
        .await
    }
}
