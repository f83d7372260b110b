//! Shared server state.

use std::sync::Arc;

use crate::error::ServerError;
use crate::identity::LogRef;
use crate::index::SctSthIndex;
use crate::keys::SigningKeyStore;
use crate::storage::{StorageWriter, VerifiableLog};
use crate::submission::SubmissionValidator;
use tablelog_core::table_name::TableNameValidator;

/// Everything a request handler needs, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    account: String,
    log_store: Arc<dyn VerifiableLog>,
    keys: SigningKeyStore,
    index: SctSthIndex,
    validator: Arc<dyn SubmissionValidator>,
    table_names: TableNameValidator,
}

impl AppState {
    /// Assembles the server state. `storage` backs both the signing key
    /// store and the SCT/STH index; `log_store` is the Merkle log engine.
    #[must_use]
    pub fn new(
        account: impl Into<String>,
        storage: Arc<dyn StorageWriter>,
        log_store: Arc<dyn VerifiableLog>,
        validator: Arc<dyn SubmissionValidator>,
        table_names: TableNameValidator,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                account: account.into(),
                keys: SigningKeyStore::new(Arc::clone(&storage)),
                index: SctSthIndex::new(storage),
                log_store,
                validator,
                table_names,
            }),
        }
    }

    /// Validates a request's log name and builds the log reference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for unacceptable names.
    pub fn log_ref(&self, raw_name: &str) -> Result<LogRef, ServerError> {
        let canonical = self
            .inner
            .table_names
            .validate_and_canonicalise(raw_name)
            .map_err(|_| ServerError::InvalidRequest)?;
        Ok(LogRef::new(self.inner.account.clone(), canonical))
    }

    /// The Merkle log engine.
    #[must_use]
    pub fn log_store(&self) -> &dyn VerifiableLog {
        self.inner.log_store.as_ref()
    }

    /// The signing key store.
    #[must_use]
    pub fn keys(&self) -> &SigningKeyStore {
        &self.inner.keys
    }

    /// The SCT/STH index.
    #[must_use]
    pub fn index(&self) -> &SctSthIndex {
        &self.inner.index
    }

    /// The submission validator for `add-objecthash`.
    #[must_use]
    pub fn validator(&self) -> &dyn SubmissionValidator {
        self.inner.validator.as_ref()
    }
}
