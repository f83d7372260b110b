//! Table name validation.
//!
//! Every log name — whether it arrives in a request path on the server or
//! names an upstream resource in the submission pipeline — passes through a
//! [`TableNameValidator`] before it is used anywhere: in URL construction,
//! storage keying or SQL identifiers. This is what prevents path traversal,
//! accidental cross-log writes and unbounded namespace creation from
//! attacker-chosen names.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

/// Registered name of the validator that accepts anything. Test-only.
pub const INSECURE_SKIP_VALIDATION: &str = "insecure-skip-validation";

/// Errors building a validator from configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorConfigError {
    /// The registered name is unknown.
    #[error("table name validator not found: {0}")]
    UnknownValidator(String),

    /// A whitelist validator needs at least one entry.
    #[error("table name whitelist must contain at least one entry")]
    EmptyWhitelist,
}

/// A rejected table name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("table name not acceptable: {name}")]
pub struct TableNameError {
    /// The offending name.
    pub name: String,
}

/// Accepts or rejects log names, producing the canonical form used
/// everywhere downstream.
#[derive(Debug, Clone)]
pub enum TableNameValidator {
    /// Names must parse as UUIDs; the canonical form is the hyphenated
    /// lowercase rendering.
    Uuid,

    /// Names must be members of a fixed set.
    Whitelist(HashSet<String>),

    /// Accepts any name unchanged. Never use outside tests.
    InsecureSkip,
}

impl TableNameValidator {
    /// Builds a validator by its registered name.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names or an empty whitelist.
    pub fn create_named(name: &str, param: &str) -> Result<Self, ValidatorConfigError> {
        match name {
            "uuid" => Ok(Self::Uuid),
            "whitelist" => Self::whitelist(param.split(',')),
            INSECURE_SKIP_VALIDATION => Ok(Self::InsecureSkip),
            other => Err(ValidatorConfigError::UnknownValidator(other.to_owned())),
        }
    }

    /// Builds a whitelist validator from an iterator of names, ignoring
    /// blank entries.
    ///
    /// # Errors
    ///
    /// Returns an error when no names remain.
    pub fn whitelist<I, S>(names: I) -> Result<Self, ValidatorConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: HashSet<String> = names
            .into_iter()
            .map(|s| s.as_ref().trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Err(ValidatorConfigError::EmptyWhitelist);
        }
        Ok(Self::Whitelist(names))
    }

    /// Validates `name` and returns its canonical form.
    ///
    /// # Errors
    ///
    /// Returns a [`TableNameError`] when the name is not acceptable.
    pub fn validate_and_canonicalise(&self, name: &str) -> Result<String, TableNameError> {
        let reject = || TableNameError {
            name: name.to_owned(),
        };
        match self {
            Self::Uuid => Uuid::parse_str(name)
                .map(|u| u.to_string())
                .map_err(|_| reject()),
            Self::Whitelist(names) => {
                if names.contains(name) {
                    Ok(name.to_owned())
                } else {
                    Err(reject())
                }
            },
            Self::InsecureSkip => Ok(name.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_canonicalises_case_and_format() {
        let v = TableNameValidator::create_named("uuid", "").unwrap();
        assert_eq!(
            v.validate_and_canonicalise("A1A2A3A4-B1B2-C1C2-D1D2-E1E2E3E4E5E6")
                .unwrap(),
            "a1a2a3a4-b1b2-c1c2-d1d2-e1e2e3e4e5e6"
        );
        assert!(v.validate_and_canonicalise("not-a-uuid").is_err());
        assert!(v.validate_and_canonicalise("../etc/passwd").is_err());
    }

    #[test]
    fn whitelist_enforces_membership() {
        let v = TableNameValidator::create_named("whitelist", "a,b").unwrap();
        assert_eq!(v.validate_and_canonicalise("a").unwrap(), "a");
        assert_eq!(v.validate_and_canonicalise("b").unwrap(), "b");
        assert!(v.validate_and_canonicalise("c").is_err());
    }

    #[test]
    fn empty_whitelist_is_a_config_error() {
        assert_eq!(
            TableNameValidator::create_named("whitelist", " , ").unwrap_err(),
            ValidatorConfigError::EmptyWhitelist
        );
        assert_eq!(
            TableNameValidator::whitelist(Vec::<String>::new()).unwrap_err(),
            ValidatorConfigError::EmptyWhitelist
        );
    }

    #[test]
    fn skip_validator_passes_input_through() {
        let v = TableNameValidator::create_named(INSECURE_SKIP_VALIDATION, "").unwrap();
        assert_eq!(v.validate_and_canonicalise("anything").unwrap(), "anything");
    }

    #[test]
    fn unknown_validator_name_is_rejected() {
        assert!(matches!(
            TableNameValidator::create_named("regex", ""),
            Err(ValidatorConfigError::UnknownValidator(_))
        ));
    }
}
