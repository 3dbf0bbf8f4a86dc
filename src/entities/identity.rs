// 👤 Identity Entity - the registered user a run writes on behalf of
//
// Exactly one identity is selected per run:
// - a requested identifier must match an email or id exactly
// - otherwise the sole identity, or the first non-test identity when several exist

use crate::error::MigrateError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl Identity {
    pub fn new(id: &str, email: &str) -> Self {
        Identity {
            id: id.to_string(),
            email: email.to_string(),
        }
    }

    /// Test accounts are skipped by the automatic choice
    pub fn is_test_account(&self) -> bool {
        self.email.to_lowercase().contains("test")
    }

    fn matches(&self, identifier: &str) -> bool {
        self.email == identifier || self.id == identifier
    }
}

/// Pick the identity for this run from the store's listing
pub fn select_identity<'a>(
    identities: &'a [Identity],
    requested: Option<&str>,
) -> Result<&'a Identity, MigrateError> {
    if identities.is_empty() {
        return Err(MigrateError::NoIdentities);
    }

    if let Some(identifier) = requested {
        return identities
            .iter()
            .find(|identity| identity.matches(identifier))
            .ok_or_else(|| MigrateError::IdentityNotFound(identifier.to_string()));
    }

    if identities.len() == 1 {
        return Ok(&identities[0]);
    }

    let chosen = identities
        .iter()
        .find(|identity| !identity.is_test_account())
        .unwrap_or(&identities[0]);

    log::info!(
        "{} identities registered, auto-selected {} (use --user to choose another)",
        identities.len(),
        chosen.email
    );

    Ok(chosen)
}
