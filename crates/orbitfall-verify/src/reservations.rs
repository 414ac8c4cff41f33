//! Reserved player names.
//!
//! A reserved name may only be submitted together with the credential it was
//! reserved with. Only the blake3 digest of the credential is stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::NameError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameReservations {
    /// Lowercased name -> hex digest of the credential.
    digests: BTreeMap<String, String>,
}

impl NameReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` for whoever holds `credential`. Reserving a name again
    /// replaces the previous credential.
    pub fn reserve(&mut self, name: &str, credential: &str) {
        self.digests.insert(normalize(name), digest(credential));
    }

    pub fn release(&mut self, name: &str) -> bool {
        self.digests.remove(&normalize(name)).is_some()
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.digests.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Unreserved names pass. Reserved names need the matching credential.
    pub fn authorize(&self, name: &str, credential: Option<&str>) -> Result<(), NameError> {
        let Some(expected) = self.digests.get(&normalize(name)) else {
            return Ok(());
        };
        match credential {
            Some(credential) if digest(credential) == *expected => Ok(()),
            _ => Err(NameError::Reserved),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn digest(credential: &str) -> String {
    blake3::hash(credential.as_bytes()).to_hex().to_string()
}
