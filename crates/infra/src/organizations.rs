//! Organization resolution.
//!
//! Callers identify themselves with an external organization key; every
//! ledger operation runs against the internal [`OrganizationId`] it resolves to.

use std::collections::HashMap;

use tradeflow_core::OrganizationId;

/// Resolve an external organization key to the internal id.
pub trait OrganizationResolver: Send + Sync {
    fn resolve(&self, external_key: &str) -> Option<OrganizationId>;
}

/// An organization known at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationSeed {
    pub key: String,
    /// Fixed internal id; generated when absent.
    pub id: Option<OrganizationId>,
}

/// Static key → id directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrganizationDirectory {
    organizations: HashMap<String, OrganizationId>,
}

impl InMemoryOrganizationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seeds<'a, I>(seeds: I) -> Self
    where
        I: IntoIterator<Item = &'a OrganizationSeed>,
    {
        let mut directory = Self::new();
        for seed in seeds {
            directory.register(&seed.key, seed.id.unwrap_or_default());
        }
        directory
    }

    /// Register `key`, returning the id it resolves to.
    pub fn register(&mut self, key: &str, id: OrganizationId) -> OrganizationId {
        *self.organizations.entry(normalize(key)).or_insert(id)
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }
}

impl OrganizationResolver for InMemoryOrganizationDirectory {
    fn resolve(&self, external_key: &str) -> Option<OrganizationId> {
        self.organizations.get(&normalize(external_key)).copied()
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_keys_case_insensitively() {
        let id = OrganizationId::new();
        let directory = InMemoryOrganizationDirectory::from_seeds(&[OrganizationSeed {
            key: "Acme-Traders".to_string(),
            id: Some(id),
        }]);

        assert_eq!(directory.resolve("acme-traders"), Some(id));
        assert_eq!(directory.resolve(" ACME-TRADERS "), Some(id));
        assert_eq!(directory.resolve("someone-else"), None);
    }

    #[test]
    fn first_registration_wins() {
        let mut directory = InMemoryOrganizationDirectory::new();
        let first = directory.register("north", OrganizationId::new());
        let second = directory.register("north", OrganizationId::new());
        assert_eq!(first, second);
        assert_eq!(directory.len(), 1);
    }
}
