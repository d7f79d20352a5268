//! Authorization-code catalog consumed read-only by the invoice validator.

use std::collections::BTreeSet;

use liquida_shared::SettlementConfig;

use super::error::InvoiceError;

/// Set of valid invoice authorization codes.
///
/// Codes are stored trimmed and upper-cased; lookups normalize the same way.
/// The catalog is immutable: a refresh builds a new catalog and swaps it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationCatalog {
    codes: BTreeSet<String>,
}

impl AuthorizationCatalog {
    /// Builds a catalog from raw codes. Blank entries are ignored.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = codes
            .into_iter()
            .map(|c| normalize(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        Self { codes }
    }

    /// Builds the catalog from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::MissingCatalog` if no codes are configured.
    pub fn from_config(config: &SettlementConfig) -> Result<Self, InvoiceError> {
        let catalog = Self::new(&config.authorization_codes);
        if catalog.is_empty() {
            return Err(InvoiceError::MissingCatalog);
        }
        Ok(catalog)
    }

    /// Returns true if `code` is a valid authorization code.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(&normalize(code))
    }

    /// Returns true if the catalog holds no codes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Number of codes in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = AuthorizationCatalog::new(["aut-001", " AUT-002 "]);
        assert!(catalog.contains("AUT-001"));
        assert!(catalog.contains("aut-002"));
        assert!(!catalog.contains("AUT-003"));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_blank_codes_ignored() {
        let catalog = AuthorizationCatalog::new(["", "   "]);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_from_config_requires_codes() {
        let config = SettlementConfig::default();
        assert!(matches!(
            AuthorizationCatalog::from_config(&config),
            Err(InvoiceError::MissingCatalog)
        ));

        let config = SettlementConfig {
            authorization_codes: vec!["AUT-001".to_string()],
            ..SettlementConfig::default()
        };
        assert!(AuthorizationCatalog::from_config(&config).unwrap().contains("aut-001"));
    }
}
