//! Partner directory boundary.

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A partner (socio) returned by a directory search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    /// Directory identifier.
    pub partner_id: String,
    /// Display name.
    pub name: String,
}

/// An account eligible to receive a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerAccount {
    /// Account number.
    pub account_number: String,
    /// Product label, e.g. "AHORRO".
    pub product_label: String,
}

/// Directory failure. Always recoverable from the caller's point of view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct LookupError(pub String);

/// External partner directory.
///
/// Implemented outside the core (HTTP client, database view, ...). Errors are
/// returned, never panicked across the boundary.
pub trait PartnerDirectory: Send + Sync {
    /// Searches partners by free-text term.
    fn search_partners(
        &self,
        term: &str,
    ) -> impl Future<Output = Result<Vec<Partner>, LookupError>> + Send;

    /// Lists the accounts of a partner eligible to receive deposits.
    fn list_accounts(
        &self,
        partner_id: &str,
    ) -> impl Future<Output = Result<Vec<PartnerAccount>, LookupError>> + Send;
}

/// Fixed in-memory directory, used for development seeding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPartnerDirectory {
    partners: Vec<Partner>,
    accounts: BTreeMap<String, Vec<PartnerAccount>>,
}

impl StaticPartnerDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a partner with its eligible accounts.
    #[must_use]
    pub fn with_partner(
        mut self,
        partner_id: &str,
        name: &str,
        accounts: &[(&str, &str)],
    ) -> Self {
        self.partners.push(Partner {
            partner_id: partner_id.to_string(),
            name: name.to_string(),
        });
        self.accounts.insert(
            partner_id.to_string(),
            accounts
                .iter()
                .map(|(number, label)| PartnerAccount {
                    account_number: (*number).to_string(),
                    product_label: (*label).to_string(),
                })
                .collect(),
        );
        self
    }
}

impl PartnerDirectory for StaticPartnerDirectory {
    async fn search_partners(&self, term: &str) -> Result<Vec<Partner>, LookupError> {
        let needle = term.trim().to_lowercase();
        Ok(self
            .partners
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle) || p.partner_id.to_lowercase() == needle
            })
            .cloned()
            .collect())
    }

    async fn list_accounts(&self, partner_id: &str) -> Result<Vec<PartnerAccount>, LookupError> {
        self.accounts
            .get(partner_id)
            .cloned()
            .ok_or_else(|| LookupError(format!("partner {partner_id} not found")))
    }
}
