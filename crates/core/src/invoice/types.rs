//! Invoice data types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use liquida_shared::types::{Currency, InvoiceId, UserId};

/// Field identifiers used in validation errors and correction diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceField {
    /// Document (DTE) number.
    DocumentNumber,
    /// Issue date.
    IssueDate,
    /// Authorization number.
    AuthorizationNumber,
    /// Issuer name.
    IssuerName,
    /// Total amount.
    TotalAmount,
    /// Currency code.
    Currency,
}

impl InvoiceField {
    /// Returns the field identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentNumber => "document_number",
            Self::IssueDate => "issue_date",
            Self::AuthorizationNumber => "authorization_number",
            Self::IssuerName => "issuer_name",
            Self::TotalAmount => "total_amount",
            Self::Currency => "currency",
        }
    }
}

impl std::fmt::Display for InvoiceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw invoice data as entered by the caller.
///
/// Every field is optional text so that "missing" and "malformed" can be
/// reported separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceInput {
    /// Document number.
    pub document_number: Option<String>,
    /// Issue date as `YYYY-MM-DD`.
    pub issue_date: Option<String>,
    /// Authorization number.
    pub authorization_number: Option<String>,
    /// Issuer name.
    pub issuer_name: Option<String>,
    /// Total amount as decimal text.
    pub total_amount: Option<String>,
    /// Currency code. Defaults to the settlement currency when absent.
    pub currency: Option<String>,
}

/// Partial update of an attached invoice. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePatch {
    /// New document number.
    pub document_number: Option<String>,
    /// New issue date.
    pub issue_date: Option<String>,
    /// New authorization number.
    pub authorization_number: Option<String>,
    /// New issuer name.
    pub issuer_name: Option<String>,
    /// New total amount.
    pub total_amount: Option<String>,
}

impl InvoicePatch {
    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document_number.is_none()
            && self.issue_date.is_none()
            && self.authorization_number.is_none()
            && self.issuer_name.is_none()
            && self.total_amount.is_none()
    }
}

/// A validated, normalized invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: InvoiceId,
    /// Owner of the settlement the invoice belongs to.
    pub owner_id: UserId,
    /// Upper-cased document number.
    pub document_number: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Upper-cased authorization number.
    pub authorization_number: String,
    /// Upper-cased issuer name.
    pub issuer_name: String,
    /// Total amount.
    pub total_amount: Decimal,
    /// Currency.
    pub currency: Currency,
}

impl Invoice {
    /// Converts the invoice back into raw input, e.g. to re-validate after a patch.
    #[must_use]
    pub fn to_input(&self) -> InvoiceInput {
        InvoiceInput {
            document_number: Some(self.document_number.clone()),
            issue_date: Some(self.issue_date.format("%Y-%m-%d").to_string()),
            authorization_number: Some(self.authorization_number.clone()),
            issuer_name: Some(self.issuer_name.clone()),
            total_amount: Some(self.total_amount.to_string()),
            currency: Some(self.currency.code().to_string()),
        }
    }

    /// Applies a patch on top of this invoice's values.
    #[must_use]
    pub fn patched_input(&self, patch: &InvoicePatch) -> InvoiceInput {
        let mut input = self.to_input();
        if let Some(value) = &patch.document_number {
            input.document_number = Some(value.clone());
        }
        if let Some(value) = &patch.issue_date {
            input.issue_date = Some(value.clone());
        }
        if let Some(value) = &patch.authorization_number {
            input.authorization_number = Some(value.clone());
        }
        if let Some(value) = &patch.issuer_name {
            input.issuer_name = Some(value.clone());
        }
        if let Some(value) = &patch.total_amount {
            input.total_amount = Some(value.clone());
        }
        input
    }

    /// Short human-readable label used in audit diffs.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} {} {}",
            self.document_number, self.currency, self.total_amount
        )
    }
}
