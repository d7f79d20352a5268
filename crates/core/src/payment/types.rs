//! Payment data types.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use liquida_shared::types::{PaymentId, UserId};

/// Payment method tag used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodTag {
    /// Deposit into a partner (socio) account.
    Deposit,
    /// Check.
    Check,
    /// Bank transfer.
    Transfer,
    /// Card payment.
    Card,
    /// Settlement against a prior cash advance.
    Advance,
}

impl PaymentMethodTag {
    /// All supported methods.
    pub const ALL: [Self; 5] = [
        Self::Deposit,
        Self::Check,
        Self::Transfer,
        Self::Card,
        Self::Advance,
    ];

    /// Returns the string representation of the tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Check => "check",
            Self::Transfer => "transfer",
            Self::Card => "card",
            Self::Advance => "advance",
        }
    }

    /// Parses a tag from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Some(Self::Deposit),
            "check" => Some(Self::Check),
            "transfer" => Some(Self::Transfer),
            "card" => Some(Self::Card),
            "advance" => Some(Self::Advance),
            _ => None,
        }
    }

    /// Method-specific fields that must be present in [`RawPaymentInput::fields`].
    #[must_use]
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Deposit => &["partner_id", "account_number", "account_product_label"],
            Self::Check => &["check_number", "bank_name"],
            Self::Transfer => &["reference", "origin_bank"],
            Self::Card => &["card_last_four", "authorization_code"],
            Self::Advance => &["advance_reference"],
        }
    }
}

impl std::fmt::Display for PaymentMethodTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deposit payload. Partner and account are references into the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPayload {
    /// Partner (socio) identifier.
    pub partner_id: String,
    /// Destination account number.
    pub account_number: String,
    /// Account product label, e.g. "AHORRO".
    pub account_product_label: String,
}

/// Check payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPayload {
    /// Check number (digits only).
    pub check_number: String,
    /// Issuing bank.
    pub bank_name: String,
}

/// Transfer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    /// Transfer reference.
    pub reference: String,
    /// Originating bank.
    pub origin_bank: String,
}

/// Card payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayload {
    /// Last four digits of the card.
    pub card_last_four: String,
    /// Card authorization code.
    pub authorization_code: String,
}

/// Advance payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancePayload {
    /// Reference of the advance being settled.
    pub advance_reference: String,
}

/// A payment method with its normalized payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Deposit into a partner account.
    Deposit(DepositPayload),
    /// Check.
    Check(CheckPayload),
    /// Bank transfer.
    Transfer(TransferPayload),
    /// Card payment.
    Card(CardPayload),
    /// Advance settlement.
    Advance(AdvancePayload),
}

impl PaymentMethod {
    /// Returns the dispatch tag of this method.
    #[must_use]
    pub fn tag(&self) -> PaymentMethodTag {
        match self {
            Self::Deposit(_) => PaymentMethodTag::Deposit,
            Self::Check(_) => PaymentMethodTag::Check,
            Self::Transfer(_) => PaymentMethodTag::Transfer,
            Self::Card(_) => PaymentMethodTag::Card,
            Self::Advance(_) => PaymentMethodTag::Advance,
        }
    }

    /// Short human-readable reference used in audit diffs.
    #[must_use]
    pub fn reference(&self) -> String {
        match self {
            Self::Deposit(p) => format!("{}/{}", p.partner_id, p.account_number),
            Self::Check(p) => format!("{} #{}", p.bank_name, p.check_number),
            Self::Transfer(p) => format!("{} {}", p.origin_bank, p.reference),
            Self::Card(p) => format!("****{}", p.card_last_four),
            Self::Advance(p) => p.advance_reference.clone(),
        }
    }
}

/// Raw payment data as entered by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPaymentInput {
    /// Amount as decimal text.
    pub amount: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Method-specific fields by name.
    pub fields: BTreeMap<String, String>,
}

impl RawPaymentInput {
    /// Creates an input with an amount and no method fields.
    #[must_use]
    pub fn with_amount(amount: impl Into<String>) -> Self {
        Self {
            amount: Some(amount.into()),
            ..Self::default()
        }
    }

    /// Adds a method-specific field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets the note.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A payment attached to a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID.
    pub id: PaymentId,
    /// Owner of the settlement the payment belongs to.
    pub owner_id: UserId,
    /// Method and payload.
    pub method: PaymentMethod,
    /// Amount paid.
    pub amount: Decimal,
    /// Free-text note.
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for tag in PaymentMethodTag::ALL {
            assert_eq!(PaymentMethodTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(PaymentMethodTag::parse(" CARD "), Some(PaymentMethodTag::Card));
        assert_eq!(PaymentMethodTag::parse("crypto"), None);
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            PaymentMethodTag::Deposit.required_fields(),
            &["partner_id", "account_number", "account_product_label"]
        );
        assert_eq!(PaymentMethodTag::Advance.required_fields(), &["advance_reference"]);
        assert!(
            PaymentMethodTag::ALL
                .iter()
                .all(|tag| !tag.required_fields().is_empty())
        );
    }

    #[test]
    fn test_method_serializes_with_tag() {
        let method = PaymentMethod::Advance(AdvancePayload {
            advance_reference: "ANT-7".to_string(),
        });
        let json = serde_json::to_value(&method).unwrap();
        assert_eq!(json["method"], "advance");
        assert_eq!(json["advance_reference"], "ANT-7");
        assert_eq!(method.tag(), PaymentMethodTag::Advance);
    }
}
