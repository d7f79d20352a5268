//! Structural and business-rule validation of a single invoice.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use liquida_shared::types::{Currency, InvoiceId, MAX_INTEGER_DIGITS, UserId, exceeds_integer_digits};

use super::catalog::AuthorizationCatalog;
use super::error::InvoiceError;
use super::types::{Invoice, InvoiceField, InvoiceInput};
use crate::validation::ValidationReport;

/// Maximum document number length.
pub const DOCUMENT_NUMBER_MAX_LEN: usize = 25;
/// Minimum trimmed issuer name length.
pub const ISSUER_NAME_MIN_LEN: usize = 3;
/// Maximum trimmed issuer name length.
pub const ISSUER_NAME_MAX_LEN: usize = 200;

/// Invoice amounts must be strictly greater than this.
#[must_use]
pub fn minimum_amount() -> Decimal {
    Decimal::new(1, 2)
}

/// Pure invoice validator.
///
/// Rules run in a fixed precedence and all of them are evaluated, so the
/// report lists every failing field:
/// 1. document number
/// 2. issue date
/// 3. authorization number
/// 4. issuer name
/// 5. total amount
/// 6. currency
#[derive(Debug, Clone, Copy)]
pub struct InvoiceValidator<'a> {
    catalog: &'a AuthorizationCatalog,
    currency: Currency,
}

impl<'a> InvoiceValidator<'a> {
    /// Creates a validator bound to a catalog and the settlement currency.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::MissingCatalog` if the catalog is empty.
    pub fn new(catalog: &'a AuthorizationCatalog, currency: Currency) -> Result<Self, InvoiceError> {
        if catalog.is_empty() {
            return Err(InvoiceError::MissingCatalog);
        }
        Ok(Self { catalog, currency })
    }

    /// Validates raw input without side effects.
    #[must_use]
    pub fn validate(&self, input: &InvoiceInput) -> ValidationReport {
        let mut report = ValidationReport::default();
        let _ = self.check(input, &mut report);
        report
    }

    /// Validates and normalizes raw input into an [`Invoice`].
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::Invalid` carrying every failed rule.
    pub fn normalize(
        &self,
        id: InvoiceId,
        owner_id: UserId,
        input: &InvoiceInput,
    ) -> Result<Invoice, InvoiceError> {
        let mut report = ValidationReport::default();
        let fields = self.check(input, &mut report);

        match fields {
            Some(Normalized {
                document_number,
                issue_date,
                authorization_number,
                issuer_name,
                total_amount,
                currency,
            }) if report.is_valid() => Ok(Invoice {
                id,
                owner_id,
                document_number,
                issue_date,
                authorization_number,
                issuer_name,
                total_amount,
                currency,
            }),
            _ => Err(InvoiceError::Invalid(report.errors)),
        }
    }

    fn check(&self, input: &InvoiceInput, report: &mut ValidationReport) -> Option<Normalized> {
        let document_number = check_document_number(input.document_number.as_deref(), report);
        let issue_date = check_issue_date(input.issue_date.as_deref(), report);
        let authorization_number =
            self.check_authorization(input.authorization_number.as_deref(), report);
        let issuer_name = check_issuer_name(input.issuer_name.as_deref(), report);
        let total_amount = check_total_amount(input.total_amount.as_deref(), report);
        let currency = self.check_currency(input.currency.as_deref(), report);

        Some(Normalized {
            document_number: document_number?,
            issue_date: issue_date?,
            authorization_number: authorization_number?,
            issuer_name: issuer_name?,
            total_amount: total_amount?,
            currency: currency?,
        })
    }

    fn check_authorization(&self, value: Option<&str>, report: &mut ValidationReport) -> Option<String> {
        let field = InvoiceField::AuthorizationNumber.as_str();
        let Some(value) = present(value) else {
            report.push(field, "Authorization number is required");
            return None;
        };
        if !self.catalog.contains(value) {
            report.push(
                field,
                format!("Authorization number {value} is not a recognized authorization code"),
            );
            return None;
        }
        Some(value.to_uppercase())
    }

    fn check_currency(&self, value: Option<&str>, report: &mut ValidationReport) -> Option<Currency> {
        let Some(value) = present(value) else {
            return Some(self.currency);
        };
        match Currency::from_str(value) {
            Ok(currency) if currency == self.currency => Some(currency),
            _ => {
                report.push(
                    InvoiceField::Currency.as_str(),
                    format!("Currency must be {}", self.currency),
                );
                None
            }
        }
    }
}

struct Normalized {
    document_number: String,
    issue_date: NaiveDate,
    authorization_number: String,
    issuer_name: String,
    total_amount: Decimal,
    currency: Currency,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_document_number(value: Option<&str>, report: &mut ValidationReport) -> Option<String> {
    let field = InvoiceField::DocumentNumber.as_str();
    let Some(value) = present(value) else {
        report.push(field, "Document number is required");
        return None;
    };
    let well_formed = value.chars().count() <= DOCUMENT_NUMBER_MAX_LEN
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !well_formed {
        report.push(
            field,
            format!("Document number must be 1-{DOCUMENT_NUMBER_MAX_LEN} letters, digits or hyphens"),
        );
        return None;
    }
    Some(value.to_uppercase())
}

fn check_issue_date(value: Option<&str>, report: &mut ValidationReport) -> Option<NaiveDate> {
    let field = InvoiceField::IssueDate.as_str();
    let Some(value) = present(value) else {
        report.push(field, "Issue date is required");
        return None;
    };
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Some(date)
    } else {
        report.push(field, "Issue date must be a valid calendar date (YYYY-MM-DD)");
        None
    }
}

fn check_issuer_name(value: Option<&str>, report: &mut ValidationReport) -> Option<String> {
    let field = InvoiceField::IssuerName.as_str();
    let Some(value) = present(value) else {
        report.push(field, "Issuer name is required");
        return None;
    };
    let len = value.chars().count();
    if !(ISSUER_NAME_MIN_LEN..=ISSUER_NAME_MAX_LEN).contains(&len) {
        report.push(
            field,
            format!(
                "Issuer name must be between {ISSUER_NAME_MIN_LEN} and {ISSUER_NAME_MAX_LEN} characters"
            ),
        );
        return None;
    }
    Some(value.to_uppercase())
}

fn check_total_amount(value: Option<&str>, report: &mut ValidationReport) -> Option<Decimal> {
    let field = InvoiceField::TotalAmount.as_str();
    let Some(value) = present(value) else {
        report.push(field, "Total amount is required");
        return None;
    };
    let Ok(amount) = Decimal::from_str(value) else {
        report.push(field, "Total amount must be numeric");
        return None;
    };
    if amount <= minimum_amount() {
        report.push(field, "Total amount must be greater than 0.01");
        return None;
    }
    if exceeds_integer_digits(amount) {
        report.push(
            field,
            format!("Total amount must have at most {MAX_INTEGER_DIGITS} integer digits"),
        );
        return None;
    }
    if amount.normalize().scale() > 2 {
        report.push(field, "Total amount must have at most 2 decimal places");
        return None;
    }
    Some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn catalog() -> AuthorizationCatalog {
        AuthorizationCatalog::new(["AUT-001", "AUT-002"])
    }

    fn valid_input() -> InvoiceInput {
        InvoiceInput {
            document_number: Some(" fac-0001 ".to_string()),
            issue_date: Some("2026-03-15".to_string()),
            authorization_number: Some("aut-001".to_string()),
            issuer_name: Some("  Distribuidora del Sur ".to_string()),
            total_amount: Some("500.00".to_string()),
            currency: Some("GTQ".to_string()),
        }
    }

    #[test]
    fn test_valid_invoice_normalizes() {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let invoice = validator
            .normalize(InvoiceId::new(), UserId::new(), &valid_input())
            .unwrap();

        assert_eq!(invoice.document_number, "FAC-0001");
        assert_eq!(invoice.authorization_number, "AUT-001");
        assert_eq!(invoice.issuer_name, "DISTRIBUIDORA DEL SUR");
        assert_eq!(invoice.total_amount, dec!(500.00));
        assert_eq!(
            invoice.issue_date,
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_empty_catalog_is_configuration_error() {
        let empty = AuthorizationCatalog::default();
        assert!(matches!(
            InvoiceValidator::new(&empty, Currency::Gtq),
            Err(InvoiceError::MissingCatalog)
        ));
    }

    #[test]
    fn test_all_errors_reported_in_precedence_order() {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            currency: Some("USD".to_string()),
            ..InvoiceInput::default()
        });

        assert_eq!(
            report.fields(),
            vec![
                "document_number",
                "issue_date",
                "authorization_number",
                "issuer_name",
                "total_amount",
                "currency",
            ]
        );
    }

    #[test]
    fn test_missing_currency_defaults_to_settlement_currency() {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let input = InvoiceInput {
            currency: None,
            ..valid_input()
        };
        let invoice = validator
            .normalize(InvoiceId::new(), UserId::new(), &input)
            .unwrap();
        assert_eq!(invoice.currency, Currency::Gtq);
    }

    #[rstest]
    #[case("FAC 001")]
    #[case("FAC_001")]
    #[case("ABCDEFGHIJKLMNOPQRSTUVWXYZ")]
    fn test_malformed_document_number(#[case] doc: &str) {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            document_number: Some(doc.to_string()),
            ..valid_input()
        });
        assert_eq!(report.fields(), vec!["document_number"]);
    }

    #[rstest]
    #[case("2026-02-30")]
    #[case("15/03/2026")]
    #[case("yesterday")]
    fn test_invalid_issue_date(#[case] date: &str) {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            issue_date: Some(date.to_string()),
            ..valid_input()
        });
        assert_eq!(report.fields(), vec!["issue_date"]);
    }

    #[test]
    fn test_future_issue_date_is_accepted() {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            issue_date: Some("2099-12-31".to_string()),
            ..valid_input()
        });
        assert!(report.is_valid());
    }

    #[test]
    fn test_unknown_authorization_code() {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            authorization_number: Some("AUT-999".to_string()),
            ..valid_input()
        });
        assert_eq!(report.fields(), vec!["authorization_number"]);
    }

    #[rstest]
    #[case("AB")]
    #[case("   AB   ")]
    fn test_issuer_name_too_short(#[case] name: &str) {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            issuer_name: Some(name.to_string()),
            ..valid_input()
        });
        assert_eq!(report.fields(), vec!["issuer_name"]);
    }

    #[test]
    fn test_issuer_name_too_long() {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            issuer_name: Some("X".repeat(201)),
            ..valid_input()
        });
        assert_eq!(report.fields(), vec!["issuer_name"]);
    }

    #[rstest]
    #[case("0.01", "greater than 0.01")]
    #[case("0", "greater than 0.01")]
    #[case("-5", "greater than 0.01")]
    #[case("abc", "numeric")]
    #[case("10.005", "2 decimal places")]
    #[case("1000000000000", "12 integer digits")]
    #[case("79228162514264337593543950335", "12 integer digits")]
    fn test_invalid_amount(#[case] amount: &str, #[case] expected: &str) {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            total_amount: Some(amount.to_string()),
            ..valid_input()
        });
        assert_eq!(report.fields(), vec!["total_amount"]);
        assert!(report.errors[0].message.contains(expected));
    }

    #[test]
    fn test_smallest_valid_amount() {
        let catalog = catalog();
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let report = validator.validate(&InvoiceInput {
            total_amount: Some("0.02".to_string()),
            ..valid_input()
        });
        assert!(report.is_valid());
    }
}
