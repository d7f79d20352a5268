//! Property-based tests for the invoice validator.

use proptest::prelude::*;
use rust_decimal::Decimal;

use liquida_shared::types::Currency;

use super::catalog::AuthorizationCatalog;
use super::types::InvoiceInput;
use super::validator::InvoiceValidator;

fn input_with_amount(amount: Decimal) -> InvoiceInput {
    InvoiceInput {
        document_number: Some("FAC-1".to_string()),
        issue_date: Some("2026-01-31".to_string()),
        authorization_number: Some("AUT-001".to_string()),
        issuer_name: Some("Ferreteria Central".to_string()),
        total_amount: Some(amount.to_string()),
        currency: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any amount at or below 0.01 fails the amount rule, and only that rule.
    #[test]
    fn prop_amount_at_or_below_minimum_is_invalid(cents in -1_000_000i64..=1) {
        let catalog = AuthorizationCatalog::new(["AUT-001"]);
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();

        let report = validator.validate(&input_with_amount(Decimal::new(cents, 2)));

        prop_assert!(!report.is_valid());
        prop_assert_eq!(report.fields(), vec!["total_amount"]);
        prop_assert!(report.errors[0].message.contains("0.01"));
    }

    /// Any two-decimal amount above 0.01 passes.
    #[test]
    fn prop_amount_above_minimum_is_valid(cents in 2i64..100_000_000) {
        let catalog = AuthorizationCatalog::new(["AUT-001"]);
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();

        let report = validator.validate(&input_with_amount(Decimal::new(cents, 2)));

        prop_assert!(report.is_valid());
    }

    /// Document numbers matching `[A-Za-z0-9-]{1,25}` are accepted and upper-cased.
    #[test]
    fn prop_document_number_pattern(doc in "[A-Za-z0-9-]{1,25}") {
        let catalog = AuthorizationCatalog::new(["AUT-001"]);
        let validator = InvoiceValidator::new(&catalog, Currency::Gtq).unwrap();
        let input = InvoiceInput {
            document_number: Some(doc.clone()),
            ..input_with_amount(Decimal::new(1000, 2))
        };

        let invoice = validator
            .normalize(Default::default(), Default::default(), &input)
            .unwrap();

        prop_assert_eq!(invoice.document_number, doc.to_uppercase());
    }
}
