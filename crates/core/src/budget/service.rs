//! Reconciliation service.

use rust_decimal::Decimal;

use super::types::{BudgetSnapshot, FundingState};
use crate::invoice::Invoice;
use crate::payment::Payment;

/// Reconciliation service for funding calculations.
///
/// Sums saturate at `Decimal::MAX` instead of panicking. Amounts are capped
/// at validation, so saturation only matters for records built elsewhere.
pub struct ReconciliationService;

impl ReconciliationService {
    /// Builds the funding snapshot of a set of invoices against a declared total.
    #[must_use]
    pub fn reconcile(declared_total: Decimal, invoices: &[Invoice]) -> BudgetSnapshot {
        let invoiced_total = saturating_sum(invoices.iter().map(|i| i.total_amount));

        BudgetSnapshot {
            invoice_count: invoices.len(),
            invoiced_total,
            declared_total,
            difference: declared_total.saturating_sub(invoiced_total),
            funding_state: Self::classify(invoiced_total, declared_total),
        }
    }

    /// Classifies an invoiced total against the declared total.
    ///
    /// Equality is exact decimal equality, so `500.00` and `500` are equal.
    #[must_use]
    pub fn classify(invoiced_total: Decimal, declared_total: Decimal) -> FundingState {
        match invoiced_total.cmp(&declared_total) {
            std::cmp::Ordering::Less => FundingState::Incomplete,
            std::cmp::Ordering::Equal => FundingState::Complete,
            std::cmp::Ordering::Greater => FundingState::Exceeded,
        }
    }

    /// Sum of payment amounts.
    #[must_use]
    pub fn paid_total(payments: &[Payment]) -> Decimal {
        saturating_sum(payments.iter().map(|p| p.amount))
    }

    /// Amount still payable before the declared total is reached. Never negative.
    #[must_use]
    pub fn remaining_to_pay(declared_total: Decimal, payments: &[Payment]) -> Decimal {
        declared_total
            .saturating_sub(Self::paid_total(payments))
            .max(Decimal::ZERO)
    }
}

fn saturating_sum(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, Decimal::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{AdvancePayload, PaymentMethod};
    use chrono::NaiveDate;
    use liquida_shared::types::{Currency, InvoiceId, PaymentId, UserId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn invoice(amount: Decimal) -> Invoice {
        Invoice {
            id: InvoiceId::new(),
            owner_id: UserId::new(),
            document_number: "FAC-1".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap_or_default(),
            authorization_number: "AUT-001".to_string(),
            issuer_name: "FERRETERIA CENTRAL".to_string(),
            total_amount: amount,
            currency: Currency::Gtq,
        }
    }

    fn payment(amount: Decimal) -> Payment {
        Payment {
            id: PaymentId::new(),
            owner_id: UserId::new(),
            method: PaymentMethod::Advance(AdvancePayload {
                advance_reference: "ANT-1".to_string(),
            }),
            amount,
            note: None,
        }
    }

    #[test]
    fn test_exact_match_is_complete() {
        let snapshot = ReconciliationService::reconcile(dec!(500.00), &[invoice(dec!(500.00))]);

        assert_eq!(snapshot.invoice_count, 1);
        assert_eq!(snapshot.invoiced_total, dec!(500.00));
        assert_eq!(snapshot.difference, Decimal::ZERO);
        assert_eq!(snapshot.funding_state, FundingState::Complete);
        assert!(snapshot.is_complete());
    }

    #[test]
    fn test_split_invoices_sum_exactly() {
        let invoices = [invoice(dec!(0.10)), invoice(dec!(0.20))];
        let snapshot = ReconciliationService::reconcile(dec!(0.30), &invoices);
        assert_eq!(snapshot.funding_state, FundingState::Complete);
    }

    #[test]
    fn test_no_invoices_is_incomplete() {
        let snapshot = ReconciliationService::reconcile(dec!(500.00), &[]);
        assert_eq!(snapshot.invoice_count, 0);
        assert_eq!(snapshot.difference, dec!(500.00));
        assert_eq!(snapshot.funding_state, FundingState::Incomplete);
    }

    #[test]
    fn test_over_invoiced_has_negative_difference() {
        let snapshot = ReconciliationService::reconcile(
            dec!(500.00),
            &[invoice(dec!(300.00)), invoice(dec!(250.00))],
        );
        assert_eq!(snapshot.difference, dec!(-50.00));
        assert_eq!(snapshot.funding_state, FundingState::Exceeded);
    }

    #[rstest]
    #[case(dec!(499.99), FundingState::Incomplete)]
    #[case(dec!(500), FundingState::Complete)]
    #[case(dec!(500.000), FundingState::Complete)]
    #[case(dec!(500.01), FundingState::Exceeded)]
    fn test_classify(#[case] invoiced: Decimal, #[case] expected: FundingState) {
        assert_eq!(ReconciliationService::classify(invoiced, dec!(500.00)), expected);
    }

    #[test]
    fn test_remaining_to_pay() {
        let payments = [payment(dec!(200.00)), payment(dec!(100.50))];
        assert_eq!(ReconciliationService::paid_total(&payments), dec!(300.50));
        assert_eq!(
            ReconciliationService::remaining_to_pay(dec!(500.00), &payments),
            dec!(199.50)
        );
        assert_eq!(
            ReconciliationService::remaining_to_pay(dec!(100.00), &payments),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_oversized_amounts_do_not_overflow() {
        let invoices = [invoice(Decimal::MAX), invoice(Decimal::MAX)];
        let snapshot = ReconciliationService::reconcile(dec!(500.00), &invoices);
        assert_eq!(snapshot.invoiced_total, Decimal::MAX);
        assert_eq!(snapshot.funding_state, FundingState::Exceeded);
        assert!(snapshot.difference.is_sign_negative());

        let snapshot = ReconciliationService::reconcile(Decimal::MIN, &[invoice(Decimal::MAX)]);
        assert_eq!(snapshot.difference, Decimal::MIN);

        let payments = [payment(Decimal::MAX), payment(Decimal::MAX)];
        assert_eq!(ReconciliationService::paid_total(&payments), Decimal::MAX);
        assert_eq!(
            ReconciliationService::remaining_to_pay(dec!(500.00), &payments),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_funding_state_serializes_in_spanish() {
        assert_eq!(
            serde_json::to_string(&FundingState::Exceeded).unwrap(),
            "\"excedido\""
        );
        assert_eq!(FundingState::Incomplete.to_string(), "incompleto");
    }
}
