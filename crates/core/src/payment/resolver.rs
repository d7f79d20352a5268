//! Payment method dispatch and normalization.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::error;

use liquida_shared::types::{MAX_INTEGER_DIGITS, PaymentId, UserId, exceeds_integer_digits};

use super::error::PaymentError;
use super::types::{
    AdvancePayload, CardPayload, CheckPayload, DepositPayload, Payment, PaymentMethod,
    PaymentMethodTag, RawPaymentInput, TransferPayload,
};
use crate::validation::ValidationReport;

/// Normalized payment ready to be attached to a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPayment {
    /// Method and normalized payload.
    pub method: PaymentMethod,
    /// Amount.
    pub amount: Decimal,
    /// Trimmed note, if any.
    pub note: Option<String>,
}

impl CapturedPayment {
    /// Materializes the payment for a settlement owner.
    #[must_use]
    pub fn into_payment(self, id: PaymentId, owner_id: UserId) -> Payment {
        Payment {
            id,
            owner_id,
            method: self.method,
            amount: self.amount,
            note: self.note,
        }
    }
}

/// Stateless resolver selecting capture behavior by method tag.
pub struct PaymentResolver;

impl PaymentResolver {
    /// Captures a payment for a method given by its textual tag.
    ///
    /// # Errors
    ///
    /// * `PaymentError::UnknownMethod` if the tag is not supported. This is a
    ///   configuration defect, never silently defaulted.
    /// * `PaymentError::Invalid` with every failing field otherwise.
    pub fn capture(tag: &str, raw: &RawPaymentInput) -> Result<CapturedPayment, PaymentError> {
        let Some(tag) = PaymentMethodTag::parse(tag) else {
            error!(tag, "Payment capture requested for unknown method");
            return Err(PaymentError::UnknownMethod(tag.to_string()));
        };
        Self::capture_tagged(tag, raw)
    }

    /// Captures a payment for a known method.
    ///
    /// Deposits read their resolved partner/account from the raw fields; use
    /// [`PaymentResolver::capture_deposit`] with a confirmed search selection
    /// to avoid re-entering them.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Invalid` with every failing field.
    pub fn capture_tagged(
        tag: PaymentMethodTag,
        raw: &RawPaymentInput,
    ) -> Result<CapturedPayment, PaymentError> {
        let mut report = ValidationReport::default();
        let method = match tag {
            PaymentMethodTag::Deposit => capture_deposit_fields(raw, &mut report),
            PaymentMethodTag::Check => capture_check(raw, &mut report),
            PaymentMethodTag::Transfer => capture_transfer(raw, &mut report),
            PaymentMethodTag::Card => capture_card(raw, &mut report),
            PaymentMethodTag::Advance => capture_advance(raw, &mut report),
        };
        let amount = check_amount(raw.amount.as_deref(), &mut report);
        finish(method, amount, raw, report)
    }

    /// Captures a deposit from a payload resolved through the partner search.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Invalid` if the amount is invalid.
    pub fn capture_deposit(
        payload: DepositPayload,
        raw: &RawPaymentInput,
    ) -> Result<CapturedPayment, PaymentError> {
        let mut report = ValidationReport::default();
        let amount = check_amount(raw.amount.as_deref(), &mut report);
        finish(Some(PaymentMethod::Deposit(payload)), amount, raw, report)
    }
}

fn finish(
    method: Option<PaymentMethod>,
    amount: Option<Decimal>,
    raw: &RawPaymentInput,
    report: ValidationReport,
) -> Result<CapturedPayment, PaymentError> {
    match (method, amount) {
        (Some(method), Some(amount)) if report.is_valid() => Ok(CapturedPayment {
            method,
            amount,
            note: raw
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }),
        _ => Err(PaymentError::Invalid(report.errors)),
    }
}

fn field<'a>(raw: &'a RawPaymentInput, name: &str) -> Option<&'a str> {
    raw.fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(
    raw: &'a RawPaymentInput,
    name: &str,
    report: &mut ValidationReport,
) -> Option<&'a str> {
    let value = field(raw, name);
    if value.is_none() {
        report.push(name, format!("{name} is required"));
    }
    value
}

fn check_amount(value: Option<&str>, report: &mut ValidationReport) -> Option<Decimal> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        report.push("amount", "Amount is required");
        return None;
    };
    let Ok(amount) = Decimal::from_str(value) else {
        report.push("amount", "Amount must be numeric");
        return None;
    };
    if amount <= Decimal::ZERO {
        report.push("amount", "Amount must be greater than zero");
        return None;
    }
    if exceeds_integer_digits(amount) {
        report.push(
            "amount",
            format!("Amount must have at most {MAX_INTEGER_DIGITS} integer digits"),
        );
        return None;
    }
    if amount.normalize().scale() > 2 {
        report.push("amount", "Amount must have at most 2 decimal places");
        return None;
    }
    Some(amount)
}

fn is_code(value: &str, min: usize, max: usize, allow_hyphen: bool) -> bool {
    (min..=max).contains(&value.chars().count())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || (allow_hyphen && c == '-'))
}

fn bank_name(
    raw: &RawPaymentInput,
    name: &str,
    report: &mut ValidationReport,
) -> Option<String> {
    let value = required(raw, name, report)?;
    if !(2..=100).contains(&value.chars().count()) {
        report.push(name, "Bank name must be between 2 and 100 characters");
        return None;
    }
    Some(value.to_uppercase())
}

fn capture_deposit_fields(
    raw: &RawPaymentInput,
    report: &mut ValidationReport,
) -> Option<PaymentMethod> {
    let partner_id = required(raw, "partner_id", report);
    let account_number = required(raw, "account_number", report);
    let label = required(raw, "account_product_label", report);
    Some(PaymentMethod::Deposit(DepositPayload {
        partner_id: partner_id?.to_string(),
        account_number: account_number?.to_string(),
        account_product_label: label?.to_uppercase(),
    }))
}

fn capture_check(raw: &RawPaymentInput, report: &mut ValidationReport) -> Option<PaymentMethod> {
    let check_number = required(raw, "check_number", report).and_then(|v| {
        if (1..=20).contains(&v.len()) && v.chars().all(|c| c.is_ascii_digit()) {
            Some(v.to_string())
        } else {
            report.push("check_number", "Check number must be 1-20 digits");
            None
        }
    });
    let bank_name = bank_name(raw, "bank_name", report);
    Some(PaymentMethod::Check(CheckPayload {
        check_number: check_number?,
        bank_name: bank_name?,
    }))
}

fn capture_transfer(raw: &RawPaymentInput, report: &mut ValidationReport) -> Option<PaymentMethod> {
    let reference = required(raw, "reference", report).and_then(|v| {
        if is_code(v, 4, 40, true) {
            Some(v.to_uppercase())
        } else {
            report.push(
                "reference",
                "Transfer reference must be 4-40 letters, digits or hyphens",
            );
            None
        }
    });
    let origin_bank = bank_name(raw, "origin_bank", report);
    Some(PaymentMethod::Transfer(TransferPayload {
        reference: reference?,
        origin_bank: origin_bank?,
    }))
}

fn capture_card(raw: &RawPaymentInput, report: &mut ValidationReport) -> Option<PaymentMethod> {
    let last_four = required(raw, "card_last_four", report).and_then(|v| {
        if v.len() == 4 && v.chars().all(|c| c.is_ascii_digit()) {
            Some(v.to_string())
        } else {
            report.push("card_last_four", "Card last four must be exactly 4 digits");
            None
        }
    });
    let authorization_code = required(raw, "authorization_code", report).and_then(|v| {
        if is_code(v, 4, 12, false) {
            Some(v.to_uppercase())
        } else {
            report.push(
                "authorization_code",
                "Card authorization code must be 4-12 letters or digits",
            );
            None
        }
    });
    Some(PaymentMethod::Card(CardPayload {
        card_last_four: last_four?,
        authorization_code: authorization_code?,
    }))
}

fn capture_advance(raw: &RawPaymentInput, report: &mut ValidationReport) -> Option<PaymentMethod> {
    let reference = required(raw, "advance_reference", report).and_then(|v| {
        if is_code(v, 1, 25, true) {
            Some(v.to_uppercase())
        } else {
            report.push(
                "advance_reference",
                "Advance reference must be 1-25 letters, digits or hyphens",
            );
            None
        }
    });
    Some(PaymentMethod::Advance(AdvancePayload {
        advance_reference: reference?,
    }))
}
