//! Payment method capture.
//!
//! Every payment method is one variant of [`PaymentMethod`], captured through a
//! single dispatch in [`PaymentResolver`]. Deposits additionally go through the
//! partner search flow in [`deposit`], which resolves the partner and account
//! from the external [`PartnerDirectory`].

pub mod deposit;
pub mod directory;
pub mod error;
pub mod resolver;
pub mod types;

pub use deposit::{DepositSearch, LookupOutcome, SearchState};
pub use directory::{LookupError, Partner, PartnerAccount, PartnerDirectory, StaticPartnerDirectory};
pub use error::PaymentError;
pub use resolver::{CapturedPayment, PaymentResolver};
pub use types::{
    AdvancePayload, CardPayload, CheckPayload, DepositPayload, Payment, PaymentMethod,
    PaymentMethodTag, RawPaymentInput, TransferPayload,
};
