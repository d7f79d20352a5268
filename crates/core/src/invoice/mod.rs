//! Invoice (factura) validation.
//!
//! An invoice only becomes an [`Invoice`] after every rule in
//! [`InvoiceValidator`] passes, so anything attached to a settlement is valid
//! by construction.

pub mod catalog;
pub mod error;
pub mod types;
pub mod validator;

#[cfg(test)]
mod validator_props;

pub use catalog::AuthorizationCatalog;
pub use error::InvoiceError;
pub use types::{Invoice, InvoiceField, InvoiceInput, InvoicePatch};
pub use validator::InvoiceValidator;
