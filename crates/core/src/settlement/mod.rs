//! Settlement aggregate and its persistence boundary.

pub mod error;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::{InMemorySettlementStore, SettlementStore};
pub use types::{CorrectionRequest, CreateSettlementInput, Settlement};
