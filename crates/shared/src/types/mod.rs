//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{Currency, MAX_INTEGER_DIGITS, Money, exceeds_integer_digits};
