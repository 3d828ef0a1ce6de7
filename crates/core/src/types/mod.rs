//! Core types for Till.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod payment;

pub use id::*;
pub use money::{Money, MoneyError};
pub use payment::PaymentMethod;
