//! Till Core - Shared types library.
//!
//! This crate provides common types used across all Till components:
//! - `terminal` - The point-of-sale terminal library (auth, catalog, cart, checkout)
//! - `cli` - Command-line front end for operators
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and money, plus payment methods

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
