//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs`: Domain types
//! - `wire.rs`: Raw serde structs matching upstream payloads
//! - `convert.rs`: Wire → domain conversions with validation
//! - `window.rs`: The bounded state container driven by the reconciliation core

pub mod block;
