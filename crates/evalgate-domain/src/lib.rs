//! Domain types shared across the Evalgate crates.
//!
//! Pure types with no framework dependencies; validation lives on the type
//! so every layer that holds one can rely on it.

pub mod access_code;
pub mod code_status;
pub mod id;
pub mod pagination;
