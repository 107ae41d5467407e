//! sea-orm entities for the intake service.
//!
//! `codes` and `evaluations` are independent tables related only by the
//! `code` string; there is no foreign key between them.

pub mod codes;
pub mod evaluations;
