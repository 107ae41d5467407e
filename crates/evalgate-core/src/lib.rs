//! HTTP plumbing shared by Evalgate services: health probes, middleware
//! layers, tracing setup, serde helpers and shutdown handling.

pub mod health;
pub mod middleware;
pub mod serde;
pub mod shutdown;
pub mod tracing;
