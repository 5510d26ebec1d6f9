//! trustgate — the trust-and-dispatch core of an API gateway.
//!
//! Fronts a fleet of backend services and, per request, decides whether
//! the caller is authenticated, authorized, and within rate/lockout
//! budgets, then hands back a routing decision for the transport layer to
//! act on. See `SPEC_FULL.md` for the full component breakdown.

pub mod admin;
pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod model;
pub mod ratelimit;
pub mod registry;
pub mod revocation;
pub mod store;
pub mod translate;

pub use error::{GatewayError, Result};
pub use gateway::Gateway;
