// Account Server - Identity & Entitlement Core
//
// This crate provides the identity resolution and subscription entitlement
// backend: password and federated one-time-token login, user provisioning,
// session token issuance, and plan/proration arithmetic.

pub mod common;
pub mod config;
pub mod domains;
pub mod server;

pub use config::*;
