// Business domains
pub mod auth;
pub mod cache;
pub mod credentials;
pub mod entitlement;
pub mod identity;
