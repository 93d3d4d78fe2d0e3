// Common types and utilities shared across the application

pub mod errors;

pub use errors::{ServiceError, ServiceResult};
