//! Identity domain - resolves external login assertions to local users.
//!
//! Responsibilities:
//! - One-time-token consumption (single-use, via the cache's atomic take)
//! - First-sign-in provisioning for federated identities
//! - Password registration, login and profile updates

pub mod models;
pub mod ott;
pub mod resolver;

pub use models::{normalize_email, User, UserPatch};
pub use ott::OttPayload;
pub use resolver::{EnsureUser, IdentityService, NewUser};
