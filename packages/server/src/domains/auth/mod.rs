//! Auth domain - session tokens and notification ingestion.
//!
//! Responsibilities:
//! - Stateless bearer-token mint/verify (30-day default lifetime)
//! - `login_success` / `order_paid` event entry points

pub mod notify;
pub mod session;

pub use notify::{LoginSuccess, NotificationEvent, NotificationHandler};
pub use session::{SessionClaims, SessionIssuer};
