//! Entitlement domain - derives the active plan from payment metadata and
//! credits pro-rated time across mid-cycle plan changes.

pub mod engine;
pub mod models;
pub mod plan;

pub use engine::{EntitlementService, PaymentNotice};
pub use plan::{classify_plan_name, plan_from_info, proration_delta, Plan, PlanSnapshot, PlanTier};
