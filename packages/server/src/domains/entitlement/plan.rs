//! Plan snapshots, tier classification and proration arithmetic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::common::{ServiceError, ServiceResult};

pub const SECONDS_PER_DAY: i64 = 86_400;
/// Billing cycles use fixed constants, no calendar awareness.
pub const MONTH_SECONDS: i64 = 30 * SECONDS_PER_DAY;
pub const YEAR_SECONDS: i64 = 365 * SECONDS_PER_DAY;

/// Subscription tier derived from the plan's display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Basic,
    Pro,
    Plus,
    Ultra,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Plus => "plus",
            PlanTier::Ultra => "ultra",
        }
    }
}

/// Keyword list checked in fixed priority order - first match wins. A name
/// containing several keywords resolves to the earliest entry; callers rely
/// on this order as the tie-break contract.
const PLAN_KEYWORDS: &[(&str, PlanTier)] = &[
    ("basic", PlanTier::Basic),
    ("pro", PlanTier::Pro),
    ("plus", PlanTier::Plus),
    ("ultra", PlanTier::Ultra),
];

/// Classify a plan display name by case-insensitive substring match.
/// Product names vary by billing provider, so matching is deliberately
/// loose; no match means `free`.
pub fn classify_plan_name(name: &str) -> PlanTier {
    let lowered = name.to_ascii_lowercase();
    for (keyword, tier) in PLAN_KEYWORDS {
        if lowered.contains(keyword) {
            return *tier;
        }
    }
    PlanTier::Free
}

/// A user's current entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub name: PlanTier,
    /// Effective expiry (epoch seconds), including the proration delta.
    /// Absent for the free tier.
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

impl Plan {
    pub fn free() -> Self {
        Self {
            name: PlanTier::Free,
            end_time: None,
        }
    }
}

/// Strictly-typed view of the `info.pay` blob. The storage boundary keeps
/// the loose JSON; this is the validated in-memory form the engine works
/// with. Malformed metadata is rejected, not defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSnapshot {
    pub name: String,
    pub amount: i64,
    pub end_time_epoch: i64,
    pub price_tag: String,
}

impl PlanSnapshot {
    /// Parse a raw `pay` value. Billing providers disagree on the name key
    /// (`name` vs `product`) and send `price` as string or number.
    pub fn parse(value: &Value) -> ServiceResult<Self> {
        let obj = value
            .as_object()
            .ok_or(ServiceError::validation("invalid-pay"))?;

        let name = obj
            .get("name")
            .or_else(|| obj.get("product"))
            .and_then(Value::as_str)
            .ok_or(ServiceError::validation("invalid-pay"))?
            .to_string();
        let amount = obj
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or(ServiceError::validation("invalid-pay"))?;
        let end_time_epoch = obj
            .get("endTime")
            .and_then(Value::as_i64)
            .ok_or(ServiceError::validation("invalid-pay"))?;
        let price_tag = match obj.get("price") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            None | Some(Value::Null) => String::new(),
            Some(_) => return Err(ServiceError::validation("invalid-pay")),
        };

        Ok(Self {
            name,
            amount,
            end_time_epoch,
            price_tag,
        })
    }

    /// Billing-cycle length in seconds. The display name wins
    /// (`year`/`month` substring), then a trailing `|Y`/`|M` tag on the
    /// price string, then a 30-day month as the default.
    pub fn cycle_seconds(&self) -> i64 {
        let name = self.name.to_ascii_lowercase();
        if name.contains("year") {
            return YEAR_SECONDS;
        }
        if name.contains("month") {
            return MONTH_SECONDS;
        }
        if self.price_tag.ends_with("|Y") {
            return YEAR_SECONDS;
        }
        if self.price_tag.ends_with("|M") {
            return MONTH_SECONDS;
        }
        MONTH_SECONDS
    }
}

/// Seconds of new-plan time equivalent to the unexpired value left on the
/// old plan:
///
/// `floor(remaining * (old_amount/old_cycle) / (new_amount/new_cycle))`
///
/// Computed as one exact rational in i128 - no float drift. A downgrade to
/// a cheaper plan yields more bonus seconds, an upgrade fewer. Zero when
/// nothing remains or either amount is non-positive.
pub fn proration_delta(old: &PlanSnapshot, new: &PlanSnapshot, now_ms: i64) -> i64 {
    // endTime arrives from external billing metadata unbounded, so the
    // whole computation stays in i128.
    let remaining_seconds =
        (old.end_time_epoch as i128 * 1000 - now_ms as i128).max(0) / 1000;
    if remaining_seconds <= 0 || old.amount <= 0 || new.amount <= 0 {
        return 0;
    }

    let numerator = remaining_seconds
        .checked_mul(old.amount as i128)
        .and_then(|n| n.checked_mul(new.cycle_seconds() as i128));
    let denominator = old.cycle_seconds() as i128 * new.amount as i128;
    match numerator {
        Some(n) => i64::try_from(n / denominator).unwrap_or(i64::MAX),
        // All factors are positive here; an i128 overflow just means an
        // absurdly large credit, capped.
        None => i64::MAX,
    }
}

/// Derive the current plan from a user's `info` bag.
///
/// Absent (or null) `pay` and a passed raw `endTime` both mean free; the
/// proration delta only stretches the reported end, it does not keep an
/// expired snapshot alive.
pub fn plan_from_info(info: &Value, now_epoch: i64) -> ServiceResult<Plan> {
    let pay = match info.get("pay") {
        Some(Value::Null) | None => return Ok(Plan::free()),
        Some(pay) => pay,
    };
    let snapshot = PlanSnapshot::parse(pay)?;
    if snapshot.end_time_epoch <= now_epoch {
        return Ok(Plan::free());
    }

    let delta = match info.get("delta") {
        Some(Value::Null) | None => 0,
        Some(value) => value.as_i64().unwrap_or_else(|| {
            warn!("non-integer delta in user info, ignoring");
            0
        }),
    };
    Ok(Plan {
        name: classify_plan_name(&snapshot.name),
        end_time: Some(snapshot.end_time_epoch.saturating_add(delta)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(name: &str, amount: i64, end_time: i64, price: &str) -> PlanSnapshot {
        PlanSnapshot {
            name: name.to_string(),
            amount,
            end_time_epoch: end_time,
            price_tag: price.to_string(),
        }
    }

    #[test]
    fn test_classification_keywords() {
        assert_eq!(classify_plan_name("Basic Plan"), PlanTier::Basic);
        assert_eq!(classify_plan_name("Pro Plan Monthly"), PlanTier::Pro);
        assert_eq!(classify_plan_name("PLUS yearly"), PlanTier::Plus);
        assert_eq!(classify_plan_name("Ultra"), PlanTier::Ultra);
        assert_eq!(classify_plan_name("Enterprise"), PlanTier::Free);
        assert_eq!(classify_plan_name(""), PlanTier::Free);
    }

    #[test]
    fn test_classification_priority_order_is_the_tiebreak() {
        // Contains both "basic" and "pro": "basic" is checked first.
        assert_eq!(classify_plan_name("Basic Pro Bundle"), PlanTier::Basic);
        // Contains both "pro" and "plus": "pro" wins.
        assert_eq!(classify_plan_name("Pro Plus"), PlanTier::Pro);
    }

    #[test]
    fn test_parse_accepts_name_or_product() {
        let a = PlanSnapshot::parse(&json!({
            "name": "Pro Monthly", "amount": 990, "endTime": 1000, "price": "9.9|M"
        }))
        .unwrap();
        assert_eq!(a.name, "Pro Monthly");

        let b = PlanSnapshot::parse(&json!({
            "product": "Pro Monthly", "amount": 990, "endTime": 1000
        }))
        .unwrap();
        assert_eq!(b.name, "Pro Monthly");
        assert_eq!(b.price_tag, "");
    }

    #[test]
    fn test_parse_rejects_malformed_metadata() {
        assert!(PlanSnapshot::parse(&json!("not an object")).is_err());
        assert!(PlanSnapshot::parse(&json!({"amount": 990, "endTime": 1})).is_err());
        assert!(PlanSnapshot::parse(&json!({"name": "Pro", "endTime": 1})).is_err());
        assert!(
            PlanSnapshot::parse(&json!({"name": "Pro", "amount": "990", "endTime": 1})).is_err(),
            "stringly-typed amount is rejected, not coerced"
        );
    }

    #[test]
    fn test_cycle_from_name_beats_price_tag() {
        let s = snapshot("Pro Yearly", 9900, 0, "99|M");
        assert_eq!(s.cycle_seconds(), YEAR_SECONDS);
        let s = snapshot("Pro Monthly", 990, 0, "9.9|Y");
        assert_eq!(s.cycle_seconds(), MONTH_SECONDS);
    }

    #[test]
    fn test_cycle_from_price_tag_and_default() {
        assert_eq!(snapshot("Pro", 990, 0, "99|Y").cycle_seconds(), YEAR_SECONDS);
        assert_eq!(snapshot("Pro", 990, 0, "9.9|M").cycle_seconds(), MONTH_SECONDS);
        assert_eq!(snapshot("Pro", 990, 0, "").cycle_seconds(), MONTH_SECONDS);
    }

    #[test]
    fn test_proration_upgrade_monthly_to_yearly() {
        // 15 days (1_296_000 s) left on a 990/month plan, moving to
        // 9900/year: floor(1296000 * (990/2592000) / (9900/31536000))
        let now_ms = 1_700_000_000_000;
        let old_end = now_ms / 1000 + 1_296_000;
        let old = snapshot("Pro Monthly", 990, old_end, "");
        let new = snapshot("Pro Yearly", 9900, old_end + YEAR_SECONDS, "");
        assert_eq!(proration_delta(&old, &new, now_ms), 1_576_800);
    }

    #[test]
    fn test_proration_downgrade_yearly_to_monthly() {
        // 100 days left on a 9900/year plan, moving to 990/month:
        // floor(8640000 * (9900/31536000) / (990/2592000)) = 7_101_369
        let now_ms = 1_700_000_000_000;
        let old_end = now_ms / 1000 + 100 * SECONDS_PER_DAY;
        let old = snapshot("Ultra Yearly", 9900, old_end, "");
        let new = snapshot("Basic Monthly", 990, old_end + MONTH_SECONDS, "");
        let expected = (8_640_000i128 * 9900 * MONTH_SECONDS as i128
            / (YEAR_SECONDS as i128 * 990)) as i64;
        assert_eq!(proration_delta(&old, &new, now_ms), expected);
        assert_eq!(expected, 7_101_369);
    }

    #[test]
    fn test_proration_zero_cases() {
        let now_ms = 1_700_000_000_000;
        let expired = snapshot("Pro", 990, now_ms / 1000 - 10, "");
        let new = snapshot("Ultra", 9900, now_ms / 1000 + YEAR_SECONDS, "");
        assert_eq!(proration_delta(&expired, &new, now_ms), 0);

        let free_old = snapshot("Trial", 0, now_ms / 1000 + 1000, "");
        assert_eq!(proration_delta(&free_old, &new, now_ms), 0);

        let live_old = snapshot("Pro", 990, now_ms / 1000 + 1000, "");
        let free_new = snapshot("Comp", 0, now_ms / 1000 + 1000, "");
        assert_eq!(proration_delta(&live_old, &free_new, now_ms), 0);
    }

    #[test]
    fn test_proration_survives_extreme_end_time() {
        // Billing metadata is attacker-reachable; an absurd endTime must
        // not overflow the arithmetic.
        let now_ms = 1_700_000_000_000;
        let old = snapshot("Pro Monthly", 990, i64::MAX / 100, "");
        let new = snapshot("Pro Yearly", 9900, i64::MAX / 100, "");
        let delta = proration_delta(&old, &new, now_ms);
        assert!(delta > 0);

        let old = snapshot("Pro Monthly", i64::MAX, i64::MAX, "");
        let new = snapshot("Comp Yearly", 1, i64::MAX, "");
        assert_eq!(proration_delta(&old, &new, now_ms), i64::MAX);
    }

    #[test]
    fn test_plan_from_info_active_snapshot() {
        let now = 1_700_000_000;
        let info = json!({
            "pay": {"name": "Pro Plan Monthly", "amount": 1000, "endTime": now + MONTH_SECONDS}
        });
        let plan = plan_from_info(&info, now).unwrap();
        assert_eq!(plan.name, PlanTier::Pro);
        assert_eq!(plan.end_time, Some(now + MONTH_SECONDS));
    }

    #[test]
    fn test_plan_from_info_delta_stretches_end() {
        let now = 1_700_000_000;
        let info = json!({
            "pay": {"name": "Ultra Yearly", "amount": 9900, "endTime": now + 100},
            "delta": 5000
        });
        let plan = plan_from_info(&info, now).unwrap();
        assert_eq!(plan.end_time, Some(now + 100 + 5000));
    }

    #[test]
    fn test_plan_from_info_delta_saturates_instead_of_wrapping() {
        let now = 1_700_000_000;
        let info = json!({
            "pay": {"name": "Ultra", "amount": 9900, "endTime": i64::MAX - 10},
            "delta": i64::MAX
        });
        let plan = plan_from_info(&info, now).unwrap();
        assert_eq!(plan.end_time, Some(i64::MAX));
    }

    #[test]
    fn test_plan_from_info_absent_or_expired_is_free() {
        let now = 1_700_000_000;
        assert_eq!(plan_from_info(&json!({}), now).unwrap(), Plan::free());
        assert_eq!(
            plan_from_info(&json!({"pay": null}), now).unwrap(),
            Plan::free()
        );
        let expired = json!({
            "pay": {"name": "Pro", "amount": 990, "endTime": now - 1}
        });
        assert_eq!(plan_from_info(&expired, now).unwrap(), Plan::free());
    }

    #[test]
    fn test_plan_from_info_rejects_malformed_pay() {
        let info = json!({"pay": {"name": "Pro"}});
        assert!(plan_from_info(&info, 0).is_err());
    }

    #[test]
    fn test_plan_serializes_with_wire_field_names() {
        let plan = Plan {
            name: PlanTier::Pro,
            end_time: Some(123),
        };
        assert_eq!(
            serde_json::to_value(plan).unwrap(),
            json!({"name": "pro", "endTime": 123})
        );
        assert_eq!(
            serde_json::to_value(Plan::free()).unwrap(),
            json!({"name": "free"})
        );
    }
}
