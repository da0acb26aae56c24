use crate::campaign::Campaign;
use crate::ledger::{ServingLedger, ServingRecord};
use crate::user::User;
use chrono::{DateTime, Duration, Utc};

/// Rule that can veto a campaign for a user based on serving history
/// Constraints hold no mutable state; everything they need arrives as arguments
pub trait ConstraintTrait: Send + Sync {
    /// Check whether serving `campaign` to `user` now would break this rule
    ///
    /// # Arguments
    /// * `campaign` - Candidate campaign
    /// * `user` - User the request is for
    /// * `user_history` - The user's most recent servings, newest first, bounded by the engine
    /// * `ledger` - Full serving ledger, for global windows
    /// * `now` - Evaluation time
    fn is_violated(&self, campaign: &Campaign, user: &User, user_history: &[ServingRecord], ledger: &ServingLedger, now: DateTime<Utc>) -> bool;

    /// Name used in diagnostics
    fn constraint_name(&self) -> &str;
}

/// Caps how often one campaign appears in a user's recent history
///
/// Only the bounded history the engine hands over is counted (10 records by
/// default), so this is a cap within that window, not a lifetime cap.
pub struct UserFrequencyConstraint {
    pub max_views: usize,
}

impl ConstraintTrait for UserFrequencyConstraint {
    fn is_violated(&self, campaign: &Campaign, _user: &User, user_history: &[ServingRecord], _ledger: &ServingLedger, _now: DateTime<Utc>) -> bool {
        let views = user_history.iter().filter(|record| record.campaign_id == campaign.campaign_id).count();
        views >= self.max_views
    }

    fn constraint_name(&self) -> &str {
        "UserFrequencyConstraint"
    }
}

/// Caps how often one campaign is served to anyone within a trailing window
pub struct GlobalFrequencyConstraint {
    pub max_views: usize,
    pub window: Duration,
}

impl ConstraintTrait for GlobalFrequencyConstraint {
    fn is_violated(&self, campaign: &Campaign, _user: &User, _user_history: &[ServingRecord], ledger: &ServingLedger, now: DateTime<Utc>) -> bool {
        ledger.count_by_campaign_since(&campaign.campaign_id, now - self.window) >= self.max_views
    }

    fn constraint_name(&self) -> &str {
        "GlobalFrequencyConstraint"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignTargeting;
    use chrono::{NaiveDate, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn campaign(id: &str) -> Campaign {
        Campaign {
            campaign_id: id.to_string(),
            advertiser_id: "ADV_1".to_string(),
            bid_amount: 10.0,
            url: "https://example.com".to_string(),
            content_type: "banner".to_string(),
            targeting: CampaignTargeting::age(25),
            active: true,
            sequence: 1,
        }
    }

    fn user() -> User {
        User::new("john_25".to_string(), NaiveDate::from_ymd_opt(1998, 5, 15).unwrap(), "male".to_string())
    }

    #[test]
    fn test_user_frequency_blocks_at_cap_not_before() {
        let constraint = UserFrequencyConstraint { max_views: 10 };
        let ledger = ServingLedger::new();
        for served in 0..12 {
            let history = ledger.query_by_user("john_25", 10);
            let violated = constraint.is_violated(&campaign("CAMP_1"), &user(), &history, &ledger, t0());
            assert_eq!(violated, served >= 10, "after {} servings", served);
            ledger.append("CAMP_1", "john_25", t0());
        }
    }

    #[test]
    fn test_user_frequency_only_counts_the_bounded_window() {
        let constraint = UserFrequencyConstraint { max_views: 10 };
        let ledger = ServingLedger::new();
        for _ in 0..10 {
            ledger.append("CAMP_1", "john_25", t0());
        }
        // One serving of another campaign pushes a CAMP_1 record out of the window
        ledger.append("CAMP_2", "john_25", t0());

        let history = ledger.query_by_user("john_25", 10);
        assert!(!constraint.is_violated(&campaign("CAMP_1"), &user(), &history, &ledger, t0()));
    }

    #[test]
    fn test_global_frequency_window_slides() {
        let constraint = GlobalFrequencyConstraint { max_views: 5, window: Duration::minutes(1) };
        let ledger = ServingLedger::new();
        for i in 0..5 {
            ledger.append("CAMP_1", &format!("user_{}", i), t0() + Duration::seconds(i * 10));
        }
        let now = t0() + Duration::seconds(45);
        assert!(constraint.is_violated(&campaign("CAMP_1"), &user(), &[], &ledger, now));
        assert!(!constraint.is_violated(&campaign("CAMP_2"), &user(), &[], &ledger, now));

        // The first record falls out once the minute has passed
        let later = t0() + Duration::seconds(61);
        assert!(!constraint.is_violated(&campaign("CAMP_1"), &user(), &[], &ledger, later));
    }
}
