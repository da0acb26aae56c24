//! Matching strategies narrow the full campaign set down to the candidates eligible for one request
//!
//! A strategy only filters. Picking the winner, charging and recording are the
//! engine's job, so strategies must not mutate anything they are handed.

use crate::advertisers::Advertisers;
use crate::campaign::Campaign;
use crate::config::AGE_TOLERANCE_YEARS;
use crate::constraint::ConstraintTrait;
use crate::ledger::{ServingLedger, ServingRecord};
use crate::user::User;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Everything a strategy may look at for one request
pub struct MatchRequest<'a> {
    pub user: &'a User,
    pub city: &'a str,
    /// Most recent servings for the user, newest first
    pub user_history: &'a [ServingRecord],
    pub ledger: &'a ServingLedger,
    pub advertisers: &'a Advertisers,
    /// Registered constraints in evaluation order
    pub constraints: &'a [Arc<dyn ConstraintTrait>],
    pub now: DateTime<Utc>,
}

impl MatchRequest<'_> {
    /// Name of the first constraint that vetoes `campaign`, if any
    pub fn first_violation(&self, campaign: &Campaign) -> Option<&str> {
        self.constraints
            .iter()
            .find(|constraint| constraint.is_violated(campaign, self.user, self.user_history, self.ledger, self.now))
            .map(|constraint| constraint.constraint_name())
    }
}

/// Trait for candidate selection policies
pub trait MatchingStrategyTrait: Send + Sync {
    /// Filter `campaigns` down to the candidates eligible for `request`
    ///
    /// # Arguments
    /// * `campaigns` - All campaigns in creation order
    /// * `request` - User, city, histories and registries for this request
    ///
    /// # Returns
    /// Eligible campaigns; order carries no meaning, the engine ranks them
    fn apply(&self, campaigns: &[Arc<Campaign>], request: &MatchRequest) -> Vec<Arc<Campaign>>;

    /// Name reported by `AdEngine::current_strategy_name`
    fn strategy_name(&self) -> &str;
}

/// Built-in strategy kinds
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyType {
    /// Active, targeted, affordable, and passing every constraint
    DEFAULT,
    /// DEFAULT plus `bid > min_bid`
    MINIMUM_BID { min_bid: f64 },
}

impl StrategyType {
    /// Build the strategy with the given age tolerance
    pub fn build(self, age_tolerance_years: u32) -> Arc<dyn MatchingStrategyTrait> {
        let default = DefaultMatchingStrategy { age_tolerance_years };
        match self {
            StrategyType::DEFAULT => Arc::new(default),
            StrategyType::MINIMUM_BID { min_bid } => Arc::new(MinimumBidStrategy { inner: default, min_bid }),
        }
    }
}

/// Default eligibility: (a) active, (b) targeting matches, (c) advertiser can pay the bid, (d) no constraint vetoes it
pub struct DefaultMatchingStrategy {
    pub age_tolerance_years: u32,
}

impl DefaultMatchingStrategy {
    /// Single-campaign version of the pipeline, in the same order
    pub fn is_eligible(&self, campaign: &Campaign, request: &MatchRequest) -> bool {
        campaign.active
            && campaign.matches_user(request.user, request.city, request.now.date_naive(), self.age_tolerance_years)
            && request.advertisers.can_afford(&campaign.advertiser_id, campaign.bid_amount)
            && request.first_violation(campaign).is_none()
    }
}

impl Default for DefaultMatchingStrategy {
    fn default() -> Self {
        Self {
            age_tolerance_years: AGE_TOLERANCE_YEARS,
        }
    }
}

impl MatchingStrategyTrait for DefaultMatchingStrategy {
    fn apply(&self, campaigns: &[Arc<Campaign>], request: &MatchRequest) -> Vec<Arc<Campaign>> {
        campaigns.iter().filter(|campaign| self.is_eligible(campaign, request)).cloned().collect()
    }

    fn strategy_name(&self) -> &str {
        "DefaultMatching"
    }
}

/// Default eligibility restricted to bids strictly above a threshold
pub struct MinimumBidStrategy {
    pub inner: DefaultMatchingStrategy,
    pub min_bid: f64,
}

impl MatchingStrategyTrait for MinimumBidStrategy {
    fn apply(&self, campaigns: &[Arc<Campaign>], request: &MatchRequest) -> Vec<Arc<Campaign>> {
        campaigns
            .iter()
            .filter(|campaign| campaign.bid_amount > self.min_bid && self.inner.is_eligible(campaign, request))
            .cloned()
            .collect()
    }

    fn strategy_name(&self) -> &str {
        "MinimumBidMatching"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignTargeting;
    use crate::campaigns::Campaigns;
    use crate::constraints::Constraints;
    use chrono::{NaiveDate, TimeZone};
    use std::collections::HashSet;

    struct Fixture {
        advertisers: Advertisers,
        campaigns: Campaigns,
        ledger: ServingLedger,
        constraints: Constraints,
        rich: String,
        poor: String,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let advertisers = Advertisers::new();
        let rich = advertisers.add("Rich".to_string());
        let poor = advertisers.add("Poor".to_string());
        advertisers.credit(&rich, 1000.0).unwrap();
        advertisers.credit(&poor, 5.0).unwrap();
        Fixture {
            advertisers,
            campaigns: Campaigns::new(),
            ledger: ServingLedger::new(),
            constraints: Constraints::with_defaults(),
            rich,
            poor,
        }
    }

    fn add(fixture: &Fixture, advertiser_id: &str, bid: f64, targeting: CampaignTargeting) -> String {
        fixture
            .campaigns
            .add(&fixture.advertisers, advertiser_id, bid, format!("https://ads.example/{}", bid), "banner".to_string(), targeting)
            .unwrap()
    }

    fn user() -> User {
        let mut user = User::new("john_25".to_string(), NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(), "male".to_string());
        user.add_interests(vec!["technology".to_string()]);
        user
    }

    fn run(fixture: &Fixture, strategy: &dyn MatchingStrategyTrait, user: &User, city: &str) -> HashSet<String> {
        let history = fixture.ledger.query_by_user(&user.user_id, 10);
        let constraints = fixture.constraints.snapshot();
        let request = MatchRequest {
            user,
            city,
            user_history: &history,
            ledger: &fixture.ledger,
            advertisers: &fixture.advertisers,
            constraints: &constraints,
            now: now(),
        };
        strategy.apply(&fixture.campaigns.snapshot(), &request).into_iter().map(|c| c.campaign_id.clone()).collect()
    }

    #[test]
    fn test_default_strategy_filters_each_stage() {
        let f = fixture();
        let matching = add(&f, &f.rich, 50.0, CampaignTargeting::age(25).with_city("bangalore").with_gender("male").with_interests(["technology"]));
        let wrong_city = add(&f, &f.rich, 50.0, CampaignTargeting::age(25).with_city("mumbai"));
        let too_old = add(&f, &f.rich, 50.0, CampaignTargeting::age(50));
        let unaffordable = add(&f, &f.poor, 10.0, CampaignTargeting::age(25));
        let inactive = add(&f, &f.rich, 50.0, CampaignTargeting::age(25));
        f.campaigns.set_active(&inactive, false).unwrap();
        let capped = add(&f, &f.rich, 20.0, CampaignTargeting::age(25));
        for i in 0..5 {
            f.ledger.append(&capped, &format!("other_{}", i), now());
        }

        let strategy = DefaultMatchingStrategy::default();
        let candidates = run(&f, &strategy, &user(), "Bangalore");

        assert!(candidates.contains(&matching));
        for excluded in [&wrong_city, &too_old, &unaffordable, &inactive, &capped] {
            assert!(!candidates.contains(excluded), "{} should be filtered", excluded);
        }
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_budget_equal_to_bid_is_affordable() {
        let f = fixture();
        let exact = add(&f, &f.poor, 5.0, CampaignTargeting::age(25));

        let candidates = run(&f, &DefaultMatchingStrategy::default(), &user(), "anywhere");

        assert!(candidates.contains(&exact));
    }

    #[test]
    fn test_minimum_bid_strategy_requires_strictly_higher_bid() {
        let f = fixture();
        let low = add(&f, &f.rich, 10.0, CampaignTargeting::age(25));
        let high = add(&f, &f.rich, 10.5, CampaignTargeting::age(25));

        let strategy = StrategyType::MINIMUM_BID { min_bid: 10.0 }.build(5);
        let candidates = run(&f, strategy.as_ref(), &user(), "anywhere");

        assert_eq!(strategy.strategy_name(), "MinimumBidMatching");
        assert!(!candidates.contains(&low));
        assert!(candidates.contains(&high));
    }

    #[test]
    fn test_first_violation_reports_constraint_name() {
        let f = fixture();
        let id = add(&f, &f.rich, 10.0, CampaignTargeting::age(25));
        for _ in 0..10 {
            f.ledger.append(&id, "john_25", now() - chrono::Duration::hours(1));
        }
        let user = user();
        let history = f.ledger.query_by_user("john_25", 10);
        let constraints = f.constraints.snapshot();
        let request = MatchRequest {
            user: &user,
            city: "x",
            user_history: &history,
            ledger: &f.ledger,
            advertisers: &f.advertisers,
            constraints: &constraints,
            now: now(),
        };

        let campaign = f.campaigns.get(&id).unwrap();
        assert_eq!(request.first_violation(&campaign), Some("UserFrequencyConstraint"));
    }
}
