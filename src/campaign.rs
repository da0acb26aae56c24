use crate::user::User;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Case-insensitive equality under full Unicode lowercasing, so `MÜNCHEN` equals `münchen`
fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

/// Who a campaign wants to reach
///
/// `None` city/gender and an empty interest set are wildcards. Age is always
/// checked, with a tolerance supplied by the strategy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CampaignTargeting {
    pub age: u32,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub interests: HashSet<String>,
}

impl CampaignTargeting {
    /// Targeting that only constrains age
    pub fn age(age: u32) -> Self {
        Self {
            age,
            ..Self::default()
        }
    }

    pub fn with_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }

    pub fn with_gender(mut self, gender: &str) -> Self {
        self.gender = Some(gender.to_string());
        self
    }

    pub fn with_interests<'a, I: IntoIterator<Item = &'a str>>(mut self, interests: I) -> Self {
        self.interests.extend(interests.into_iter().map(str::to_string));
        self
    }

    /// Check every targeting criterion against a user in a city
    ///
    /// # Arguments
    /// * `user` - Candidate user
    /// * `city` - City the request comes from
    /// * `today` - Date the user's age is derived on
    /// * `age_tolerance_years` - Allowed distance from the target age
    pub fn matches(&self, user: &User, city: &str, today: NaiveDate, age_tolerance_years: u32) -> bool {
        if user.age_on(today).abs_diff(self.age) > age_tolerance_years {
            return false;
        }
        if let Some(gender) = &self.gender {
            if !eq_ignore_case(gender, &user.gender) {
                return false;
            }
        }
        if let Some(target_city) = &self.city {
            if !eq_ignore_case(target_city, city) {
                return false;
            }
        }
        if !self.interests.is_empty() && self.interests.is_disjoint(&user.interests) {
            return false;
        }
        true
    }
}

/// A targeted ad unit with a bid
/// Immutable once created except for the active flag
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub campaign_id: String,
    /// Resolved through the advertiser registry, never embedded
    pub advertiser_id: String,
    pub bid_amount: f64,
    pub url: String,
    pub content_type: String,
    pub targeting: CampaignTargeting,
    pub active: bool,
    /// Creation order, used to break bid ties deterministically
    pub sequence: u64,
}

impl Campaign {
    pub fn matches_user(&self, user: &User, city: &str, today: NaiveDate, age_tolerance_years: u32) -> bool {
        self.targeting.matches(user, city, today, age_tolerance_years)
    }
}
