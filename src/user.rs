use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

/// A user that can be matched against campaigns
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub interests: HashSet<String>,
}

impl User {
    pub fn new(user_id: String, birth_date: NaiveDate, gender: String) -> Self {
        Self {
            user_id,
            birth_date,
            gender,
            interests: HashSet::new(),
        }
    }

    /// Age in whole years on `today`
    /// Zero for birth dates in the future
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let mut years = today.year() - self.birth_date.year();
        if (today.month(), today.day()) < (self.birth_date.month(), self.birth_date.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    /// Interests only grow
    pub fn add_interests<I: IntoIterator<Item = String>>(&mut self, tags: I) {
        self.interests.extend(tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_counts_completed_years() {
        let user = User::new("john_25".to_string(), date(1998, 5, 15), "male".to_string());

        assert_eq!(user.age_on(date(2023, 5, 14)), 24);
        assert_eq!(user.age_on(date(2023, 5, 15)), 25);
        assert_eq!(user.age_on(date(2024, 1, 1)), 25);
    }

    #[test]
    fn test_leap_day_birthday() {
        let user = User::new("leap".to_string(), date(2000, 2, 29), "female".to_string());

        assert_eq!(user.age_on(date(2021, 2, 28)), 20);
        assert_eq!(user.age_on(date(2021, 3, 1)), 21);
    }

    #[test]
    fn test_future_birth_date_is_age_zero() {
        let user = User::new("unborn".to_string(), date(2030, 1, 1), "male".to_string());
        assert_eq!(user.age_on(date(2024, 1, 1)), 0);
    }

    #[test]
    fn test_interests_are_a_set() {
        let mut user = User::new("sarah_30".to_string(), date(1993, 8, 20), "female".to_string());
        user.add_interests(vec!["fashion".to_string(), "travel".to_string()]);
        user.add_interests(vec!["fashion".to_string()]);

        assert_eq!(user.interests.len(), 2);
        assert!(user.interests.contains("travel"));
    }
}
