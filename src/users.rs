use crate::errors::{EngineError, Result};
use crate::user::User;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Container for users keyed by caller-supplied user id
pub struct Users {
    users: RwLock<HashMap<String, User>>,
}

impl Users {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Register a user, replacing any previous record with the same id
    ///
    /// # Returns
    /// `true` if an existing user was replaced
    pub fn add(&self, user_id: String, birth_date: NaiveDate, gender: String) -> bool {
        let user = User::new(user_id.clone(), birth_date, gender);
        self.users.write().insert(user_id, user).is_some()
    }

    pub fn add_interests<I: IntoIterator<Item = String>>(&self, user_id: &str, tags: I) -> Result<()> {
        let mut users = self.users.write();
        let user = users.get_mut(user_id).ok_or_else(|| EngineError::UnknownUser {
            user_id: user_id.to_string(),
        })?;
        user.add_interests(tags);
        Ok(())
    }

    /// Copy of the user's current record
    pub fn snapshot(&self, user_id: &str) -> Option<User> {
        self.users.read().get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Users {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_interests_to_unknown_user_fails() {
        let users = Users::new();
        let err = users.add_interests("ghost", vec!["gaming".to_string()]).unwrap_err();
        assert_eq!(err, EngineError::UnknownUser { user_id: "ghost".to_string() });
    }

    #[test]
    fn test_re_registering_replaces_the_record() {
        let users = Users::new();
        let dob = NaiveDate::from_ymd_opt(1998, 5, 15).unwrap();
        assert!(!users.add("john_25".to_string(), dob, "male".to_string()));
        users.add_interests("john_25", vec!["technology".to_string()]).unwrap();

        assert!(users.add("john_25".to_string(), dob, "male".to_string()));

        let john = users.snapshot("john_25").unwrap();
        assert!(john.interests.is_empty());
        assert_eq!(users.len(), 1);
    }
}
