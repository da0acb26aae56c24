pub use crate::constraint::{ConstraintTrait, GlobalFrequencyConstraint, UserFrequencyConstraint};
use chrono::Duration;
use parking_lot::RwLock;
use std::sync::Arc;

/// Built-in constraint kinds
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintType {
    /// At most `max_views` servings of a campaign within the user's bounded history
    USER_FREQUENCY { max_views: usize },
    /// At most `max_views` servings of a campaign to anyone within `window`
    GLOBAL_FREQUENCY { max_views: usize, window: Duration },
}

impl ConstraintType {
    /// Cap used when nothing else is configured: 10 views per user window
    pub fn default_user_frequency() -> Self {
        ConstraintType::USER_FREQUENCY { max_views: 10 }
    }

    /// Cap used when nothing else is configured: 5 views per minute
    pub fn default_global_frequency() -> Self {
        ConstraintType::GLOBAL_FREQUENCY { max_views: 5, window: Duration::minutes(1) }
    }
}

/// Ordered set of constraints, evaluated in registration order
///
/// Registration is copy-on-write: the list is an immutable `Arc<Vec<..>>`
/// swapped in whole, so an evaluator holding the previous list keeps a
/// complete view and the next one sees the complete new list.
pub struct Constraints {
    constraints: RwLock<Arc<Vec<Arc<dyn ConstraintTrait>>>>,
}

impl Constraints {
    pub fn new() -> Self {
        Self {
            constraints: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// The user and global frequency caps, in that order
    pub fn with_defaults() -> Self {
        let constraints = Self::new();
        constraints.add(ConstraintType::default_user_frequency());
        constraints.add(ConstraintType::default_global_frequency());
        constraints
    }

    /// Add a built-in constraint
    ///
    /// # Returns
    /// The diagnostic name of the registered constraint
    pub fn add(&self, constraint_type: ConstraintType) -> String {
        let constraint: Arc<dyn ConstraintTrait> = match constraint_type {
            ConstraintType::USER_FREQUENCY { max_views } => Arc::new(UserFrequencyConstraint { max_views }),
            ConstraintType::GLOBAL_FREQUENCY { max_views, window } => Arc::new(GlobalFrequencyConstraint { max_views, window }),
        };
        self.add_advanced(constraint)
    }

    /// Add any constraint implementation
    pub fn add_advanced(&self, constraint: Arc<dyn ConstraintTrait>) -> String {
        let name = constraint.constraint_name().to_string();
        let mut slot = self.constraints.write();
        let mut next = Vec::with_capacity(slot.len() + 1);
        next.extend(slot.iter().cloned());
        next.push(constraint);
        *slot = Arc::new(next);
        name
    }

    /// Current list; stays valid and unchanged while later registrations happen
    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn ConstraintTrait>>> {
        self.constraints.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|c| c.constraint_name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.constraints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::Campaign;
    use crate::ledger::{ServingLedger, ServingRecord};
    use crate::user::User;
    use chrono::{DateTime, Utc};
    use std::thread;

    struct BlockEverything;

    impl ConstraintTrait for BlockEverything {
        fn is_violated(&self, _campaign: &Campaign, _user: &User, _user_history: &[ServingRecord], _ledger: &ServingLedger, _now: DateTime<Utc>) -> bool {
            true
        }

        fn constraint_name(&self) -> &str {
            "BlockEverything"
        }
    }

    #[test]
    fn test_defaults_are_registered_in_order() {
        let constraints = Constraints::with_defaults();
        assert_eq!(constraints.names(), vec!["UserFrequencyConstraint", "GlobalFrequencyConstraint"]);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_registration() {
        let constraints = Constraints::with_defaults();
        let before = constraints.snapshot();

        let name = constraints.add_advanced(Arc::new(BlockEverything));

        assert_eq!(name, "BlockEverything");
        assert_eq!(before.len(), 2);
        assert_eq!(constraints.len(), 3);
    }

    #[test]
    fn test_concurrent_readers_see_whole_lists() {
        let constraints = Arc::new(Constraints::new());
        let writer = {
            let constraints = constraints.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    constraints.add(ConstraintType::default_user_frequency());
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let constraints = constraints.clone();
                thread::spawn(move || {
                    let mut last_seen = 0;
                    for _ in 0..500 {
                        let snapshot = constraints.snapshot();
                        // Lists only grow, and every entry in a snapshot is usable
                        assert!(snapshot.len() >= last_seen);
                        assert!(snapshot.iter().all(|c| c.constraint_name() == "UserFrequencyConstraint"));
                        last_seen = snapshot.len();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(constraints.len(), 200);
    }
}
