use std::time::Duration;

/// Number of most recent servings per user handed to strategies and constraints
pub const USER_HISTORY_LIMIT: usize = 10;

/// Allowed distance in years between a user's age and a campaign's target age
pub const AGE_TOLERANCE_YEARS: u32 = 5;

/// How long a request waits for the allocation gate before giving up
pub const ALLOCATION_TIMEOUT: Duration = Duration::from_millis(250);

/// Engine tunables
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Bounded per-user history window (most recent records, newest first)
    pub user_history_limit: usize,
    pub age_tolerance_years: u32,
    /// Bounded wait for the select-charge-record critical section
    pub allocation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_history_limit: USER_HISTORY_LIMIT,
            age_tolerance_years: AGE_TOLERANCE_YEARS,
            allocation_timeout: ALLOCATION_TIMEOUT,
        }
    }
}
