//! The allocation engine: resolve the user, snapshot history, run the
//! installed strategy, rank the survivors and charge-and-record the winner.
//!
//! Steps from history snapshot to ledger append run inside one global
//! critical section (the allocation gate). A read lock is not enough there:
//! two requests could both see budget == bid, or both see 4 of 5 views in the
//! window, and both commit. Budget top-ups stay outside the gate since
//! credits only ever make more campaigns affordable.

use crate::advertisers::Advertisers;
use crate::campaign::{Campaign, CampaignTargeting};
use crate::campaigns::Campaigns;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::constraints::{ConstraintTrait, ConstraintType, Constraints};
use crate::errors::Result;
use crate::ledger::{ServingLedger, ServingRecord};
use crate::logger::{LogEvent, LogReceiver, Logger, ReceiverId};
use crate::strategy::{MatchRequest, MatchingStrategyTrait, StrategyType};
use crate::users::Users;
use crate::{errln, logln, warnln};
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Outcome of one match request
/// Only `Campaign` changed anything; every other variant left budgets and the ledger untouched
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum ServeResult {
    Campaign {
        campaign: Arc<Campaign>,
        charged: f64,
        record: ServingRecord,
    },
    /// No user registered under the requested id
    UNKNOWN_USER,
    /// The strategy found nothing eligible
    NO_CANDIDATES,
    /// Every ranked candidate failed its debit
    BUDGET_EXHAUSTED,
    /// The allocation gate was not acquired within the configured wait
    CONTENDED,
}

impl ServeResult {
    pub fn campaign(&self) -> Option<&Campaign> {
        match self {
            ServeResult::Campaign { campaign, .. } => Some(campaign),
            _ => None,
        }
    }

    pub fn is_served(&self) -> bool {
        matches!(self, ServeResult::Campaign { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            ServeResult::Campaign { .. } => "SERVED",
            ServeResult::UNKNOWN_USER => "UNKNOWN_USER",
            ServeResult::NO_CANDIDATES => "NO_CANDIDATES",
            ServeResult::BUDGET_EXHAUSTED => "BUDGET_EXHAUSTED",
            ServeResult::CONTENDED => "CONTENDED",
        }
    }
}

/// Highest bid first; equal bids go to the campaign created first
fn rank_candidates(candidates: &mut Vec<Arc<Campaign>>) {
    candidates.sort_by(|a, b| b.bid_amount.total_cmp(&a.bid_amount).then(a.sequence.cmp(&b.sequence)));
    // A strategy returning the same campaign twice must not get it charged twice
    candidates.dedup_by(|a, b| a.campaign_id == b.campaign_id);
}

pub struct AdEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    advertisers: Advertisers,
    users: Users,
    campaigns: Campaigns,
    ledger: ServingLedger,
    constraints: Constraints,
    strategy: RwLock<Arc<dyn MatchingStrategyTrait>>,
    allocation_gate: Mutex<()>,
    logger: Mutex<Logger>,
}

impl AdEngine {
    /// Engine with default configuration, system clock, default strategy and the two frequency caps
    pub fn new() -> Self {
        Self::with_clock(EngineConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self::custom(config, clock, Constraints::with_defaults())
    }

    /// Engine with a caller-assembled constraint set
    pub fn custom(config: EngineConfig, clock: Arc<dyn Clock>, constraints: Constraints) -> Self {
        let strategy = StrategyType::DEFAULT.build(config.age_tolerance_years);
        Self {
            config,
            clock,
            advertisers: Advertisers::new(),
            users: Users::new(),
            campaigns: Campaigns::new(),
            ledger: ServingLedger::new(),
            constraints,
            strategy: RwLock::new(strategy),
            allocation_gate: Mutex::new(()),
            logger: Mutex::new(Logger::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn add_log_receiver(&self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        self.logger.lock().add_receiver(receiver)
    }

    pub fn remove_log_receiver(&self, id: ReceiverId) {
        self.logger.lock().remove_receiver(id);
    }

    // Registration

    pub fn register_advertiser(&self, name: &str) -> String {
        let advertiser_id = self.advertisers.add(name.to_string());
        logln!(self.logger.lock(), LogEvent::Registry, "Advertiser {} registered as {}", name, advertiser_id);
        advertiser_id
    }

    pub fn register_advertiser_with_id(&self, advertiser_id: &str, name: &str) -> Result<String> {
        let advertiser_id = self.advertisers.add_with_id(advertiser_id.to_string(), name.to_string())?;
        logln!(self.logger.lock(), LogEvent::Registry, "Advertiser {} registered as {}", name, advertiser_id);
        Ok(advertiser_id)
    }

    /// Top up an advertiser's budget
    ///
    /// # Returns
    /// The new balance
    pub fn credit_budget(&self, advertiser_id: &str, amount: f64) -> Result<f64> {
        match self.advertisers.credit(advertiser_id, amount) {
            Ok(balance) => {
                logln!(self.logger.lock(), LogEvent::Registry, "Credited {:.2} to {}, balance {:.2}", amount, advertiser_id, balance);
                Ok(balance)
            }
            Err(err) => {
                errln!(self.logger.lock(), LogEvent::Registry, "Credit to {} rejected: {}", advertiser_id, err);
                Err(err)
            }
        }
    }

    /// Register a user; an existing user with the same id is replaced
    pub fn register_user(&self, user_id: &str, birth_date: NaiveDate, gender: &str) -> String {
        if self.users.add(user_id.to_string(), birth_date, gender.to_string()) {
            warnln!(self.logger.lock(), LogEvent::Registry, "User {} re-registered, previous record replaced", user_id);
        } else {
            logln!(self.logger.lock(), LogEvent::Registry, "User {} registered", user_id);
        }
        user_id.to_string()
    }

    pub fn add_interests<I, S>(&self, user_id: &str, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.add_interests(user_id, tags.into_iter().map(Into::<String>::into))
    }

    /// Create a campaign
    ///
    /// # Arguments
    /// * `advertiser_id` - Owning advertiser, must exist
    /// * `bid_amount` - Charged per serving, must be positive
    /// * `url` - Destination URL
    /// * `content_type` - Creative type tag
    /// * `targeting` - Targeting criteria
    ///
    /// # Returns
    /// The generated campaign id, or `InvalidCampaign`
    pub fn create_campaign(&self, advertiser_id: &str, bid_amount: f64, url: &str, content_type: &str, targeting: CampaignTargeting) -> Result<String> {
        match self.campaigns.add(&self.advertisers, advertiser_id, bid_amount, url.to_string(), content_type.to_string(), targeting) {
            Ok(campaign_id) => {
                logln!(self.logger.lock(), LogEvent::Registry, "Campaign {} created for {} (bid {:.2})", campaign_id, advertiser_id, bid_amount);
                Ok(campaign_id)
            }
            Err(err) => {
                errln!(self.logger.lock(), LogEvent::Registry, "Campaign for {} rejected: {}", advertiser_id, err);
                Err(err)
            }
        }
    }

    pub fn set_campaign_active(&self, campaign_id: &str, active: bool) -> Result<()> {
        self.campaigns.set_active(campaign_id, active)?;
        logln!(self.logger.lock(), LogEvent::Registry, "Campaign {} active={}", campaign_id, active);
        Ok(())
    }

    // Strategy and constraints

    /// Replace the matching strategy; requests already past their strategy read keep the old one
    pub fn install_strategy(&self, strategy: Arc<dyn MatchingStrategyTrait>) {
        let name = strategy.strategy_name().to_string();
        *self.strategy.write() = strategy;
        logln!(self.logger.lock(), LogEvent::Registry, "Matching strategy set to {}", name);
    }

    pub fn install_strategy_type(&self, strategy_type: StrategyType) {
        self.install_strategy(strategy_type.build(self.config.age_tolerance_years));
    }

    pub fn current_strategy_name(&self) -> String {
        self.strategy.read().strategy_name().to_string()
    }

    pub fn register_constraint(&self, constraint_type: ConstraintType) -> String {
        let name = self.constraints.add(constraint_type);
        logln!(self.logger.lock(), LogEvent::Registry, "Constraint {} registered", name);
        name
    }

    pub fn register_constraint_advanced(&self, constraint: Arc<dyn ConstraintTrait>) -> String {
        let name = self.constraints.add_advanced(constraint);
        logln!(self.logger.lock(), LogEvent::Registry, "Constraint {} registered", name);
        name
    }

    pub fn constraint_names(&self) -> Vec<String> {
        self.constraints.names()
    }

    // Matching

    /// Select at most one campaign for `user_id` in `city`, charge its advertiser and record the serving
    pub fn match_and_allocate(&self, user_id: &str, city: &str) -> ServeResult {
        let mut failed_debits = Vec::new();
        let result = self.allocate(user_id, city, &mut failed_debits);
        // The gate is released by now; logging never runs inside it
        self.log_outcome(user_id, city, &result, &failed_debits);
        result
    }

    /// One pass of resolve, filter, rank, charge and record
    /// Candidates whose debit failed are pushed to `failed_debits` for logging after the gate is released
    fn allocate(&self, user_id: &str, city: &str, failed_debits: &mut Vec<Arc<Campaign>>) -> ServeResult {
        let Some(user) = self.users.snapshot(user_id) else {
            return ServeResult::UNKNOWN_USER;
        };

        let Some(_gate) = self.allocation_gate.try_lock_for(self.config.allocation_timeout) else {
            return ServeResult::CONTENDED;
        };

        let now = self.clock.now();
        let user_history = self.ledger.query_by_user(user_id, self.config.user_history_limit);
        let strategy = self.strategy.read().clone();
        let constraints = self.constraints.snapshot();
        let campaigns = self.campaigns.snapshot();
        let request = MatchRequest {
            user: &user,
            city,
            user_history: &user_history,
            ledger: &self.ledger,
            advertisers: &self.advertisers,
            constraints: &constraints,
            now,
        };

        let mut candidates = strategy.apply(&campaigns, &request);
        if candidates.is_empty() {
            return ServeResult::NO_CANDIDATES;
        }
        rank_candidates(&mut candidates);

        // Each candidate is tried once, best first; a failed debit falls through to the next one
        for campaign in candidates {
            if !self.advertisers.debit(&campaign.advertiser_id, campaign.bid_amount) {
                failed_debits.push(campaign);
                continue;
            }
            let record = self.ledger.append(&campaign.campaign_id, user_id, now);
            let charged = campaign.bid_amount;
            return ServeResult::Campaign { campaign, charged, record };
        }
        ServeResult::BUDGET_EXHAUSTED
    }

    fn log_outcome(&self, user_id: &str, city: &str, result: &ServeResult, failed_debits: &[Arc<Campaign>]) {
        let mut logger = self.logger.lock();

        if logger.is_warning_enabled(LogEvent::Allocation) {
            for campaign in failed_debits {
                warnln!(logger, LogEvent::Allocation, "Debit of {:.2} for {} failed on {}, tried next candidate", campaign.bid_amount, campaign.campaign_id, campaign.advertiser_id);
            }
            if *result == ServeResult::CONTENDED {
                warnln!(logger, LogEvent::Allocation, "Allocation gate busy for {:?}, request for {} dropped", self.config.allocation_timeout, user_id);
            }
        }

        if let ServeResult::Campaign { record, .. } = result {
            if logger.is_enabled(LogEvent::Ledger) {
                logln!(logger, LogEvent::Ledger, "#{} {} -> {} at {}", record.sequence, record.campaign_id, record.user_id, record.served_at.to_rfc3339());
            }
        }

        if !logger.is_enabled(LogEvent::Allocation) {
            return;
        }
        match result {
            ServeResult::Campaign { campaign, charged, .. } => {
                logln!(logger, LogEvent::Allocation, "{} @ {}: {} {} ({}), charged {:.2}", user_id, city, result.label(), campaign.campaign_id, campaign.url, charged);
            }
            _ => {
                logln!(logger, LogEvent::Allocation, "{} @ {}: {}", user_id, city, result.label());
            }
        }
    }

    // Read-only accessors

    /// Current balance, `None` for an unknown advertiser
    pub fn advertiser_budget(&self, advertiser_id: &str) -> Option<f64> {
        self.advertisers.budget(advertiser_id)
    }

    pub fn campaign(&self, campaign_id: &str) -> Option<Arc<Campaign>> {
        self.campaigns.get(campaign_id)
    }

    pub fn total_campaigns(&self) -> usize {
        self.campaigns.len()
    }

    pub fn total_servings(&self) -> usize {
        self.ledger.len()
    }

    /// Full ledger in insertion order
    pub fn serving_history(&self) -> Vec<ServingRecord> {
        self.ledger.snapshot()
    }

    /// The `limit` most recent servings for a user, newest first
    pub fn servings_for_user(&self, user_id: &str, limit: usize) -> Vec<ServingRecord> {
        self.ledger.query_by_user(user_id, limit)
    }
}

impl Default for AdEngine {
    fn default() -> Self {
        Self::new()
    }
}
