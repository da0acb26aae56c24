//! In-memory advertisement matching and allocation engine.
//!
//! Advertisers fund campaigns, campaigns target users by age, city, gender
//! and interests, and every match request serves at most one campaign:
//! the highest bid among the campaigns a pluggable strategy deems eligible,
//! charged against the advertiser's budget and recorded in a serving ledger.

pub mod logger;
pub mod errors;
pub mod clock;
pub mod config;
pub mod advertiser;
pub mod advertisers;
pub mod user;
pub mod users;
pub mod campaign;
pub mod campaigns;
pub mod ledger;
pub mod constraint;
pub mod constraints;
pub mod strategy;
pub mod engine;

pub use campaign::{Campaign, CampaignTargeting};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use constraints::{ConstraintTrait, ConstraintType, Constraints};
pub use engine::{AdEngine, ServeResult};
pub use errors::{EngineError, Result};
pub use ledger::ServingRecord;
pub use strategy::{MatchRequest, MatchingStrategyTrait, StrategyType};
pub use user::User;
