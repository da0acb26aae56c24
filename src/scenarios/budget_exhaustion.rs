/// One advertiser with a budget of 50 and one untargeted campaign bidding 10.
///
/// It validates:
/// - Five distinct users are each served once and the budget reaches exactly 0
/// - The sixth user gets nothing although targeting and frequency caps would allow it
/// - A top-up makes the campaign servable again

use crate::scenarios::Validations;
use crate::utils;
use admatch::logger::{LogEvent, Logger};
use admatch::logln;
use admatch::{AdEngine, CampaignTargeting, EngineConfig, ManualClock, ServeResult};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "budget_exhaustion",
    run,
});

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).single().ok_or("invalid start time")?;
    let clock = ManualClock::new(start);
    let engine = AdEngine::with_clock(EngineConfig::default(), Arc::new(clock.clone()));
    utils::attach_engine_logging(&engine, scenario_name)?;

    let advertiser = engine.register_advertiser("A");
    engine.credit_budget(&advertiser, 50.0)?;
    let campaign_id = engine.create_campaign(&advertiser, 10.0, "https://a.example/offer", "banner", CampaignTargeting::age(30))?;
    let birth_date = NaiveDate::from_ymd_opt(1994, 1, 1).ok_or("invalid birth date")?;
    for i in 0..6 {
        engine.register_user(&format!("user_{}", i), birth_date, "female");
    }

    let mut validations = Validations::new();
    logln!(logger, LogEvent::Scenario, "=== Spending the budget ===");
    let mut served = 0;
    for i in 0..5 {
        // A minute apart, so only the budget can stop the campaign
        clock.advance(Duration::minutes(1));
        let result = utils::serve(&engine, &format!("user_{}", i), "anywhere");
        logln!(logger, LogEvent::Scenario, "user_{}: {:?}, budget left {:.2}", i, result.campaign().map(|c| c.campaign_id.as_str()), engine.advertiser_budget(&advertiser).unwrap_or(f64::NAN));
        if result.campaign().is_some_and(|c| c.campaign_id == campaign_id) {
            served += 1;
        }
    }
    validations.check(logger, served == 5, format!("Five distinct users served: {} == 5", served));

    let budget = engine.advertiser_budget(&advertiser).ok_or("advertiser vanished")?;
    validations.check(logger, budget == 0.0, format!("Budget fully spent: {:.2} == 0.00", budget));

    clock.advance(Duration::minutes(1));
    let sixth = utils::serve(&engine, "user_5", "anywhere");
    validations.check(logger, sixth == ServeResult::NO_CANDIDATES, format!("Sixth user gets no match: {:?}", sixth));

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Top-up ===");
    engine.credit_budget(&advertiser, 10.0)?;
    let after_top_up = utils::serve(&engine, "user_5", "anywhere");
    validations.check(logger, after_top_up.is_served(), format!("Served again after a top-up of 10: {}", after_top_up.is_served()));

    let records = engine.total_servings();
    validations.check(logger, records == 6, format!("One ledger record per debit: {} == 6", records));

    validations.finish()
}
