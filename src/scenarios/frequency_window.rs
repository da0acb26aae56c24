/// A single user and a single well-funded campaign driven through the per-minute cap.
///
/// It validates:
/// - Five servings within one minute, then "no match" regardless of the remaining budget
/// - Serving resumes as soon as the oldest record leaves the trailing 60 seconds
/// - The per-user cap blocks from the 10th serving in the user's recent history

use crate::scenarios::Validations;
use crate::utils;
use admatch::logger::{LogEvent, Logger};
use admatch::logln;
use admatch::{AdEngine, CampaignTargeting, EngineConfig, ManualClock, ServeResult};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "frequency_window",
    run,
});

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).single().ok_or("invalid start time")?;
    let clock = ManualClock::new(start);
    let engine = AdEngine::with_clock(EngineConfig::default(), Arc::new(clock.clone()));
    utils::attach_engine_logging(&engine, scenario_name)?;

    let advertiser = engine.register_advertiser("A");
    engine.credit_budget(&advertiser, 100_000.0)?;
    engine.create_campaign(&advertiser, 10.0, "https://a.example/offer", "banner", CampaignTargeting::age(30))?;
    engine.register_user("solo", NaiveDate::from_ymd_opt(1994, 1, 1).ok_or("invalid birth date")?, "male");

    let mut validations = Validations::new();

    logln!(logger, LogEvent::Scenario, "=== Global window ===");
    let mut served = 0;
    for _ in 0..5 {
        if utils::serve(&engine, "solo", "x").is_served() {
            served += 1;
        }
        clock.advance(Duration::seconds(10));
    }
    validations.check(logger, served == 5, format!("Five servings in the first minute: {} == 5", served));

    let blocked = utils::serve(&engine, "solo", "x");
    validations.check(logger, blocked == ServeResult::NO_CANDIDATES, format!("Sixth request at +50s is capped: {:?}", blocked));

    clock.set(start + Duration::seconds(59));
    let still_blocked = utils::serve(&engine, "solo", "x");
    validations.check(logger, still_blocked == ServeResult::NO_CANDIDATES, format!("Still capped at +59s: {:?}", still_blocked));

    clock.set(start + Duration::seconds(61));
    let resumed = utils::serve(&engine, "solo", "x");
    validations.check(logger, resumed.is_served(), format!("Served again at +61s once the first record left the window: {}", resumed.is_served()));

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Per-user history ===");
    // Spacing requests two minutes apart keeps the global cap out of the way
    let mut total = engine.servings_for_user("solo", usize::MAX).len();
    let mut attempts = 0;
    while total < 10 && attempts < 20 {
        clock.advance(Duration::minutes(2));
        if utils::serve(&engine, "solo", "x").is_served() {
            total += 1;
        }
        attempts += 1;
    }
    validations.check(logger, total == 10, format!("Ten servings reached without a false block: {} == 10", total));

    clock.advance(Duration::minutes(2));
    let user_capped = utils::serve(&engine, "solo", "x");
    validations.check(logger, user_capped == ServeResult::NO_CANDIDATES, format!("Eleventh serving blocked by the per-user cap: {:?}", user_capped));

    validations.finish()
}
