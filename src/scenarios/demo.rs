/// Walk-through of the engine's everyday behaviour with two advertisers and three users.
///
/// It validates:
/// - Sarah (30, female, fashion) in Bangalore is served the fashion video campaign
/// - John (26, male, technology) gets 5 of 12 back-to-back requests; the per-minute cap blocks the rest
/// - Budgets drop by exactly the bids served: TechCorp 1000 -> 750, FashionBrand 500 -> 470
/// - Bob (51, gardening) in Mumbai matches nothing

use crate::scenarios::Validations;
use crate::utils;
use admatch::logger::{LogEvent, Logger};
use admatch::logln;
use admatch::{AdEngine, CampaignTargeting, EngineConfig, ManualClock, ServeResult};
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "demo",
    run,
});

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| format!("invalid date {}-{}-{}", y, m, d))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).single().ok_or("invalid start time")?;
    let engine = AdEngine::with_clock(EngineConfig::default(), Arc::new(ManualClock::new(start)));
    utils::attach_engine_logging(&engine, scenario_name)?;

    logln!(logger, LogEvent::Scenario, "=== Setup ===");
    let tech_corp = engine.register_advertiser("TechCorp");
    let fashion_brand = engine.register_advertiser("FashionBrand");
    engine.credit_budget(&tech_corp, 1000.0)?;
    engine.credit_budget(&fashion_brand, 500.0)?;
    logln!(logger, LogEvent::Scenario, "Added advertisers {} and {} with budgets", tech_corp, fashion_brand);

    engine.register_user("john_25", date(1998, 5, 15)?, "male");
    engine.add_interests("john_25", ["technology", "gaming"])?;
    engine.register_user("sarah_30", date(1993, 8, 20)?, "female");
    engine.add_interests("sarah_30", ["fashion", "travel"])?;

    let tech_campaign = engine.create_campaign(
        &tech_corp,
        50.0,
        "https://techcorp.com/laptop",
        "banner",
        CampaignTargeting::age(25).with_city("bangalore").with_gender("male").with_interests(["technology"]),
    )?;
    let fashion_campaign = engine.create_campaign(
        &fashion_brand,
        30.0,
        "https://fashion.com/summer",
        "video",
        CampaignTargeting::age(30).with_city("bangalore").with_gender("female").with_interests(["fashion"]),
    )?;
    logln!(logger, LogEvent::Scenario, "Tech campaign: {}, fashion campaign: {}", tech_campaign, fashion_campaign);
    logln!(logger, LogEvent::Scenario, "Strategy: {}, constraints: {}", engine.current_strategy_name(), engine.constraint_names().join(", "));

    let mut validations = Validations::new();

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Targeted matching ===");
    let sarah = utils::serve(&engine, "sarah_30", "bangalore");
    if let ServeResult::Campaign { campaign, charged, .. } = &sarah {
        logln!(logger, LogEvent::Scenario, "Sarah matched with {} (bid {:.2})", campaign.url, charged);
    }
    validations.check(
        logger,
        sarah.campaign().map(|c| c.campaign_id.as_str()) == Some(fashion_campaign.as_str()),
        format!("Sarah is served the fashion campaign {}", fashion_campaign),
    );

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Frequency limits ===");
    let john_ads = (0..12).filter(|_| utils::serve(&engine, "john_25", "bangalore").is_served()).count();
    logln!(logger, LogEvent::Scenario, "John got {} of 12", john_ads);
    validations.check(logger, john_ads == 5, format!("Global cap allows 5 of 12 requests within the minute: {} == 5", john_ads));

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Budget status ===");
    let tech_budget = engine.advertiser_budget(&tech_corp).ok_or("TechCorp vanished")?;
    let fashion_budget = engine.advertiser_budget(&fashion_brand).ok_or("FashionBrand vanished")?;
    logln!(logger, LogEvent::Scenario, "TechCorp remaining budget: {:.2}", tech_budget);
    logln!(logger, LogEvent::Scenario, "FashionBrand remaining budget: {:.2}", fashion_budget);
    validations.check(logger, tech_budget == 750.0, format!("TechCorp charged 5 x 50: {:.2} == 750.00", tech_budget));
    validations.check(logger, fashion_budget == 470.0, format!("FashionBrand charged 1 x 30: {:.2} == 470.00", fashion_budget));

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Edge cases ===");
    engine.register_user("bob_50", date(1973, 3, 10)?, "male");
    engine.add_interests("bob_50", ["gardening"])?;
    let bob = utils::serve(&engine, "bob_50", "mumbai");
    validations.check(logger, bob == ServeResult::NO_CANDIDATES, format!("No ad for Bob: {:?}", bob));
    let ghost = utils::serve(&engine, "nobody", "bangalore");
    validations.check(logger, ghost == ServeResult::UNKNOWN_USER, format!("Unregistered user is not served: {:?}", ghost));

    let servings = engine.total_servings();
    validations.check(logger, servings == 6, format!("Ledger holds one record per serving: {} == 6", servings));

    validations.finish()
}
