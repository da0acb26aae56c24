/// Randomized marketplace hammered from several threads while the clock moves forward.
///
/// Advertisers, campaigns and users are drawn from distributions seeded by the
/// iteration index, so every iteration is a different but reproducible market.
///
/// It validates, over the whole ledger once all threads are done:
/// - No budget ever went below zero
/// - Every advertiser was charged exactly the sum of bids of its recorded servings
/// - No campaign has more than 5 servings inside any 60 second window
/// - Every served request produced exactly one ledger record

use crate::scenarios::Validations;
use crate::utils;
use admatch::logger::{LogEvent, Logger};
use admatch::{errln, logln};
use admatch::{AdEngine, CampaignTargeting, EngineConfig, ManualClock, ServeResult};
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "concurrent_load",
    run,
});

const ADVERTISERS: usize = 8;
const CAMPAIGNS_PER_ADVERTISER: usize = 3;
const USERS: usize = 200;
const WORKERS: usize = 8;
const REQUESTS_PER_WORKER: usize = 500;

const CITIES: [&str; 4] = ["bangalore", "mumbai", "delhi", "pune"];
const GENDERS: [&str; 2] = ["male", "female"];
const INTERESTS: [&str; 6] = ["technology", "gaming", "fashion", "travel", "sports", "gardening"];

fn random_age(rng: &mut StdRng, dist: &Normal<f64>) -> u32 {
    dist.sample(rng).round().clamp(18.0, 80.0) as u32
}

fn random_interests(rng: &mut StdRng, count: usize) -> Vec<&'static str> {
    INTERESTS.choose_multiple(rng, count).copied().collect()
}

/// Build the market; returns the initial budget per advertiser
fn populate(engine: &AdEngine, rng: &mut StdRng, today: NaiveDate) -> Result<HashMap<String, f64>, Box<dyn std::error::Error>> {
    let age_dist = Normal::new(35.0, 10.0)?;
    let budget_dist = utils::lognormal_dist(300.0, 150.0)?;
    let bid_dist = utils::lognormal_dist(20.0, 8.0)?;

    let mut budgets = HashMap::new();
    for a in 0..ADVERTISERS {
        let advertiser_id = engine.register_advertiser(&format!("Advertiser {}", a));
        let budget = engine.credit_budget(&advertiser_id, budget_dist.sample(rng).max(1.0))?;
        budgets.insert(advertiser_id.clone(), budget);

        for c in 0..CAMPAIGNS_PER_ADVERTISER {
            let mut targeting = CampaignTargeting::age(random_age(rng, &age_dist));
            if rng.gen_bool(0.5) {
                targeting = targeting.with_city(CITIES[rng.gen_range(0..CITIES.len())]);
            }
            if rng.gen_bool(0.3) {
                targeting = targeting.with_gender(GENDERS[rng.gen_range(0..GENDERS.len())]);
            }
            if rng.gen_bool(0.5) {
                let count = rng.gen_range(1..=2);
                targeting = targeting.with_interests(random_interests(rng, count));
            }
            let bid = bid_dist.sample(rng).max(0.5);
            engine.create_campaign(&advertiser_id, bid, &format!("https://ads.example/{}/{}", a, c), "banner", targeting)?;
        }
    }

    for u in 0..USERS {
        let age = random_age(rng, &age_dist);
        let birth_date = today.with_year(today.year() - age as i32).unwrap_or(today) - Duration::days(rng.gen_range(1..360));
        let user_id = format!("user_{}", u);
        engine.register_user(&user_id, birth_date, GENDERS[rng.gen_range(0..GENDERS.len())]);
        let count = rng.gen_range(0..=3);
        engine.add_interests(&user_id, random_interests(rng, count))?;
    }
    Ok(budgets)
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let seed = utils::RAND_SEED.load(Ordering::Relaxed);
    let mut rng = StdRng::seed_from_u64(seed);

    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).single().ok_or("invalid start time")?;
    let clock = ManualClock::new(start);
    let engine = Arc::new(AdEngine::with_clock(EngineConfig::default(), Arc::new(clock.clone())));
    utils::attach_engine_logging(&engine, scenario_name)?;

    let initial_budgets = populate(&engine, &mut rng, start.date_naive())?;
    logln!(logger, LogEvent::Scenario, "Seed {}: {} advertisers, {} campaigns, {} users", seed, initial_budgets.len(), engine.total_campaigns(), USERS);

    // Workers and the clock ticker start together
    let barrier = Arc::new(Barrier::new(WORKERS + 1));
    let done = Arc::new(AtomicBool::new(false));
    let ticker = {
        let (clock, barrier, done) = (clock.clone(), barrier.clone(), done.clone());
        thread::spawn(move || {
            barrier.wait();
            while !done.load(Ordering::Relaxed) {
                clock.advance(Duration::seconds(1));
                thread::sleep(std::time::Duration::from_micros(200));
            }
        })
    };
    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let (engine, barrier) = (engine.clone(), barrier.clone());
            let worker_seed = seed.wrapping_mul(1000).wrapping_add(w as u64);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker_seed);
                barrier.wait();
                let mut outcomes: HashMap<&'static str, usize> = HashMap::new();
                for _ in 0..REQUESTS_PER_WORKER {
                    let user_id = format!("user_{}", rng.gen_range(0..USERS));
                    let city = CITIES[rng.gen_range(0..CITIES.len())];
                    let key = match utils::serve(&engine, &user_id, city) {
                        ServeResult::Campaign { .. } => "served",
                        ServeResult::NO_CANDIDATES => "no_candidates",
                        ServeResult::BUDGET_EXHAUSTED => "budget_exhausted",
                        ServeResult::CONTENDED => "contended",
                        ServeResult::UNKNOWN_USER => "unknown_user",
                    };
                    *outcomes.entry(key).or_default() += 1;
                }
                outcomes
            })
        })
        .collect();

    let mut outcomes: HashMap<&'static str, usize> = HashMap::new();
    for worker in workers {
        let worker_outcomes = worker.join().map_err(|_| "worker thread panicked")?;
        for (key, count) in worker_outcomes {
            *outcomes.entry(key).or_default() += count;
        }
    }
    done.store(true, Ordering::Relaxed);
    ticker.join().map_err(|_| "clock thread panicked")?;

    let mut keys: Vec<_> = outcomes.keys().copied().collect();
    keys.sort();
    for key in keys {
        logln!(logger, LogEvent::Scenario, "  {}: {}", key, outcomes[&key]);
    }

    let mut validations = Validations::new();
    let history = engine.serving_history();

    let served = outcomes.get("served").copied().unwrap_or(0);
    validations.check(logger, served == history.len(), format!("One ledger record per serving: {} == {}", served, history.len()));

    // Charged amounts per advertiser, rebuilt from the ledger
    let mut charged: HashMap<String, f64> = HashMap::new();
    let mut by_campaign: HashMap<&str, Vec<chrono::DateTime<Utc>>> = HashMap::new();
    for record in &history {
        let campaign = engine.campaign(&record.campaign_id).ok_or("ledger references unknown campaign")?;
        *charged.entry(campaign.advertiser_id.clone()).or_default() += campaign.bid_amount;
        by_campaign.entry(record.campaign_id.as_str()).or_default().push(record.served_at);
    }

    let mut negative = 0;
    let mut mismatched = 0;
    for (advertiser_id, initial) in &initial_budgets {
        let remaining = engine.advertiser_budget(advertiser_id).ok_or("advertiser vanished")?;
        if remaining < 0.0 {
            negative += 1;
        }
        let spent = charged.get(advertiser_id).copied().unwrap_or(0.0);
        if (initial - spent - remaining).abs() > 1e-6 {
            errln!(logger, LogEvent::Scenario, "{}: initial {:.4} - spent {:.4} != remaining {:.4}", advertiser_id, initial, spent, remaining);
            mismatched += 1;
        }
    }
    validations.check(logger, negative == 0, format!("No negative budgets: {} advertisers below zero", negative));
    validations.check(logger, mismatched == 0, format!("Budgets reconcile with the ledger: {} mismatches", mismatched));

    // Six records of one campaign must span more than the 60 second window
    let window = Duration::seconds(60);
    let crowded = by_campaign
        .values()
        .filter(|times| times.windows(6).any(|w| w[5] - w[0] <= window))
        .count();
    validations.check(logger, crowded == 0, format!("No campaign above 5 servings per minute: {} campaigns over the cap", crowded));

    validations.finish()
}
