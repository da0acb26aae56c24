mod scenarios;
mod utils;

use admatch::logger::{sanitize_filename, ConsoleReceiver, FileReceiver, LogEvent, Logger};
use admatch::{log, logln};
use scenarios::get_scenario_catalog;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use utils::{RAND_SEED, TOTAL_MATCH_REQUESTS};

fn print_usage() {
    eprintln!("Usage: admatch <scenario|all> [iterations] [start_iteration] [--verbose] [--fastbreak]");
    eprintln!("Available scenarios:");
    for s in get_scenario_catalog() {
        eprintln!("  - {}", s.short_name);
    }
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Parse and filter out --verbose and --fastbreak arguments
    let mut args = Vec::new();
    let mut fastbreak = false;
    for arg in raw_args.iter() {
        if arg == "--verbose" {
            utils::VERBOSE_ENGINE.store(true, Ordering::Relaxed);
            continue;
        }
        if arg == "--fastbreak" {
            fastbreak = true;
            continue;
        }
        args.push(arg.clone());
    }

    // Without a scenario name the demo walk-through runs with its narration on the console
    let scenario_arg = args.get(1).cloned().unwrap_or_else(|| "demo".to_string());
    if scenario_arg == "help" || scenario_arg == "--help" {
        print_usage();
        return;
    }

    let iterations = match args.get(2) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid iterations parameter '{}'. Expected a number.", raw);
                std::process::exit(1);
            }
        },
        None => 1,
    };

    let start_iteration = match args.get(3) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid start iteration parameter '{}'. Expected a number.", raw);
                std::process::exit(1);
            }
        },
        None => 0,
    };

    let all_scenarios = get_scenario_catalog();
    let scenarios: Vec<_> = if scenario_arg == "all" {
        all_scenarios.clone()
    } else {
        match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
            Some(scenario) => vec![scenario.clone()],
            None => {
                eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                print_usage();
                std::process::exit(1);
            }
        }
    };

    // Scenario narration only makes sense on the console for a single scenario run once
    let mut logger = Logger::new();
    if scenario_arg != "all" && iterations == 1 {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
    } else {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
    }

    let summary_receiver_id = match FileReceiver::new(&PathBuf::from("log/summary.log"), vec![LogEvent::Validation]) {
        Ok(receiver) => logger.add_receiver(receiver),
        Err(e) => {
            eprintln!("Error: Cannot create log/summary.log: {}", e);
            std::process::exit(1);
        }
    };

    TOTAL_MATCH_REQUESTS.store(0, Ordering::Relaxed);

    let target = if scenario_arg == "all" { "all scenarios".to_string() } else { format!("scenario '{}'", scenario_arg) };
    if iterations > 1 {
        logln!(&mut logger, LogEvent::Validation, "Running {} {} times...\n", target, iterations);
    } else {
        logln!(&mut logger, LogEvent::Validation, "Running {}...\n", target);
    }

    let mut failures = 0;
    'scenarios: for scenario in &scenarios {
        log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

        let scenario_log = PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name)));
        let scenario_receiver_id = match FileReceiver::new(&scenario_log, vec![LogEvent::Scenario]) {
            Ok(receiver) => Some(logger.add_receiver(receiver)),
            Err(e) => {
                eprintln!("Warning: Cannot create {}: {}", scenario_log.display(), e);
                None
            }
        };

        for i in start_iteration..(start_iteration + iterations) {
            if iterations > 1 {
                log!(&mut logger, LogEvent::Validation, "[{}/{}] ", i - start_iteration + 1, iterations);
            }

            RAND_SEED.store(i, Ordering::Relaxed);

            match (scenario.run)(scenario.short_name, &mut logger) {
                Ok(()) => {
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✓");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                    }
                }
                Err(e) => {
                    failures += 1;
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✗");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                    }

                    if fastbreak {
                        if let Some(id) = scenario_receiver_id {
                            logger.remove_receiver(id);
                        }
                        logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                        logln!(&mut logger, LogEvent::Validation, "Error at iteration {}/{} (seed {}): {}", i - start_iteration + 1, iterations, i, e);
                        break 'scenarios;
                    }
                }
            }

            let _ = logger.flush();
        }

        if let Some(id) = scenario_receiver_id {
            logger.remove_receiver(id);
        }
    }

    logln!(&mut logger, LogEvent::Validation, "\nTotal match requests issued: {}", TOTAL_MATCH_REQUESTS.load(Ordering::Relaxed));
    let _ = logger.flush();
    logger.remove_receiver(summary_receiver_id);

    if failures > 0 {
        std::process::exit(1);
    }
}
