use admatch::logger::{LogEvent, Logger};
use admatch::{errln, logln};
use std::error::Error;

/// Function type for scenario entry functions
pub type ScenarioFn = fn(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>>;

/// Entry in the scenario catalog
#[derive(Clone)]
pub struct ScenarioEntry {
    pub short_name: &'static str,
    pub run: ScenarioFn,
}

inventory::collect!(ScenarioEntry);

/// Get all registered scenarios from the catalog, sorted by name
pub fn get_scenario_catalog() -> Vec<ScenarioEntry> {
    let mut catalog: Vec<ScenarioEntry> = inventory::iter::<ScenarioEntry>.into_iter().cloned().collect();
    catalog.sort_by_key(|entry| entry.short_name);
    catalog
}

/// Collects validation outcomes, logging ✓/✗ lines as they come in
pub struct Validations {
    errors: Vec<String>,
}

impl Validations {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn check(&mut self, logger: &mut Logger, passed: bool, msg: String) {
        if passed {
            logln!(logger, LogEvent::Scenario, "✓ {}", msg);
        } else {
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
            self.errors.push(msg);
        }
    }

    /// Ok when every check passed, otherwise all failure messages joined
    pub fn finish(self) -> Result<(), Box<dyn Error>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.join("; ").into())
        }
    }
}

pub mod demo;
pub mod budget_exhaustion;
pub mod frequency_window;
pub mod concurrent_load;
