use admatch::logger::{sanitize_filename, ConsoleReceiver, FileReceiver, LogEvent};
use admatch::AdEngine;
use rand_distr::{LogNormal, NormalError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Seed for scenario randomness, set by the host to the iteration index
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// Match requests issued by scenarios since the host last reset the counter
pub static TOTAL_MATCH_REQUESTS: AtomicU64 = AtomicU64::new(0);

/// Mirror engine ledger and allocation lines on the console
pub static VERBOSE_ENGINE: AtomicBool = AtomicBool::new(false);

/// Convert mean and standard deviation to log-normal distribution parameters
/// Returns (μ, σ) for LogNormal(μ, σ) with the given mean and stddev
///
/// - σ = sqrt(ln(1 + s²/m²))
/// - μ = ln(m) - σ²/2
fn lognormal_from_mean_stddev(mean: f64, stddev: f64) -> (f64, f64) {
    let sigma_squared = (1.0 + (stddev * stddev) / (mean * mean)).ln();
    (mean.ln() - sigma_squared / 2.0, sigma_squared.sqrt())
}

/// Log-normal distribution from mean and standard deviation, used for bid amounts
pub fn lognormal_dist(mean: f64, stddev: f64) -> Result<LogNormal<f64>, NormalError> {
    let (mu, sigma) = lognormal_from_mean_stddev(mean, stddev);
    LogNormal::new(mu, sigma)
}

/// Route an engine's own log lines to `log/<scenario>/engine.log`, and to the console when verbose
pub fn attach_engine_logging(engine: &AdEngine, scenario_name: &str) -> std::io::Result<()> {
    let path = PathBuf::from(format!("log/{}/engine.log", sanitize_filename(scenario_name)));
    engine.add_log_receiver(FileReceiver::new(&path, vec![LogEvent::Ledger, LogEvent::Allocation, LogEvent::Registry])?);
    if VERBOSE_ENGINE.load(Ordering::Relaxed) {
        engine.add_log_receiver(ConsoleReceiver::new(vec![LogEvent::Ledger, LogEvent::Allocation]));
    }
    Ok(())
}

/// Issue a match request and count it
pub fn serve(engine: &AdEngine, user_id: &str, city: &str) -> admatch::ServeResult {
    TOTAL_MATCH_REQUESTS.fetch_add(1, Ordering::Relaxed);
    engine.match_and_allocate(user_id, city)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::Distribution;

    #[test]
    fn test_lognormal_dist_has_requested_mean() {
        let dist = lognormal_dist(20.0, 5.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let mean = (0..n).map(|_| dist.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 20.0).abs() < 0.5, "mean {}", mean);
    }
}
