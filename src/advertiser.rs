use std::sync::atomic::{AtomicU64, Ordering};

/// Budget-holding entity that owns campaigns
///
/// The budget is an `f64` kept as raw bits in an `AtomicU64`, so credits and
/// debits are lock-free compare-exchange loops and never block a caller.
#[derive(Debug)]
pub struct Advertiser {
    pub advertiser_id: String,
    pub name: String,
    budget_bits: AtomicU64,
}

impl Advertiser {
    /// New advertiser starting with a zero budget
    pub fn new(advertiser_id: String, name: String) -> Self {
        Self {
            advertiser_id,
            name,
            budget_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    pub fn budget(&self) -> f64 {
        f64::from_bits(self.budget_bits.load(Ordering::Acquire))
    }

    /// Unconditionally add `amount` and return the new balance
    /// Amount validation is the caller's job (see `Advertisers::credit`)
    pub fn credit(&self, amount: f64) -> f64 {
        let mut current = self.budget_bits.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + amount).to_bits();
            match self.budget_bits.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return f64::from_bits(next),
                Err(observed) => current = observed,
            }
        }
    }

    /// Subtract `amount` only if the balance covers it
    ///
    /// # Returns
    /// `true` if the deduction was applied, `false` if funds were insufficient
    pub fn debit(&self, amount: f64) -> bool {
        let mut current = self.budget_bits.load(Ordering::Acquire);
        loop {
            let balance = f64::from_bits(current);
            // Negated comparison so a NaN amount is refused too
            if !(balance >= amount) || amount < 0.0 {
                return false;
            }
            // Rounding must never take the balance below zero
            let next = (balance - amount).max(0.0).to_bits();
            match self.budget_bits.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}
