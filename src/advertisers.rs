use crate::advertiser::Advertiser;
use crate::errors::{EngineError, Result};
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Container for advertisers keyed by advertiser id
///
/// The map lock only guards membership. Budget changes go through the
/// advertiser's own atomic, so top-ups never wait on the map.
pub struct Advertisers {
    advertisers: RwLock<HashMap<String, Arc<Advertiser>>>,
}

impl Advertisers {
    pub fn new() -> Self {
        Self {
            advertisers: RwLock::new(HashMap::new()),
        }
    }

    /// Register an advertiser under a generated `ADV_xxxxxxxx` id
    ///
    /// # Returns
    /// The advertiser_id of the just added advertiser
    pub fn add(&self, name: String) -> String {
        let mut rng = rand::thread_rng();
        let mut advertisers = self.advertisers.write();
        let advertiser_id = loop {
            let candidate = format!("ADV_{:08x}", rng.gen::<u32>());
            if !advertisers.contains_key(&candidate) {
                break candidate;
            }
        };
        advertisers.insert(advertiser_id.clone(), Arc::new(Advertiser::new(advertiser_id.clone(), name)));
        advertiser_id
    }

    /// Register an advertiser under a caller-supplied id
    pub fn add_with_id(&self, advertiser_id: String, name: String) -> Result<String> {
        let mut advertisers = self.advertisers.write();
        if advertisers.contains_key(&advertiser_id) {
            return Err(EngineError::DuplicateAdvertiser { advertiser_id });
        }
        advertisers.insert(advertiser_id.clone(), Arc::new(Advertiser::new(advertiser_id.clone(), name)));
        Ok(advertiser_id)
    }

    pub fn get(&self, advertiser_id: &str) -> Option<Arc<Advertiser>> {
        self.advertisers.read().get(advertiser_id).cloned()
    }

    pub fn contains(&self, advertiser_id: &str) -> bool {
        self.advertisers.read().contains_key(advertiser_id)
    }

    pub fn len(&self) -> usize {
        self.advertisers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current balance, `None` for an unknown advertiser
    pub fn budget(&self, advertiser_id: &str) -> Option<f64> {
        self.get(advertiser_id).map(|advertiser| advertiser.budget())
    }

    /// True when the advertiser exists and can currently afford `amount`
    pub fn can_afford(&self, advertiser_id: &str, amount: f64) -> bool {
        self.budget(advertiser_id).is_some_and(|budget| budget >= amount)
    }

    /// Add `amount` to an advertiser's budget
    ///
    /// # Returns
    /// The new balance
    pub fn credit(&self, advertiser_id: &str, amount: f64) -> Result<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(EngineError::InvalidAmount { amount });
        }
        let advertiser = self.get(advertiser_id).ok_or_else(|| EngineError::UnknownAdvertiser {
            advertiser_id: advertiser_id.to_string(),
        })?;
        Ok(advertiser.credit(amount))
    }

    /// Conditionally subtract `amount`
    /// Insufficient funds and unknown advertisers both return `false`: neither is exceptional here
    pub fn debit(&self, advertiser_id: &str, amount: f64) -> bool {
        match self.get(advertiser_id) {
            Some(advertiser) => advertiser.debit(amount),
            None => false,
        }
    }
}

impl Default for Advertisers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_have_prefix_and_are_unique() {
        let advertisers = Advertisers::new();
        let a = advertisers.add("TechCorp".to_string());
        let b = advertisers.add("FashionBrand".to_string());

        assert!(a.starts_with("ADV_"));
        assert_eq!(a.len(), "ADV_".len() + 8);
        assert_ne!(a, b);
        assert_eq!(advertisers.len(), 2);
        assert_eq!(advertisers.get(&a).unwrap().name, "TechCorp");
    }

    #[test]
    fn test_duplicate_supplied_id_is_rejected() {
        let advertisers = Advertisers::new();
        advertisers.add_with_id("ADV_fixed".to_string(), "First".to_string()).unwrap();

        let err = advertisers.add_with_id("ADV_fixed".to_string(), "Second".to_string()).unwrap_err();

        assert_eq!(err, EngineError::DuplicateAdvertiser { advertiser_id: "ADV_fixed".to_string() });
        assert_eq!(advertisers.get("ADV_fixed").unwrap().name, "First");
    }

    #[test]
    fn test_credit_validates_amount_and_advertiser() {
        let advertisers = Advertisers::new();
        let id = advertisers.add("TechCorp".to_string());

        assert_eq!(advertisers.credit(&id, 0.0), Err(EngineError::InvalidAmount { amount: 0.0 }));
        assert_eq!(advertisers.credit(&id, -5.0), Err(EngineError::InvalidAmount { amount: -5.0 }));
        assert!(matches!(advertisers.credit(&id, f64::NAN), Err(EngineError::InvalidAmount { .. })));
        assert_eq!(
            advertisers.credit("ADV_missing", 5.0),
            Err(EngineError::UnknownAdvertiser { advertiser_id: "ADV_missing".to_string() })
        );
        assert_eq!(advertisers.credit(&id, 1000.0), Ok(1000.0));
        assert_eq!(advertisers.budget(&id), Some(1000.0));
    }

    #[test]
    fn test_debit_outcomes() {
        let advertisers = Advertisers::new();
        let id = advertisers.add("TechCorp".to_string());
        advertisers.credit(&id, 30.0).unwrap();

        assert!(advertisers.can_afford(&id, 30.0));
        assert!(advertisers.debit(&id, 20.0));
        assert!(!advertisers.debit(&id, 20.0));
        assert!(!advertisers.debit("ADV_missing", 1.0));
        assert_eq!(advertisers.budget(&id), Some(10.0));
        assert_eq!(advertisers.budget("ADV_missing"), None);
    }
}
