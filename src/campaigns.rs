pub use crate::campaign::{Campaign, CampaignTargeting};
use crate::advertisers::Advertisers;
use crate::errors::{EngineError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct CampaignsInner {
    /// Creation order
    campaigns: Vec<Arc<Campaign>>,
    index: HashMap<String, usize>,
    next_sequence: u64,
}

/// Container for campaigns, kept in creation order
/// Ids are assigned as `CAMP_1`, `CAMP_2`, ...
pub struct Campaigns {
    inner: RwLock<CampaignsInner>,
}

impl Campaigns {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CampaignsInner {
                campaigns: Vec::new(),
                index: HashMap::new(),
                next_sequence: 1,
            }),
        }
    }

    /// Create a campaign for an existing advertiser
    ///
    /// # Arguments
    /// * `advertisers` - Registry the owning advertiser must be present in
    /// * `advertiser_id` - Owning advertiser
    /// * `bid_amount` - Amount charged per serving, must be finite and positive
    /// * `url` - Destination URL
    /// * `content_type` - Creative type tag (banner, video, ...)
    /// * `targeting` - Targeting criteria
    ///
    /// # Returns
    /// The campaign_id of the just added campaign
    pub fn add(&self, advertisers: &Advertisers, advertiser_id: &str, bid_amount: f64, url: String, content_type: String, targeting: CampaignTargeting) -> Result<String> {
        if !advertisers.contains(advertiser_id) {
            return Err(EngineError::InvalidCampaign {
                reason: format!("advertiser {} does not exist", advertiser_id),
            });
        }
        if !bid_amount.is_finite() || bid_amount <= 0.0 {
            return Err(EngineError::InvalidCampaign {
                reason: format!("bid amount must be positive, got {}", bid_amount),
            });
        }

        let mut inner = self.inner.write();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        let campaign_id = format!("CAMP_{}", sequence);
        let campaign = Campaign {
            campaign_id: campaign_id.clone(),
            advertiser_id: advertiser_id.to_string(),
            bid_amount,
            url,
            content_type,
            targeting,
            active: true,
            sequence,
        };
        let position = inner.campaigns.len();
        inner.campaigns.push(Arc::new(campaign));
        inner.index.insert(campaign_id.clone(), position);
        Ok(campaign_id)
    }

    pub fn get(&self, campaign_id: &str) -> Option<Arc<Campaign>> {
        let inner = self.inner.read();
        inner.index.get(campaign_id).map(|&position| inner.campaigns[position].clone())
    }

    /// Flip the active flag; existing snapshots keep the old value
    pub fn set_active(&self, campaign_id: &str, active: bool) -> Result<()> {
        let mut inner = self.inner.write();
        let position = *inner.index.get(campaign_id).ok_or_else(|| EngineError::UnknownCampaign {
            campaign_id: campaign_id.to_string(),
        })?;
        let slot = &mut inner.campaigns[position];
        if slot.active != active {
            let mut updated = (**slot).clone();
            updated.active = active;
            *slot = Arc::new(updated);
        }
        Ok(())
    }

    /// All campaigns in creation order
    pub fn snapshot(&self) -> Vec<Arc<Campaign>> {
        self.inner.read().campaigns.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Campaigns {
    fn default() -> Self {
        Self::new()
    }
}
