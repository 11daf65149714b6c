//! Site policy registry (§4.C): the coordinator's belief about what policies
//! are currently in force at the authority.
//!
//! Two-layer locking per §5: a [`parking_lot::RwLock`] guards the outer
//! `site -> slice` map with short, synchronous critical sections (look up or
//! lazily insert a site's slice); a [`tokio::sync::Mutex`] guards each site's
//! slice itself and is held across the `.await` points of a whole
//! reconciliation (get_targets -> plan -> execute), so concurrent SiteVisits
//! for the same site serialize, while different sites never block each
//! other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::policy::{Action, PolicyId, SiteId, Species};

/// What the registry believes the authority currently has in force for one
/// species at one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEntry {
    pub policy_id: PolicyId,
    pub action: Action,
}

impl PolicyEntry {
    #[must_use]
    pub fn new(policy_id: PolicyId, action: Action) -> Self {
        Self { policy_id, action }
    }
}

/// Slice of the registry for a single site: `species -> current policy`.
pub type SiteSlice = HashMap<Species, PolicyEntry>;

#[derive(Debug, Default)]
pub struct PolicyRegistry {
    sites: RwLock<HashMap<SiteId, Arc<Mutex<SiteSlice>>>>,
}

impl PolicyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the per-site lock for `site`, creating an empty slice on
    /// first observation of that site (§4.C: "entries are created lazily").
    ///
    /// The handler is expected to `.lock().await` the result and hold it for
    /// the whole reconciliation; the outer [`RwLock`] is only ever held for
    /// the duration of this lookup.
    #[must_use]
    pub fn site_lock(&self, site: SiteId) -> Arc<Mutex<SiteSlice>> {
        if let Some(slice) = self.sites.read().get(&site) {
            return slice.clone();
        }

        self.sites
            .write()
            .entry(site)
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .clone()
    }
}
