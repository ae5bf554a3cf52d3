//!
//! In-memory ticket bookkeeping: logins revoked through CAS single logout,
//! and proxy-granting tickets waiting to be picked up by their IOU.
//!

use {
    dashmap::DashMap,
    std::{
        sync::Arc,
        time::{Duration, Instant},
    },
};

/// How long a revoked login is remembered. Sessions outlive this only when
/// the inactivity timeout is longer.
const REVOCATION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// A PGT callback arrives before the validation response that names its IOU.
const PGT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default)]
pub struct TicketRegistry {
    revoked: Arc<DashMap<String, Instant>>,
}

impl TicketRegistry {
    pub fn revoke(&self, login_id: &str) {
        self.revoked.insert(login_id.to_string(), Instant::now());
    }

    pub fn is_revoked(&self, login_id: &str) -> bool {
        self.revoked.contains_key(login_id)
    }

    pub fn prune(&self) {
        self.revoked
            .retain(|_, revoked| revoked.elapsed() < REVOCATION_TTL);
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PgtStore {
    tickets: Arc<DashMap<String, (Instant, String)>>,
}

impl PgtStore {
    pub fn insert(&self, iou: &str, pgt: &str) {
        self.tickets
            .insert(iou.to_string(), (Instant::now(), pgt.to_string()));
    }

    /// Removes and returns the PGT registered under `iou`.
    pub fn take(&self, iou: &str) -> Option<String> {
        self.tickets
            .remove(iou)
            .filter(|(_, (stored, _))| stored.elapsed() < PGT_TTL)
            .map(|(_, (_, pgt))| pgt)
    }

    pub fn prune(&self) {
        self.tickets.retain(|_, (stored, _)| stored.elapsed() < PGT_TTL);
    }
}
