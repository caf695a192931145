// ── Correlation tracker ──
//
// Pairs fire-and-forget commands with the push events that answer
// them. The hub acknowledges scans and claims with `{"status":
// "started"}` and reports the outcome later on the event stream; this
// module keeps the in-between state explicit.

use std::sync::{Mutex, PoisonError};

use meshly_api::DiscoveredDevice;

use crate::error::CoreError;

/// Lifecycle of one fire-and-forget operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OpState<T> {
    #[default]
    Idle,
    Outstanding(T),
}

impl<T> OpState<T> {
    fn is_outstanding(&self) -> bool {
        matches!(self, Self::Outstanding(_))
    }
}

#[derive(Debug, Default)]
struct Inner {
    mesh_scan: OpState<()>,
    unassoc_scan: OpState<()>,
    /// Token is the uuid hash of the device being claimed.
    claim: OpState<u32>,
    /// Last mesh discovery results, kept until the next scan or reset.
    mesh_candidates: Vec<DiscoveredDevice>,
    /// Unassociated-device uuid hashes from the last scan.
    unassoc_candidates: Vec<u32>,
}

/// Parse a `0x`-prefixed hex uuid hash as the hub prints them.
pub fn parse_uuid_hash(text: &str) -> Option<u32> {
    let hex = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    u32::from_str_radix(hex, 16).ok()
}

/// Tracks outstanding scans and claims.
///
/// At most one operation of each kind may be in flight: starting a
/// second is rejected rather than silently replacing the first, so a
/// late result can never be attributed to the wrong request.
#[derive(Debug, Default)]
pub struct CorrelationTracker {
    inner: Mutex<Inner>,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mesh discovery scan ──────────────────────────────────────────

    /// Arm the mesh discovery scan. Fails if one is already running.
    pub fn begin_mesh_scan(&self) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if inner.mesh_scan.is_outstanding() {
            return Err(CoreError::ScanPending { kind: "mesh discovery" });
        }
        inner.mesh_scan = OpState::Outstanding(());
        inner.mesh_candidates.clear();
        Ok(())
    }

    /// Record discovery results and disarm the scan. Results arriving
    /// with no scan outstanding are stored anyway -- the hub may push
    /// them to a session that joined mid-scan.
    pub fn complete_mesh_scan(&self, devices: Vec<DiscoveredDevice>) {
        let mut inner = self.lock();
        inner.mesh_scan = OpState::Idle;
        inner.mesh_candidates = devices;
    }

    /// Disarm after a transport failure so a retry is possible.
    pub fn abort_mesh_scan(&self) {
        self.lock().mesh_scan = OpState::Idle;
    }

    pub fn mesh_scan_outstanding(&self) -> bool {
        self.lock().mesh_scan.is_outstanding()
    }

    pub fn mesh_candidates(&self) -> Vec<DiscoveredDevice> {
        self.lock().mesh_candidates.clone()
    }

    // ── Unassociated-device scan ─────────────────────────────────────

    /// Arm the unassociated-device scan. Fails if one is already running.
    pub fn begin_unassoc_scan(&self) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if inner.unassoc_scan.is_outstanding() {
            return Err(CoreError::ScanPending { kind: "unassociated-device" });
        }
        inner.unassoc_scan = OpState::Outstanding(());
        inner.unassoc_candidates.clear();
        Ok(())
    }

    /// Record scan results (uuid hashes) and disarm.
    pub fn complete_unassoc_scan(&self, hashes: Vec<u32>) {
        let mut inner = self.lock();
        inner.unassoc_scan = OpState::Idle;
        inner.unassoc_candidates = hashes;
    }

    pub fn abort_unassoc_scan(&self) {
        self.lock().unassoc_scan = OpState::Idle;
    }

    pub fn unassoc_scan_outstanding(&self) -> bool {
        self.lock().unassoc_scan.is_outstanding()
    }

    pub fn unassoc_candidates(&self) -> Vec<u32> {
        self.lock().unassoc_candidates.clone()
    }

    // ── Claim ────────────────────────────────────────────────────────

    /// Arm a claim for the given uuid hash. Fails if another claim is
    /// still unresolved.
    pub fn begin_claim(&self, uuid_hash: u32) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if let OpState::Outstanding(pending) = inner.claim {
            return Err(CoreError::ClaimPending(pending));
        }
        inner.claim = OpState::Outstanding(uuid_hash);
        Ok(())
    }

    /// Resolve the outstanding claim. On success the claimed hash is
    /// removed from the unassociated candidates; on failure the
    /// candidate stays listed for another attempt. Returns the token
    /// the claim was armed with, or `None` if nothing was outstanding.
    pub fn resolve_claim(&self, success: bool) -> Option<u32> {
        let mut inner = self.lock();
        let OpState::Outstanding(token) = inner.claim else {
            return None;
        };
        inner.claim = OpState::Idle;
        if success {
            inner.unassoc_candidates.retain(|&h| h != token);
        }
        Some(token)
    }

    /// Disarm after a transport failure so a retry is possible.
    pub fn abort_claim(&self) {
        self.lock().claim = OpState::Idle;
    }

    pub fn claim_outstanding(&self) -> Option<u32> {
        match self.lock().claim {
            OpState::Outstanding(token) => Some(token),
            OpState::Idle => None,
        }
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Forget everything. Called on (re)connect: results for
    /// operations started in a previous session will never arrive.
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = Inner::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn discovered(id: u16) -> DiscoveredDevice {
        DiscoveredDevice {
            device_id: id,
            fw: "2.1.0".into(),
            vendor_id: 0x0a,
            csr_product_id: 134,
            known: false,
        }
    }

    #[test]
    fn second_scan_is_rejected_while_outstanding() {
        let tracker = CorrelationTracker::new();
        tracker.begin_mesh_scan().unwrap();
        assert!(matches!(
            tracker.begin_mesh_scan(),
            Err(CoreError::ScanPending { .. })
        ));

        tracker.complete_mesh_scan(vec![discovered(12)]);
        tracker.begin_mesh_scan().unwrap();
    }

    #[test]
    fn scan_kinds_are_independent() {
        let tracker = CorrelationTracker::new();
        tracker.begin_mesh_scan().unwrap();
        tracker.begin_unassoc_scan().unwrap();
        assert!(tracker.mesh_scan_outstanding());
        assert!(tracker.unassoc_scan_outstanding());
    }

    #[test]
    fn abort_reopens_the_scan() {
        let tracker = CorrelationTracker::new();
        tracker.begin_unassoc_scan().unwrap();
        tracker.abort_unassoc_scan();
        tracker.begin_unassoc_scan().unwrap();
    }

    #[test]
    fn successful_claim_removes_its_candidate_only() {
        let tracker = CorrelationTracker::new();
        tracker.complete_unassoc_scan(vec![0xdead_beef, 0x00c0_ffee]);

        tracker.begin_claim(0x00c0_ffee).unwrap();
        assert_eq!(tracker.resolve_claim(true), Some(0x00c0_ffee));
        assert_eq!(tracker.unassoc_candidates(), vec![0xdead_beef]);
    }

    #[test]
    fn failed_claim_keeps_the_candidate() {
        let tracker = CorrelationTracker::new();
        tracker.complete_unassoc_scan(vec![0x00c0_ffee]);

        tracker.begin_claim(0x00c0_ffee).unwrap();
        assert_eq!(tracker.resolve_claim(false), Some(0x00c0_ffee));
        assert_eq!(tracker.unassoc_candidates(), vec![0x00c0_ffee]);

        // Retry is allowed once resolved.
        tracker.begin_claim(0x00c0_ffee).unwrap();
    }

    #[test]
    fn concurrent_claim_is_rejected() {
        let tracker = CorrelationTracker::new();
        tracker.begin_claim(1).unwrap();
        assert!(matches!(tracker.begin_claim(2), Err(CoreError::ClaimPending(1))));
    }

    #[test]
    fn stray_resolution_is_ignored() {
        let tracker = CorrelationTracker::new();
        assert_eq!(tracker.resolve_claim(true), None);
    }

    #[test]
    fn reset_clears_all_state() {
        let tracker = CorrelationTracker::new();
        tracker.begin_mesh_scan().unwrap();
        tracker.begin_claim(5).unwrap();
        tracker.complete_unassoc_scan(vec![1, 2]);

        tracker.reset();
        assert!(!tracker.mesh_scan_outstanding());
        assert!(tracker.claim_outstanding().is_none());
        assert!(tracker.unassoc_candidates().is_empty());
        tracker.begin_mesh_scan().unwrap();
    }

    #[test]
    fn parses_hub_formatted_hashes() {
        assert_eq!(parse_uuid_hash("0x00c0ffee"), Some(0x00c0_ffee));
        assert_eq!(parse_uuid_hash("0XDEADBEEF"), Some(0xdead_beef));
        assert_eq!(parse_uuid_hash("c0ffee"), None);
        assert_eq!(parse_uuid_hash("0xzzzz"), None);
    }
}
