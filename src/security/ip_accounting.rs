//! Per-address open connection accounting.
//!
//! # Responsibilities
//! - Count currently-open connections per source address
//! - Admit a new connection only while its address is under the limit
//! - Drop an address entirely once its last connection is released
//!
//! # Design Decisions
//! - Check-and-increment runs under the DashMap shard lock via the entry API,
//!   so two admissions racing for the last slot of an address cannot both win
//! - Entries never sit at zero; memory is bounded by live connections

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Open connection counters keyed by source address.
#[derive(Debug, Default)]
pub struct IpAccounting {
    counts: DashMap<String, usize>,
}

impl IpAccounting {
    pub fn new() -> Self {
        Self {
            counts: DashMap::new(),
        }
    }

    /// Try to take one connection slot for `address`.
    /// Returns true if admitted, false if the address is at `limit`.
    pub fn try_acquire(&self, address: &str, limit: usize) -> bool {
        match self.counts.entry(address.to_string()) {
            Entry::Occupied(mut entry) => {
                let count = entry.get_mut();
                if *count < limit {
                    *count += 1;
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                if limit == 0 {
                    return false;
                }
                entry.insert(1);
                true
            }
        }
    }

    /// Give back one slot for `address`. No-op if the address is not tracked.
    pub fn release(&self, address: &str) {
        if let Entry::Occupied(mut entry) = self.counts.entry(address.to_string()) {
            if *entry.get() <= 1 {
                entry.remove();
            } else {
                *entry.get_mut() -= 1;
            }
        }
    }

    /// Current open connection count for `address` (0 when untracked).
    pub fn open_count(&self, address: &str) -> usize {
        self.counts.get(address).map(|c| *c.value()).unwrap_or(0)
    }

    /// Number of addresses with at least one open connection.
    pub fn tracked_addresses(&self) -> usize {
        self.counts.len()
    }

    /// Snapshot of every tracked address and its count.
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<_> = self
            .counts
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}
