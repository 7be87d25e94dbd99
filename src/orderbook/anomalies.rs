//! Counters for feed inconsistencies that the books tolerate.
//!
//! None of these stop processing. Each one means the upstream feed said
//! something the reconstructed state could not fully honour, so every
//! recording is also logged and pushed to the metrics facade.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::orderbook::types::{Price, Quantity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAnomalies {
    /// Change for a price the ladder never saw, applied as New
    pub unknown_level_changes: u64,
    /// Delete for a price the ladder does not hold
    pub unknown_level_deletes: u64,
    /// New for a price the ladder already holds
    pub duplicate_level_inserts: u64,
    /// Shrink that exceeded the opaque quantity queued at a level
    pub unabsorbed_cleans: u64,
    /// Decrement that would have driven a level quantity negative
    pub clamped_quantities: u64,
}

impl FeedAnomalies {
    pub fn total(&self) -> u64 {
        self.unknown_level_changes
            + self.unknown_level_deletes
            + self.duplicate_level_inserts
            + self.unabsorbed_cleans
            + self.clamped_quantities
    }

    pub fn merge(&self, other: &FeedAnomalies) -> FeedAnomalies {
        FeedAnomalies {
            unknown_level_changes: self.unknown_level_changes + other.unknown_level_changes,
            unknown_level_deletes: self.unknown_level_deletes + other.unknown_level_deletes,
            duplicate_level_inserts: self.duplicate_level_inserts + other.duplicate_level_inserts,
            unabsorbed_cleans: self.unabsorbed_cleans + other.unabsorbed_cleans,
            clamped_quantities: self.clamped_quantities + other.clamped_quantities,
        }
    }

    pub(crate) fn record_unknown_change(&mut self, price: Price) {
        self.unknown_level_changes += 1;
        warn!("Change for unseen price {}, inserting as new level", price);
        counter!("feed_anomalies_total", "kind" => "unknown_change").increment(1);
    }

    pub(crate) fn record_unknown_delete(&mut self, price: Price) {
        self.unknown_level_deletes += 1;
        warn!("Delete for unseen price {}, ignored", price);
        counter!("feed_anomalies_total", "kind" => "unknown_delete").increment(1);
    }

    pub(crate) fn record_duplicate_insert(&mut self, price: Price) {
        self.duplicate_level_inserts += 1;
        warn!("New for existing price {}, overwriting level", price);
        counter!("feed_anomalies_total", "kind" => "duplicate_insert").increment(1);
    }

    pub(crate) fn record_unabsorbed_clean(&mut self, price: Price, leftover: Quantity) {
        self.unabsorbed_cleans += 1;
        warn!(
            "Level {} shrank by {} more than its opaque quantity",
            price, leftover
        );
        counter!("feed_anomalies_total", "kind" => "unabsorbed_clean").increment(1);
    }

    pub(crate) fn record_clamp(&mut self, price: Price, shortfall: Quantity) {
        self.clamped_quantities += 1;
        warn!(
            "Level {} quantity would go negative by {}, clamped to zero",
            price, shortfall
        );
        counter!("feed_anomalies_total", "kind" => "clamped_quantity").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_total() {
        let mut a = FeedAnomalies::default();
        a.record_unknown_change(100);
        a.record_unabsorbed_clean(100, 5);

        let mut b = FeedAnomalies::default();
        b.record_unknown_delete(101);

        let merged = a.merge(&b);
        assert_eq!(merged.unknown_level_changes, 1);
        assert_eq!(merged.unknown_level_deletes, 1);
        assert_eq!(merged.unabsorbed_cleans, 1);
        assert_eq!(merged.total(), 3);
    }
}
