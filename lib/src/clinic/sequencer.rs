// lib/src/clinic/sequencer.rs

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};
use sled::transaction::TransactionalTree;
use sled::Tree;

use crate::clinic::clock::Clock;
use crate::storage_engine::storage_utils::TxResult;

/// Hands out the day's queue numbers.
///
/// Each service day has one counter row in `queue_counters` holding the last
/// number issued, as a big-endian `u64`. Numbers start at 1, are unique
/// within a day and are never reused, even after earlier tickets finish.
#[derive(Clone)]
pub struct QueueSequencer {
    counters: Tree,
    clock: Arc<dyn Clock>,
}

impl QueueSequencer {
    pub fn new(counters: Tree, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock }
    }

    /// The number the next registration today would receive. Never fails:
    /// an unreadable counter degrades to a timestamp-derived number.
    pub fn next_queue_number(&self) -> u32 {
        let day = self.clock.today();
        match self.counters.get(day_key(day)) {
            Ok(None) => 1,
            Ok(Some(raw)) => match decode_counter(&raw) {
                Some(last) => to_queue_number(last + 1),
                None => self.fallback_number(day, "counter row is corrupt"),
            },
            Err(e) => self.fallback_number(day, &e.to_string()),
        }
    }

    /// Bumps the counter for `day` inside the caller's transaction and
    /// returns the issued number.
    pub fn take_next(&self, counters: &TransactionalTree, day: NaiveDate) -> TxResult<u32> {
        let key = day_key(day);
        let next = match counters.get(key.as_bytes())? {
            None => 1,
            Some(raw) => match decode_counter(&raw) {
                Some(last) => last + 1,
                None => u64::from(self.fallback_number(day, "counter row is corrupt")),
            },
        };
        // A fallback also reseeds the counter so later numbers continue from it.
        counters.insert(key.as_bytes(), &next.to_be_bytes()[..])?;
        debug!("Issued queue number {} for {}", next, key);
        Ok(to_queue_number(next))
    }

    fn fallback_number(&self, day: NaiveDate, reason: &str) -> u32 {
        let millis = self.clock.now().timestamp_millis().rem_euclid(1000) as u32;
        let number = millis.max(1);
        warn!(
            "Queue counter for {} unavailable ({}); falling back to timestamp-derived number {}",
            day, reason, number
        );
        number
    }
}

pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn decode_counter(raw: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = raw.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

fn to_queue_number(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
