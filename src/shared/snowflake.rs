//! Snowflake ID Generator
//!
//! Twitter-style distributed unique ID generation.
//!
//! ```text
//! 63                         22          17          12          0
//! +---------------------------+-----------+-----------+-----------+
//! |  ms since epoch (41 bits) |  machine  |   node    |  sequence |
//! +---------------------------+-----------+-----------+-----------+
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Default epoch (2024-01-01T00:00:00.000Z)
pub const DEFAULT_EPOCH: u64 = 1_704_067_200_000;

const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    epoch: u64,
    machine_id: u64,
    node_id: u64,
    /// Packed `(last_timestamp << 12) | sequence`
    state: AtomicU64,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator using the default epoch
    pub fn new(machine_id: u64, node_id: u64) -> Self {
        Self::with_epoch(DEFAULT_EPOCH, machine_id, node_id)
    }

    /// Create a generator with a custom epoch in milliseconds
    pub fn with_epoch(epoch: u64, machine_id: u64, node_id: u64) -> Self {
        Self {
            epoch,
            machine_id: machine_id & 0x1F,
            node_id: node_id & 0x1F,
            state: AtomicU64::new(0),
        }
    }

    /// Generate a new snowflake ID
    ///
    /// Never goes backwards: if the wall clock regresses, the last seen
    /// timestamp keeps being used until the sequence runs out.
    pub fn generate(&self) -> i64 {
        loop {
            let now = current_timestamp();
            let prev = self.state.load(Ordering::Acquire);
            let prev_ts = prev >> SEQUENCE_BITS;
            let prev_seq = prev & SEQUENCE_MASK;

            let (ts, seq) = if now > prev_ts {
                (now, 0)
            } else if prev_seq < SEQUENCE_MASK {
                (prev_ts, prev_seq + 1)
            } else {
                (prev_ts + 1, 0)
            };

            let next = (ts << SEQUENCE_BITS) | seq;
            if self
                .state
                .compare_exchange(prev, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let id = (ts.saturating_sub(self.epoch) << 22)
                    | (self.machine_id << 17)
                    | (self.node_id << 12)
                    | seq;
                return id as i64;
            }
        }
    }

    /// Extract the unix timestamp (ms) from an id produced by this generator
    pub fn timestamp_of(&self, snowflake: i64) -> u64 {
        ((snowflake as u64) >> 22) + self.epoch
    }
}

fn current_timestamp() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_generate_unique() {
        let gen = SnowflakeGenerator::new(1, 1);
        let id1 = gen.generate();
        let id2 = gen.generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_monotonic() {
        let gen = SnowflakeGenerator::new(1, 0);
        let mut last = gen.generate();
        for _ in 0..10_000 {
            let next = gen.generate();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_generate_unique_across_threads() {
        let gen = Arc::new(SnowflakeGenerator::new(3, 2));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || (0..2_000).map(|_| gen.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
    }

    #[test]
    fn test_extract_timestamp() {
        let gen = SnowflakeGenerator::new(1, 1);
        let id = gen.generate();
        let ts = gen.timestamp_of(id);
        let now = current_timestamp();
        assert!(ts <= now + 5);
        assert!(ts + 1000 > now);
    }
}
