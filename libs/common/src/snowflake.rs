use std::sync::Mutex;

use chrono::Utc;

/// Timestamps count from 2025-01-01T00:00:00Z, stored as Unix millis.
const BANTER_EPOCH_MS: u64 = 1_735_689_600_000;

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;

const TIMESTAMP_SHIFT: u64 = WORKER_BITS + SEQUENCE_BITS;
const WORKER_SHIFT: u64 = SEQUENCE_BITS;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Issue position: the millisecond we last minted in and the per-ms counter.
struct Cursor {
    at_ms: u64,
    seq: u64,
}

/// 64-bit time-ordered ID generator.
///
/// An ID packs 42 bits of milliseconds since the Banter epoch, 10 bits of
/// worker ID and a 12-bit per-millisecond sequence, so IDs sort by creation
/// time and a single worker can mint 4096 per millisecond.
pub struct SnowflakeGenerator {
    worker_id: u64,
    cursor: Mutex<Cursor>,
}

impl SnowflakeGenerator {
    pub fn new(worker_id: u16) -> Self {
        assert!(
            (worker_id as u64) < (1 << WORKER_BITS),
            "worker_id must fit in {WORKER_BITS} bits"
        );
        Self {
            worker_id: worker_id as u64,
            cursor: Mutex::new(Cursor { at_ms: 0, seq: 0 }),
        }
    }

    pub fn generate(&self) -> i64 {
        let mut cursor = self.cursor.lock().unwrap();

        // A clock that jumps backwards must not reorder IDs; hold the line
        // at the last millisecond we minted in until real time catches up.
        let mut now_ms = clock_ms().max(cursor.at_ms);

        if now_ms == cursor.at_ms {
            cursor.seq = (cursor.seq + 1) & SEQUENCE_MASK;
            if cursor.seq == 0 {
                // 4096 IDs inside one millisecond; wait out the remainder.
                while now_ms <= cursor.at_ms {
                    now_ms = clock_ms();
                }
            }
        } else {
            cursor.seq = 0;
        }
        cursor.at_ms = now_ms;

        let elapsed = now_ms - BANTER_EPOCH_MS;
        ((elapsed << TIMESTAMP_SHIFT) | (self.worker_id << WORKER_SHIFT) | cursor.seq) as i64
    }
}

fn clock_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Recover the mint time (ms since Unix epoch) packed into an ID.
pub fn snowflake_timestamp_ms(id: i64) -> u64 {
    ((id as u64) >> TIMESTAMP_SHIFT) + BANTER_EPOCH_MS
}
