//! Sequential (time-ordered) identifier generator.
//!
//! # Responsibility
//! - Combine a 0.1 ms resolution timestamp with random bits.
//! - Support a time-first layout (raw byte order) and a time-last layout
//!   (engines that order 128-bit values by their trailing bytes).
//!
//! # Invariants
//! - The timestamp occupies exactly 6 bytes, most-significant byte first.
//! - Ten random bytes survive in both layouts.
//! - Two identifiers in the same tick differ only by their random bits;
//!   uniqueness is probabilistic.

use super::EntityId;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// 100 ns ticks between 1900-01-01T00:00:00Z and the unix epoch.
const EPOCH_1900_OFFSET_TICKS: u128 = 2_208_988_800 * 10_000_000;
/// Ticks are divided by this to get 0.1 ms resolution.
const TICKS_PER_UNIT: u128 = 1_000;
const TIMESTAMP_BYTES: usize = 6;
const TIMESTAMP_MASK: u64 = (1 << (TIMESTAMP_BYTES * 8)) - 1;
const RANDOM_BYTES_KEPT: usize = 16 - TIMESTAMP_BYTES;

/// Where the timestamp lives inside the 16 identifier bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampLayout {
    /// Timestamp in bytes 0..6; ascending under raw byte ordering.
    TimeFirst,
    /// Timestamp in bytes 10..16; ascending for engines that compare the
    /// trailing bytes first.
    #[default]
    TimeLast,
}

/// Returns the current timestamp in 0.1 ms units since 1900-01-01 (UTC),
/// truncated to the low 48 bits.
pub fn current_timestamp() -> u64 {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() / 100)
        .unwrap_or(0);
    let units = (since_unix + EPOCH_1900_OFFSET_TICKS) / TICKS_PER_UNIT;
    (units as u64) & TIMESTAMP_MASK
}

/// Generates a new sequential identifier for the given layout.
pub fn new_sequential_id(layout: TimestampLayout) -> EntityId {
    encode_sequential_id(layout, current_timestamp(), *Uuid::new_v4().as_bytes())
}

/// Builds an identifier from an explicit timestamp and random source.
///
/// Only the low 48 bits of `timestamp` are used.
///
/// - `TimeFirst`: random bytes `0..10` shift down to `6..16`; the last six
///   random bytes are discarded.
/// - `TimeLast`: random bytes `0..10` stay in place; bytes `10..16` are
///   replaced by the timestamp.
pub fn encode_sequential_id(
    layout: TimestampLayout,
    timestamp: u64,
    random: [u8; 16],
) -> EntityId {
    let stamp = timestamp_bytes(timestamp);
    let mut bytes = [0_u8; 16];

    match layout {
        TimestampLayout::TimeFirst => {
            bytes[..TIMESTAMP_BYTES].copy_from_slice(&stamp);
            bytes[TIMESTAMP_BYTES..].copy_from_slice(&random[..RANDOM_BYTES_KEPT]);
        }
        TimestampLayout::TimeLast => {
            bytes[..RANDOM_BYTES_KEPT].copy_from_slice(&random[..RANDOM_BYTES_KEPT]);
            bytes[RANDOM_BYTES_KEPT..].copy_from_slice(&stamp);
        }
    }

    Uuid::from_bytes(bytes)
}

/// Extracts the 48-bit timestamp embedded by [`encode_sequential_id`].
pub fn sequential_timestamp(id: EntityId, layout: TimestampLayout) -> u64 {
    let bytes = id.as_bytes();
    let range = match layout {
        TimestampLayout::TimeFirst => 0..TIMESTAMP_BYTES,
        TimestampLayout::TimeLast => RANDOM_BYTES_KEPT..16,
    };

    bytes[range]
        .iter()
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn timestamp_bytes(timestamp: u64) -> [u8; TIMESTAMP_BYTES] {
    let full = (timestamp & TIMESTAMP_MASK).to_be_bytes();
    let mut stamp = [0_u8; TIMESTAMP_BYTES];
    stamp.copy_from_slice(&full[8 - TIMESTAMP_BYTES..]);
    stamp
}

#[cfg(test)]
mod tests {
    use super::{
        current_timestamp, encode_sequential_id, new_sequential_id, sequential_timestamp,
        TimestampLayout, TIMESTAMP_MASK,
    };

    const RANDOM: [u8; 16] = [
        0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xab, 0xac, 0xad, 0xae,
        0xaf,
    ];

    #[test]
    fn time_first_writes_timestamp_into_leading_bytes() {
        let id = encode_sequential_id(TimestampLayout::TimeFirst, 0x0102_0304_0506, RANDOM);
        assert_eq!(
            id.as_bytes(),
            &[
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
                0xa8, 0xa9
            ]
        );
    }

    #[test]
    fn time_last_writes_timestamp_into_trailing_bytes() {
        let id = encode_sequential_id(TimestampLayout::TimeLast, 0x0102_0304_0506, RANDOM);
        assert_eq!(
            id.as_bytes(),
            &[
                0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0x01, 0x02, 0x03, 0x04,
                0x05, 0x06
            ]
        );
    }

    #[test]
    fn timestamp_is_truncated_to_48_bits() {
        let id = encode_sequential_id(TimestampLayout::TimeFirst, 0xffff_0102_0304_0506, RANDOM);
        assert_eq!(
            sequential_timestamp(id, TimestampLayout::TimeFirst),
            0x0102_0304_0506
        );
    }

    #[test]
    fn generated_ids_are_not_empty_and_embed_current_time() {
        let before = current_timestamp();
        let id = new_sequential_id(TimestampLayout::TimeLast);
        let after = current_timestamp();

        assert!(!id.is_nil());
        let embedded = sequential_timestamp(id, TimestampLayout::TimeLast);
        assert!(embedded >= before && embedded <= after);
        assert!(after <= TIMESTAMP_MASK);
    }
}
