// src/reduction/value_limits.rs - Split over-long tag values into numbered tags
use log::debug;
use serde_json::Value;

use crate::models::address::{AddressRecord, TAG_FLATS};

/// Splits an `addr:flats` value longer than `max_len` characters into chunks of
/// at most `max_len`, stored as `addr:flats`, `addr:flats2`, `addr:flats3`, ...
pub fn apply_value_limits(mut record: AddressRecord, max_len: usize) -> AddressRecord {
    let Some(flats) = record.tags.flats.take() else {
        return record;
    };
    if max_len == 0 || flats.chars().count() <= max_len {
        record.tags.flats = Some(flats);
        return record;
    }

    let chars: Vec<char> = flats.chars().collect();
    let mut chunks = chars.chunks(max_len).map(|c| c.iter().collect::<String>());
    record.tags.flats = chunks.next();
    let mut count = 1;
    for (i, chunk) in chunks.enumerate() {
        record
            .tags
            .extra
            .insert(format!("{}{}", TAG_FLATS, i + 2), Value::String(chunk));
        count += 1;
    }
    debug!("Split {} flats into {} tags", record.describe(), count);
    record
}
