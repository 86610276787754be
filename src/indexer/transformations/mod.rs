pub mod events;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Decode API records one by one, logging and skipping the malformed ones.
pub fn decode_records<T: DeserializeOwned>(records: Vec<Value>, kind: &str) -> Vec<T> {
    let total = records.len();
    let decoded = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<T>(record) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Skipping malformed {} record: {}", kind, e);
                None
            }
        })
        .collect::<Vec<_>>();
    if decoded.len() < total {
        warn!("Skipped {} of {} {} records", total - decoded.len(), total, kind);
    }
    decoded
}
