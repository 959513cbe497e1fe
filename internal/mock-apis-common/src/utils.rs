use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serializer;
use serde::de::DeserializeOwned;

use crate::error::Error;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix appended to synthesized identifiers.
pub const ID_SUFFIX_LEN: usize = 9;

/// Formats a timestamp as RFC 3339 in UTC with millisecond precision, e.g. `2025-03-04T10:00:00.000Z`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `serialize_with` adapter for [`format_timestamp`].
pub fn serialize_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(*timestamp))
}

/// A random lowercase base-36 string, used to make synthesized ids unique.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(BASE36_ALPHABET[rng.random_range(0..BASE36_ALPHABET.len())]))
        .collect()
}

/// Builds an id of the form `<prefix>_<unix millis>_<random suffix>`.
pub fn synthesize_id(prefix: &str, now: DateTime<Utc>) -> String {
    format!(
        "{prefix}_{}_{}",
        now.timestamp_millis(),
        random_suffix(ID_SUFFIX_LEN)
    )
}

/// Parses a request body as JSON, treating an empty (or all-whitespace) body as `T::default()`.
///
/// Clients of the mock services often send bare POSTs with no body or `Content-Type`, so
/// handlers take raw bytes instead of axum's `Json` extractor.
pub fn parse_json_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}
