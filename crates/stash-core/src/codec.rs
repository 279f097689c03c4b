//! Value codec - JSON wire encoding for cache values.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;

/// Longest raw-string excerpt carried in a decode error.
const RAW_CONTEXT_MAX: usize = 120;

/// Serialize a value to its wire form.
///
/// A value that fails to encode never reaches the backend; the error carries
/// the offending type name.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|err| CacheError::Serialization {
        context: std::any::type_name::<T>().to_string(),
        detail: err.to_string(),
    })
}

/// Deserialize a wire value. `None` passes through without invoking the
/// decoder; a decode failure carries the raw string that could not be
/// converted.
pub fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, CacheError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| CacheError::Serialization {
            context: excerpt(&raw),
            detail: err.to_string(),
        })
}

fn excerpt(raw: &str) -> String {
    if raw.len() <= RAW_CONTEXT_MAX {
        raw.to_string()
    } else {
        let mut cut: String = raw.chars().take(RAW_CONTEXT_MAX).collect();
        cut.push_str("...");
        cut
    }
}
