//! Page-token codec.
//!
//! Encodes any serializable value into an opaque base64 cursor string and
//! decodes the reverse. `decode(encode(v)) == v` for any value whose JSON
//! representation round-trips.

use crate::error::CoreError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes `value` as a base64 page token.
pub fn encode_page_token<T: Serialize>(value: &T) -> Result<String, CoreError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(bytes))
}

/// Decodes a page token produced by [`encode_page_token`].
pub fn decode_page_token<T: DeserializeOwned>(token: &str) -> Result<T, CoreError> {
    let bytes = STANDARD.decode(token)?;
    Ok(serde_json::from_slice(&bytes)?)
}
