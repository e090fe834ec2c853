//! Canonical serialization and the keyed authentication tag.
//!
//! The tag is computed over the message's semantic fields in a byte form
//! that is stable regardless of how the caller built the `serde_json::Value`
//! — `serde_json::Map` (without the `preserve_order` feature) is backed by
//! a `BTreeMap`, so `serde_json::to_vec` already yields keys sorted at every
//! nesting level, the same guarantee `json.dumps(message, sort_keys=True)`
//! gives in a dynamically-typed implementation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{ProtocolError, Result};
use crate::key::SecretKey;

type HmacSha256 = Hmac<Sha256>;

pub const TAG_FIELD: &str = "hmac";

/// Canonical byte form of a JSON value: sorted keys at every level, compact
/// separators.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("Value serialization is infallible")
}

fn calculate_tag(key: &SecretKey, fields: &Value) -> String {
    let bytes = canonical_bytes(fields);
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(&bytes);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Insert the authentication tag into `message`, computed over every other
/// field. `message` must be a JSON object.
pub fn add_tag(key: &SecretKey, message: &mut Value) -> Result<()> {
    let obj = message
        .as_object_mut()
        .ok_or_else(|| ProtocolError::Format("message must be a JSON object".into()))?;
    obj.remove(TAG_FIELD);
    let tag = calculate_tag(key, message);
    message
        .as_object_mut()
        .expect("checked above")
        .insert(TAG_FIELD.to_string(), Value::String(tag));
    Ok(())
}

/// Verify and strip the tag from `message`, returning the remaining fields.
/// Constant-time comparison via `hmac::Mac::verify_slice`.
pub fn verify_and_strip_tag(key: &SecretKey, mut message: Value) -> Result<Value> {
    let obj = message
        .as_object_mut()
        .ok_or_else(|| ProtocolError::Format("message must be a JSON object".into()))?;
    let received = obj
        .remove(TAG_FIELD)
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or(ProtocolError::Auth)?;
    let received_bytes = STANDARD.decode(received).map_err(|_| ProtocolError::Auth)?;

    let bytes = canonical_bytes(&message);
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(&bytes);
    mac.verify_slice(&received_bytes).map_err(|_| ProtocolError::Auth)?;

    Ok(message)
}
