use base64::prelude::BASE64_STANDARD;
use base64::Engine;

/// Decodes a base64 notification payload to text. Invalid UTF-8 sequences are replaced,
/// an invalid base64 payload yields `None`.
pub fn decode_payload(value: &str) -> Option<String> {
    let bytes = BASE64_STANDARD.decode(value.trim()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
