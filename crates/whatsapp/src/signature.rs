use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing or not sha256-prefixed")]
    MalformedHeader,
    #[error("signature does not match the request body")]
    Mismatch,
}

/// Checks the `X-Hub-Signature-256` header against the raw request body.
/// The comparison runs in constant time through the mac verifier.
pub fn verify_signature(
    app_secret: &str,
    body: &[u8],
    header: &str,
) -> Result<(), SignatureError> {
    let hex_digest =
        header.strip_prefix("sha256=").ok_or(SignatureError::MalformedHeader)?;
    let expected = decode_hex(hex_digest).ok_or(SignatureError::MalformedHeader)?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|_| SignatureError::MalformedHeader)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Produces the header value Meta would send for this body. Used by tests
/// and by the webhook simulator in local development.
pub fn sign_body(app_secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return "sha256=".to_owned(),
    };
    mac.update(body);
    format!("sha256={}", encode_hex(mac.finalize().into_bytes().as_slice()))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&hex[index..index + 2], 16).ok())
        .collect()
}
