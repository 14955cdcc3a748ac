//! Minimal HS256 JWT utilities.
//!
//! Notes:
//! - Only supports JSON objects for header/payload.
//! - Uses base64url encoding WITHOUT padding.
//! - Performs signature verification using `Hmac::verify_slice`.
//!
//! Claim validation (`exp`, purpose) belongs to the caller.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Invalid JWT format")]
    Format,

    #[error("Invalid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid JWT JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported JWT header")]
    UnsupportedHeader,

    #[error("Invalid HMAC key")]
    Key,

    #[error("Invalid JWT signature")]
    Signature,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn b64url_decode(s: &str) -> Result<Vec<u8>, JwtError> {
    Ok(URL_SAFE_NO_PAD.decode(s.as_bytes())?)
}

fn mac_for(secret: &[u8], signing_input: &str) -> Result<Hmac<Sha256>, JwtError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| JwtError::Key)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Encode claims as an HS256-signed JWT.
pub fn encode_hs256<T: Serialize>(secret: &[u8], claims: &T) -> Result<String, JwtError> {
    let header = JwtHeader {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };

    let header_b64 = b64url_encode(&serde_json::to_vec(&header)?);
    let claims_b64 = b64url_encode(&serde_json::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature = mac_for(secret, &signing_input)?.finalize().into_bytes();
    let sig_b64 = b64url_encode(&signature);

    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Decode an HS256 JWT and verify its signature.
///
/// The payload is only parsed after the signature checks out, so a forged token
/// never reaches the claim schema.
pub fn decode_hs256<T: DeserializeOwned>(secret: &[u8], token: &str) -> Result<T, JwtError> {
    let token = token.replace(char::is_whitespace, "");
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::Format);
    };

    let header: JwtHeader = serde_json::from_slice(&b64url_decode(header_b64)?)?;
    if header.alg != "HS256" || !header.typ.eq_ignore_ascii_case("JWT") {
        return Err(JwtError::UnsupportedHeader);
    }

    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig = b64url_decode(sig_b64)?;
    mac_for(secret, &signing_input)?
        .verify_slice(&sig)
        .map_err(|_| JwtError::Signature)?;

    let claims: T = serde_json::from_slice(&b64url_decode(payload_b64)?)?;
    Ok(claims)
}
