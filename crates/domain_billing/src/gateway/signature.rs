//! Callback signatures
//!
//! The provider signs the sorted `vnp_*` query parameters with HMAC-SHA512
//! and sends the hex digest as `vnp_SecureHash`. Outbound checkout URLs are
//! signed the same way.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::BTreeMap;

use super::callback::CallbackRejection;

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";

/// Authenticates inbound gateway callbacks
pub trait CallbackVerifier: Send + Sync {
    /// Checks the signature carried in `params`
    fn verify(&self, params: &BTreeMap<String, String>) -> Result<(), CallbackRejection>;
}

/// HMAC-SHA512 signer and verifier keyed by the merchant hash secret
#[derive(Clone)]
pub struct HmacSha512Verifier {
    secret: String,
}

impl HmacSha512Verifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Hex HMAC-SHA512 of the canonical form of `params`
    pub fn sign(&self, params: &BTreeMap<String, String>) -> Result<String, CallbackRejection> {
        let mut mac = self.mac()?;
        mac.update(canonical_query(params).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha512, CallbackRejection> {
        HmacSha512::new_from_slice(self.secret.as_bytes())
            .map_err(|_| CallbackRejection::Unprocessable("invalid hash secret".to_string()))
    }
}

impl std::fmt::Debug for HmacSha512Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha512Verifier").field("secret", &"<redacted>").finish()
    }
}

impl CallbackVerifier for HmacSha512Verifier {
    fn verify(&self, params: &BTreeMap<String, String>) -> Result<(), CallbackRejection> {
        let provided = params
            .get(SECURE_HASH_FIELD)
            .ok_or(CallbackRejection::MissingField(SECURE_HASH_FIELD))?;
        let provided = hex::decode(provided.trim()).map_err(|_| CallbackRejection::InvalidSignature)?;

        let mut mac = self.mac()?;
        mac.update(canonical_query(params).as_bytes());
        // constant-time comparison
        mac.verify_slice(&provided)
            .map_err(|_| CallbackRejection::InvalidSignature)
    }
}

/// `key=value` pairs of the signed fields, sorted by key and form-encoded
///
/// Only `vnp_`-prefixed fields are signed; the hash fields themselves and
/// empty values are left out.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, value)| {
            key.starts_with("vnp_")
                && key.as_str() != SECURE_HASH_FIELD
                && key.as_str() != SECURE_HASH_TYPE_FIELD
                && !value.is_empty()
        })
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
