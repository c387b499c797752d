//! Per-instance signing keys.
//!
//! `instance_secret = hex(SHA256(master || ":" || instance_id))`. The 64 hex
//! characters themselves, not the raw digest, are the HMAC key.

use common::MasterSecret;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// HMAC key derived for one platform instance. Zeroed on drop.
pub struct InstanceSecret(Zeroizing<String>);

impl InstanceSecret {
    pub fn derive(master: &MasterSecret, instance_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(master.as_bytes());
        hasher.update(b":");
        hasher.update(instance_id.as_bytes());
        Self(Zeroizing::new(hex::encode(hasher.finalize())))
    }

    /// Lowercase hex of the key, as provisioned onto an instance.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Lowercase hex HMAC-SHA256 of `message` under this key.
    pub fn sign(&self, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.0.as_bytes())
            .expect("BUG: HMAC-SHA256 accepts keys of any length");
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Compares two signatures without an early exit on the first differing byte.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
