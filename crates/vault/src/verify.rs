//! Token verification.
//!
//! Checks run in a fixed order and the first failure wins:
//! decode, structure, identity binding, instance id, signature,
//! completion count, timestamp.

use crate::{canonical, secret, InstanceSecret, VerifyError, CLOCK_SKEW_SECS, TOTAL_CHALLENGES};
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, Engine};
use common::TrustConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Claims extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Username as written in the token (original case).
    pub github_username: String,
    pub date: String,
    pub completion_time: String,
    pub challenges: u32,
}

/// `Ok` for a valid token, otherwise the first failing check.
pub type VerificationResult = Result<Completion, VerifyError>;

/// Verifies completion tokens against the shared master secret.
///
/// Holds no mutable state; share one instance across threads freely.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    trust: TrustConfig,
}

impl TokenVerifier {
    pub fn new(trust: TrustConfig) -> Self {
        Self { trust }
    }

    /// Verifies `token` for `asserted_identity` against the current clock.
    ///
    /// `asserted_identity` must already be authenticated by the caller
    /// (e.g. an OAuth-verified GitHub login).
    pub fn verify(&self, token: &str, asserted_identity: &str) -> VerificationResult {
        self.verify_at(token, asserted_identity, unix_now())
    }

    /// Verifies `token` with `now` (seconds since the epoch) as the clock.
    pub fn verify_at(&self, token: &str, asserted_identity: &str, now: f64) -> VerificationResult {
        let result = self.run_checks(token, asserted_identity, now);
        match &result {
            Ok(completion) => debug!(user = %completion.github_username, "token verified"),
            Err(e) => warn!(kind = e.kind(), reason = %e, "token rejected"),
        }
        result
    }

    fn run_checks(&self, token: &str, asserted_identity: &str, now: f64) -> VerificationResult {
        // 1. Decode.
        let envelope = decode_envelope(token)?;
        debug!("token decoded");

        // 2. Structure.
        let payload = match envelope.get("payload") {
            Some(Value::Object(p)) if !p.is_empty() => p,
            _ => return Err(VerifyError::Structure),
        };
        let signature = match envelope.get("signature") {
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            _ => return Err(VerifyError::Structure),
        };
        debug!(
            github_username = ?payload.get("github_username"),
            instance_id = ?payload.get("instance_id"),
            challenges = ?payload.get("challenges"),
            "payload parsed"
        );

        // 3. Identity binding.
        let token_username = str_field(payload, "github_username").to_lowercase();
        if token_username != asserted_identity.to_lowercase() {
            return Err(VerifyError::IdentityMismatch {
                token_username,
                asserted: asserted_identity.to_owned(),
            });
        }
        debug!(user = %token_username, "username bound to signed-in identity");

        // 4. Instance secret.
        let instance_id = instance_id_of(payload).ok_or(VerifyError::MissingInstanceId)?;
        let instance_secret = InstanceSecret::derive(self.trust.master_secret(), &instance_id);
        debug!(%instance_id, "instance secret derived");

        // 5. Signature.
        let message = canonical::to_vec(payload).map_err(|e| VerifyError::Decode(e.to_string()))?;
        let expected = instance_secret.sign(&message);
        if !secret::signatures_match(&expected, signature) {
            return Err(VerifyError::SignatureInvalid);
        }
        debug!("signature valid");

        // 6. Completion count.
        let challenges = payload.get("challenges");
        if challenges.and_then(Value::as_f64) != Some(f64::from(TOTAL_CHALLENGES)) {
            return Err(VerifyError::IncompleteChallenges(display_claim(challenges)));
        }

        // 7. Timestamp. Absent counts as the epoch; only the future is bounded.
        let timestamp = match payload.get("timestamp") {
            None => 0.0,
            Some(v) => v
                .as_f64()
                .ok_or_else(|| VerifyError::Decode("timestamp is not a number".to_owned()))?,
        };
        if timestamp > now + CLOCK_SKEW_SECS as f64 {
            return Err(VerifyError::FutureTimestamp);
        }

        Ok(Completion {
            github_username: str_field(payload, "github_username").to_owned(),
            date: str_field(payload, "date").to_owned(),
            completion_time: str_field(payload, "time").to_owned(),
            challenges: TOTAL_CHALLENGES,
        })
    }
}

/// Standard alphabet and padding; stray bits in the final symbol are ignored.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// base64 -> UTF-8 -> JSON object.
fn decode_envelope(token: &str) -> Result<Map<String, Value>, VerifyError> {
    // Tokens piped through `base64` arrive wrapped at 76 columns.
    let compact: String = token.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let raw = TOKEN_ENGINE
        .decode(compact)
        .map_err(|e| VerifyError::Decode(e.to_string()))?;
    let text = String::from_utf8(raw).map_err(|e| VerifyError::Decode(e.to_string()))?;
    match serde_json::from_str::<Value>(&text).map_err(|e| VerifyError::Decode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(VerifyError::Decode("token is not a JSON object".to_owned())),
    }
}

/// String field or `""` when absent or not a string.
fn str_field<'a>(payload: &'a Map<String, Value>, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Instance ID as the issuer formats it into the key derivation.
///
/// Numbers keep their JSON text. Empty strings, zero and non-scalar values
/// count as absent.
fn instance_id_of(payload: &Map<String, Value>) -> Option<String> {
    match payload.get("instance_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Renders a claim for a rejection reason: strings bare, absent as `None`.
fn display_claim(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "True".to_owned(),
        Some(Value::Bool(false)) => "False".to_owned(),
        Some(other) => other.to_string(),
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
