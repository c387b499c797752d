//! Token issuance.
//!
//! Produces tokens in the exact shape platform instances emit, so the
//! verifier can be exercised end to end and operators can mint tokens for
//! provisioning checks.

use crate::{canonical, InstanceSecret};
use base64::Engine;
use common::TrustConfig;
use serde::{Deserialize, Serialize};

/// Errors from token issuance.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("instance ID must not be empty")]
    MissingInstanceId,
    #[error("GitHub username must not be empty")]
    MissingUsername,
    #[error("Encoding error: {0}")]
    EncodeError(#[from] serde_json::Error),
}

/// Signed completion claims.
///
/// Field order is the canonical key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub github_username: String,
    pub date: String,
    pub time: String,
    pub challenges: u32,
    pub instance_id: String,
    pub timestamp: u64,
}

#[derive(Serialize)]
struct Envelope<'a> {
    payload: &'a CompletionPayload,
    signature: String,
}

/// Signs completion payloads with per-instance keys.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    trust: TrustConfig,
}

impl TokenIssuer {
    pub fn new(trust: TrustConfig) -> Self {
        Self { trust }
    }

    /// Derives the signing key for `instance_id`.
    pub fn instance_secret(&self, instance_id: &str) -> InstanceSecret {
        InstanceSecret::derive(self.trust.master_secret(), instance_id)
    }

    /// Signs `payload` and returns the base64 token.
    pub fn issue(&self, payload: &CompletionPayload) -> Result<String, IssueError> {
        if payload.instance_id.is_empty() {
            return Err(IssueError::MissingInstanceId);
        }
        if payload.github_username.is_empty() {
            return Err(IssueError::MissingUsername);
        }

        let message = canonical::to_vec(payload)?;
        let signature = self.instance_secret(&payload.instance_id).sign(&message);
        let envelope = serde_json::to_vec(&Envelope { payload, signature })?;
        Ok(base64::engine::general_purpose::STANDARD.encode(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TokenVerifier, VerifyError};
    use common::MasterSecret;

    const NOW: f64 = 1_730_556_207.0;

    fn trust() -> TrustConfig {
        TrustConfig::new(MasterSecret::new("fixture-master-secret").unwrap())
    }

    fn payload(username: &str) -> CompletionPayload {
        CompletionPayload {
            github_username: username.into(),
            date: "2024-11-02".into(),
            time: "14:03:27".into(),
            challenges: 18,
            instance_id: "a1b2c3d4".into(),
            timestamp: 1_730_556_207,
        }
    }

    #[test]
    fn test_canonical_payload_matches_reference_issuer() {
        let bytes = canonical::to_vec(&payload("Alice")).unwrap();
        assert_eq!(
            bytes,
            br#"{"github_username":"Alice","date":"2024-11-02","time":"14:03:27","challenges":18,"instance_id":"a1b2c3d4","timestamp":1730556207}"#
        );
    }

    #[test]
    fn test_issued_token_verifies() {
        let issuer = TokenIssuer::new(trust());
        let verifier = TokenVerifier::new(trust());

        for username in ["Alice", "Zoë", "octo-cat"] {
            let token = issuer.issue(&payload(username)).unwrap();
            let completion = verifier
                .verify_at(&token, &username.to_uppercase(), NOW)
                .unwrap();
            assert_eq!(completion.github_username, username);
            assert_eq!(completion.date, "2024-11-02");
            assert_eq!(completion.completion_time, "14:03:27");
            assert_eq!(completion.challenges, 18);
        }
    }

    #[test]
    fn test_issued_token_bound_to_user() {
        let token = TokenIssuer::new(trust()).issue(&payload("Alice")).unwrap();
        let err = TokenVerifier::new(trust())
            .verify_at(&token, "bob", NOW)
            .unwrap_err();
        assert!(matches!(err, VerifyError::IdentityMismatch { .. }));
    }

    #[test]
    fn test_empty_fields_refused() {
        let issuer = TokenIssuer::new(trust());

        let mut no_instance = payload("Alice");
        no_instance.instance_id.clear();
        assert!(matches!(
            issuer.issue(&no_instance),
            Err(IssueError::MissingInstanceId)
        ));

        assert!(matches!(
            issuer.issue(&payload("")),
            Err(IssueError::MissingUsername)
        ));
    }
}
