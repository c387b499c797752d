//! # The Vault: Completion Token Verification
//!
//! Proves that a CTF completion token was issued by a legitimate platform
//! instance and belongs to the user presenting it.
//!
//! ## Protocol
//! 1. A platform instance is provisioned with
//!    `hex(SHA256(master_secret ":" instance_id))` as its signing key.
//! 2. On completion it builds a payload (`github_username`, `date`, `time`,
//!    `challenges`, `instance_id`, `timestamp`), signs the canonical payload
//!    bytes with HMAC-SHA256 and base64-encodes `{"payload", "signature"}`.
//! 3. The verifier re-derives the instance key from the shared master secret
//!    and calls [`TokenVerifier::verify`] with the token and the username the
//!    caller already authenticated.

pub mod canonical;
pub mod issue;
pub mod secret;
pub mod verify;

pub use issue::{CompletionPayload, IssueError, TokenIssuer};
pub use secret::InstanceSecret;
pub use verify::{Completion, TokenVerifier, VerificationResult};

/// Total number of challenges in the program.
pub const TOTAL_CHALLENGES: u32 = 18;

/// Forward clock skew tolerated on the token timestamp.
pub const CLOCK_SKEW_SECS: u64 = 3600;

/// Reasons a token is rejected, in the order the checks run.
///
/// `Display` renders the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("Token parsing failed: {0}")]
    Decode(String),
    #[error("Invalid token structure")]
    Structure,
    #[error("GitHub username mismatch. Token is for '{token_username}', but you signed in as '{asserted}'")]
    IdentityMismatch {
        token_username: String,
        asserted: String,
    },
    #[error("Missing instance ID")]
    MissingInstanceId,
    #[error("Invalid signature")]
    SignatureInvalid,
    #[error("Incomplete challenges: {0}/{total}", total = TOTAL_CHALLENGES)]
    IncompleteChallenges(String),
    #[error("Invalid timestamp (in the future)")]
    FutureTimestamp,
}

impl VerifyError {
    /// Stable short name for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Decode(_) => "decode",
            VerifyError::Structure => "structure",
            VerifyError::IdentityMismatch { .. } => "identity_mismatch",
            VerifyError::MissingInstanceId => "missing_instance_id",
            VerifyError::SignatureInvalid => "signature_invalid",
            VerifyError::IncompleteChallenges(_) => "incomplete_challenges",
            VerifyError::FutureTimestamp => "future_timestamp",
        }
    }
}
