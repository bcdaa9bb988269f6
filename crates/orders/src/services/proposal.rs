//! Signed order proposals.
//!
//! A proposal is the canonical description of an order the caller wants to
//! place. [`ProposalSigner::issue`] stamps it with `issued_at` and a random
//! `nonce` and returns an HMAC-SHA256 over its canonical JSON as the
//! confirmation token. Nothing is stored server-side; [`ProposalSigner::verify`]
//! recomputes the signature from the proposal the caller echoes back, so any
//! changed field invalidates the token.
//!
//! The canonical JSON is `serde_json` over the struct: fields in declaration
//! order, attribute keys sorted, `notes` omitted when absent.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{instrument, warn};

use chatshop_core::{AttributeMap, CustomerFields};

type HmacSha256 = Hmac<Sha256>;

/// How far in the future `issued_at` may lie before a token is refused.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Errors from proposal signing and verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProposalError {
    /// Signature does not match the proposal, or the proposal is from the future.
    #[error("confirmation token does not match the proposal")]
    InvalidToken,

    /// Signature matches but the proposal is older than the TTL.
    #[error("proposal issued at {issued_at} expired after {ttl_secs}s")]
    Expired {
        /// Unix seconds the proposal was issued at.
        issued_at: i64,
        /// Configured TTL.
        ttl_secs: i64,
    },

    /// The signing key was rejected.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// An order proposal as signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProposal {
    /// Product code.
    pub product_code: String,
    /// Units requested.
    pub quantity: i32,
    /// Canonical attribute map.
    pub attributes: AttributeMap,
    /// Validated customer fields.
    pub customer: CustomerFields,
    /// Unix seconds at issue.
    pub issued_at: i64,
    /// Single-use identifier recorded on the order.
    pub nonce: String,
}

impl OrderProposal {
    /// Canonical bytes covered by the signature.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Plain structs of strings and integers always serialize
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// A proposal together with its confirmation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    /// Hex HMAC-SHA256 of the proposal.
    pub confirmation_token: String,
    /// The exact payload that was signed.
    pub proposal: OrderProposal,
}

/// Issues and verifies confirmation tokens.
#[derive(Clone)]
pub struct ProposalSigner {
    mac: HmacSha256,
    ttl_secs: i64,
}

impl std::fmt::Debug for ProposalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposalSigner")
            .field("mac", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl ProposalSigner {
    /// Create a signer keyed with `secret`.
    ///
    /// # Errors
    ///
    /// Returns `ProposalError::InvalidKey` if the key cannot initialize HMAC.
    pub fn new(secret: &SecretString, ttl_secs: i64) -> Result<Self, ProposalError> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| ProposalError::InvalidKey(e.to_string()))?;
        Ok(Self { mac, ttl_secs })
    }

    /// Proposal validity window in seconds.
    #[must_use]
    pub const fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Stamp and sign a new proposal.
    #[must_use]
    pub fn issue(
        &self,
        product_code: String,
        quantity: i32,
        attributes: AttributeMap,
        customer: CustomerFields,
    ) -> SignedProposal {
        self.issue_at(product_code, quantity, attributes, customer, Utc::now())
    }

    /// [`Self::issue`] with an explicit clock.
    #[must_use]
    pub fn issue_at(
        &self,
        product_code: String,
        quantity: i32,
        attributes: AttributeMap,
        customer: CustomerFields,
        now: DateTime<Utc>,
    ) -> SignedProposal {
        let proposal = OrderProposal {
            product_code,
            quantity,
            attributes,
            customer,
            issued_at: now.timestamp(),
            nonce: uuid::Uuid::new_v4().simple().to_string(),
        };
        SignedProposal {
            confirmation_token: self.sign(&proposal),
            proposal,
        }
    }

    /// Hex signature of `proposal`.
    #[must_use]
    pub fn sign(&self, proposal: &OrderProposal) -> String {
        let mut mac = self.mac.clone();
        mac.update(&proposal.canonical_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check `token` against `proposal` and the validity window.
    ///
    /// # Errors
    ///
    /// - `ProposalError::InvalidToken` if the signature does not match or the
    ///   proposal claims to be issued in the future
    /// - `ProposalError::Expired` if the proposal is older than the TTL
    pub fn verify(&self, token: &str, proposal: &OrderProposal) -> Result<(), ProposalError> {
        self.verify_at(token, proposal, Utc::now())
    }

    /// [`Self::verify`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Self::verify`].
    #[instrument(skip_all, fields(product_code = %proposal.product_code))]
    pub fn verify_at(
        &self,
        token: &str,
        proposal: &OrderProposal,
        now: DateTime<Utc>,
    ) -> Result<(), ProposalError> {
        let expected = self.sign(proposal);
        if !constant_time_compare(&expected, token.trim()) {
            warn!("Confirmation token mismatch");
            return Err(ProposalError::InvalidToken);
        }

        let age = now.timestamp() - proposal.issued_at;
        if age < -MAX_CLOCK_SKEW_SECS {
            warn!(age, "Proposal issued in the future");
            return Err(ProposalError::InvalidToken);
        }
        if age > self.ttl_secs {
            warn!(age, ttl_secs = self.ttl_secs, "Proposal expired");
            return Err(ProposalError::Expired {
                issued_at: proposal.issued_at,
                ttl_secs: self.ttl_secs,
            });
        }

        Ok(())
    }
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
