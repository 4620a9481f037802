//! Lease types and lifecycle.

use crate::path::LeasePath;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Duration, OffsetDateTime};

/// Minimum accepted token length.
///
/// Freshly minted tokens are 43 characters (32 random bytes,
/// base64 URL-safe without padding); 22 characters is the floor for
/// tokens minted by older gateways.
pub const MIN_TOKEN_LEN: usize = 22;

/// An opaque, unguessable lease token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseToken(String);

impl LeaseToken {
    /// Mint a new token using cryptographically secure RNG.
    pub fn mint() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Parse a client-supplied token, validating the grammar.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.len() < MIN_TOKEN_LEN {
            return Err(crate::Error::InvalidToken(format!(
                "token too short: {} chars, minimum {}",
                s.len(),
                MIN_TOKEN_LEN
            )));
        }
        for c in s.chars() {
            if !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_') {
                return Err(crate::Error::InvalidToken(
                    "token contains non-URL-safe characters".to_string(),
                ));
            }
        }
        Ok(Self(s.to_string()))
    }

    /// Get the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens are credentials; keep them out of debug logs.
        let head: String = self.0.chars().take(8).collect();
        write!(f, "LeaseToken({head}..)")
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lease lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseState {
    /// Lease is live and accepting payload submissions.
    Active,
    /// A commit is in flight; no further submissions.
    Committing,
    /// Commit succeeded.
    Committed,
    /// Cancelled by the client, an admin, or a failed commit.
    Cancelled,
    /// Deadline passed before the lease reached a terminal state.
    Expired,
}

impl LeaseState {
    /// Check if the state is terminal. Terminal states are sticky.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Cancelled | Self::Expired)
    }

    /// Check if the lease accepts payload submissions.
    pub fn accepts_payloads(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// String form used by the SQLite backend and wire messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parse from the string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "committing" => Ok(Self::Committing),
            "committed" => Ok(Self::Committed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err(crate::Error::InvalidLeaseState(s.to_string())),
        }
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A time-bounded exclusive write permission over a repository sub-path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lease {
    /// The lease token (identity and credential).
    pub token: LeaseToken,
    /// Key that owns the lease.
    pub key_id: String,
    /// The leased path.
    pub lease_path: LeasePath,
    /// When the lease was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued: OffsetDateTime,
    /// When the lease expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    /// API protocol version negotiated at creation.
    pub protocol_version: u32,
    /// Current lifecycle state.
    pub state: LeaseState,
}

impl Lease {
    /// Create a fresh active lease.
    pub fn new(
        key_id: impl Into<String>,
        lease_path: LeasePath,
        protocol_version: u32,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            token: LeaseToken::mint(),
            key_id: key_id.into(),
            lease_path,
            issued: now,
            expires: now + ttl,
            protocol_version,
            state: LeaseState::Active,
        }
    }

    /// Check if the lease deadline has passed.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires <= now
    }

    /// Time left until expiry, clamped at zero.
    pub fn remaining(&self, now: OffsetDateTime) -> Duration {
        (self.expires - now).max(Duration::ZERO)
    }
}

/// A user-supplied label attached to a commit. Opaque to the gateway;
/// forwarded verbatim to the receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTag {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub description: String,
}
