//! Bearer tokens and caller resolution
//!
//! Token kinds:
//! - admin key: exact match against the configured key, grants the `admin` role
//! - `sess-` prefix: stateless session token (signed payload of user id + roles)
//!
//! Requests without a token resolve to the guest caller.

use crate::auth::caller::{Caller, RoleSet};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

/// Token prefix for session tokens
pub const SESSION_TOKEN_PREFIX: &str = "sess-";

/// Session user ids may not start with this; it marks built-in identities
pub const RESERVED_IDENTITY_PREFIX: char = '@';

/// Identity and role given to admin-key callers
pub const ADMIN_IDENTITY: &str = "@admin";
pub const ADMIN_ROLE: &str = "admin";

/// Signature length in bytes (truncated HMAC-SHA256)
const SIGNATURE_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    InvalidFormat,

    #[error("invalid token prefix: expected '{expected}'")]
    InvalidPrefix { expected: String },

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token decode error: {0}")]
    DecodeError(String),

    #[error("token encode error: {0}")]
    EncodeError(String),

    #[error("invalid signing key")]
    InvalidKey,

    #[error("user id '{0}' is reserved")]
    ReservedIdentity(String),
}

/// Generate a fresh random signing secret (32 bytes, base64 encoded)
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn mac_for(secret: &[u8]) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)
}

/// Admin key for full access
#[derive(Clone)]
pub struct AdminKey {
    key: String,
}

impl AdminKey {
    pub fn new(key: String) -> Self {
        Self { key }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("CHATTER_ADMIN_KEY").ok().map(Self::new)
    }

    pub fn matches(&self, token: &str) -> bool {
        // Constant-time comparison
        if token.len() != self.key.len() {
            return false;
        }

        let mut result = 0u8;
        for (a, b) in token.bytes().zip(self.key.bytes()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdminKey([REDACTED])")
    }
}

/// Payload stored in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Stable identity used for ownership checks
    pub user_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A stateless, signed session token
#[derive(Debug, Clone)]
pub struct SessionToken {
    /// The full token string including prefix
    token: String,
    payload: SessionPayload,
}

impl SessionToken {
    /// Create and sign a new session token
    pub fn create(
        user_id: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
        secret: &[u8],
    ) -> Result<Self, TokenError> {
        let user_id = user_id.into();
        if user_id.starts_with(RESERVED_IDENTITY_PREFIX) {
            return Err(TokenError::ReservedIdentity(user_id));
        }

        let payload = SessionPayload {
            user_id,
            roles: roles.into_iter().map(Into::into).collect(),
        };
        let payload_json =
            serde_json::to_vec(&payload).map_err(|e| TokenError::EncodeError(e.to_string()))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);

        let mut mac = mac_for(secret)?;
        mac.update(payload_b64.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = URL_SAFE_NO_PAD.encode(&signature[..SIGNATURE_LEN]);

        let token = format!("{}{}.{}", SESSION_TOKEN_PREFIX, payload_b64, signature_b64);

        Ok(Self { token, payload })
    }

    /// Parse and verify a session token
    pub fn parse(token: &str, secret: &[u8]) -> Result<Self, TokenError> {
        let content = token
            .strip_prefix(SESSION_TOKEN_PREFIX)
            .ok_or_else(|| TokenError::InvalidPrefix {
                expected: SESSION_TOKEN_PREFIX.to_string(),
            })?;

        let (payload_b64, signature_b64) =
            content.split_once('.').ok_or(TokenError::InvalidFormat)?;
        if signature_b64.contains('.') {
            return Err(TokenError::InvalidFormat);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::DecodeError(e.to_string()))?;

        if signature.len() != SIGNATURE_LEN {
            return Err(TokenError::InvalidSignature);
        }

        let mut mac = mac_for(secret)?;
        mac.update(payload_b64.as_bytes());
        mac.verify_truncated_left(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| TokenError::DecodeError(e.to_string()))?;

        let payload: SessionPayload = serde_json::from_slice(&payload_json)
            .map_err(|e| TokenError::DecodeError(e.to_string()))?;
        if payload.user_id.starts_with(RESERVED_IDENTITY_PREFIX) {
            return Err(TokenError::ReservedIdentity(payload.user_id));
        }

        Ok(Self {
            token: token.to_string(),
            payload,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> &str {
        &self.payload.user_id
    }

    pub fn roles(&self) -> &[String] {
        &self.payload.roles
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

/// Unified token type
#[derive(Debug, Clone)]
pub enum Token {
    Admin,
    Session(SessionToken),
}

impl Token {
    /// Parse any token type
    pub fn parse(token: &str, secret: &[u8], admin_key: Option<&AdminKey>) -> Result<Self, TokenError> {
        // Check admin key first
        if let Some(admin) = admin_key {
            if admin.matches(token) {
                return Ok(Token::Admin);
            }
        }

        if token.starts_with(SESSION_TOKEN_PREFIX) {
            return SessionToken::parse(token, secret).map(Token::Session);
        }

        Err(TokenError::InvalidFormat)
    }

    /// The caller this token stands for
    pub fn caller(&self) -> Caller {
        match self {
            Token::Admin => Caller::authenticated(ADMIN_IDENTITY, RoleSet::new([ADMIN_ROLE])),
            Token::Session(session) => Caller::authenticated(
                session.user_id(),
                RoleSet::new(session.roles().iter().cloned()),
            ),
        }
    }
}

/// Resolves bearer tokens into callers
#[derive(Clone)]
pub struct Authenticator {
    secret: Vec<u8>,
    admin_key: Option<AdminKey>,
}

impl Authenticator {
    pub fn new(secret: Vec<u8>, admin_key: Option<AdminKey>) -> Self {
        Self { secret, admin_key }
    }

    /// Resolve an optional bearer token; no token means guest
    pub fn caller(&self, bearer: Option<&str>) -> Result<Caller, TokenError> {
        match bearer {
            None => Ok(Caller::guest()),
            Some(token) => {
                Token::parse(token, &self.secret, self.admin_key.as_ref()).map(|t| t.caller())
            }
        }
    }

    /// Mint a session token signed with this authenticator's secret
    pub fn issue(
        &self,
        user_id: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<SessionToken, TokenError> {
        SessionToken::create(user_id, roles, &self.secret)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("admin_key", &self.admin_key)
            .finish_non_exhaustive()
    }
}
