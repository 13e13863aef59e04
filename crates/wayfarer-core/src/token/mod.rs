//! Session token generation and validation for API authentication.
//!
//! Tokens are HMAC-SHA256 based, scoped to a (user_id, expiry) pair.
//! Format: `wayfarer_st_<user_id>_<expiry_unix>_<hmac_hex>`

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Token prefix used to identify wayfarer session tokens.
const TOKEN_PREFIX: &str = "wayfarer_st_";

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("invalid expiry in token: {0}")]
    InvalidExpiry(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("token has expired")]
    Expired,

    #[error("missing token secret")]
    MissingSecret,
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// The HMAC secret key bytes.
    pub secret: Vec<u8>,
}

impl TokenConfig {
    /// Create a new TokenConfig with the given secret.
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Create a TokenConfig from the `WAYFARER_TOKEN_SECRET` environment
    /// variable (hex-encoded, as written by `wayfarer init`).
    pub fn from_env() -> Result<Self, TokenError> {
        let secret_hex =
            std::env::var("WAYFARER_TOKEN_SECRET").map_err(|_| TokenError::MissingSecret)?;
        let secret = hex::decode(&secret_hex).map_err(|e| {
            TokenError::InvalidFormat(format!("WAYFARER_TOKEN_SECRET is not valid hex: {e}"))
        })?;
        Ok(Self::new(secret))
    }
}

/// Claims extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// The user this token authenticates.
    pub user_id: Uuid,
    /// Expiry as a unix timestamp (seconds).
    pub expires_at: i64,
}

/// Generate a session token expiring at the given unix timestamp.
///
/// The token format is: `wayfarer_st_<user_id>_<expiry_unix>_<hmac_hex>`
/// where the HMAC-SHA256 is computed over `<user_id>:<expiry_unix>`.
pub fn generate_token(config: &TokenConfig, user_id: Uuid, expires_at: i64) -> String {
    let message = format!("{user_id}:{expires_at}");
    let mac = compute_hmac(&config.secret, message.as_bytes());
    let hmac_hex = hex::encode(mac);
    format!("{TOKEN_PREFIX}{user_id}_{expires_at}_{hmac_hex}")
}

/// Generate a session token valid for `ttl_days` from now.
pub fn generate_token_with_ttl(config: &TokenConfig, user_id: Uuid, ttl_days: i64) -> String {
    let expires_at = Utc::now().timestamp() + ttl_days * 24 * 3600;
    generate_token(config, user_id, expires_at)
}

/// Validate a session token against the current time and extract its claims.
///
/// This function:
/// 1. Parses the token format
/// 2. Recomputes the HMAC
/// 3. Uses constant-time comparison to verify the HMAC
/// 4. Rejects expired tokens
pub fn validate_token(config: &TokenConfig, token: &str) -> Result<TokenClaims, TokenError> {
    validate_token_at(config, token, Utc::now().timestamp())
}

/// Validate a session token against an explicit "now" timestamp.
pub fn validate_token_at(
    config: &TokenConfig,
    token: &str,
    now_unix: i64,
) -> Result<TokenClaims, TokenError> {
    // Strip prefix
    let rest = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        TokenError::InvalidFormat("token must start with 'wayfarer_st_'".to_string())
    })?;

    // Parse the components: <user_id>_<expiry>_<hmac_hex>
    // A UUID is 36 chars (8-4-4-4-12). We parse the UUID first (36 chars),
    // then expect underscore, then expiry, then underscore, then hmac_hex.
    let (user_id_str, after_user_id) = parse_uuid_prefix(rest)?;

    let user_id =
        Uuid::parse_str(user_id_str).map_err(|e| TokenError::InvalidUserId(e.to_string()))?;

    let after_underscore = after_user_id.strip_prefix('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore after user_id".to_string())
    })?;

    // Split on the next underscore to get expiry and hmac
    let (expiry_str, hmac_hex) = after_underscore.split_once('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore between expiry and hmac".to_string())
    })?;

    let expires_at: i64 = expiry_str
        .parse()
        .map_err(|e: std::num::ParseIntError| TokenError::InvalidExpiry(e.to_string()))?;

    // Decode the provided HMAC
    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| TokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    // Recompute and verify HMAC using constant-time comparison, before the
    // expiry check so a forged token never learns which part failed first.
    let message = format!("{user_id}:{expires_at}");
    verify_hmac_constant_time(&config.secret, message.as_bytes(), &provided_mac)?;

    if expires_at <= now_unix {
        return Err(TokenError::Expired);
    }

    Ok(TokenClaims {
        user_id,
        expires_at,
    })
}

/// Parse a UUID from the beginning of a string.
/// Returns (uuid_str, remainder).
fn parse_uuid_prefix(s: &str) -> Result<(&str, &str), TokenError> {
    // A standard UUID is 36 characters: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    if s.len() < 36 {
        return Err(TokenError::InvalidFormat(
            "token too short to contain a valid UUID".to_string(),
        ));
    }
    Ok(s.split_at(36))
}

/// Compute HMAC-SHA256 over the given message with the given key.
fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Verify HMAC using constant-time comparison.
///
/// This uses the `hmac` crate's `verify_slice` method which is
/// designed to be constant-time to prevent timing attacks.
fn verify_hmac_constant_time(
    key: &[u8],
    message: &[u8],
    expected_mac: &[u8],
) -> Result<(), TokenError> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| TokenError::HmacMismatch)
}
