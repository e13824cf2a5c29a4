//! JWT token generation and validation.
//!
//! Access and refresh tokens share one claim shape but are signed with
//! distinct secrets and carry distinct lifetimes. A refresh token that
//! verifies here is still only half-valid: the session service also requires
//! it to be present in the owner's refresh token set.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token - stateless, never looked up
    Access,
    /// Long-lived refresh token - must also be registered on the user
    Refresh,
}

/// JWT claims carried by both token types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// JWT ID, random per token so two tokens never collide
    pub jti: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted token lifetime: 10 years
pub const MAX_TOKEN_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validity windows for both token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access_secs: u64,
    pub refresh_secs: u64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_secs: ACCESS_TOKEN_DURATION_SECS,
            refresh_secs: REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// JWT ID
    pub jti: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub ttl: u64,
}

/// Signing keys and lifetimes for both token classes.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    lifetimes: TokenLifetimes,
}

impl JwtConfig {
    /// Create a configuration with the default lifetimes.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_lifetimes(access_secret, refresh_secret, TokenLifetimes::default())
    }

    pub fn with_lifetimes(
        access_secret: &[u8],
        refresh_secret: &[u8],
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Issue an access token for a user.
    pub fn issue_access_token(&self, user_uuid: &str) -> Result<IssuedToken, JwtError> {
        issue(
            user_uuid,
            TokenType::Access,
            self.lifetimes.access_secs,
            &self.access_encoding,
        )
    }

    /// Issue a refresh token for a user.
    pub fn issue_refresh_token(&self, user_uuid: &str) -> Result<IssuedToken, JwtError> {
        issue(
            user_uuid,
            TokenType::Refresh,
            self.lifetimes.refresh_secs,
            &self.refresh_encoding,
        )
    }

    /// Validate and decode an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        verify(token, &self.access_decoding, TokenType::Access)
    }

    /// Validate and decode a refresh token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        verify(token, &self.refresh_decoding, TokenType::Refresh)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

fn issue(
    user_uuid: &str,
    token_type: TokenType,
    ttl: u64,
    key: &EncodingKey,
) -> Result<IssuedToken, JwtError> {
    let now = unix_now()?;
    let jti = uuid::Uuid::new_v4().to_string();
    let exp = now.checked_add(ttl).ok_or(JwtError::LifetimeOverflow)?;

    let claims = Claims {
        sub: user_uuid.to_string(),
        jti: jti.clone(),
        token_type,
        iat: now,
        exp,
    };

    let token =
        jsonwebtoken::encode(&Header::default(), &claims, key).map_err(JwtError::Encoding)?;

    Ok(IssuedToken {
        token,
        jti,
        issued_at: now,
        expires_at: exp,
        ttl,
    })
}

/// Verify a token against a key and check its type.
pub fn verify(token: &str, key: &DecodingKey, expected: TokenType) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data =
        jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            _ => JwtError::Malformed(e),
        })?;

    if token_data.claims.token_type != expected {
        return Err(JwtError::WrongTokenType);
    }

    Ok(token_data.claims)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Signature does not match the secret
    InvalidSignature,
    /// Signature is fine but `exp` has passed
    Expired,
    /// Token could not be parsed or is missing claims
    Malformed(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
    /// `iat + ttl` does not fit in a timestamp
    LifetimeOverflow,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::InvalidSignature => write!(f, "Invalid token signature"),
            JwtError::Expired => write!(f, "Token has expired"),
            JwtError::Malformed(e) => write!(f, "Malformed token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
            JwtError::LifetimeOverflow => write!(f, "Token lifetime is too long"),
        }
    }
}

impl std::error::Error for JwtError {}
