//! Per-user refresh token registry.
//!
//! A `RefreshTokenSet` is an immutable value: every operation consumes the
//! set and returns the updated one. It is stored embedded in the user row as
//! a JSON array of `{token, expiresAt}` records.
//!
//! Pruning is lazy. Expired records stay in storage until the next login,
//! logout or refresh touches the owning user.

use serde::{Deserialize, Serialize};

/// One registered refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    pub token: String,
    /// Unix seconds. The record is dead once `expires_at <= now`.
    pub expires_at: u64,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Ordered set of a user's refresh tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshTokenSet(Vec<RefreshTokenRecord>);

impl RefreshTokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record that has expired at `now`.
    #[must_use]
    pub fn prune_expired(mut self, now: u64) -> Self {
        self.0.retain(|record| !record.is_expired(now));
        self
    }

    /// Prune, then register `token` until `now + ttl_secs` (saturating).
    #[must_use]
    pub fn add(self, token: &str, ttl_secs: u64, now: u64) -> Self {
        let mut set = self.prune_expired(now).remove(token);
        set.0.push(RefreshTokenRecord {
            token: token.to_string(),
            expires_at: now.saturating_add(ttl_secs),
        });
        set
    }

    /// Remove `token` by exact match. Absent tokens are ignored.
    #[must_use]
    pub fn remove(mut self, token: &str) -> Self {
        self.0.retain(|record| record.token != token);
        self
    }

    /// Exact membership. Callers prune first so a hit is also unexpired.
    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|record| record.token == token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RefreshTokenRecord> {
        self.0.iter()
    }
}

impl FromIterator<RefreshTokenRecord> for RefreshTokenSet {
    fn from_iter<I: IntoIterator<Item = RefreshTokenRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
