//! Authentication user types.

use crate::db::User;

/// The caller behind a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User record resolved from the token subject
    pub user: User,
}

impl AuthenticatedUser {
    /// Whether the caller is the user with this public id.
    pub fn is(&self, uuid: &str) -> bool {
        self.user.uuid == uuid
    }
}
