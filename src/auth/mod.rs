//! Bearer-token authentication gate.
//!
//! Protected routes take the `Auth` extractor. It verifies the access token
//! from the `Authorization` header and resolves its subject to a user. It does
//! no writes and never consults the refresh token registry: access tokens stay
//! valid for their whole (short) lifetime.

mod bearer;
mod errors;
mod extractors;
mod state;
mod types;

pub use bearer::bearer_token;
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::Auth;
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
