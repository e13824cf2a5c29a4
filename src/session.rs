//! Register, login, logout and refresh flows.
//!
//! Every change to a user's refresh token set is read → prune → mutate →
//! compare-and-swap on the user's revision. A lost swap re-reads the user and
//! re-applies the mutation, so concurrent logins, logouts and refreshes never
//! silently drop each other's writes, and a refresh token can be rotated at
//! most once.

use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{Database, NewUser, User, is_unique_violation};
use crate::jwt::{IssuedToken, JwtConfig, JwtError, unix_now};
use crate::password::{self, PasswordError};
use crate::registry::RefreshTokenSet;
use crate::validation::{normalize_email, normalize_username, validate_password};

/// Attempts at a token set write before giving up on a contended user.
const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Access and refresh token handed to the client.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful register or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug)]
pub enum SessionError {
    /// Input failed a format or length rule
    Validation(&'static str),
    /// Username or email already registered
    DuplicateUser,
    /// Unknown email or wrong password, reported identically
    InvalidCredentials,
    /// Bad signature, expired, unknown owner or not registered
    InvalidRefreshToken,
    /// The user was deleted while the request was in flight
    UserGone,
    /// Too many concurrent writes to the same user
    Contention,
    Database(sqlx::Error),
    Token(JwtError),
    Password(PasswordError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Validation(msg) => write!(f, "{}", msg),
            SessionError::DuplicateUser => {
                write!(f, "User with this email or username already exists")
            }
            SessionError::InvalidCredentials => write!(f, "Invalid email or password"),
            SessionError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            SessionError::UserGone => write!(f, "User not found"),
            SessionError::Contention => write!(f, "Too many concurrent updates"),
            SessionError::Database(e) => write!(f, "Database error: {}", e),
            SessionError::Token(e) => write!(f, "Token error: {}", e),
            SessionError::Password(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Database(e)
    }
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        SessionError::Token(e)
    }
}

impl From<PasswordError> for SessionError {
    fn from(e: PasswordError) -> Self {
        SessionError::Password(e)
    }
}

#[derive(Clone)]
pub struct SessionService {
    db: Database,
    jwt: Arc<JwtConfig>,
}

impl SessionService {
    pub fn new(db: Database, jwt: Arc<JwtConfig>) -> Self {
        Self { db, jwt }
    }

    /// Create an account and open its first session.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, SessionError> {
        let email = normalize_email(email).map_err(SessionError::Validation)?;
        validate_password(password).map_err(SessionError::Validation)?;
        let username = normalize_username(username).map_err(SessionError::Validation)?;

        let users = self.db.users();
        if users.exists_with(username, &email).await? {
            return Err(SessionError::DuplicateUser);
        }

        let password_hash = password::hash_password(password).await?;
        let uuid = uuid::Uuid::new_v4().to_string();
        let (tokens, refresh) = self.issue_pair(&uuid)?;

        let user = users
            .create(NewUser {
                uuid: &uuid,
                username,
                email: &email,
                password_hash: &password_hash,
                refresh_tokens: RefreshTokenSet::new().add(
                    &refresh.token,
                    refresh.ttl,
                    refresh.issued_at,
                ),
            })
            .await
            .map_err(|e| {
                // Lost a race with another registration for the same name
                if is_unique_violation(&e) {
                    SessionError::DuplicateUser
                } else {
                    SessionError::Database(e)
                }
            })?;

        info!(user = %user.uuid, username = %user.username, "User registered");
        Ok(Session { user, tokens })
    }

    /// Authenticate by email and password and open a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.db.users().get_by_email(&email).await? else {
            password::verify_dummy(password).await;
            warn!("Login failed: unknown email");
            return Err(SessionError::InvalidCredentials);
        };

        if !password::verify_password(password, &user.password_hash).await? {
            warn!(user = %user.uuid, "Login failed: wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        let (tokens, refresh) = self.issue_pair(&user.uuid)?;
        let user = self
            .update_tokens(user, |set| {
                Ok(set.add(&refresh.token, refresh.ttl, refresh.issued_at))
            })
            .await
            .map_err(|e| match e {
                SessionError::UserGone => SessionError::InvalidCredentials,
                e => e,
            })?;

        info!(user = %user.uuid, sessions = user.refresh_tokens.len(), "Login successful");
        Ok(Session { user, tokens })
    }

    /// Revoke one refresh token of an authenticated user. Idempotent.
    pub async fn logout(&self, user: User, refresh_token: Option<&str>) -> Result<(), SessionError> {
        let now = unix_now()?;
        let user = self
            .update_tokens(user, |set| {
                let set = set.prune_expired(now);
                Ok(match refresh_token {
                    Some(token) => set.remove(token),
                    None => set,
                })
            })
            .await?;

        info!(user = %user.uuid, sessions = user.refresh_tokens.len(), "Logout successful");
        Ok(())
    }

    /// Exchange a registered refresh token for a new pair, consuming it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, SessionError> {
        let claims = self.jwt.verify_refresh_token(refresh_token).map_err(|e| {
            warn!(error = %e, "Refresh rejected");
            SessionError::InvalidRefreshToken
        })?;

        let user = self
            .db
            .users()
            .get_by_uuid(&claims.sub)
            .await?
            .ok_or(SessionError::InvalidRefreshToken)?;

        let now = unix_now()?;
        let (tokens, next) = self.issue_pair(&user.uuid)?;
        let result = self
            .update_tokens(user, |set| {
                let set = set.prune_expired(now);
                if !set.contains(refresh_token) {
                    return Err(SessionError::InvalidRefreshToken);
                }
                Ok(set
                    .remove(refresh_token)
                    .add(&next.token, next.ttl, next.issued_at))
            })
            .await;

        match result {
            Ok(user) => {
                info!(user = %user.uuid, "Refresh token rotated");
                Ok(tokens)
            }
            Err(SessionError::InvalidRefreshToken) => {
                warn!(user = %claims.sub, "Refresh rejected: token not registered");
                Err(SessionError::InvalidRefreshToken)
            }
            Err(SessionError::UserGone | SessionError::Contention) => {
                Err(SessionError::InvalidRefreshToken)
            }
            Err(e) => Err(e),
        }
    }

    fn issue_pair(&self, user_uuid: &str) -> Result<(TokenPair, IssuedToken), SessionError> {
        let access = self.jwt.issue_access_token(user_uuid)?;
        let refresh = self.jwt.issue_refresh_token(user_uuid)?;
        let pair = TokenPair {
            access_token: access.token,
            refresh_token: refresh.token.clone(),
        };
        Ok((pair, refresh))
    }

    /// Apply `mutate` to the user's token set and persist it, retrying on
    /// concurrent modification. Returns the user as written.
    async fn update_tokens<F>(&self, mut user: User, mutate: F) -> Result<User, SessionError>
    where
        F: Fn(RefreshTokenSet) -> Result<RefreshTokenSet, SessionError>,
    {
        let users = self.db.users();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let tokens = mutate(user.refresh_tokens.clone())?;

            if users
                .replace_refresh_tokens(user.id, &tokens, user.revision)
                .await?
            {
                user.refresh_tokens = tokens;
                user.revision += 1;
                return Ok(user);
            }

            warn!(user = %user.uuid, attempt, "Refresh tokens modified concurrently, retrying");
            user = users
                .get_by_id(user.id)
                .await?
                .ok_or(SessionError::UserGone)?;
        }

        Err(SessionError::Contention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::TokenLifetimes;

    async fn service() -> (SessionService, Database) {
        let db = Database::open(":memory:").await.unwrap();
        let jwt = Arc::new(JwtConfig::new(
            b"test-access-secret-key-for-testing",
            b"test-refresh-secret-key-for-testing",
        ));
        (SessionService::new(db.clone(), jwt), db)
    }

    #[tokio::test]
    async fn test_register_registers_refresh_token() {
        let (service, db) = service().await;

        let err = service
            .register("u1", "U1@E.com", "secret1")
            .await
            .unwrap_err();
        // "u1" is shorter than the minimum username length
        assert!(matches!(err, SessionError::Validation(_)));

        let session = service
            .register("user1", "U1@E.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.user.email, "u1@e.com");

        let stored = db.users().get_by_uuid(&session.user.uuid).await.unwrap().unwrap();
        assert!(stored.refresh_tokens.contains(&session.tokens.refresh_token));
        assert_ne!(stored.password_hash, "secret1");
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let (service, _) = service().await;

        service.register("alice", "alice@example.com", "secret1").await.unwrap();

        let by_email = service.register("alice2", "ALICE@example.com", "secret1").await;
        assert!(matches!(by_email, Err(SessionError::DuplicateUser)));

        let by_name = service.register("Alice", "other@example.com", "secret1").await;
        assert!(matches!(by_name, Err(SessionError::DuplicateUser)));
    }

    #[tokio::test]
    async fn test_login_accumulates_sessions() {
        let (service, db) = service().await;
        let registered = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();

        let login = service.login("alice@example.com", "secret1").await.unwrap();
        assert_ne!(login.tokens.refresh_token, registered.tokens.refresh_token);

        let stored = db.users().get_by_id(registered.user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, _) = service().await;
        service.register("alice", "alice@example.com", "secret1").await.unwrap();

        let wrong_password = service.login("alice@example.com", "nope123").await.unwrap_err();
        let unknown_email = service.login("bob@example.com", "secret1").await.unwrap_err();

        assert!(matches!(wrong_password, SessionError::InvalidCredentials));
        assert!(matches!(unknown_email, SessionError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_refresh_is_one_shot() {
        let (service, _) = service().await;
        let session = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();

        let rotated = service.refresh(&session.tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, session.tokens.refresh_token);

        let replay = service.refresh(&session.tokens.refresh_token).await;
        assert!(matches!(replay, Err(SessionError::InvalidRefreshToken)));

        // The replacement is usable
        service.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_record() {
        let (service, db) = service().await;
        let session = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();

        // Signature and exp are still valid, but the registered record is dead
        let user = db.users().get_by_id(session.user.id).await.unwrap().unwrap();
        let expired = RefreshTokenSet::new().add(&session.tokens.refresh_token, 0, 1_000);
        assert!(
            db.users()
                .replace_refresh_tokens(user.id, &expired, user.revision)
                .await
                .unwrap()
        );

        let result = service.refresh(&session.tokens.refresh_token).await;
        assert!(matches!(result, Err(SessionError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (service, _) = service().await;
        let session = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();

        let result = service.refresh(&session.tokens.access_token).await;
        assert!(matches!(result, Err(SessionError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_logout_with_stale_user_keeps_concurrent_rotation() {
        let (service, db) = service().await;
        let first = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();
        let second = service.login("alice@example.com", "secret1").await.unwrap();

        // Snapshot taken before another request rotates the first token
        let stale = db.users().get_by_id(first.user.id).await.unwrap().unwrap();
        let rotated = service.refresh(&first.tokens.refresh_token).await.unwrap();

        service
            .logout(stale, Some(&second.tokens.refresh_token))
            .await
            .unwrap();

        let stored = db.users().get_by_id(first.user.id).await.unwrap().unwrap();
        assert!(!stored.refresh_tokens.contains(&second.tokens.refresh_token));
        assert!(!stored.refresh_tokens.contains(&first.tokens.refresh_token));
        assert!(stored.refresh_tokens.contains(&rotated.refresh_token));
    }

    #[tokio::test]
    async fn test_logout_without_token_is_noop() {
        let (service, db) = service().await;
        let session = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();

        service.logout(session.user.clone(), None).await.unwrap();
        service
            .logout(session.user.clone(), Some("not-a-registered-token"))
            .await
            .unwrap();

        let stored = db.users().get_by_id(session.user.id).await.unwrap().unwrap();
        assert!(stored.refresh_tokens.contains(&session.tokens.refresh_token));
    }

    #[tokio::test]
    async fn test_logout_after_delete() {
        let (service, db) = service().await;
        let session = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();

        db.users().delete(session.user.id).await.unwrap();

        let result = service
            .logout(session.user, Some(&session.tokens.refresh_token))
            .await;
        assert!(matches!(result, Err(SessionError::UserGone)));
    }

    #[tokio::test]
    async fn test_expired_refresh_jwt_rejected() {
        let db = Database::open(":memory:").await.unwrap();
        let jwt = Arc::new(JwtConfig::with_lifetimes(
            b"test-access-secret-key-for-testing",
            b"test-refresh-secret-key-for-testing",
            TokenLifetimes {
                access_secs: 60,
                refresh_secs: 1,
            },
        ));
        let service = SessionService::new(db, jwt);

        let session = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

        let result = service.refresh(&session.tokens.refresh_token).await;
        assert!(matches!(result, Err(SessionError::InvalidRefreshToken)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_refreshes_rotate_once() {
        let path = std::env::temp_dir().join(format!("quillpost-race-{}.db", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();
        let db = Database::open(&path).await.unwrap();
        let jwt = Arc::new(JwtConfig::new(
            b"test-access-secret-key-for-testing",
            b"test-refresh-secret-key-for-testing",
        ));
        let service = SessionService::new(db.clone(), jwt);

        let session = service
            .register("alice", "alice@example.com", "secret1")
            .await
            .unwrap();
        let token = session.tokens.refresh_token.clone();

        let (a, b) = tokio::join!(service.refresh(&token), service.refresh(&token));
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);

        let stored = db.users().get_by_id(session.user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_tokens.len(), 1);
        assert!(!stored.refresh_tokens.contains(&token));

        db.pool().close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }
    }
}
