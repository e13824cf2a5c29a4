//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{
    ACCESS_TOKEN_DURATION_SECS, MAX_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS,
    TokenLifetimes,
};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MIN_JWT_SECRET_LENGTH: usize = 32;

const ACCESS_SECRET_ENV: &str = "JWT_SECRET";
const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

const DEV_ACCESS_SECRET: &str = "quillpost-dev-access-secret-not-for-production";
const DEV_REFRESH_SECRET: &str = "quillpost-dev-refresh-secret-not-for-production";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "quillpost", about = "Blog backend with JWT session management")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_PATH", default_value = "quillpost.db")]
    pub database: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = ACCESS_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_DURATION_SECS))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = REFRESH_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_DURATION_SECS))]
    pub refresh_token_ttl: u64,

    /// Path to file containing the access token secret. Prefer the JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer the REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Development mode: fall back to built-in secrets when none are configured
    #[arg(long, env = "QUILLPOST_DEV")]
    pub dev: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// The two HMAC secrets, already checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningSecrets {
    pub access: String,
    pub refresh: String,
}

/// Read one secret from its environment variable or, failing that, a file.
/// The environment variable is cleared once read.
fn read_secret(env_var: &str, file: Option<&str>) -> Result<Option<String>, String> {
    if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        return Ok(Some(secret));
    }

    match file {
        Some(path) => std::fs::read_to_string(path)
            .map(|content| Some(content.trim().to_string()))
            .map_err(|e| format!("Failed to read secret file {}: {}", path, e)),
        None => Ok(None),
    }
}

/// Apply the startup rules to the configured secrets.
///
/// Outside development mode both secrets must be set, at least
/// `MIN_JWT_SECRET_LENGTH` characters, and different from each other.
pub fn check_secrets(
    access: Option<String>,
    refresh: Option<String>,
    dev: bool,
) -> Result<SigningSecrets, String> {
    let access = match (access, dev) {
        (Some(secret), _) => secret,
        (None, true) => {
            warn!("{} not set, using development placeholder", ACCESS_SECRET_ENV);
            DEV_ACCESS_SECRET.to_string()
        }
        (None, false) => {
            return Err(format!(
                "Access token secret is required. Set {} (recommended) or use --jwt-secret-file",
                ACCESS_SECRET_ENV
            ));
        }
    };
    let refresh = match (refresh, dev) {
        (Some(secret), _) => secret,
        (None, true) => {
            warn!("{} not set, using development placeholder", REFRESH_SECRET_ENV);
            DEV_REFRESH_SECRET.to_string()
        }
        (None, false) => {
            return Err(format!(
                "Refresh token secret is required. Set {} (recommended) or use --refresh-secret-file",
                REFRESH_SECRET_ENV
            ));
        }
    };

    let problem = if access.len() < MIN_JWT_SECRET_LENGTH || refresh.len() < MIN_JWT_SECRET_LENGTH
    {
        Some(format!(
            "Token secrets must be at least {} characters",
            MIN_JWT_SECRET_LENGTH
        ))
    } else if access == refresh {
        Some("Access and refresh token secrets must differ".to_string())
    } else {
        None
    };

    match problem {
        Some(msg) if !dev => Err(msg),
        Some(msg) => {
            warn!("{} (allowed in development mode)", msg);
            Ok(SigningSecrets { access, refresh })
        }
        None => Ok(SigningSecrets { access, refresh }),
    }
}

/// Load both signing secrets from environment variables or files.
/// Returns None and logs an error if they cannot be loaded.
pub fn load_signing_secrets(args: &Args) -> Option<SigningSecrets> {
    let loaded = read_secret(ACCESS_SECRET_ENV, args.jwt_secret_file.as_deref()).and_then(
        |access| {
            read_secret(REFRESH_SECRET_ENV, args.refresh_secret_file.as_deref())
                .map(|refresh| (access, refresh))
        },
    );

    match loaded.and_then(|(access, refresh)| check_secrets(access, refresh, args.dev)) {
        Ok(secrets) => Some(secrets),
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(db: Database, secrets: SigningSecrets, args: &Args) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: secrets.access.into_bytes(),
        refresh_secret: secrets.refresh.into_bytes(),
        lifetimes: TokenLifetimes {
            access_secs: args.access_token_ttl,
            refresh_secs: args.refresh_token_ttl,
        },
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "access-secret-that-is-long-enough-0123";
    const REFRESH: &str = "refresh-secret-that-is-long-enough-0123";

    #[test]
    fn test_secrets_accepted() {
        let secrets = check_secrets(Some(ACCESS.into()), Some(REFRESH.into()), false).unwrap();
        assert_eq!(secrets.access, ACCESS);
        assert_eq!(secrets.refresh, REFRESH);
    }

    #[test]
    fn test_missing_secret_rejected_outside_dev() {
        assert!(check_secrets(None, Some(REFRESH.into()), false).is_err());
        assert!(check_secrets(Some(ACCESS.into()), None, false).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(check_secrets(Some("short".into()), Some(REFRESH.into()), false).is_err());
    }

    #[test]
    fn test_identical_secrets_rejected() {
        assert!(check_secrets(Some(ACCESS.into()), Some(ACCESS.into()), false).is_err());
    }

    #[test]
    fn test_dev_placeholders_are_distinct() {
        let secrets = check_secrets(None, None, true).unwrap();
        assert_ne!(secrets.access, secrets.refresh);
        assert!(secrets.access.len() >= MIN_JWT_SECRET_LENGTH);
        assert!(secrets.refresh.len() >= MIN_JWT_SECRET_LENGTH);
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["quillpost"]);
        assert_eq!(args.access_token_ttl, 900);
        assert_eq!(args.refresh_token_ttl, 604800);
        assert!(!args.dev);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(Args::try_parse_from(["quillpost", "--access-token-ttl", "0"]).is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        let max = MAX_TOKEN_DURATION_SECS.to_string();
        let args =
            Args::try_parse_from(["quillpost", "--refresh-token-ttl", max.as_str()]).unwrap();
        assert_eq!(args.refresh_token_ttl, MAX_TOKEN_DURATION_SECS);

        let over = (MAX_TOKEN_DURATION_SECS + 1).to_string();
        assert!(Args::try_parse_from(["quillpost", "--refresh-token-ttl", over.as_str()]).is_err());

        let huge = u64::MAX.to_string();
        assert!(Args::try_parse_from(["quillpost", "--access-token-ttl", huge.as_str()]).is_err());
    }
}
