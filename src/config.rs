use jsonwebtoken::Algorithm;

use crate::error::AuthError;

/// Configuration for token encode/decode, refresh and blacklisting.
///
/// Build with [`new`](Self::new) and the builder methods, or
/// [`from_env`](Self::from_env).  Defaults follow `tymon/jwt-auth`.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub base_url: String,
    pub auth_path: String,
    /// Token lifetime in minutes.
    pub ttl_minutes: u64,
    /// Minutes after `iat` during which a token may still be refreshed.
    pub refresh_ttl_minutes: u64,
    pub refresh_iat: bool,
    pub leeway_secs: u64,
    /// Emit a `prv` claim tying tokens to the principal type.
    pub lock_subject: bool,
    pub blacklist_enabled: bool,
    pub blacklist_grace_period_secs: u64,
    /// Custom claims kept when a token is refreshed with `reset_claims`.
    pub persistent_claims: Vec<String>,
    pub validate_issuer: bool,
    /// When `Some`, the `aud` claim is both written into generated tokens
    /// and enforced during verification.
    pub audience: Option<Vec<String>>,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            base_url: "http://localhost:8000".into(),
            auth_path: "/api/login".into(),
            ttl_minutes: 60,
            refresh_ttl_minutes: 20_160,
            refresh_iat: false,
            leeway_secs: 0,
            lock_subject: true,
            blacklist_enabled: true,
            blacklist_grace_period_secs: 0,
            persistent_claims: Vec::new(),
            validate_issuer: false,
            audience: None,
        }
    }

    /// Build from environment variables already set in the process.
    ///
    /// | Variable                     | Required | Default                 |
    /// |------------------------------|----------|-------------------------|
    /// | `JWT_SECRET`                 | **yes**  |                         |
    /// | `JWT_ALGO`                   | no       | `HS256`                 |
    /// | `BASE_URL`                   | no       | `http://localhost:8000` |
    /// | `AUTH_PATH`                  | no       | `/api/login`            |
    /// | `JWT_TTL`                    | no       | `60` (minutes)          |
    /// | `JWT_REFRESH_TTL`            | no       | `20160` (minutes)       |
    /// | `JWT_REFRESH_IAT`            | no       | `false`                 |
    /// | `JWT_LEEWAY`                 | no       | `0` (seconds)           |
    /// | `JWT_LOCK_SUBJECT`           | no       | `true`                  |
    /// | `JWT_BLACKLIST_ENABLED`      | no       | `true`                  |
    /// | `JWT_BLACKLIST_GRACE_PERIOD` | no       | `0` (seconds)           |
    /// | `JWT_PERSISTENT_CLAIMS`      | no       | *(empty)*               |
    /// | `JWT_VALIDATE_ISSUER`        | no       | `false`                 |
    /// | `JWT_AUDIENCE`               | no       | *(unset)*               |
    ///
    /// Boolean flags accept `true` or `1`.
    pub fn from_env() -> Result<Self, AuthError> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::ConfigError("JWT_SECRET is not set".into()))?;

        let mut config = Self::new(secret);

        if let Ok(algo) = std::env::var("JWT_ALGO") {
            config.algorithm = parse_algorithm(&algo)?;
        }
        if let Ok(v) = std::env::var("BASE_URL") {
            config.base_url = v;
        }
        if let Ok(v) = std::env::var("AUTH_PATH") {
            config.auth_path = v;
        }

        config.ttl_minutes = env_number("JWT_TTL", config.ttl_minutes);
        config.refresh_ttl_minutes = env_number("JWT_REFRESH_TTL", config.refresh_ttl_minutes);
        config.leeway_secs = env_number("JWT_LEEWAY", config.leeway_secs);
        config.blacklist_grace_period_secs =
            env_number("JWT_BLACKLIST_GRACE_PERIOD", config.blacklist_grace_period_secs);

        config.refresh_iat = env_flag("JWT_REFRESH_IAT", config.refresh_iat);
        config.lock_subject = env_flag("JWT_LOCK_SUBJECT", config.lock_subject);
        config.blacklist_enabled = env_flag("JWT_BLACKLIST_ENABLED", config.blacklist_enabled);
        config.validate_issuer = env_flag("JWT_VALIDATE_ISSUER", config.validate_issuer);

        if let Some(claims) = env_list("JWT_PERSISTENT_CLAIMS") {
            config.persistent_claims = claims;
        }
        config.audience = env_list("JWT_AUDIENCE");

        Ok(config)
    }

    /// Full issuer URI: `{base_url}/{auth_path}`.
    pub fn issuer(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.auth_path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Token lifetime in seconds.
    pub fn ttl_secs(&self) -> Result<i64, AuthError> {
        minutes_to_secs(self.ttl_minutes).ok_or_else(|| {
            AuthError::ConfigError(format!("JWT_TTL of {} minutes is out of range", self.ttl_minutes))
        })
    }

    /// Refresh window in seconds.
    pub fn refresh_ttl_secs(&self) -> Result<i64, AuthError> {
        minutes_to_secs(self.refresh_ttl_minutes).ok_or_else(|| {
            AuthError::ConfigError(format!(
                "JWT_REFRESH_TTL of {} minutes is out of range",
                self.refresh_ttl_minutes
            ))
        })
    }

    pub fn algorithm(mut self, v: Algorithm) -> Self {
        self.algorithm = v;
        self
    }
    pub fn base_url(mut self, v: impl Into<String>) -> Self {
        self.base_url = v.into();
        self
    }
    pub fn auth_path(mut self, v: impl Into<String>) -> Self {
        self.auth_path = v.into();
        self
    }
    pub fn ttl_minutes(mut self, v: u64) -> Self {
        self.ttl_minutes = v;
        self
    }
    pub fn refresh_ttl_minutes(mut self, v: u64) -> Self {
        self.refresh_ttl_minutes = v;
        self
    }
    pub fn refresh_iat(mut self, v: bool) -> Self {
        self.refresh_iat = v;
        self
    }
    pub fn leeway_secs(mut self, v: u64) -> Self {
        self.leeway_secs = v;
        self
    }
    pub fn lock_subject(mut self, v: bool) -> Self {
        self.lock_subject = v;
        self
    }
    pub fn blacklist_enabled(mut self, v: bool) -> Self {
        self.blacklist_enabled = v;
        self
    }
    pub fn blacklist_grace_period_secs(mut self, v: u64) -> Self {
        self.blacklist_grace_period_secs = v;
        self
    }
    pub fn persistent_claims(mut self, v: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.persistent_claims = v.into_iter().map(Into::into).collect();
        self
    }
    pub fn validate_issuer(mut self, v: bool) -> Self {
        self.validate_issuer = v;
        self
    }
    pub fn audience(mut self, v: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.audience = Some(v.into_iter().map(Into::into).collect());
        self
    }
}

/// Only the HMAC family is supported; the key is always `secret`.
fn parse_algorithm(name: &str) -> Result<Algorithm, AuthError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(AuthError::ConfigError(format!(
            "unsupported JWT_ALGO {other:?}, expected HS256, HS384 or HS512"
        ))),
    }
}

/// `None` when the result does not fit an `i64`.
pub(crate) fn minutes_to_secs(minutes: u64) -> Option<i64> {
    i64::try_from(minutes).ok()?.checked_mul(60)
}

fn env_number(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

// Comma-separated list, e.g. "https://api.example.com,https://admin.example.com"
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
}
