use std::sync::Arc;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::blacklist::{Blacklist, BlacklistStorage, MemoryStorage};
use crate::claims::{hash_subject_model, Claims, CustomClaims, Payload, REGISTERED_CLAIMS};
use crate::config::JwtConfig;
use crate::error::AuthError;

/// Current Unix time in seconds.
pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as i64
}

/// Random alphanumeric `jti`.
pub fn generate_jti(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Encode, verify, refresh and invalidate compact signed tokens.
///
/// The guard only talks to this trait, so any issuer can sit behind it.
/// [`JwtCodec`] is the stock HMAC implementation.
pub trait TokenCodec: Send + Sync {
    /// Issue a token for `subject`.  `subject_model` names the principal
    /// type and becomes the `prv` claim when subjects are locked.
    fn encode(
        &self,
        subject: &str,
        subject_model: Option<&str>,
        claims: CustomClaims,
    ) -> Result<String, AuthError>;

    /// Verify the signature, then the registered claims and the blacklist.
    fn decode(&self, token: &str) -> Result<Payload, AuthError>;

    /// Exchange a token still inside its refresh window for a new one.
    fn refresh(&self, token: &str, force_forever: bool, reset_claims: bool)
        -> Result<String, AuthError>;

    /// Put the token on the blacklist.
    fn invalidate(&self, token: &str, force_forever: bool) -> Result<(), AuthError>;
}

/// [`TokenCodec`] over `jsonwebtoken` with an HMAC secret.
#[derive(Clone)]
pub struct JwtCodec {
    config: JwtConfig,
    blacklist: Blacklist,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCodec")
            .field("algorithm", &self.config.algorithm)
            .field("issuer", &self.config.issuer())
            .field("blacklist", &self.blacklist)
            .finish_non_exhaustive()
    }
}

impl JwtCodec {
    /// Codec with an in-process blacklist.
    pub fn new(config: JwtConfig) -> Self {
        Self::with_storage(config, Arc::new(MemoryStorage::new()))
    }

    pub fn with_storage(config: JwtConfig, storage: Arc<dyn BlacklistStorage>) -> Self {
        let blacklist = Blacklist::new(
            storage,
            config.blacklist_grace_period_secs,
            config.refresh_ttl_minutes,
        );
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            blacklist,
            config,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Sign a fully built claim set as-is.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        if self.config.secret.is_empty() {
            return Err(AuthError::ConfigError("JWT secret must not be empty".into()));
        }
        encode(&Header::new(self.config.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// `iat` defaults to the same instant as `nbf`; refreshes may keep the
    /// original one.
    fn build_claims(
        &self,
        sub: String,
        iat: Option<i64>,
        prv: Option<String>,
        custom: CustomClaims,
    ) -> Result<Claims, AuthError> {
        let now = now();
        let exp = now
            .checked_add(self.config.ttl_secs()?)
            .ok_or_else(|| AuthError::ConfigError("token expiry overflows".into()))?;
        Ok(Claims {
            iss: Some(self.config.issuer()),
            iat: iat.unwrap_or(now),
            exp,
            nbf: now,
            jti: generate_jti(16),
            sub,
            aud: self.config.audience.clone(),
            prv,
            custom,
        })
    }

    /// Signature and registered-claim checks.  `exp` is skipped in the
    /// refresh flow, where the refresh window applies instead.
    fn verify(&self, token: &str, refresh_flow: bool) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.validate_exp = !refresh_flow;
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        if self.config.validate_issuer {
            validation.set_issuer(&[self.config.issuer()]);
        }

        if let Some(aud) = &self.config.audience {
            validation.set_audience(aud);
        } else {
            validation.validate_aud = false;
        }

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = data.claims;

        if refresh_flow {
            let window_end = claims.iat.saturating_add(self.config.refresh_ttl_secs()?);
            if window_end < now() {
                return Err(AuthError::RefreshExpired);
            }
        }

        Ok(claims)
    }

    fn check_blacklist(&self, claims: &Claims) -> Result<(), AuthError> {
        if self.config.blacklist_enabled && self.blacklist.has(claims) {
            tracing::debug!(jti = %claims.jti, "rejected blacklisted token");
            return Err(AuthError::TokenBlacklisted);
        }
        Ok(())
    }

    fn blacklist_claims(&self, claims: &Claims, force_forever: bool) {
        if force_forever {
            self.blacklist.add_forever(claims);
        } else {
            self.blacklist.add(claims);
        }
    }
}

impl TokenCodec for JwtCodec {
    fn encode(
        &self,
        subject: &str,
        subject_model: Option<&str>,
        mut claims: CustomClaims,
    ) -> Result<String, AuthError> {
        if subject.is_empty() {
            return Err(AuthError::InvalidSubject("subject must not be empty".into()));
        }

        for name in REGISTERED_CLAIMS {
            if claims.remove(name).is_some() {
                tracing::debug!(claim = name, "ignoring custom claim shadowing a registered claim");
            }
        }

        let prv = subject_model
            .filter(|_| self.config.lock_subject)
            .map(hash_subject_model);

        let claims = self.build_claims(subject.to_owned(), None, prv, claims)?;
        self.sign(&claims)
    }

    fn decode(&self, token: &str) -> Result<Payload, AuthError> {
        let claims = self.verify(token, false)?;
        self.check_blacklist(&claims)?;
        Ok(claims)
    }

    fn refresh(
        &self,
        token: &str,
        force_forever: bool,
        reset_claims: bool,
    ) -> Result<String, AuthError> {
        let old = self.verify(token, true)?;
        self.check_blacklist(&old)?;

        if self.config.blacklist_enabled {
            self.blacklist_claims(&old, force_forever);
        }

        let custom = if reset_claims {
            old.custom
                .iter()
                .filter(|(name, _)| self.config.persistent_claims.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        } else {
            old.custom.clone()
        };

        let iat = (!self.config.refresh_iat).then_some(old.iat);
        let claims = self.build_claims(old.sub.clone(), iat, old.prv.clone(), custom)?;
        tracing::debug!(sub = %claims.sub, old_jti = %old.jti, jti = %claims.jti, "refreshed token");
        self.sign(&claims)
    }

    fn invalidate(&self, token: &str, force_forever: bool) -> Result<(), AuthError> {
        if !self.config.blacklist_enabled {
            return Err(AuthError::BlacklistDisabled);
        }
        let claims = self.verify(token, false)?;
        self.blacklist_claims(&claims, force_forever);
        tracing::debug!(jti = %claims.jti, forever = force_forever, "invalidated token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec(cfg: JwtConfig) -> JwtCodec {
        JwtCodec::new(cfg)
    }

    fn claims_at(iat: i64, exp: i64) -> Claims {
        Claims {
            iss: None,
            iat,
            exp,
            nbf: iat,
            jti: generate_jti(16),
            sub: "5".into(),
            aud: None,
            prv: None,
            custom: CustomClaims::new(),
        }
    }

    #[test]
    fn roundtrip() {
        let c = codec(JwtConfig::new("test-secret"));
        let token = c.encode("42", None, CustomClaims::new()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        let claims = c.decode(&token).unwrap();
        assert_eq!(claims.user_id_u32(), Some(42));
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.jti.len(), 16);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.nbf, claims.iat);
        assert!(claims.prv.is_none());
    }

    #[test]
    fn locked_subject_emits_prv() {
        let c = codec(JwtConfig::new("test-secret"));
        let token = c.encode("42", Some("App\\Models\\User"), CustomClaims::new()).unwrap();
        let claims = c.decode(&token).unwrap();
        assert_eq!(claims.prv, Some(hash_subject_model("App\\Models\\User")));
        assert!(claims.matches_subject_model("App\\Models\\User"));
    }

    #[test]
    fn unlocked_subject_omits_prv() {
        let c = codec(JwtConfig::new("test-secret").lock_subject(false));
        let token = c.encode("42", Some("App\\Models\\User"), CustomClaims::new()).unwrap();
        assert!(c.decode(&token).unwrap().prv.is_none());
    }

    #[test]
    fn custom_claims_roundtrip_and_cannot_shadow_sub() {
        let c = codec(JwtConfig::new("test-secret"));
        let mut extra = CustomClaims::new();
        extra.insert("tenant".into(), json!("acme"));
        extra.insert("sub".into(), json!("999"));
        let token = c.encode("7", None, extra).unwrap();
        let claims = c.decode(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.get("tenant"), Some(json!("acme")));
    }

    #[test]
    fn empty_subject_rejected() {
        let c = codec(JwtConfig::new("s"));
        assert!(matches!(
            c.encode("", None, CustomClaims::new()),
            Err(AuthError::InvalidSubject(_))
        ));
    }

    #[test]
    fn empty_secret_rejected() {
        let c = codec(JwtConfig::new(""));
        assert!(matches!(
            c.encode("1", None, CustomClaims::new()),
            Err(AuthError::ConfigError(_))
        ));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = codec(JwtConfig::new("good"))
            .encode("1", None, CustomClaims::new())
            .unwrap();
        assert!(matches!(
            codec(JwtConfig::new("bad")).decode(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn malformed_token_rejected() {
        let c = codec(JwtConfig::new("s"));
        assert!(matches!(c.decode("not.a.jwt"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(c.decode(""), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_token_rejected() {
        let c = codec(JwtConfig::new("s"));
        let t = now();
        let token = c.sign(&claims_at(t - 7200, t - 3600)).unwrap();
        assert!(matches!(c.decode(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn future_nbf_rejected() {
        let c = codec(JwtConfig::new("s"));
        let t = now();
        let mut claims = claims_at(t, t + 7200);
        claims.nbf = t + 3600;
        let token = c.sign(&claims).unwrap();
        assert_eq!(c.decode(&token), Err(AuthError::TokenNotYetValid));
    }

    #[test]
    fn out_of_range_ttl_refuses_to_encode() {
        let c = codec(JwtConfig::new("s").ttl_minutes(u64::MAX));
        assert!(matches!(
            c.encode("1", None, CustomClaims::new()),
            Err(AuthError::ConfigError(_))
        ));

        let c = codec(JwtConfig::new("s").ttl_minutes(i64::MAX as u64 / 60));
        assert!(matches!(
            c.encode("1", None, CustomClaims::new()),
            Err(AuthError::ConfigError(_))
        ));
    }

    #[test]
    fn issuer_enforced_when_enabled() {
        let issuing = codec(JwtConfig::new("s").base_url("https://a.example.com"));
        let token = issuing.encode("1", None, CustomClaims::new()).unwrap();
        let verifying = codec(
            JwtConfig::new("s")
                .base_url("https://b.example.com")
                .validate_issuer(true),
        );
        assert!(matches!(verifying.decode(&token), Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn wrong_audience_rejected() {
        let issuing = codec(JwtConfig::new("secret").audience(["https://api.example.com"]));
        let token = issuing.encode("1", None, CustomClaims::new()).unwrap();

        let verifying = codec(JwtConfig::new("secret").audience(["https://other.example.com"]));
        assert!(matches!(verifying.decode(&token), Err(AuthError::InvalidAudience)));

        // No audience configured: the aud claim is not checked.
        assert!(codec(JwtConfig::new("secret")).decode(&token).is_ok());
    }

    #[test]
    fn invalidated_token_is_blacklisted() {
        let c = codec(JwtConfig::new("s"));
        let token = c.encode("1", None, CustomClaims::new()).unwrap();
        c.invalidate(&token, false).unwrap();
        assert!(matches!(c.decode(&token), Err(AuthError::TokenBlacklisted)));
    }

    #[test]
    fn grace_period_keeps_invalidated_token_alive() {
        let c = codec(JwtConfig::new("s").blacklist_grace_period_secs(60));
        let token = c.encode("1", None, CustomClaims::new()).unwrap();
        c.invalidate(&token, false).unwrap();
        assert!(c.decode(&token).is_ok());
        c.invalidate(&token, true).unwrap();
        assert!(matches!(c.decode(&token), Err(AuthError::TokenBlacklisted)));
    }

    #[test]
    fn plain_invalidate_cannot_lift_forever_entry() {
        let c = codec(JwtConfig::new("s").blacklist_grace_period_secs(60));
        let token = c.encode("1", None, CustomClaims::new()).unwrap();
        c.invalidate(&token, true).unwrap();
        assert_eq!(c.decode(&token), Err(AuthError::TokenBlacklisted));
        c.invalidate(&token, false).unwrap();
        assert_eq!(c.decode(&token), Err(AuthError::TokenBlacklisted));
    }

    #[test]
    fn invalidate_requires_blacklist() {
        let c = codec(JwtConfig::new("s").blacklist_enabled(false));
        let token = c.encode("1", None, CustomClaims::new()).unwrap();
        assert_eq!(c.invalidate(&token, false), Err(AuthError::BlacklistDisabled));
    }

    #[test]
    fn refresh_issues_new_token_and_blacklists_old() {
        let c = codec(JwtConfig::new("s"));
        let mut extra = CustomClaims::new();
        extra.insert("role".into(), json!("admin"));
        let token = c.encode("9", Some("App\\Models\\User"), extra).unwrap();
        let old = c.decode(&token).unwrap();

        let fresh = c.refresh(&token, false, false).unwrap();
        assert_ne!(fresh, token);
        let claims = c.decode(&fresh).unwrap();
        assert_eq!(claims.sub, "9");
        assert_eq!(claims.iat, old.iat);
        assert_eq!(claims.prv, old.prv);
        assert_ne!(claims.jti, old.jti);
        assert_eq!(claims.get("role"), Some(json!("admin")));

        assert!(matches!(c.decode(&token), Err(AuthError::TokenBlacklisted)));
        assert!(matches!(
            c.refresh(&token, false, false),
            Err(AuthError::TokenBlacklisted)
        ));
    }

    #[test]
    fn refresh_with_reset_keeps_only_persistent_claims() {
        let c = codec(JwtConfig::new("s").persistent_claims(["tenant"]));
        let mut extra = CustomClaims::new();
        extra.insert("tenant".into(), json!("acme"));
        extra.insert("role".into(), json!("admin"));
        let token = c.encode("9", None, extra).unwrap();

        let claims = c.decode(&c.refresh(&token, false, true).unwrap()).unwrap();
        assert_eq!(claims.get("tenant"), Some(json!("acme")));
        assert!(!claims.has("role"));
    }

    #[test]
    fn expired_token_refreshable_inside_window() {
        let c = codec(JwtConfig::new("s").refresh_iat(true));
        let t = now();
        let token = c.sign(&claims_at(t - 7200, t - 3600)).unwrap();
        let claims = c.decode(&c.refresh(&token, false, false).unwrap()).unwrap();
        assert_eq!(claims.sub, "5");
        assert!(claims.iat >= t);
    }

    #[test]
    fn refresh_window_enforced() {
        let c = codec(JwtConfig::new("s").refresh_ttl_minutes(60));
        let t = now();
        let token = c.sign(&claims_at(t - 7200, t - 3600)).unwrap();
        assert_eq!(c.refresh(&token, false, false), Err(AuthError::RefreshExpired));
    }

    #[test]
    fn refresh_without_blacklist_leaves_old_token_valid() {
        let c = codec(JwtConfig::new("s").blacklist_enabled(false));
        let token = c.encode("1", None, CustomClaims::new()).unwrap();
        c.refresh(&token, false, false).unwrap();
        assert!(c.decode(&token).is_ok());
    }

    #[test]
    fn jti_is_alphanumeric() {
        let jti = generate_jti(32);
        assert_eq!(jti.len(), 32);
        assert!(jti.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
