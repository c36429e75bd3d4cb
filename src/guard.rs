//! Request-scoped authentication guard.
//!
//! A [`JwtGuard`] lives for one request.  It pulls the raw token from its
//! token source at most once, resolves the principal at most once, and
//! coordinates credential checks, token issuance, refresh and
//! invalidation through the injected collaborators.

use std::sync::Arc;

use serde_json::Value;

use crate::claims::{CustomClaims, Payload};
use crate::error::{AuthError, AuthFailure};
use crate::events::{AuthEvent, EventNotifier};
use crate::extension::Extensions;
use crate::provider::{Credentials, JwtSubject, PrincipalStore};
use crate::token::TokenCodec;

type TokenSource = Box<dyn FnOnce() -> Option<String> + Send>;

enum TokenSlot {
    Unparsed(TokenSource),
    Parsed(Option<String>),
}

/// Memoized outcome of principal resolution.
#[derive(Debug, Clone)]
pub enum Resolution<P> {
    Unresolved,
    Resolved(P),
    Unauthenticated(AuthFailure),
}

impl<P> Resolution<P> {
    pub fn principal(&self) -> Option<&P> {
        match self {
            Resolution::Resolved(p) => Some(p),
            _ => None,
        }
    }
}

/// Result of [`JwtGuard::attempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Credentials valid, token issued.
    Issued(String),
    /// Credentials valid, no token requested.
    Authenticated,
    Rejected,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, AttemptOutcome::Rejected)
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Issued(t) => Some(t),
            _ => None,
        }
    }
}

/// Stateless JWT guard for one authentication context.
///
/// ```rust
/// use std::sync::Arc;
/// use jwt_guard::{Credentials, JwtCodec, JwtConfig, JwtGuard, JwtSubject, NoopNotifier, PrincipalStore};
///
/// #[derive(Clone)]
/// struct User { id: u32 }
///
/// impl JwtSubject for User {
///     fn jwt_identifier(&self) -> String { self.id.to_string() }
/// }
///
/// struct Users;
///
/// impl PrincipalStore for Users {
///     type Principal = User;
///     fn retrieve_by_id(&self, id: &str) -> Option<User> {
///         (id == "1").then_some(User { id: 1 })
///     }
///     fn validate(&self, credentials: &Credentials) -> Option<User> {
///         (credentials.get("password").map(String::as_str) == Some("secret")).then_some(User { id: 1 })
///     }
/// }
///
/// let codec = Arc::new(JwtCodec::new(JwtConfig::new("app-secret")));
/// let mut guard: JwtGuard<User> =
///     JwtGuard::new(codec.clone(), Arc::new(Users), Arc::new(NoopNotifier), || None);
/// let token = guard.login(User { id: 1 }).unwrap();
///
/// // A later request carrying the token.
/// let mut guard: JwtGuard<User> =
///     JwtGuard::new(codec, Arc::new(Users), Arc::new(NoopNotifier), move || Some(token));
/// assert_eq!(guard.id().as_deref(), Some("1"));
/// ```
pub struct JwtGuard<P: JwtSubject + Clone + 'static> {
    codec: Arc<dyn TokenCodec>,
    store: Arc<dyn PrincipalStore<Principal = P>>,
    notifier: Arc<dyn EventNotifier<P>>,
    extensions: Arc<Extensions<P>>,
    token: TokenSlot,
    resolution: Resolution<P>,
    last_attempted: Option<P>,
    pending_claims: CustomClaims,
}

impl<P: JwtSubject + Clone + 'static> JwtGuard<P> {
    /// `token_source` is called at most once, the first time the guard
    /// needs the request's token.
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        store: Arc<dyn PrincipalStore<Principal = P>>,
        notifier: Arc<dyn EventNotifier<P>>,
        token_source: impl FnOnce() -> Option<String> + Send + 'static,
    ) -> Self {
        Self {
            codec,
            store,
            notifier,
            extensions: Arc::new(Extensions::new()),
            token: TokenSlot::Unparsed(Box::new(token_source)),
            resolution: Resolution::Unresolved,
            last_attempted: None,
            pending_claims: CustomClaims::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: Arc<Extensions<P>>) -> Self {
        self.extensions = extensions;
        self
    }

    // ── Resolution ───────────────────────────────────────────────────────

    /// The authenticated principal, or `None` for any failure.
    pub fn user(&mut self) -> Option<&P> {
        if let Resolution::Unresolved = self.resolution {
            self.resolution = match self.resolve_from_token() {
                Ok(principal) => Resolution::Resolved(principal),
                Err(failure) => {
                    tracing::debug!(%failure, "request is unauthenticated");
                    Resolution::Unauthenticated(failure)
                }
            };
        }
        self.resolution.principal()
    }

    /// Like [`user`](Self::user), but every failure becomes
    /// [`AuthError::UserNotDefined`].  Use [`failure`](Self::failure) to
    /// learn the cause.
    pub fn user_or_fail(&mut self) -> Result<&P, AuthError> {
        self.user().ok_or(AuthError::UserNotDefined)
    }

    pub fn check(&mut self) -> bool {
        self.user().is_some()
    }

    pub fn guest(&mut self) -> bool {
        !self.check()
    }

    pub fn id(&mut self) -> Option<String> {
        self.user().map(JwtSubject::jwt_identifier)
    }

    /// Whether a principal is already memoized.  Never resolves.
    pub fn has_user(&self) -> bool {
        self.resolution.principal().is_some()
    }

    pub fn resolution(&self) -> &Resolution<P> {
        &self.resolution
    }

    /// The memoized reason resolution came up empty.
    pub fn failure(&self) -> Option<&AuthFailure> {
        match &self.resolution {
            Resolution::Unauthenticated(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn set_user(&mut self, principal: P) -> &mut Self {
        self.resolution = Resolution::Resolved(principal);
        self
    }

    fn resolve_from_token(&mut self) -> Result<P, AuthFailure> {
        let token = self.token().map(str::to_owned).ok_or(AuthFailure::NoToken)?;

        let payload = self
            .codec
            .decode(&token)
            .map_err(AuthFailure::InvalidToken)?;

        if let Some(type_name) = self.store.principal_type_name() {
            if !payload.matches_subject_model(type_name) {
                return Err(AuthFailure::InvalidToken(AuthError::SubjectMismatch));
            }
        }

        self.store
            .retrieve_by_id(&payload.sub)
            .ok_or(AuthFailure::PrincipalNotFound(payload.sub))
    }

    // ── Credentials ──────────────────────────────────────────────────────

    /// Check `credentials` against the store.  With `login`, a token is
    /// issued for the principal.  Only a failure to issue the token is an
    /// error; wrong credentials give [`AttemptOutcome::Rejected`].
    pub fn attempt(
        &mut self,
        credentials: &Credentials,
        login: bool,
    ) -> Result<AttemptOutcome, AuthError> {
        self.notify(AuthEvent::Attempting { credentials });

        let principal = self.store.validate(credentials);
        self.last_attempted = principal.clone();

        let Some(principal) = principal else {
            self.notify(AuthEvent::Failed { credentials });
            tracing::debug!("credentials rejected");
            return Ok(AttemptOutcome::Rejected);
        };

        self.notify(AuthEvent::Validated {
            principal: &principal,
        });

        if login {
            Ok(AttemptOutcome::Issued(self.login(principal)?))
        } else {
            self.set_user(principal);
            Ok(AttemptOutcome::Authenticated)
        }
    }

    /// Authenticate for this context only, without issuing a token.
    pub fn once(&mut self, credentials: &Credentials) -> bool {
        matches!(
            self.attempt(credentials, false),
            Ok(AttemptOutcome::Authenticated)
        )
    }

    /// Same as [`once`](Self::once).
    pub fn validate(&mut self, credentials: &Credentials) -> bool {
        self.once(credentials)
    }

    pub fn last_attempted(&self) -> Option<&P> {
        self.last_attempted.as_ref()
    }

    // ── Issuance ─────────────────────────────────────────────────────────

    /// Issue a token for `principal` without any credential check and make
    /// it the current principal.
    pub fn login(&mut self, principal: P) -> Result<String, AuthError> {
        let token = self.issue_token(&principal)?;
        self.token = TokenSlot::Parsed(Some(token.clone()));
        self.notify(AuthEvent::Login {
            principal: &principal,
        });
        tracing::info!(sub = %principal.jwt_identifier(), "logged in");
        self.resolution = Resolution::Resolved(principal);
        Ok(token)
    }

    /// Issue a token for the stored principal `id`.  No events, no state change
    /// besides consuming pending claims.
    pub fn token_by_id(&mut self, id: &str) -> Result<Option<String>, AuthError> {
        match self.store.retrieve_by_id(id) {
            Some(principal) => self.issue_token(&principal).map(Some),
            None => Ok(None),
        }
    }

    /// Make the stored principal `id` current for this context only.
    pub fn once_using_id(&mut self, id: &str) -> bool {
        match self.store.retrieve_by_id(id) {
            Some(principal) => {
                self.set_user(principal);
                true
            }
            None => false,
        }
    }

    pub fn by_id(&mut self, id: &str) -> bool {
        self.once_using_id(id)
    }

    /// Extra claims for the next issued token.
    pub fn claims(&mut self, claims: CustomClaims) -> &mut Self {
        self.pending_claims.extend(claims);
        self
    }

    fn issue_token(&mut self, principal: &P) -> Result<String, AuthError> {
        let mut claims = principal.jwt_custom_claims();
        claims.extend(std::mem::take(&mut self.pending_claims));
        self.codec.encode(
            &principal.jwt_identifier(),
            self.store.principal_type_name(),
            claims,
        )
    }

    // ── Token lifecycle ──────────────────────────────────────────────────

    /// Forget the principal and the token, invalidating the token when one
    /// was present.  Having no token is not an error.
    pub fn logout(&mut self, force_forever: bool) -> Result<(), AuthError> {
        let token = self.token().map(str::to_owned);
        let invalidated = match &token {
            Some(token) => self.codec.invalidate(token, force_forever),
            None => Ok(()),
        };

        self.token = TokenSlot::Parsed(None);
        let previous = std::mem::replace(
            &mut self.resolution,
            Resolution::Unauthenticated(AuthFailure::NoToken),
        );
        let principal = match previous {
            Resolution::Resolved(p) => Some(p),
            _ => None,
        };
        self.notify(AuthEvent::Logout {
            principal: principal.as_ref(),
        });
        tracing::info!(had_token = token.is_some(), "logged out");

        invalidated
    }

    pub fn refresh(&mut self, force_forever: bool, reset_claims: bool) -> Result<String, AuthError> {
        let token = self.require_token()?;
        self.codec.refresh(&token, force_forever, reset_claims)
    }

    pub fn invalidate(&mut self, force_forever: bool) -> Result<bool, AuthError> {
        let token = self.require_token()?;
        self.codec.invalidate(&token, force_forever)?;
        Ok(true)
    }

    /// Decoded claims of the current token.  Unlike [`user`](Self::user),
    /// decode failures are returned.
    pub fn payload(&mut self) -> Result<Payload, AuthError> {
        let token = self.require_token()?;
        self.codec.decode(&token)
    }

    /// The request's raw token, pulled from the token source on first use.
    pub fn token(&mut self) -> Option<&str> {
        if let TokenSlot::Unparsed(_) = self.token {
            if let TokenSlot::Unparsed(source) =
                std::mem::replace(&mut self.token, TokenSlot::Parsed(None))
            {
                self.token = TokenSlot::Parsed(source());
            }
        }
        match &self.token {
            TokenSlot::Parsed(token) => token.as_deref(),
            TokenSlot::Unparsed(_) => None,
        }
    }

    /// Replace the token.  Any memoized resolution belonged to the old token
    /// and is dropped.
    pub fn set_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.token = TokenSlot::Parsed(Some(token.into()));
        self.resolution = Resolution::Unresolved;
        self
    }

    fn require_token(&mut self) -> Result<String, AuthError> {
        self.token().map(str::to_owned).ok_or(AuthError::TokenMissing)
    }

    // ── Collaborators ────────────────────────────────────────────────────

    pub fn codec(&self) -> &Arc<dyn TokenCodec> {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn PrincipalStore<Principal = P>> {
        &self.store
    }

    /// Run the extension registered as `name`.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, AuthError> {
        let extension = self
            .extensions
            .get(name)
            .ok_or_else(|| AuthError::ExtensionNotFound(name.to_owned()))?;
        extension(self, args)
    }

    fn notify(&self, event: AuthEvent<'_, P>) {
        if let Err(error) = self.notifier.notify(&event) {
            tracing::warn!(event = event.kind(), %error, "auth event notifier failed");
        }
    }
}
