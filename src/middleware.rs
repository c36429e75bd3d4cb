use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::error::AuthError;
use crate::parser::TokenParser;

/// Axum extractor: the raw token of the request.
///
/// Uses the [`TokenParser`] registered as an extension, or the default
/// chain.  Feed it to a guard as the token source:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use jwt_guard::{JwtGuard, JwtSubject, NoopNotifier, OptionalRequestToken, PrincipalStore, TokenCodec};
///
/// fn guard_for<P: JwtSubject + Clone + 'static>(
///     token: OptionalRequestToken,
///     codec: Arc<dyn TokenCodec>,
///     store: Arc<dyn PrincipalStore<Principal = P>>,
/// ) -> JwtGuard<P> {
///     let token = token.into_inner();
///     JwtGuard::new(codec, store, Arc::new(NoopNotifier), move || token)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken(pub String);

impl RequestToken {
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<S> FromRequestParts<S> for RequestToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse(parts).map(RequestToken).ok_or(AuthError::TokenMissing)
    }
}

/// Like [`RequestToken`] but yields `None` when the request carries no token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalRequestToken(Option<String>);

impl OptionalRequestToken {
    pub fn into_inner(self) -> Option<String> {
        self.0
    }
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for OptionalRequestToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parse(parts)))
    }
}

fn parse(parts: &Parts) -> Option<String> {
    match parts.extensions.get::<TokenParser>() {
        Some(parser) => parser.parse(parts),
        None => TokenParser::default().parse(parts),
    }
}
