//! # jwt-guard
//!
//! Stateless bearer-token authentication: a request-scoped [`JwtGuard`]
//! that resolves the current principal from a JWT, issues tokens for
//! credentials, and refreshes or invalidates them.  Tokens are compatible
//! with Laravel's `tymon/jwt-auth` (same `prv` claim, same defaults).
//!
//! The guard talks to three collaborators, all injected:
//!
//! - a [`TokenCodec`] ([`JwtCodec`] signs with an HMAC secret and keeps a
//!   [`Blacklist`] of invalidated tokens),
//! - a [`PrincipalStore`] that finds principals by id or credentials,
//! - an [`EventNotifier`] told about attempts, logins and logouts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Extension, Router};
//! use jwt_guard::{
//!     Credentials, JwtCodec, JwtConfig, JwtGuard, JwtSubject, OptionalRequestToken,
//!     PrincipalStore, TracingNotifier,
//! };
//!
//! #[derive(Clone)]
//! struct User { id: u32 }
//!
//! impl JwtSubject for User {
//!     fn jwt_identifier(&self) -> String { self.id.to_string() }
//! }
//!
//! struct Users;
//!
//! impl PrincipalStore for Users {
//!     type Principal = User;
//!     fn retrieve_by_id(&self, id: &str) -> Option<User> {
//!         id.parse().ok().map(|id| User { id })
//!     }
//!     fn validate(&self, _credentials: &Credentials) -> Option<User> { None }
//!     fn principal_type_name(&self) -> Option<&str> { Some("App\\Models\\User") }
//! }
//!
//! async fn me(
//!     Extension(codec): Extension<Arc<JwtCodec>>,
//!     token: OptionalRequestToken,
//! ) -> String {
//!     let token = token.into_inner();
//!     let mut guard: JwtGuard<User> =
//!         JwtGuard::new(codec, Arc::new(Users), Arc::new(TracingNotifier), move || token);
//!     match guard.user_or_fail() {
//!         Ok(user) => format!("user_id = {}", user.id),
//!         Err(e) => e.to_string(),
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let codec = Arc::new(JwtCodec::new(JwtConfig::from_env().unwrap()));
//!     let app: Router = Router::new()
//!         .route("/me", get(me))
//!         .layer(Extension(codec));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Environment variables (`JwtConfig::from_env`)
//!
//! This crate does **not** load `.env` files.  See [`JwtConfig::from_env`]
//! for the full list; only `JWT_SECRET` is required.
//!
//! ## Laravel interop
//!
//! Share `JWT_SECRET` with the Laravel application and return the model
//! class (e.g. `App\Models\User`) from
//! [`PrincipalStore::principal_type_name`]: tokens issued on either side
//! then carry the same `prv` hash and are accepted by both.

pub mod blacklist;
pub mod claims;
pub mod config;
pub mod error;
pub mod events;
pub mod extension;
pub mod guard;
pub mod middleware;
pub mod parser;
pub mod provider;
pub mod token;

pub use blacklist::{Blacklist, BlacklistEntry, BlacklistStorage, MemoryStorage};
pub use claims::{hash_subject_model, Claims, CustomClaims, Payload};
pub use config::JwtConfig;
pub use error::{AuthError, AuthFailure};
pub use events::{AuthEvent, BoxError, EventNotifier, NoopNotifier, TracingNotifier};
pub use extension::{Extension, Extensions};
pub use guard::{AttemptOutcome, JwtGuard, Resolution};
pub use middleware::{OptionalRequestToken, RequestToken};
pub use parser::{TokenLocation, TokenParser};
pub use provider::{Credentials, JwtSubject, PrincipalStore};
pub use token::{generate_jti, JwtCodec, TokenCodec};
